use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_enum, sharing_from_json, sharing_to_json};
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_org_unit(conn: &Connection, ou: &OrganisationUnit) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO organisationunit (organisationunitid, uid, code, name, path, hierarchylevel)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![ou.id, ou.uid, ou.code, ou.name, ou.path, ou.hierarchy_level],
    )?;
    Ok(())
}

fn org_unit_from_row(row: &Row) -> rusqlite::Result<OrganisationUnit> {
    Ok(OrganisationUnit {
        id: row.get("organisationunitid")?,
        uid: row.get("uid")?,
        code: row.get("code")?,
        name: row.get("name")?,
        path: row.get("path")?,
        hierarchy_level: row.get("hierarchylevel")?,
    })
}

pub fn get_org_unit(conn: &Connection, id: i64) -> Result<Option<OrganisationUnit>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT organisationunitid, uid, code, name, path, hierarchylevel
             FROM organisationunit WHERE organisationunitid = ?1",
            params![id],
            org_unit_from_row,
        )
        .optional()?)
}

pub fn get_org_unit_by_uid(
    conn: &Connection,
    uid: &str,
) -> Result<Option<OrganisationUnit>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT organisationunitid, uid, code, name, path, hierarchylevel
             FROM organisationunit WHERE uid = ?1",
            params![uid],
            org_unit_from_row,
        )
        .optional()?)
}

pub fn insert_tracked_entity_type(
    conn: &Connection,
    te_type: &TrackedEntityType,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO trackedentitytype (trackedentitytypeid, uid, name, sharing)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            te_type.id,
            te_type.uid,
            te_type.name,
            sharing_to_json(&te_type.sharing)?
        ],
    )?;
    Ok(())
}

fn tracked_entity_type_where(
    conn: &Connection,
    clause: &str,
    key: &dyn rusqlite::ToSql,
) -> Result<Option<TrackedEntityType>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT trackedentitytypeid, uid, name, sharing FROM trackedentitytype WHERE {clause}"),
            [key],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, uid, name, sharing)| {
        Ok(TrackedEntityType {
            id,
            uid,
            name,
            sharing: sharing_from_json(&sharing)?,
        })
    })
    .transpose()
}

pub fn get_tracked_entity_type(
    conn: &Connection,
    id: i64,
) -> Result<Option<TrackedEntityType>, DatabaseError> {
    tracked_entity_type_where(conn, "trackedentitytypeid = ?1", &id)
}

pub fn get_tracked_entity_type_by_uid(
    conn: &Connection,
    uid: &str,
) -> Result<Option<TrackedEntityType>, DatabaseError> {
    tracked_entity_type_where(conn, "uid = ?1", &uid)
}

pub fn insert_attribute(
    conn: &Connection,
    attribute: &TrackedEntityAttribute,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO trackedentityattribute (trackedentityattributeid, uid, name, confidential)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            attribute.id,
            attribute.uid,
            attribute.name,
            attribute.confidential as i32
        ],
    )?;
    Ok(())
}

/// Insert a program and link its attributes (by UID, in order).
pub fn insert_program(conn: &Connection, program: &Program) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO program (programid, uid, name, type, accesslevel, trackedentitytypeid, sharing)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            program.id,
            program.uid,
            program.name,
            program.program_type.as_str(),
            program.access_level.as_str(),
            program.tracked_entity_type.as_ref().map(|t| t.id),
            sharing_to_json(&program.sharing)?,
        ],
    )?;

    for (sort_order, attribute_uid) in program.attributes.iter().enumerate() {
        let linked = conn.execute(
            "INSERT INTO programattribute (programid, trackedentityattributeid, sort_order)
             SELECT ?1, trackedentityattributeid, ?2 FROM trackedentityattribute WHERE uid = ?3",
            params![program.id, sort_order as i64, attribute_uid],
        )?;
        if linked == 0 {
            return Err(DatabaseError::NotFound {
                entity_type: "TrackedEntityAttribute".into(),
                id: attribute_uid.clone(),
            });
        }
    }
    Ok(())
}

fn get_program_attribute_uids(conn: &Connection, program_id: i64) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.uid FROM programattribute pa
         JOIN trackedentityattribute a ON a.trackedentityattributeid = pa.trackedentityattributeid
         WHERE pa.programid = ?1 ORDER BY pa.sort_order",
    )?;
    let rows = stmt.query_map(params![program_id], |row| row.get::<_, String>(0))?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

struct ProgramRow {
    id: i64,
    uid: String,
    name: String,
    program_type: String,
    access_level: String,
    tracked_entity_type_id: Option<i64>,
    sharing: String,
}

const PROGRAM_COLUMNS: &str =
    "programid, uid, name, type, accesslevel, trackedentitytypeid, sharing";

fn program_row(row: &Row) -> rusqlite::Result<ProgramRow> {
    Ok(ProgramRow {
        id: row.get("programid")?,
        uid: row.get("uid")?,
        name: row.get("name")?,
        program_type: row.get("type")?,
        access_level: row.get("accesslevel")?,
        tracked_entity_type_id: row.get("trackedentitytypeid")?,
        sharing: row.get("sharing")?,
    })
}

fn program_from_row(conn: &Connection, row: ProgramRow) -> Result<Program, DatabaseError> {
    let tracked_entity_type = match row.tracked_entity_type_id {
        Some(id) => get_tracked_entity_type(conn, id)?,
        None => None,
    };
    Ok(Program {
        id: row.id,
        uid: row.uid,
        name: row.name,
        program_type: parse_enum(&row.program_type)?,
        access_level: parse_enum(&row.access_level)?,
        tracked_entity_type,
        attributes: get_program_attribute_uids(conn, row.id)?,
        sharing: sharing_from_json(&row.sharing)?,
    })
}

pub fn get_program(conn: &Connection, id: i64) -> Result<Option<Program>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PROGRAM_COLUMNS} FROM program WHERE programid = ?1"),
            params![id],
            program_row,
        )
        .optional()?;
    row.map(|r| program_from_row(conn, r)).transpose()
}

pub fn get_program_by_uid(conn: &Connection, uid: &str) -> Result<Option<Program>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PROGRAM_COLUMNS} FROM program WHERE uid = ?1"),
            params![uid],
            program_row,
        )
        .optional()?;
    row.map(|r| program_from_row(conn, r)).transpose()
}

pub fn get_all_programs(conn: &Connection) -> Result<Vec<Program>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROGRAM_COLUMNS} FROM program ORDER BY programid"
    ))?;
    let rows = stmt
        .query_map([], program_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(|r| program_from_row(conn, r)).collect()
}

pub fn insert_program_stage(conn: &Connection, stage: &ProgramStage) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO programstage (programstageid, uid, name, programid, sharing)
         SELECT ?1, ?2, ?3, programid, ?5 FROM program WHERE uid = ?4",
        params![
            stage.id,
            stage.uid,
            stage.name,
            stage.program,
            sharing_to_json(&stage.sharing)?
        ],
    )?;
    Ok(())
}

fn program_stage_where(
    conn: &Connection,
    clause: &str,
    key: &dyn rusqlite::ToSql,
) -> Result<Option<ProgramStage>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT ps.programstageid, ps.uid, ps.name, p.uid, ps.sharing
                 FROM programstage ps JOIN program p ON p.programid = ps.programid
                 WHERE {clause}"
            ),
            [key],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, uid, name, program, sharing)| {
        Ok(ProgramStage {
            id,
            uid,
            name,
            program,
            sharing: sharing_from_json(&sharing)?,
        })
    })
    .transpose()
}

pub fn get_program_stage(conn: &Connection, id: i64) -> Result<Option<ProgramStage>, DatabaseError> {
    program_stage_where(conn, "ps.programstageid = ?1", &id)
}

pub fn get_program_stage_by_uid(
    conn: &Connection,
    uid: &str,
) -> Result<Option<ProgramStage>, DatabaseError> {
    program_stage_where(conn, "ps.uid = ?1", &uid)
}

pub fn insert_relationship_type(
    conn: &Connection,
    rel_type: &RelationshipType,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO relationshiptype (relationshiptypeid, uid, name, from_entity, to_entity,
         bidirectional, sharing)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            rel_type.id,
            rel_type.uid,
            rel_type.name,
            rel_type.from_entity.as_str(),
            rel_type.to_entity.as_str(),
            rel_type.bidirectional as i32,
            sharing_to_json(&rel_type.sharing)?,
        ],
    )?;
    Ok(())
}

pub fn get_relationship_type(
    conn: &Connection,
    id: i64,
) -> Result<Option<RelationshipType>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT relationshiptypeid, uid, name, from_entity, to_entity, bidirectional, sharing
             FROM relationshiptype WHERE relationshiptypeid = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, bool>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, uid, name, from, to, bidirectional, sharing)| {
        Ok(RelationshipType {
            id,
            uid,
            name,
            from_entity: parse_enum(&from)?,
            to_entity: parse_enum(&to)?,
            bidirectional,
            sharing: sharing_from_json(&sharing)?,
        })
    })
    .transpose()
}

/// Memoizes metadata rows while one query assembles many tracker objects.
pub struct MetadataCache<'c> {
    conn: &'c Connection,
    org_units: HashMap<i64, OrganisationUnit>,
    programs: HashMap<i64, Program>,
    program_ids: HashMap<String, i64>,
    stages: HashMap<i64, ProgramStage>,
    tracked_entity_types: HashMap<i64, TrackedEntityType>,
    relationship_types: HashMap<i64, RelationshipType>,
}

fn missing(entity_type: &str, id: i64) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: entity_type.into(),
        id: id.to_string(),
    }
}

impl<'c> MetadataCache<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            org_units: HashMap::new(),
            programs: HashMap::new(),
            program_ids: HashMap::new(),
            stages: HashMap::new(),
            tracked_entity_types: HashMap::new(),
            relationship_types: HashMap::new(),
        }
    }

    pub fn conn(&self) -> &'c Connection {
        self.conn
    }

    pub fn org_unit(&mut self, id: i64) -> Result<OrganisationUnit, DatabaseError> {
        if let Some(ou) = self.org_units.get(&id) {
            return Ok(ou.clone());
        }
        let ou = get_org_unit(self.conn, id)?.ok_or_else(|| missing("OrganisationUnit", id))?;
        self.org_units.insert(id, ou.clone());
        Ok(ou)
    }

    pub fn program(&mut self, id: i64) -> Result<Program, DatabaseError> {
        if let Some(program) = self.programs.get(&id) {
            return Ok(program.clone());
        }
        let program = get_program(self.conn, id)?.ok_or_else(|| missing("Program", id))?;
        self.program_ids.insert(program.uid.clone(), id);
        self.programs.insert(id, program.clone());
        Ok(program)
    }

    pub fn program_by_uid(&mut self, uid: &str) -> Result<Program, DatabaseError> {
        if let Some(id) = self.program_ids.get(uid).copied() {
            return self.program(id);
        }
        let program = get_program_by_uid(self.conn, uid)?.ok_or_else(|| DatabaseError::NotFound {
            entity_type: "Program".into(),
            id: uid.to_string(),
        })?;
        self.program_ids.insert(program.uid.clone(), program.id);
        self.programs.insert(program.id, program.clone());
        Ok(program)
    }

    pub fn program_stage(&mut self, id: i64) -> Result<ProgramStage, DatabaseError> {
        if let Some(stage) = self.stages.get(&id) {
            return Ok(stage.clone());
        }
        let stage = get_program_stage(self.conn, id)?.ok_or_else(|| missing("ProgramStage", id))?;
        self.stages.insert(id, stage.clone());
        Ok(stage)
    }

    pub fn tracked_entity_type(&mut self, id: i64) -> Result<TrackedEntityType, DatabaseError> {
        if let Some(te_type) = self.tracked_entity_types.get(&id) {
            return Ok(te_type.clone());
        }
        let te_type = get_tracked_entity_type(self.conn, id)?
            .ok_or_else(|| missing("TrackedEntityType", id))?;
        self.tracked_entity_types.insert(id, te_type.clone());
        Ok(te_type)
    }

    pub fn relationship_type(&mut self, id: i64) -> Result<RelationshipType, DatabaseError> {
        if let Some(rel_type) = self.relationship_types.get(&id) {
            return Ok(rel_type.clone());
        }
        let rel_type = get_relationship_type(self.conn, id)?
            .ok_or_else(|| missing("RelationshipType", id))?;
        self.relationship_types.insert(id, rel_type.clone());
        Ok(rel_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::*;
    use crate::models::sharing::ACCESS_DATA_READ;

    fn person_type() -> TrackedEntityType {
        TrackedEntityType {
            id: 1,
            uid: "TeTypeAAAAA".into(),
            name: "Person".into(),
            sharing: Sharing::with_public(ACCESS_DATA_READ),
        }
    }

    #[test]
    fn org_unit_round_trips_by_uid() {
        let conn = open_memory_database().unwrap();
        let root = OrganisationUnit::new(1, "RootAAAAAAA", "Root", None);
        let child = OrganisationUnit::new(2, "ChildAAAAAA", "Child", Some(&root)).with_code("CH");
        insert_org_unit(&conn, &root).unwrap();
        insert_org_unit(&conn, &child).unwrap();

        let loaded = get_org_unit_by_uid(&conn, "ChildAAAAAA").unwrap().unwrap();
        assert_eq!(loaded, child);
        assert!(get_org_unit_by_uid(&conn, "MissingAAAA").unwrap().is_none());
    }

    #[test]
    fn program_loads_type_and_ordered_attributes() {
        let conn = open_memory_database().unwrap();
        insert_tracked_entity_type(&conn, &person_type()).unwrap();
        for (id, uid) in [(1, "AttrNameAAA"), (2, "AttrAgeAAAA")] {
            insert_attribute(
                &conn,
                &TrackedEntityAttribute {
                    id,
                    uid: uid.into(),
                    name: uid.into(),
                    confidential: false,
                },
            )
            .unwrap();
        }
        let program = Program {
            id: 7,
            uid: "ProgramAAAA".into(),
            name: "Child care".into(),
            program_type: ProgramType::WithRegistration,
            access_level: ProgramAccessLevel::Protected,
            tracked_entity_type: Some(person_type()),
            attributes: vec!["AttrAgeAAAA".into(), "AttrNameAAA".into()],
            sharing: Sharing::default(),
        };
        insert_program(&conn, &program).unwrap();

        let loaded = get_program_by_uid(&conn, "ProgramAAAA").unwrap().unwrap();
        assert_eq!(loaded, program);
        assert_eq!(get_all_programs(&conn).unwrap().len(), 1);
    }

    #[test]
    fn program_with_unknown_attribute_fails() {
        let conn = open_memory_database().unwrap();
        let program = Program {
            id: 1,
            uid: "ProgramAAAA".into(),
            name: "p".into(),
            program_type: ProgramType::WithoutRegistration,
            access_level: ProgramAccessLevel::Open,
            tracked_entity_type: None,
            attributes: vec!["NoSuchAttrA".into()],
            sharing: Sharing::default(),
        };
        let err = insert_program(&conn, &program).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn cache_serves_repeated_lookups() {
        let conn = open_memory_database().unwrap();
        insert_org_unit(&conn, &OrganisationUnit::new(1, "RootAAAAAAA", "Root", None)).unwrap();
        let mut cache = MetadataCache::new(&conn);
        assert_eq!(cache.org_unit(1).unwrap().uid, "RootAAAAAAA");
        conn.execute("DELETE FROM organisationunit", []).unwrap();
        assert_eq!(cache.org_unit(1).unwrap().uid, "RootAAAAAAA");
        assert!(matches!(cache.org_unit(2), Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn relationship_type_parses_entities() {
        let conn = open_memory_database().unwrap();
        let rel_type = RelationshipType {
            id: 3,
            uid: "RelTypeAAAA".into(),
            name: "Mother-child".into(),
            from_entity: RelationshipEntity::TrackedEntity,
            to_entity: RelationshipEntity::Enrollment,
            bidirectional: true,
            sharing: Sharing::with_public(ACCESS_DATA_READ).add_user_access("UserAAAAAAA", "rwrw----"),
        };
        insert_relationship_type(&conn, &rel_type).unwrap();
        assert_eq!(get_relationship_type(&conn, 3).unwrap().unwrap(), rel_type);
    }
}
