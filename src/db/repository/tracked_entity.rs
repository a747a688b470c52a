use rusqlite::{params, Connection, OptionalExtension};

use super::MetadataCache;
use crate::db::DatabaseError;
use crate::models::*;

/// Insert a tracked entity with its attribute values.
pub fn insert_tracked_entity(conn: &Connection, te: &TrackedEntity) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO trackedentity (trackedentityid, uid, trackedentitytypeid, organisationunitid,
         created, lastupdated, inactive, deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            te.id,
            te.uid,
            te.tracked_entity_type.as_ref().map(|t| t.id),
            te.org_unit.as_ref().map(|ou| ou.id),
            te.created,
            te.last_updated,
            te.inactive as i32,
            te.deleted as i32,
        ],
    )?;
    for value in &te.attribute_values {
        insert_attribute_value(conn, te.id, value)?;
    }
    Ok(())
}

pub fn insert_attribute_value(
    conn: &Connection,
    tracked_entity_id: i64,
    value: &TrackedEntityAttributeValue,
) -> Result<(), DatabaseError> {
    let inserted = conn.execute(
        "INSERT INTO trackedentityattributevalue (trackedentityid, trackedentityattributeid,
         value, created, lastupdated)
         SELECT ?1, trackedentityattributeid, ?3, ?4, ?5 FROM trackedentityattribute WHERE uid = ?2",
        params![
            tracked_entity_id,
            value.attribute,
            value.value,
            value.created,
            value.last_updated,
        ],
    )?;
    if inserted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "TrackedEntityAttribute".into(),
            id: value.attribute.clone(),
        });
    }
    Ok(())
}

pub fn get_attribute_values(
    conn: &Connection,
    tracked_entity_id: i64,
) -> Result<Vec<TrackedEntityAttributeValue>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.uid, v.value, v.created, v.lastupdated
         FROM trackedentityattributevalue v
         JOIN trackedentityattribute a ON a.trackedentityattributeid = v.trackedentityattributeid
         WHERE v.trackedentityid = ?1
         ORDER BY a.trackedentityattributeid",
    )?;
    let rows = stmt.query_map(params![tracked_entity_id], |row| {
        Ok(TrackedEntityAttributeValue {
            attribute: row.get(0)?,
            value: row.get(1)?,
            created: row.get(2)?,
            last_updated: row.get(3)?,
        })
    })?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Load a tracked entity by internal id, deleted or not.
pub fn load_tracked_entity(
    meta: &mut MetadataCache,
    id: i64,
) -> Result<Option<TrackedEntity>, DatabaseError> {
    let conn = meta.conn();
    let row = conn
        .query_row(
            "SELECT trackedentityid, uid, trackedentitytypeid, organisationunitid, created,
             lastupdated, inactive, deleted
             FROM trackedentity WHERE trackedentityid = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<chrono::NaiveDateTime>>(4)?,
                    row.get::<_, Option<chrono::NaiveDateTime>>(5)?,
                    row.get::<_, bool>(6)?,
                    row.get::<_, bool>(7)?,
                ))
            },
        )
        .optional()?;

    let Some((id, uid, type_id, ou_id, created, last_updated, inactive, deleted)) = row else {
        return Ok(None);
    };

    let tracked_entity_type = type_id.map(|t| meta.tracked_entity_type(t)).transpose()?;
    let org_unit = ou_id.map(|ou| meta.org_unit(ou)).transpose()?;

    Ok(Some(TrackedEntity {
        id,
        uid,
        tracked_entity_type,
        org_unit,
        created,
        last_updated,
        inactive,
        deleted,
        attribute_values: get_attribute_values(conn, id)?,
    }))
}

pub fn get_tracked_entity_id(conn: &Connection, uid: &str) -> Result<Option<i64>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT trackedentityid FROM trackedentity WHERE uid = ?1",
            params![uid],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn get_tracked_entity_by_uid(
    conn: &Connection,
    uid: &str,
) -> Result<Option<TrackedEntity>, DatabaseError> {
    match get_tracked_entity_id(conn, uid)? {
        Some(id) => load_tracked_entity(&mut MetadataCache::new(conn), id),
        None => Ok(None),
    }
}

pub fn mark_tracked_entity_deleted(conn: &Connection, uid: &str) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE trackedentity SET deleted = 1 WHERE uid = ?1",
        params![uid],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "TrackedEntity".into(),
            id: uid.to_string(),
        });
    }
    Ok(())
}
