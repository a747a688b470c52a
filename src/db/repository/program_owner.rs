use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::get_org_unit;
use crate::db::DatabaseError;
use crate::models::TrackedEntityProgramOwner;

const OWNER_KEYS: &str = "FROM trackedentity te, program p, organisationunit ou
     WHERE te.uid = ?1 AND p.uid = ?2 AND ou.uid = ?3";

fn owner_keys_missing(te_uid: &str, program_uid: &str, org_unit_uid: &str) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: "TrackedEntityProgramOwner".into(),
        id: format!("{te_uid}/{program_uid}/{org_unit_uid}"),
    }
}

/// Assign the owning org unit of a tracked entity for one program.
pub fn create_program_owner(
    conn: &Connection,
    te_uid: &str,
    program_uid: &str,
    org_unit_uid: &str,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let inserted = conn.execute(
        &format!(
            "INSERT INTO trackedentityprogramowner
             (trackedentityid, programid, organisationunitid, created, lastupdated)
             SELECT te.trackedentityid, p.programid, ou.organisationunitid, ?4, ?4 {OWNER_KEYS}"
        ),
        params![te_uid, program_uid, org_unit_uid, now],
    )?;
    if inserted == 0 {
        return Err(owner_keys_missing(te_uid, program_uid, org_unit_uid));
    }
    tracing::debug!(te = %te_uid, program = %program_uid, org_unit = %org_unit_uid, "program owner created");
    Ok(())
}

/// Create the owner row, or move ownership to `org_unit_uid` when one exists.
pub fn create_or_update_program_owner(
    conn: &Connection,
    te_uid: &str,
    program_uid: &str,
    org_unit_uid: &str,
    now: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let written = conn.execute(
        &format!(
            "INSERT INTO trackedentityprogramowner
             (trackedentityid, programid, organisationunitid, created, lastupdated)
             SELECT te.trackedentityid, p.programid, ou.organisationunitid, ?4, ?4 {OWNER_KEYS}
             ON CONFLICT (trackedentityid, programid)
             DO UPDATE SET organisationunitid = excluded.organisationunitid,
                           lastupdated = excluded.lastupdated"
        ),
        params![te_uid, program_uid, org_unit_uid, now],
    )?;
    if written == 0 {
        return Err(owner_keys_missing(te_uid, program_uid, org_unit_uid));
    }
    tracing::debug!(te = %te_uid, program = %program_uid, org_unit = %org_unit_uid, "program owner updated");
    Ok(())
}

/// Owner row for (tracked entity, program), if ownership was ever assigned.
pub fn get_program_owner(
    conn: &Connection,
    te_uid: &str,
    program_uid: &str,
) -> Result<Option<TrackedEntityProgramOwner>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT o.organisationunitid, o.created, o.lastupdated
             FROM trackedentityprogramowner o
             JOIN trackedentity te ON te.trackedentityid = o.trackedentityid
             JOIN program p ON p.programid = o.programid
             WHERE te.uid = ?1 AND p.uid = ?2",
            params![te_uid, program_uid],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, NaiveDateTime>(1)?,
                    row.get::<_, NaiveDateTime>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((org_unit_id, created, last_updated)) = row else {
        return Ok(None);
    };
    let org_unit = get_org_unit(conn, org_unit_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "OrganisationUnit".into(),
        id: org_unit_id.to_string(),
    })?;

    Ok(Some(TrackedEntityProgramOwner {
        tracked_entity: te_uid.to_string(),
        program: program_uid.to_string(),
        org_unit,
        created,
        last_updated,
    }))
}

/// Record a temporary ownership grant ("breaking the glass") valid until `valid_till`.
pub fn grant_temporary_ownership(
    conn: &Connection,
    te_uid: &str,
    program_uid: &str,
    user_uid: &str,
    reason: &str,
    valid_till: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let inserted = conn.execute(
        "INSERT INTO programtempowner (trackedentityid, programid, useruid, reason, validtill)
         SELECT te.trackedentityid, p.programid, ?3, ?4, ?5
         FROM trackedentity te, program p WHERE te.uid = ?1 AND p.uid = ?2",
        params![te_uid, program_uid, user_uid, reason, valid_till],
    )?;
    if inserted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "TrackedEntity".into(),
            id: format!("{te_uid}/{program_uid}"),
        });
    }
    tracing::info!(te = %te_uid, program = %program_uid, user = %user_uid, %reason, "temporary ownership granted");
    Ok(())
}

/// Whether `user_uid` holds a grant for (tracked entity, program) still valid at `now`.
pub fn has_temporary_ownership(
    conn: &Connection,
    te_uid: &str,
    program_uid: &str,
    user_uid: &str,
    now: NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM programtempowner t
         JOIN trackedentity te ON te.trackedentityid = t.trackedentityid
         JOIN program p ON p.programid = t.programid
         WHERE te.uid = ?1 AND p.uid = ?2 AND t.useruid = ?3 AND t.validtill > ?4",
        params![te_uid, program_uid, user_uid, now],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
