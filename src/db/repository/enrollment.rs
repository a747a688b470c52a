use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    fetch_id_page, fetch_ids, load_tracked_entity, parse_enum, restrict_org_units, MetadataCache,
    SqlFilter,
};
use crate::db::DatabaseError;
use crate::export::page::{Page, PageParams};
use crate::export::params::{EnrollmentOrderField, EnrollmentQueryParams, SortDirection};
use crate::models::*;

pub fn insert_enrollment(conn: &Connection, enrollment: &Enrollment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO enrollment (enrollmentid, uid, trackedentityid, programid, organisationunitid,
         geometry, created, createdatclient, lastupdated, lastupdatedatclient, status,
         enrollmentdate, occurreddate, followup, completeddate, completedby, storedby,
         createdbyuid, createdbyusername, lastupdatedbyuid, lastupdatedbyusername, deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
         ?18, ?19, ?20, ?21, ?22)",
        params![
            enrollment.id,
            enrollment.uid,
            enrollment.tracked_entity.as_ref().map(|te| te.id),
            enrollment.program.id,
            enrollment.org_unit.id,
            enrollment.geometry,
            enrollment.created,
            enrollment.created_at_client,
            enrollment.last_updated,
            enrollment.last_updated_at_client,
            enrollment.status.as_str(),
            enrollment.enrollment_date,
            enrollment.occurred_date,
            enrollment.follow_up as i32,
            enrollment.completed_date,
            enrollment.completed_by,
            enrollment.stored_by,
            enrollment.created_by.as_ref().map(|u| u.uid.as_str()),
            enrollment.created_by.as_ref().map(|u| u.username.as_str()),
            enrollment.last_updated_by.as_ref().map(|u| u.uid.as_str()),
            enrollment.last_updated_by.as_ref().map(|u| u.username.as_str()),
            enrollment.deleted as i32,
        ],
    )?;
    for note in &enrollment.notes {
        insert_note(conn, note, NoteOwner::Enrollment(enrollment.id))?;
    }
    Ok(())
}

/// Row a note hangs off.
#[derive(Debug, Clone, Copy)]
pub enum NoteOwner {
    Enrollment(i64),
    Event(i64),
}

pub fn insert_note(conn: &Connection, note: &Note, owner: NoteOwner) -> Result<(), DatabaseError> {
    let (enrollment_id, event_id) = match owner {
        NoteOwner::Enrollment(id) => (Some(id), None),
        NoteOwner::Event(id) => (None, Some(id)),
    };
    conn.execute(
        "INSERT INTO note (uid, value, storedby, created, enrollmentid, eventid)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            note.uid,
            note.value,
            note.stored_by,
            note.created,
            enrollment_id,
            event_id
        ],
    )?;
    Ok(())
}

pub(super) fn get_notes(conn: &Connection, owner: NoteOwner) -> Result<Vec<Note>, DatabaseError> {
    let (column, id) = match owner {
        NoteOwner::Enrollment(id) => ("enrollmentid", id),
        NoteOwner::Event(id) => ("eventid", id),
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT uid, value, storedby, created FROM note WHERE {column} = ?1 ORDER BY noteid"
    ))?;
    let rows = stmt.query_map(params![id], |row| {
        Ok(Note {
            uid: row.get(0)?,
            value: row.get(1)?,
            stored_by: row.get(2)?,
            created: row.get(3)?,
        })
    })?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

fn user_info(uid: Option<String>, username: Option<String>) -> Option<UserInfo> {
    uid.map(|uid| UserInfo {
        uid,
        username: username.unwrap_or_default(),
    })
}

struct EnrollmentRow {
    id: i64,
    uid: String,
    tracked_entity_id: Option<i64>,
    program_id: i64,
    org_unit_id: i64,
    geometry: Option<String>,
    created: Option<NaiveDateTime>,
    created_at_client: Option<NaiveDateTime>,
    last_updated: Option<NaiveDateTime>,
    last_updated_at_client: Option<NaiveDateTime>,
    status: String,
    enrollment_date: Option<NaiveDateTime>,
    occurred_date: Option<NaiveDateTime>,
    follow_up: bool,
    completed_date: Option<NaiveDateTime>,
    completed_by: Option<String>,
    stored_by: Option<String>,
    created_by: Option<UserInfo>,
    last_updated_by: Option<UserInfo>,
    deleted: bool,
}

/// Load one enrollment with its tracked entity, program, org unit and notes.
/// Nested events, relationships and attributes are left unset.
pub fn load_enrollment(
    meta: &mut MetadataCache,
    id: i64,
) -> Result<Option<Enrollment>, DatabaseError> {
    let conn = meta.conn();
    let row = conn
        .query_row(
            "SELECT * FROM enrollment WHERE enrollmentid = ?1",
            params![id],
            |row| {
                Ok(EnrollmentRow {
                    id: row.get("enrollmentid")?,
                    uid: row.get("uid")?,
                    tracked_entity_id: row.get("trackedentityid")?,
                    program_id: row.get("programid")?,
                    org_unit_id: row.get("organisationunitid")?,
                    geometry: row.get("geometry")?,
                    created: row.get("created")?,
                    created_at_client: row.get("createdatclient")?,
                    last_updated: row.get("lastupdated")?,
                    last_updated_at_client: row.get("lastupdatedatclient")?,
                    status: row.get("status")?,
                    enrollment_date: row.get("enrollmentdate")?,
                    occurred_date: row.get("occurreddate")?,
                    follow_up: row.get("followup")?,
                    completed_date: row.get("completeddate")?,
                    completed_by: row.get("completedby")?,
                    stored_by: row.get("storedby")?,
                    created_by: user_info(row.get("createdbyuid")?, row.get("createdbyusername")?),
                    last_updated_by: user_info(
                        row.get("lastupdatedbyuid")?,
                        row.get("lastupdatedbyusername")?,
                    ),
                    deleted: row.get("deleted")?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let tracked_entity = match row.tracked_entity_id {
        Some(te_id) => load_tracked_entity(meta, te_id)?,
        None => None,
    };

    Ok(Some(Enrollment {
        id: row.id,
        uid: row.uid,
        tracked_entity,
        program: meta.program(row.program_id)?,
        org_unit: meta.org_unit(row.org_unit_id)?,
        geometry: row.geometry,
        created: row.created,
        created_at_client: row.created_at_client,
        last_updated: row.last_updated,
        last_updated_at_client: row.last_updated_at_client,
        status: parse_enum(&row.status)?,
        enrollment_date: row.enrollment_date,
        occurred_date: row.occurred_date,
        follow_up: row.follow_up,
        completed_date: row.completed_date,
        completed_by: row.completed_by,
        stored_by: row.stored_by,
        created_by: row.created_by,
        last_updated_by: row.last_updated_by,
        deleted: row.deleted,
        notes: get_notes(conn, NoteOwner::Enrollment(row.id))?,
        events: None,
        relationship_items: None,
        attributes: None,
    }))
}

pub fn get_enrollment_by_uid(
    conn: &Connection,
    uid: &str,
) -> Result<Option<Enrollment>, DatabaseError> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT enrollmentid FROM enrollment WHERE uid = ?1",
            params![uid],
            |row| row.get(0),
        )
        .optional()?;
    match id {
        Some(id) => load_enrollment(&mut MetadataCache::new(conn), id),
        None => Ok(None),
    }
}

const SELECT_ENROLLMENT_IDS: &str = "SELECT en.enrollmentid FROM enrollment en
     JOIN organisationunit ou ON ou.organisationunitid = en.organisationunitid
     LEFT JOIN trackedentity te ON te.trackedentityid = en.trackedentityid
     WHERE 1=1";

fn enrollment_filter(params: &EnrollmentQueryParams) -> SqlFilter {
    let mut filter = SqlFilter::new();
    if !params.enrollments.is_empty() {
        let uids = filter.bind_all(params.enrollments.iter().cloned());
        filter.and(format!("en.uid IN ({uids})"));
    }
    if let Some(program) = &params.program {
        let id = filter.bind(program.id);
        filter.and(format!("en.programid = {id}"));
    }
    if let Some(te_type) = &params.tracked_entity_type {
        let id = filter.bind(te_type.id);
        filter.and(format!("te.trackedentitytypeid = {id}"));
    }
    if let Some(te) = &params.tracked_entity {
        let uid = filter.bind(te.clone());
        filter.and(format!("te.uid = {uid}"));
    }
    if let Some(status) = params.enrollment_status {
        let status = filter.bind(status.as_str());
        filter.and(format!("en.status = {status}"));
    }
    if let Some(follow_up) = params.follow_up {
        let follow_up = filter.bind(follow_up as i32);
        filter.and(format!("en.followup = {follow_up}"));
    }
    if let Some(last_updated) = params.last_updated {
        let bound = filter.bind(last_updated);
        filter.and(format!("en.lastupdated >= {bound}"));
    }
    if let Some(after) = params.enrolled_after {
        let bound = filter.bind(after);
        filter.and(format!("en.enrollmentdate >= {bound}"));
    }
    if let Some(before) = params.enrolled_before {
        let bound = filter.bind(before);
        filter.and(format!("en.enrollmentdate <= {bound}"));
    }
    if !params.include_deleted {
        filter.and("en.deleted = 0");
    }
    restrict_org_units(&mut filter, "ou", params.org_unit_mode, &params.org_units);
    filter
}

fn order_column(field: EnrollmentOrderField) -> &'static str {
    match field {
        EnrollmentOrderField::Created => "en.created",
        EnrollmentOrderField::LastUpdated => "en.lastupdated",
        EnrollmentOrderField::EnrolledAt => "en.enrollmentdate",
        EnrollmentOrderField::OccurredAt => "en.occurreddate",
        EnrollmentOrderField::CompletedAt => "en.completeddate",
    }
}

fn enrollment_order_by(params: &EnrollmentQueryParams) -> String {
    let mut columns: Vec<String> = params
        .order
        .iter()
        .map(|(field, direction)| {
            let dir = match direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{} {dir}", order_column(*field))
        })
        .collect();
    columns.push("en.enrollmentid".to_string());
    columns.join(", ")
}

fn load_all(conn: &Connection, ids: Vec<i64>) -> Result<Vec<Enrollment>, DatabaseError> {
    let mut meta = MetadataCache::new(conn);
    let mut enrollments = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(enrollment) = load_enrollment(&mut meta, id)? {
            enrollments.push(enrollment);
        }
    }
    Ok(enrollments)
}

/// All enrollments matching `params`, in store order.
pub fn query_enrollments(
    conn: &Connection,
    params: &EnrollmentQueryParams,
) -> Result<Vec<Enrollment>, DatabaseError> {
    let filter = enrollment_filter(params);
    let ids = fetch_ids(conn, SELECT_ENROLLMENT_IDS, &filter, &enrollment_order_by(params))?;
    load_all(conn, ids)
}

pub fn query_enrollment_page(
    conn: &Connection,
    params: &EnrollmentQueryParams,
    page: &PageParams,
) -> Result<Page<Enrollment>, DatabaseError> {
    let filter = enrollment_filter(params);
    let ids = fetch_id_page(
        conn,
        SELECT_ENROLLMENT_IDS,
        &filter,
        &enrollment_order_by(params),
        page,
    )?;
    let enrollments = load_all(conn, ids.items.clone())?;
    Ok(ids.with_items(enrollments))
}

/// Non-deleted enrollments of a tracked entity.
pub fn count_active_enrollments(conn: &Connection, te_uid: &str) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM enrollment en
         JOIN trackedentity te ON te.trackedentityid = en.trackedentityid
         WHERE te.uid = ?1 AND en.deleted = 0",
        params![te_uid],
        |row| row.get(0),
    )?;
    Ok(count)
}
