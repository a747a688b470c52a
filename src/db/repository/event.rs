use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::enrollment::{get_notes, insert_note, NoteOwner};
use super::{fetch_ids, load_tracked_entity, parse_enum, MetadataCache, SqlFilter};
use crate::db::DatabaseError;
use crate::export::params::EventQueryParams;
use crate::models::*;

pub fn insert_event(conn: &Connection, event: &Event) -> Result<(), DatabaseError> {
    let inserted = conn.execute(
        "INSERT INTO event (eventid, uid, enrollmentid, programstageid, organisationunitid, status,
         occurreddate, scheduleddate, geometry, created, lastupdated, completeddate, completedby,
         storedby, assigneduseruid, assignedusername, deleted, eventdatavalues)
         SELECT ?1, ?2, en.enrollmentid, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
         ?17, ?18
         FROM enrollment en WHERE en.uid = ?3",
        params![
            event.id,
            event.uid,
            event.enrollment,
            event.program_stage.id,
            event.org_unit.id,
            event.status.as_str(),
            event.occurred_date,
            event.scheduled_date,
            event.geometry,
            event.created,
            event.last_updated,
            event.completed_date,
            event.completed_by,
            event.stored_by,
            event.assigned_user.as_ref().map(|u| u.uid.as_str()),
            event.assigned_user.as_ref().map(|u| u.username.as_str()),
            event.deleted as i32,
            serde_json::to_string(&event.data_values)?,
        ],
    )?;
    if inserted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Enrollment".into(),
            id: event.enrollment.clone(),
        });
    }
    for note in &event.notes {
        insert_note(conn, note, NoteOwner::Event(event.id))?;
    }
    Ok(())
}

struct EventRow {
    id: i64,
    uid: String,
    enrollment: String,
    tracked_entity_id: Option<i64>,
    stage_id: i64,
    org_unit_id: i64,
    status: String,
    occurred_date: Option<NaiveDateTime>,
    scheduled_date: Option<NaiveDateTime>,
    geometry: Option<String>,
    created: Option<NaiveDateTime>,
    last_updated: Option<NaiveDateTime>,
    completed_date: Option<NaiveDateTime>,
    completed_by: Option<String>,
    stored_by: Option<String>,
    assigned_uid: Option<String>,
    assigned_username: Option<String>,
    deleted: bool,
    data_values: String,
}

/// Load one event with its stage, program, org unit, data values and notes.
pub fn load_event(meta: &mut MetadataCache, id: i64) -> Result<Option<Event>, DatabaseError> {
    let conn = meta.conn();
    let row = conn
        .query_row(
            "SELECT ev.*, en.uid AS enrollmentuid, en.trackedentityid AS trackedentityid
             FROM event ev JOIN enrollment en ON en.enrollmentid = ev.enrollmentid
             WHERE ev.eventid = ?1",
            params![id],
            |row| {
                Ok(EventRow {
                    id: row.get("eventid")?,
                    uid: row.get("uid")?,
                    enrollment: row.get("enrollmentuid")?,
                    tracked_entity_id: row.get("trackedentityid")?,
                    stage_id: row.get("programstageid")?,
                    org_unit_id: row.get("organisationunitid")?,
                    status: row.get("status")?,
                    occurred_date: row.get("occurreddate")?,
                    scheduled_date: row.get("scheduleddate")?,
                    geometry: row.get("geometry")?,
                    created: row.get("created")?,
                    last_updated: row.get("lastupdated")?,
                    completed_date: row.get("completeddate")?,
                    completed_by: row.get("completedby")?,
                    stored_by: row.get("storedby")?,
                    assigned_uid: row.get("assigneduseruid")?,
                    assigned_username: row.get("assignedusername")?,
                    deleted: row.get("deleted")?,
                    data_values: row.get("eventdatavalues")?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let program_stage = meta.program_stage(row.stage_id)?;
    let program = meta.program_by_uid(&program_stage.program)?;
    let tracked_entity = match row.tracked_entity_id {
        Some(te_id) => load_tracked_entity(meta, te_id)?,
        None => None,
    };

    Ok(Some(Event {
        id: row.id,
        uid: row.uid,
        enrollment: row.enrollment,
        tracked_entity,
        program,
        program_stage,
        org_unit: meta.org_unit(row.org_unit_id)?,
        status: parse_enum(&row.status)?,
        occurred_date: row.occurred_date,
        scheduled_date: row.scheduled_date,
        geometry: row.geometry,
        created: row.created,
        last_updated: row.last_updated,
        completed_date: row.completed_date,
        completed_by: row.completed_by,
        stored_by: row.stored_by,
        assigned_user: row.assigned_uid.map(|uid| UserInfo {
            uid,
            username: row.assigned_username.unwrap_or_default(),
        }),
        deleted: row.deleted,
        data_values: serde_json::from_str(&row.data_values)?,
        notes: get_notes(conn, NoteOwner::Event(row.id))?,
        relationship_items: None,
    }))
}

pub fn get_event_by_uid(conn: &Connection, uid: &str) -> Result<Option<Event>, DatabaseError> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT eventid FROM event WHERE uid = ?1",
            params![uid],
            |row| row.get(0),
        )
        .optional()?;
    match id {
        Some(id) => load_event(&mut MetadataCache::new(conn), id),
        None => Ok(None),
    }
}

/// Events of the given enrollments ordered by enrollment, then scheduled and
/// occurred date.
pub fn query_events(conn: &Connection, params: &EventQueryParams) -> Result<Vec<Event>, DatabaseError> {
    if params.enrollments.is_empty() {
        return Ok(Vec::new());
    }
    let mut filter = SqlFilter::new();
    let uids = filter.bind_all(params.enrollments.iter().cloned());
    filter.and(format!("en.uid IN ({uids})"));
    if !params.include_deleted {
        filter.and("ev.deleted = 0");
    }
    let ids = fetch_ids(
        conn,
        "SELECT ev.eventid FROM event ev JOIN enrollment en ON en.enrollmentid = ev.enrollmentid WHERE 1=1",
        &filter,
        "ev.enrollmentid, ev.occurreddate, ev.eventid",
    )?;

    let mut meta = MetadataCache::new(conn);
    let mut events = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(event) = load_event(&mut meta, id)? {
            events.push(event);
        }
    }
    Ok(events)
}

/// Non-deleted events of an enrollment.
pub fn count_active_events(conn: &Connection, enrollment_uid: &str) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM event ev
         JOIN enrollment en ON en.enrollmentid = ev.enrollmentid
         WHERE en.uid = ?1 AND ev.deleted = 0",
        params![enrollment_uid],
        |row| row.get(0),
    )?;
    Ok(count)
}
