use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    fetch_id_page, fetch_ids, load_enrollment, load_event, load_tracked_entity, MetadataCache,
    SqlFilter,
};
use crate::db::DatabaseError;
use crate::export::page::{Page, PageParams};
use crate::models::enums::RelationshipEntity;
use crate::models::*;

/// Column suffix and owning table for one kind of relationship side.
fn side_target(entity: RelationshipEntity) -> (&'static str, &'static str) {
    match entity {
        RelationshipEntity::TrackedEntity => ("trackedentityid", "trackedentity"),
        RelationshipEntity::Enrollment => ("enrollmentid", "enrollment"),
        RelationshipEntity::Event => ("eventid", "event"),
    }
}

fn side_ids(item: &RelationshipItem) -> [Option<i64>; 3] {
    match item {
        RelationshipItem::TrackedEntity(te) => [Some(te.id), None, None],
        RelationshipItem::Enrollment(enrollment) => [None, Some(enrollment.id), None],
        RelationshipItem::Event(event) => [None, None, Some(event.id)],
    }
}

pub fn insert_relationship(conn: &Connection, rel: &Relationship) -> Result<(), DatabaseError> {
    let [from_te, from_en, from_ev] = side_ids(&rel.from);
    let [to_te, to_en, to_ev] = side_ids(&rel.to);
    conn.execute(
        "INSERT INTO relationship (relationshipid, uid, relationshiptypeid,
         from_trackedentityid, from_enrollmentid, from_eventid,
         to_trackedentityid, to_enrollmentid, to_eventid,
         deleted, created, createdatclient, lastupdated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            rel.id,
            rel.uid,
            rel.relationship_type.id,
            from_te,
            from_en,
            from_ev,
            to_te,
            to_en,
            to_ev,
            rel.deleted as i32,
            rel.created,
            rel.created_at_client,
            rel.last_updated,
        ],
    )?;
    Ok(())
}

fn load_item(
    meta: &mut MetadataCache,
    ids: [Option<i64>; 3],
    relationship_uid: &str,
) -> Result<RelationshipItem, DatabaseError> {
    let item = match ids {
        [Some(id), _, _] => load_tracked_entity(meta, id)?.map(RelationshipItem::TrackedEntity),
        [_, Some(id), _] => {
            load_enrollment(meta, id)?.map(|e| RelationshipItem::Enrollment(Box::new(e)))
        }
        [_, _, Some(id)] => load_event(meta, id)?.map(|e| RelationshipItem::Event(Box::new(e))),
        _ => None,
    };
    item.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "RelationshipItem".into(),
        id: relationship_uid.to_string(),
    })
}

struct RelationshipRow {
    id: i64,
    uid: String,
    type_id: i64,
    from: [Option<i64>; 3],
    to: [Option<i64>; 3],
    deleted: bool,
    created: Option<NaiveDateTime>,
    created_at_client: Option<NaiveDateTime>,
    last_updated: Option<NaiveDateTime>,
}

/// Load one relationship with both sides fully resolved.
pub fn load_relationship(
    meta: &mut MetadataCache,
    id: i64,
) -> Result<Option<Relationship>, DatabaseError> {
    let row = meta
        .conn()
        .query_row(
            "SELECT * FROM relationship WHERE relationshipid = ?1",
            params![id],
            |row| {
                Ok(RelationshipRow {
                    id: row.get("relationshipid")?,
                    uid: row.get("uid")?,
                    type_id: row.get("relationshiptypeid")?,
                    from: [
                        row.get("from_trackedentityid")?,
                        row.get("from_enrollmentid")?,
                        row.get("from_eventid")?,
                    ],
                    to: [
                        row.get("to_trackedentityid")?,
                        row.get("to_enrollmentid")?,
                        row.get("to_eventid")?,
                    ],
                    deleted: row.get("deleted")?,
                    created: row.get("created")?,
                    created_at_client: row.get("createdatclient")?,
                    last_updated: row.get("lastupdated")?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(Relationship {
        id: row.id,
        relationship_type: meta.relationship_type(row.type_id)?,
        from: load_item(meta, row.from, &row.uid)?,
        to: load_item(meta, row.to, &row.uid)?,
        uid: row.uid,
        deleted: row.deleted,
        created: row.created,
        created_at_client: row.created_at_client,
        last_updated: row.last_updated,
    }))
}

pub fn get_relationship_by_uid(
    conn: &Connection,
    uid: &str,
) -> Result<Option<Relationship>, DatabaseError> {
    let id: Option<i64> = conn
        .query_row(
            "SELECT relationshipid FROM relationship WHERE uid = ?1",
            params![uid],
            |row| row.get(0),
        )
        .optional()?;
    match id {
        Some(id) => load_relationship(&mut MetadataCache::new(conn), id),
        None => Ok(None),
    }
}

const SELECT_RELATIONSHIP_IDS: &str = "SELECT r.relationshipid FROM relationship r WHERE 1=1";

fn item_filter(entity: RelationshipEntity, item_uid: &str, include_deleted: bool) -> SqlFilter {
    let (column, table) = side_target(entity);
    let mut filter = SqlFilter::new();
    let uid = filter.bind(item_uid.to_string());
    let target = format!("(SELECT {column} FROM {table} WHERE uid = {uid})");
    filter.and(format!(
        "(r.from_{column} = {target} OR r.to_{column} = {target})"
    ));
    if !include_deleted {
        filter.and("r.deleted = 0");
    }
    filter
}

fn load_all(conn: &Connection, ids: Vec<i64>) -> Result<Vec<Relationship>, DatabaseError> {
    let mut meta = MetadataCache::new(conn);
    let mut relationships = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(rel) = load_relationship(&mut meta, id)? {
            relationships.push(rel);
        }
    }
    Ok(relationships)
}

/// Relationships with the given item on either side.
pub fn query_relationships_by_item(
    conn: &Connection,
    entity: RelationshipEntity,
    item_uid: &str,
    include_deleted: bool,
) -> Result<Vec<Relationship>, DatabaseError> {
    let filter = item_filter(entity, item_uid, include_deleted);
    let ids = fetch_ids(conn, SELECT_RELATIONSHIP_IDS, &filter, "r.relationshipid")?;
    load_all(conn, ids)
}

pub fn query_relationship_page_by_item(
    conn: &Connection,
    entity: RelationshipEntity,
    item_uid: &str,
    include_deleted: bool,
    page: &PageParams,
) -> Result<Page<Relationship>, DatabaseError> {
    let filter = item_filter(entity, item_uid, include_deleted);
    let ids = fetch_id_page(conn, SELECT_RELATIONSHIP_IDS, &filter, "r.relationshipid", page)?;
    let relationships = load_all(conn, ids.items.clone())?;
    Ok(ids.with_items(relationships))
}
