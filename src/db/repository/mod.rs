//! Repository layer: entity-scoped database operations as free functions
//! over a `&Connection`, split by tracker entity.

mod acl;
mod enrollment;
mod event;
mod metadata;
mod program_owner;
mod relationship;
mod tracked_entity;

use std::str::FromStr;

use rusqlite::types::ToSql;
use rusqlite::Connection;

use super::DatabaseError;
use crate::export::page::{Page, PageParams, Pager};
use crate::models::enums::{OrgUnitSelectionMode, ParseEnumError};
use crate::models::{OrganisationUnit, Sharing};

pub use acl::*;
pub use enrollment::*;
pub use event::*;
pub use metadata::*;
pub use program_owner::*;
pub use relationship::*;
pub use tracked_entity::*;

/// `WHERE` suffix built up clause by clause with positional `?N` params.
#[derive(Default)]
pub(crate) struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl SqlFilter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a param and return its placeholder.
    pub(crate) fn bind(&mut self, value: impl ToSql + 'static) -> String {
        self.params.push(Box::new(value));
        format!("?{}", self.params.len())
    }

    /// Placeholders for an `IN (...)` list.
    pub(crate) fn bind_all<I, T>(&mut self, values: I) -> String
    where
        I: IntoIterator<Item = T>,
        T: ToSql + 'static,
    {
        values
            .into_iter()
            .map(|v| self.bind(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn and(&mut self, clause: impl Into<String>) {
        self.clauses.push(clause.into());
    }

    pub(crate) fn sql_suffix(&self) -> String {
        self.clauses
            .iter()
            .map(|c| format!(" AND {c}"))
            .collect::<String>()
    }

    pub(crate) fn param_refs(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

/// Restrict rows joined to `organisationunit` under `alias` by selection mode.
/// ACCESSIBLE and CAPTURE arrive with their scope roots and behave like
/// DESCENDANTS; an empty unit list matches nothing.
pub(crate) fn restrict_org_units(
    filter: &mut SqlFilter,
    alias: &str,
    mode: OrgUnitSelectionMode,
    org_units: &[OrganisationUnit],
) {
    if mode == OrgUnitSelectionMode::All {
        return;
    }
    if org_units.is_empty() {
        filter.and("1 = 0");
        return;
    }
    let mut alternatives = Vec::with_capacity(org_units.len());
    for unit in org_units {
        let clause = match mode {
            OrgUnitSelectionMode::Selected => {
                let id = filter.bind(unit.id);
                format!("{alias}.organisationunitid = {id}")
            }
            OrgUnitSelectionMode::Children => {
                let id = filter.bind(unit.id);
                let below = filter.bind(format!("{}/%", unit.path));
                let level = filter.bind(unit.hierarchy_level + 1);
                format!(
                    "({alias}.organisationunitid = {id} OR ({alias}.path LIKE {below} AND {alias}.hierarchylevel = {level}))"
                )
            }
            _ => {
                let path = filter.bind(unit.path.clone());
                let below = filter.bind(format!("{}/%", unit.path));
                format!("({alias}.path = {path} OR {alias}.path LIKE {below})")
            }
        };
        alternatives.push(clause);
    }
    filter.and(format!("({})", alternatives.join(" OR ")));
}

/// Run `select_sql` (one id column, already carrying `WHERE 1=1`) with the
/// filter applied and return the ids in order.
pub(crate) fn fetch_ids(
    conn: &Connection,
    select_sql: &str,
    filter: &SqlFilter,
    order_by: &str,
) -> Result<Vec<i64>, DatabaseError> {
    let sql = format!("{select_sql}{} ORDER BY {order_by}", filter.sql_suffix());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(filter.param_refs().as_slice(), |row| row.get::<_, i64>(0))?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Paged variant of [`fetch_ids`]. Counts all matches when the caller asked
/// for totals, otherwise reads one row past the window to detect the last page.
pub(crate) fn fetch_id_page(
    conn: &Connection,
    select_sql: &str,
    filter: &SqlFilter,
    order_by: &str,
    page: &PageParams,
) -> Result<Page<i64>, DatabaseError> {
    let where_sql = format!("{select_sql}{}", filter.sql_suffix());
    let params = filter.param_refs();
    let limit = if page.page_total() {
        i64::from(page.page_size())
    } else {
        i64::from(page.page_size()) + 1
    };

    let sql = format!(
        "{where_sql} ORDER BY {order_by} LIMIT {limit} OFFSET {}",
        page.offset()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut ids = stmt
        .query_map(params.as_slice(), |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let pager = if page.page_total() {
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM ({where_sql})"),
            params.as_slice(),
            |row| row.get(0),
        )?;
        Pager::with_total(page, total.max(0) as u64)
    } else {
        let is_last_page = ids.len() <= page.page_size() as usize;
        ids.truncate(page.page_size() as usize);
        Pager::with_last_page(page, is_last_page)
    };

    Ok(Page::new(ids, pager))
}

pub(crate) fn parse_enum<T>(value: &str) -> Result<T, DatabaseError>
where
    T: FromStr<Err = ParseEnumError>,
{
    Ok(value.parse::<T>()?)
}

pub(crate) fn sharing_from_json(json: &str) -> Result<Sharing, DatabaseError> {
    Ok(serde_json::from_str(json)?)
}

pub(crate) fn sharing_to_json(sharing: &Sharing) -> Result<String, DatabaseError> {
    Ok(serde_json::to_string(sharing)?)
}

#[cfg(test)]
pub(crate) mod fixtures;
