use std::collections::HashSet;

use rusqlite::Connection;

use super::SqlFilter;
use crate::db::DatabaseError;

/// Metadata tables carrying a `sharing` JSON column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedTable {
    TrackedEntityType,
    Program,
    ProgramStage,
    RelationshipType,
}

impl SharedTable {
    fn table_and_id(&self) -> (&'static str, &'static str) {
        match self {
            Self::TrackedEntityType => ("trackedentitytype", "trackedentitytypeid"),
            Self::Program => ("program", "programid"),
            Self::ProgramStage => ("programstage", "programstageid"),
            Self::RelationshipType => ("relationshiptype", "relationshiptypeid"),
        }
    }
}

/// Internal ids of rows in `table` the user may read data of: public access
/// absent or matching `__r%`, or a matching user entry, or (only when the
/// user belongs to groups) a matching group entry.
pub fn data_readable_ids(
    conn: &Connection,
    table: SharedTable,
    user_uid: &str,
    user_groups: &[String],
) -> Result<HashSet<i64>, DatabaseError> {
    let (name, id_column) = table.table_and_id();
    let mut filter = SqlFilter::new();
    let user = filter.bind(user_uid.to_string());

    let mut grants = vec![
        "json_extract(t.sharing, '$.public') IS NULL".to_string(),
        "json_extract(t.sharing, '$.public') LIKE '__r%'".to_string(),
        format!("json_extract(t.sharing, '$.users.\"' || {user} || '\".access') LIKE '__r%'"),
    ];
    if !user_groups.is_empty() {
        let groups = filter.bind_all(user_groups.iter().cloned());
        grants.push(format!(
            "EXISTS (SELECT 1 FROM json_each(t.sharing, '$.userGroups') g
              WHERE g.key IN ({groups}) AND json_extract(g.value, '$.access') LIKE '__r%')"
        ));
    }
    filter.and(format!("({})", grants.join(" OR ")));

    let sql = format!(
        "SELECT t.{id_column} FROM {name} t WHERE 1=1{}",
        filter.sql_suffix()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(filter.param_refs().as_slice(), |row| row.get::<_, i64>(0))?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}
