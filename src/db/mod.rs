pub mod repository;
pub mod sqlite;
pub mod store;

pub use sqlite::*;
pub use store::SqliteTrackerStore;

use thiserror::Error;

use crate::models::enums::ParseEnumError;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Invalid JSON column: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },
}

impl From<ParseEnumError> for DatabaseError {
    fn from(err: ParseEnumError) -> Self {
        DatabaseError::InvalidEnum {
            field: err.field,
            value: err.value,
        }
    }
}
