//! Caller-facing error taxonomy with status mapping.

use serde::Serialize;

use crate::db::DatabaseError;
use crate::models::enums::ParseEnumError;

/// Structured error body for transport layers.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Malformed or self-contradictory parameters.
    #[error("{0}")]
    BadRequest(String),
    /// Authenticated, but not allowed to see a specifically targeted entity.
    #[error("{0}")]
    Forbidden(String),
    /// The UID does not resolve to a visible entity.
    #[error("{entity} with id {uid} could not be found.")]
    NotFound { entity: &'static str, uid: String },
    /// Defect in parameter construction, never caused by caller input.
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl TrackerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(entity: &'static str, uid: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            uid: uid.into(),
        }
    }

    /// Wrap an error that can only come from wrongly built internal params.
    pub fn precondition(what: &str) -> Self {
        Self::Internal(format!("this must be a bug in how the {what} are built"))
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound { .. } => 404,
            Self::Internal(_) | Self::Database(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Internal(_) | Self::Database(_) => "INTERNAL",
        }
    }

    /// Build the response envelope. Internal details are logged, not exposed.
    pub fn to_body(&self) -> ErrorBody {
        let message = match self {
            Self::Internal(_) | Self::Database(_) => {
                tracing::error!(error = %self, "tracker internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };
        ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message,
            },
        }
    }
}

impl From<ParseEnumError> for TrackerError {
    fn from(err: ParseEnumError) -> Self {
        TrackerError::BadRequest(err.to_string())
    }
}
