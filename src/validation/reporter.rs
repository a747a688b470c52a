use serde::{Deserialize, Serialize};

use super::error_code::TrackerErrorCode;
use crate::models::enums::TrackerType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub code: TrackerErrorCode,
    pub uid: String,
    pub entity_type: TrackerType,
    pub message: String,
}

/// Collects the errors raised while validating one bundle. Every error is
/// recorded against the object currently being validated.
#[derive(Debug, Default)]
pub struct ValidationErrorReporter {
    errors: Vec<ValidationError>,
    current: Option<(String, TrackerType)>,
}

impl ValidationErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute subsequent errors to `uid`.
    pub fn start(&mut self, uid: &str, entity_type: TrackerType) {
        self.current = Some((uid.to_string(), entity_type));
    }

    pub fn add_error(&mut self, code: TrackerErrorCode, args: &[&str]) {
        let (uid, entity_type) = self
            .current
            .clone()
            .unwrap_or_else(|| (String::new(), TrackerType::TrackedEntity));
        tracing::debug!(code = %code, uid = %uid, "validation error");
        self.errors.push(ValidationError {
            code,
            uid,
            entity_type,
            message: code.format(args),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_error_code(&self, code: TrackerErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Errors recorded against one object.
    pub fn errors_for<'a>(&'a self, uid: &'a str) -> impl Iterator<Item = &'a ValidationError> + 'a {
        self.errors.iter().filter(move |e| e.uid == uid)
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }
}
