//! Import-side security and ownership validation.

pub mod access;
pub mod context;
pub mod error_code;
pub mod payload;
pub mod reporter;
pub mod security_ownership;

pub use access::{DefaultImportAccessManager, EventWriteAccess, ImportAccessManager};
pub use context::{ImportStore, Preheat, ValidationContext};
pub use error_code::TrackerErrorCode;
pub use payload::{ImportEnrollment, ImportEvent, ImportTrackedEntity, TrackerBundle};
pub use reporter::{ValidationError, ValidationErrorReporter};
pub use security_ownership::{validate_bundle, SecurityOwnershipValidator};
