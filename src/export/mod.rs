//! Tracker data export: enrollments with their nested events,
//! relationships and attribute values, scoped by ownership and sharing.

pub mod attribute;
pub mod context;
pub mod enrollment;
pub mod event;
pub mod mapper;
pub mod page;
pub mod params;
pub mod relationship;
pub mod store;

pub use attribute::AttributeService;
pub use context::RequestContext;
pub use enrollment::EnrollmentService;
pub use event::EventService;
pub use page::{Page, PageParams, Pager};
pub use relationship::RelationshipService;
