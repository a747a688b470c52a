pub mod enrollment;
pub mod enums;
pub mod event;
pub mod metadata;
pub mod org_unit;
pub mod relationship;
pub mod sharing;
pub mod tracked_entity;
pub mod user;

pub use enrollment::*;
pub use event::*;
pub use metadata::*;
pub use org_unit::*;
pub use relationship::*;
pub use sharing::Sharing;
pub use tracked_entity::*;
pub use user::User;
