//! Read-side access control: sharing resolution, program ownership and the
//! per-entity read rules built on both.

pub mod access;
pub mod ownership;
pub mod resolver;

pub use access::TrackerAccessManager;
pub use ownership::OwnershipAccessManager;
pub use resolver::{AclCache, AclResolver};
