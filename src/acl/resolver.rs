//! Sharing-based row resolution and its per-request memo.

use std::cell::RefCell;
use std::collections::HashSet;

use crate::db::DatabaseError;
use crate::models::User;

/// Resolves which metadata rows a user may read data of. Each method returns
/// internal ids; callers check membership.
pub trait AclResolver {
    fn accessible_tracked_entity_types(
        &self,
        user_uid: &str,
        user_groups: &[String],
    ) -> Result<HashSet<i64>, DatabaseError>;

    fn accessible_programs(
        &self,
        user_uid: &str,
        user_groups: &[String],
    ) -> Result<HashSet<i64>, DatabaseError>;

    fn accessible_program_stages(
        &self,
        user_uid: &str,
        user_groups: &[String],
    ) -> Result<HashSet<i64>, DatabaseError>;

    fn accessible_relationship_types(
        &self,
        user_uid: &str,
        user_groups: &[String],
    ) -> Result<HashSet<i64>, DatabaseError>;
}

type IdSet = RefCell<Option<HashSet<i64>>>;

/// Memoized id sets for one request. Superusers never hit the resolver.
#[derive(Debug, Default)]
pub struct AclCache {
    tracked_entity_types: IdSet,
    programs: IdSet,
    program_stages: IdSet,
    relationship_types: IdSet,
}

fn contains(
    cell: &IdSet,
    id: i64,
    load: impl FnOnce() -> Result<HashSet<i64>, DatabaseError>,
) -> Result<bool, DatabaseError> {
    if let Some(ids) = cell.borrow().as_ref() {
        return Ok(ids.contains(&id));
    }
    let ids = load()?;
    tracing::trace!(count = ids.len(), "acl id set resolved");
    let found = ids.contains(&id);
    *cell.borrow_mut() = Some(ids);
    Ok(found)
}

impl AclCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_read_tracked_entity_type<R: AclResolver + ?Sized>(
        &self,
        resolver: &R,
        user: &User,
        id: i64,
    ) -> Result<bool, DatabaseError> {
        if user.is_super() {
            return Ok(true);
        }
        contains(&self.tracked_entity_types, id, || {
            resolver.accessible_tracked_entity_types(&user.uid, &user.groups)
        })
    }

    pub fn can_read_program<R: AclResolver + ?Sized>(
        &self,
        resolver: &R,
        user: &User,
        id: i64,
    ) -> Result<bool, DatabaseError> {
        if user.is_super() {
            return Ok(true);
        }
        contains(&self.programs, id, || {
            resolver.accessible_programs(&user.uid, &user.groups)
        })
    }

    pub fn can_read_program_stage<R: AclResolver + ?Sized>(
        &self,
        resolver: &R,
        user: &User,
        id: i64,
    ) -> Result<bool, DatabaseError> {
        if user.is_super() {
            return Ok(true);
        }
        contains(&self.program_stages, id, || {
            resolver.accessible_program_stages(&user.uid, &user.groups)
        })
    }

    pub fn can_read_relationship_type<R: AclResolver + ?Sized>(
        &self,
        resolver: &R,
        user: &User,
        id: i64,
    ) -> Result<bool, DatabaseError> {
        if user.is_super() {
            return Ok(true);
        }
        contains(&self.relationship_types, id, || {
            resolver.accessible_relationship_types(&user.uid, &user.groups)
        })
    }
}
