//! Collaborator seams the export services read through.

use chrono::NaiveDateTime;

use super::page::{Page, PageParams};
use super::params::{EnrollmentOrderField, EnrollmentQueryParams, EventQueryParams};
use crate::acl::resolver::AclResolver;
use crate::db::DatabaseError;
use crate::error::TrackerError;
use crate::models::enums::RelationshipEntity;
use crate::models::*;

pub trait MetadataStore {
    fn get_program(&self, uid: &str) -> Result<Option<Program>, DatabaseError>;
    fn get_programs(&self) -> Result<Vec<Program>, DatabaseError>;
    fn get_tracked_entity_type(&self, uid: &str) -> Result<Option<TrackedEntityType>, DatabaseError>;
    fn get_org_unit(&self, uid: &str) -> Result<Option<OrganisationUnit>, DatabaseError>;
}

pub trait TrackedEntityStore {
    fn get_tracked_entity(&self, uid: &str) -> Result<Option<TrackedEntity>, DatabaseError>;
}

pub trait EnrollmentStore {
    /// Raw lookup, deleted or not, no access filtering.
    fn get_enrollment(&self, uid: &str) -> Result<Option<Enrollment>, DatabaseError>;

    fn get_enrollments(&self, params: &EnrollmentQueryParams) -> Result<Vec<Enrollment>, DatabaseError>;

    fn get_enrollments_page(
        &self,
        params: &EnrollmentQueryParams,
        page: &PageParams,
    ) -> Result<Page<Enrollment>, DatabaseError>;

    fn get_orderable_fields(&self) -> Vec<&'static str> {
        EnrollmentOrderField::ALL.iter().map(|f| f.api_name()).collect()
    }
}

pub trait EventStore {
    fn get_event(&self, uid: &str) -> Result<Option<Event>, DatabaseError>;
    fn get_events(&self, params: &EventQueryParams) -> Result<Vec<Event>, DatabaseError>;
}

pub trait RelationshipStore {
    fn get_relationship(&self, uid: &str) -> Result<Option<Relationship>, DatabaseError>;

    fn get_relationships_by_item(
        &self,
        entity: RelationshipEntity,
        item_uid: &str,
        include_deleted: bool,
    ) -> Result<Vec<Relationship>, DatabaseError>;

    fn get_relationships_page_by_item(
        &self,
        entity: RelationshipEntity,
        item_uid: &str,
        include_deleted: bool,
        page: &PageParams,
    ) -> Result<Page<Relationship>, DatabaseError>;
}

pub trait OwnershipStore {
    fn get_program_owner(
        &self,
        te_uid: &str,
        program_uid: &str,
    ) -> Result<Option<TrackedEntityProgramOwner>, DatabaseError>;

    fn has_temporary_ownership(
        &self,
        te_uid: &str,
        program_uid: &str,
        user_uid: &str,
        now: NaiveDateTime,
    ) -> Result<bool, DatabaseError>;
}

/// Runs one service call inside a single read transaction.
pub trait ReadScope {
    fn in_read_transaction<T>(
        &self,
        f: impl FnOnce() -> Result<T, TrackerError>,
    ) -> Result<T, TrackerError>;
}

/// Everything the export services need from persistence.
pub trait TrackerStore:
    MetadataStore
    + TrackedEntityStore
    + EnrollmentStore
    + EventStore
    + RelationshipStore
    + OwnershipStore
    + AclResolver
    + ReadScope
{
}

impl<T> TrackerStore for T where
    T: MetadataStore
        + TrackedEntityStore
        + EnrollmentStore
        + EventStore
        + RelationshipStore
        + OwnershipStore
        + AclResolver
        + ReadScope
{
}
