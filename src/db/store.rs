//! SQLite-backed implementation of the export collaborator traits.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::Connection;

use super::repository::{self, SharedTable};
use super::{open_database, open_memory_database, DatabaseError};
use crate::acl::resolver::AclResolver;
use crate::error::TrackerError;
use crate::export::page::{Page, PageParams};
use crate::export::params::{EnrollmentQueryParams, EventQueryParams};
use crate::export::store::*;
use crate::models::enums::RelationshipEntity;
use crate::models::*;
use crate::validation::context::ImportStore;

pub struct SqliteTrackerStore {
    conn: Connection,
}

impl SqliteTrackerStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    /// Wrap an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside one deferred transaction. Nested calls join the
    /// enclosing transaction.
    pub fn read_transaction<T, E>(&self, f: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DatabaseError>,
    {
        if !self.conn.is_autocommit() {
            return f(self);
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(DatabaseError::from)?;
        let value = f(self)?;
        tx.commit().map_err(DatabaseError::from)?;
        Ok(value)
    }
}

impl ReadScope for SqliteTrackerStore {
    fn in_read_transaction<T>(
        &self,
        f: impl FnOnce() -> Result<T, TrackerError>,
    ) -> Result<T, TrackerError> {
        self.read_transaction(|_| f())
    }
}

impl MetadataStore for SqliteTrackerStore {
    fn get_program(&self, uid: &str) -> Result<Option<Program>, DatabaseError> {
        repository::get_program_by_uid(&self.conn, uid)
    }

    fn get_programs(&self) -> Result<Vec<Program>, DatabaseError> {
        repository::get_all_programs(&self.conn)
    }

    fn get_tracked_entity_type(&self, uid: &str) -> Result<Option<TrackedEntityType>, DatabaseError> {
        repository::get_tracked_entity_type_by_uid(&self.conn, uid)
    }

    fn get_org_unit(&self, uid: &str) -> Result<Option<OrganisationUnit>, DatabaseError> {
        repository::get_org_unit_by_uid(&self.conn, uid)
    }
}

impl TrackedEntityStore for SqliteTrackerStore {
    fn get_tracked_entity(&self, uid: &str) -> Result<Option<TrackedEntity>, DatabaseError> {
        repository::get_tracked_entity_by_uid(&self.conn, uid)
    }
}

impl EnrollmentStore for SqliteTrackerStore {
    fn get_enrollment(&self, uid: &str) -> Result<Option<Enrollment>, DatabaseError> {
        repository::get_enrollment_by_uid(&self.conn, uid)
    }

    fn get_enrollments(&self, params: &EnrollmentQueryParams) -> Result<Vec<Enrollment>, DatabaseError> {
        repository::query_enrollments(&self.conn, params)
    }

    fn get_enrollments_page(
        &self,
        params: &EnrollmentQueryParams,
        page: &PageParams,
    ) -> Result<Page<Enrollment>, DatabaseError> {
        repository::query_enrollment_page(&self.conn, params, page)
    }
}

impl EventStore for SqliteTrackerStore {
    fn get_event(&self, uid: &str) -> Result<Option<Event>, DatabaseError> {
        repository::get_event_by_uid(&self.conn, uid)
    }

    fn get_events(&self, params: &EventQueryParams) -> Result<Vec<Event>, DatabaseError> {
        repository::query_events(&self.conn, params)
    }
}

impl RelationshipStore for SqliteTrackerStore {
    fn get_relationship(&self, uid: &str) -> Result<Option<Relationship>, DatabaseError> {
        repository::get_relationship_by_uid(&self.conn, uid)
    }

    fn get_relationships_by_item(
        &self,
        entity: RelationshipEntity,
        item_uid: &str,
        include_deleted: bool,
    ) -> Result<Vec<Relationship>, DatabaseError> {
        repository::query_relationships_by_item(&self.conn, entity, item_uid, include_deleted)
    }

    fn get_relationships_page_by_item(
        &self,
        entity: RelationshipEntity,
        item_uid: &str,
        include_deleted: bool,
        page: &PageParams,
    ) -> Result<Page<Relationship>, DatabaseError> {
        repository::query_relationship_page_by_item(&self.conn, entity, item_uid, include_deleted, page)
    }
}

impl OwnershipStore for SqliteTrackerStore {
    fn get_program_owner(
        &self,
        te_uid: &str,
        program_uid: &str,
    ) -> Result<Option<TrackedEntityProgramOwner>, DatabaseError> {
        repository::get_program_owner(&self.conn, te_uid, program_uid)
    }

    fn has_temporary_ownership(
        &self,
        te_uid: &str,
        program_uid: &str,
        user_uid: &str,
        now: NaiveDateTime,
    ) -> Result<bool, DatabaseError> {
        repository::has_temporary_ownership(&self.conn, te_uid, program_uid, user_uid, now)
    }
}

impl ImportStore for SqliteTrackerStore {
    fn get_program_stage(&self, uid: &str) -> Result<Option<ProgramStage>, DatabaseError> {
        repository::get_program_stage_by_uid(&self.conn, uid)
    }

    fn count_active_enrollments(&self, te_uid: &str) -> Result<i64, DatabaseError> {
        repository::count_active_enrollments(&self.conn, te_uid)
    }

    fn count_active_events(&self, enrollment_uid: &str) -> Result<i64, DatabaseError> {
        repository::count_active_events(&self.conn, enrollment_uid)
    }
}

impl AclResolver for SqliteTrackerStore {
    fn accessible_tracked_entity_types(
        &self,
        user_uid: &str,
        user_groups: &[String],
    ) -> Result<HashSet<i64>, DatabaseError> {
        repository::data_readable_ids(&self.conn, SharedTable::TrackedEntityType, user_uid, user_groups)
    }

    fn accessible_programs(
        &self,
        user_uid: &str,
        user_groups: &[String],
    ) -> Result<HashSet<i64>, DatabaseError> {
        repository::data_readable_ids(&self.conn, SharedTable::Program, user_uid, user_groups)
    }

    fn accessible_program_stages(
        &self,
        user_uid: &str,
        user_groups: &[String],
    ) -> Result<HashSet<i64>, DatabaseError> {
        repository::data_readable_ids(&self.conn, SharedTable::ProgramStage, user_uid, user_groups)
    }

    fn accessible_relationship_types(
        &self,
        user_uid: &str,
        user_groups: &[String],
    ) -> Result<HashSet<i64>, DatabaseError> {
        repository::data_readable_ids(&self.conn, SharedTable::RelationshipType, user_uid, user_groups)
    }
}
