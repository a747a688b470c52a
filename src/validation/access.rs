//! Write-side access decisions raised as validation errors.

use chrono::NaiveDateTime;

use super::error_code::TrackerErrorCode;
use super::reporter::ValidationErrorReporter;
use crate::acl::ownership::owner_in_scope;
use crate::error::TrackerError;
use crate::export::store::OwnershipStore;
use crate::models::*;

/// What an event write is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWriteAccess<'a> {
    pub program: &'a Program,
    pub program_stage: &'a ProgramStage,
    pub org_unit: &'a OrganisationUnit,
    /// Owner org unit; only set for programs with registration.
    pub owner_org_unit: Option<&'a OrganisationUnit>,
    pub tracked_entity: Option<&'a str>,
}

pub trait ImportAccessManager {
    fn check_te_type_write_access(
        &self,
        reporter: &mut ValidationErrorReporter,
        user: &User,
        te_type: &TrackedEntityType,
    ) -> Result<(), TrackerError>;

    fn check_org_unit_in_capture_scope(
        &self,
        reporter: &mut ValidationErrorReporter,
        user: &User,
        org_unit: &OrganisationUnit,
    ) -> Result<(), TrackerError>;

    fn check_org_unit_in_search_scope(
        &self,
        reporter: &mut ValidationErrorReporter,
        user: &User,
        org_unit: &OrganisationUnit,
    ) -> Result<(), TrackerError>;

    fn check_write_enrollment_access(
        &self,
        reporter: &mut ValidationErrorReporter,
        user: &User,
        program: &Program,
        tracked_entity: Option<&str>,
        owner_org_unit: Option<&OrganisationUnit>,
    ) -> Result<(), TrackerError>;

    fn check_event_write_access(
        &self,
        reporter: &mut ValidationErrorReporter,
        user: &User,
        access: EventWriteAccess<'_>,
    ) -> Result<(), TrackerError>;
}

/// Sharing, user scopes and program ownership, with temporary ownership
/// grants read from the store.
pub struct DefaultImportAccessManager<'a, S: ?Sized> {
    store: &'a S,
    now: NaiveDateTime,
}

impl<'a, S: OwnershipStore + ?Sized> DefaultImportAccessManager<'a, S> {
    pub fn new(store: &'a S, now: NaiveDateTime) -> Self {
        Self { store, now }
    }

    fn check_ownership(
        &self,
        reporter: &mut ValidationErrorReporter,
        user: &User,
        program: &Program,
        tracked_entity: Option<&str>,
        owner_org_unit: Option<&OrganisationUnit>,
    ) -> Result<(), TrackerError> {
        let (Some(te), Some(owner)) = (tracked_entity, owner_org_unit) else {
            return Ok(());
        };
        if user.is_super() || program.is_without_registration() {
            return Ok(());
        }
        let allowed = owner_in_scope(user, program.access_level, owner, || {
            self.store
                .has_temporary_ownership(te, &program.uid, &user.uid, self.now)
        })?;
        if !allowed {
            reporter.add_error(TrackerErrorCode::E1102, &[&user.username, te, &program.uid]);
        }
        Ok(())
    }
}

impl<S: OwnershipStore + ?Sized> ImportAccessManager for DefaultImportAccessManager<'_, S> {
    fn check_te_type_write_access(
        &self,
        reporter: &mut ValidationErrorReporter,
        user: &User,
        te_type: &TrackedEntityType,
    ) -> Result<(), TrackerError> {
        if !te_type.sharing.can_data_write(user) {
            reporter.add_error(TrackerErrorCode::E1001, &[&user.username, &te_type.uid]);
        }
        Ok(())
    }

    fn check_org_unit_in_capture_scope(
        &self,
        reporter: &mut ValidationErrorReporter,
        user: &User,
        org_unit: &OrganisationUnit,
    ) -> Result<(), TrackerError> {
        if !user.is_super() && !user.is_in_capture_scope(org_unit) {
            reporter.add_error(TrackerErrorCode::E1000, &[&user.username, &org_unit.uid]);
        }
        Ok(())
    }

    fn check_org_unit_in_search_scope(
        &self,
        reporter: &mut ValidationErrorReporter,
        user: &User,
        org_unit: &OrganisationUnit,
    ) -> Result<(), TrackerError> {
        if !user.is_super() && !user.is_in_search_scope(org_unit) {
            reporter.add_error(TrackerErrorCode::E1003, &[&org_unit.uid, &user.username]);
        }
        Ok(())
    }

    fn check_write_enrollment_access(
        &self,
        reporter: &mut ValidationErrorReporter,
        user: &User,
        program: &Program,
        tracked_entity: Option<&str>,
        owner_org_unit: Option<&OrganisationUnit>,
    ) -> Result<(), TrackerError> {
        if !program.sharing.can_data_write(user) {
            reporter.add_error(TrackerErrorCode::E1091, &[&user.username, &program.uid]);
        }
        if let Some(te_type) = &program.tracked_entity_type {
            self.check_te_type_write_access(reporter, user, te_type)?;
        }
        self.check_ownership(reporter, user, program, tracked_entity, owner_org_unit)
    }

    fn check_event_write_access(
        &self,
        reporter: &mut ValidationErrorReporter,
        user: &User,
        access: EventWriteAccess<'_>,
    ) -> Result<(), TrackerError> {
        if access.program.is_without_registration() {
            if !access.program.sharing.can_data_write(user) {
                reporter.add_error(TrackerErrorCode::E1091, &[&user.username, &access.program.uid]);
            }
            return Ok(());
        }
        if !access.program_stage.sharing.can_data_write(user) {
            reporter.add_error(
                TrackerErrorCode::E1095,
                &[&user.username, &access.program_stage.uid],
            );
        }
        self.check_ownership(
            reporter,
            user,
            access.program,
            access.tracked_entity,
            access.owner_org_unit,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{at, World};
    use crate::db::repository::{get_program_stage_by_uid, grant_temporary_ownership};
    use crate::db::SqliteTrackerStore;
    use crate::export::store::MetadataStore;
    use crate::models::enums::TrackerType;

    fn manager(store: &SqliteTrackerStore) -> DefaultImportAccessManager<'_, SqliteTrackerStore> {
        DefaultImportAccessManager::new(store, at("2024-06-01 12:00:00"))
    }

    fn reporter() -> ValidationErrorReporter {
        let mut reporter = ValidationErrorReporter::new();
        reporter.start("EnNewAAAAAA", TrackerType::Enrollment);
        reporter
    }

    fn codes(reporter: &ValidationErrorReporter) -> Vec<TrackerErrorCode> {
        reporter.errors().iter().map(|e| e.code).collect()
    }

    #[test]
    fn capture_and_search_scope() {
        let store = World::store();
        let access = manager(&store);
        let mut reporter = reporter();
        let user = World::user_district_a();

        access
            .check_org_unit_in_capture_scope(&mut reporter, &user, &World::unit(World::OU_FACILITY_A))
            .unwrap();
        assert!(!reporter.has_errors());

        let district_b = World::unit(World::OU_DISTRICT_B);
        access.check_org_unit_in_capture_scope(&mut reporter, &user, &district_b).unwrap();
        access.check_org_unit_in_search_scope(&mut reporter, &user, &district_b).unwrap();
        assert_eq!(codes(&reporter), vec![TrackerErrorCode::E1000, TrackerErrorCode::E1003]);

        let mut reporter = self::reporter();
        access
            .check_org_unit_in_capture_scope(&mut reporter, &World::superuser(), &district_b)
            .unwrap();
        assert!(!reporter.has_errors());
    }

    #[test]
    fn program_without_data_write_is_rejected() {
        let store = World::store();
        let access = manager(&store);
        let hidden = store.get_program(World::PROGRAM_HIDDEN).unwrap().unwrap();
        let mut reporter = reporter();

        access
            .check_write_enrollment_access(&mut reporter, &World::user_district_a(), &hidden, None, None)
            .unwrap();
        assert_eq!(codes(&reporter), vec![TrackerErrorCode::E1091]);
    }

    #[test]
    fn ownership_follows_access_level_and_grants() {
        let store = World::store();
        let access = manager(&store);
        let protected = store.get_program(World::PROGRAM_PROTECTED).unwrap().unwrap();
        let user = World::user_district_a();
        let owner = World::unit(World::OU_DISTRICT_B);

        let mut reporter = reporter();
        access
            .check_write_enrollment_access(&mut reporter, &user, &protected, Some(World::TE_ALICE), Some(&owner))
            .unwrap();
        assert_eq!(codes(&reporter), vec![TrackerErrorCode::E1102]);

        grant_temporary_ownership(
            store.conn(),
            World::TE_ALICE,
            World::PROGRAM_PROTECTED,
            &user.uid,
            "emergency",
            at("2024-06-02 00:00:00"),
        )
        .unwrap();
        let mut reporter = self::reporter();
        access
            .check_write_enrollment_access(&mut reporter, &user, &protected, Some(World::TE_ALICE), Some(&owner))
            .unwrap();
        assert!(!reporter.has_errors());
    }

    #[test]
    fn tracker_event_needs_stage_write_access() {
        let store = World::store();
        let access = manager(&store);
        let program = store.get_program(World::PROGRAM_OPEN).unwrap().unwrap();
        let stage = get_program_stage_by_uid(store.conn(), World::STAGE_HIDDEN).unwrap().unwrap();
        let district_a = World::unit(World::OU_DISTRICT_A);
        let mut reporter = reporter();

        access
            .check_event_write_access(
                &mut reporter,
                &World::user_district_a(),
                EventWriteAccess {
                    program: &program,
                    program_stage: &stage,
                    org_unit: &district_a,
                    owner_org_unit: Some(&district_a),
                    tracked_entity: Some(World::TE_ALICE),
                },
            )
            .unwrap();
        assert_eq!(codes(&reporter), vec![TrackerErrorCode::E1095]);
    }
}
