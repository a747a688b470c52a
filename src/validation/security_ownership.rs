//! Security and ownership checks run over every object of an import bundle.

use chrono::NaiveDateTime;

use super::access::{DefaultImportAccessManager, EventWriteAccess, ImportAccessManager};
use super::context::{ImportStore, Preheat, ValidationContext};
use super::error_code::TrackerErrorCode;
use super::payload::{ImportEnrollment, ImportEvent, ImportTrackedEntity, TrackerBundle};
use super::reporter::{ValidationError, ValidationErrorReporter};
use crate::error::TrackerError;
use crate::models::enums::{EventStatus, TrackerType};
use crate::models::user::authorities;

pub struct SecurityOwnershipValidator<'a, A: ?Sized> {
    access: &'a A,
}

impl<'a, A: ImportAccessManager + ?Sized> SecurityOwnershipValidator<'a, A> {
    pub fn new(access: &'a A) -> Self {
        Self { access }
    }

    /// Validate every object of the bundle. Errors of one object never stop
    /// the validation of the others.
    pub fn validate(
        &self,
        ctx: &ValidationContext,
        reporter: &mut ValidationErrorReporter,
    ) -> Result<(), TrackerError> {
        let bundle = ctx.bundle();
        for te in &bundle.tracked_entities {
            reporter.start(&te.uid, TrackerType::TrackedEntity);
            self.validate_tracked_entity(ctx, reporter, te)?;
        }
        for enrollment in &bundle.enrollments {
            reporter.start(&enrollment.uid, TrackerType::Enrollment);
            self.validate_enrollment(ctx, reporter, enrollment)?;
        }
        for event in &bundle.events {
            reporter.start(&event.uid, TrackerType::Event);
            self.validate_event(ctx, reporter, event)?;
        }
        Ok(())
    }

    pub fn validate_tracked_entity(
        &self,
        ctx: &ValidationContext,
        reporter: &mut ValidationErrorReporter,
        te: &ImportTrackedEntity,
    ) -> Result<(), TrackerError> {
        let user = ctx.user();
        let strategy = ctx.strategy_for_tracked_entity(te);

        let (org_unit, te_type) = if strategy.is_update_or_delete() {
            let Some(existing) = ctx.tracked_entity(&te.uid) else {
                tracing::trace!(uid = %te.uid, "tracked entity not found, skipping security checks");
                return Ok(());
            };
            (existing.org_unit.as_ref(), existing.tracked_entity_type.as_ref())
        } else {
            (
                ctx.org_unit(&te.org_unit),
                ctx.tracked_entity_type(&te.tracked_entity_type),
            )
        };

        if let Some(org_unit) = org_unit {
            if strategy.is_create() || strategy.is_delete() {
                self.access.check_org_unit_in_capture_scope(reporter, user, org_unit)?;
            } else {
                self.access.check_org_unit_in_search_scope(reporter, user, org_unit)?;
            }
        }

        if strategy.is_delete()
            && ctx.tracked_entity_has_active_enrollments(&te.uid)
            && !user.is_authorized(authorities::TEI_CASCADE_DELETE)
        {
            reporter.add_error(TrackerErrorCode::E1100, &[&user.username, &te.uid]);
        }

        if let Some(te_type) = te_type {
            self.access.check_te_type_write_access(reporter, user, te_type)?;
        }
        Ok(())
    }

    pub fn validate_enrollment(
        &self,
        ctx: &ValidationContext,
        reporter: &mut ValidationErrorReporter,
        enrollment: &ImportEnrollment,
    ) -> Result<(), TrackerError> {
        let user = ctx.user();
        let strategy = ctx.strategy_for_enrollment(enrollment);

        let (program, org_unit, te_uid) = if strategy.is_update_or_delete() {
            let Some(existing) = ctx.enrollment(&enrollment.uid) else {
                tracing::trace!(uid = %enrollment.uid, "enrollment not found, skipping security checks");
                return Ok(());
            };
            (
                Some(&existing.program),
                Some(&existing.org_unit),
                existing.tracked_entity_uid(),
            )
        } else {
            (
                ctx.program(&enrollment.program),
                ctx.org_unit(&enrollment.org_unit),
                enrollment.tracked_entity.as_deref(),
            )
        };
        let Some(program) = program else {
            return Ok(());
        };

        if strategy.is_create() || strategy.is_delete() || program.is_without_registration() {
            if let Some(org_unit) = org_unit {
                self.access.check_org_unit_in_capture_scope(reporter, user, org_unit)?;
            }
        }

        if strategy.is_delete()
            && ctx.enrollment_has_active_events(&enrollment.uid)
            && !user.is_authorized(authorities::ENROLLMENT_CASCADE_DELETE)
        {
            reporter.add_error(TrackerErrorCode::E1103, &[&user.username, &enrollment.uid]);
        }

        let owner = te_uid.and_then(|te| ctx.owner_org_unit(te, &program.uid));
        self.access
            .check_write_enrollment_access(reporter, user, program, te_uid, owner)
    }

    pub fn validate_event(
        &self,
        ctx: &ValidationContext,
        reporter: &mut ValidationErrorReporter,
        event: &ImportEvent,
    ) -> Result<(), TrackerError> {
        let user = ctx.user();
        let strategy = ctx.strategy_for_event(event);
        let existing = ctx.event(&event.uid);

        let (program, stage, org_unit, te_uid) = if strategy.is_update_or_delete() {
            let Some(existing) = existing else {
                tracing::trace!(uid = %event.uid, "event not found, skipping security checks");
                return Ok(());
            };
            (
                Some(&existing.program),
                Some(&existing.program_stage),
                Some(&existing.org_unit),
                existing.tracked_entity.as_ref().map(|te| te.uid.as_str()),
            )
        } else {
            (
                ctx.program(&event.program),
                ctx.program_stage(&event.program_stage),
                ctx.org_unit(&event.org_unit),
                event
                    .enrollment
                    .as_deref()
                    .and_then(|uid| ctx.tracked_entity_of_enrollment(uid)),
            )
        };
        let (Some(program), Some(stage), Some(org_unit)) = (program, stage, org_unit) else {
            return Ok(());
        };

        if strategy.is_create() || strategy.is_delete() {
            self.access.check_org_unit_in_capture_scope(reporter, user, org_unit)?;
        }

        if strategy.is_update()
            && existing.is_some_and(|e| e.status == EventStatus::Completed)
            && event.status != EventStatus::Completed
            && !user.is_authorized(authorities::UNCOMPLETE_EVENT)
        {
            reporter.add_error(TrackerErrorCode::E1083, &[&user.username]);
        }

        let te_uid = if program.is_registration() { te_uid } else { None };
        let owner_org_unit = te_uid.and_then(|te| ctx.owner_org_unit(te, &program.uid));
        self.access.check_event_write_access(
            reporter,
            user,
            EventWriteAccess {
                program,
                program_stage: stage,
                org_unit,
                owner_org_unit,
                tracked_entity: te_uid,
            },
        )
    }
}

/// Preheat the bundle from `store` and run the security and ownership checks
/// with the default access manager.
pub fn validate_bundle<S: ImportStore + ?Sized>(
    store: &S,
    bundle: &TrackerBundle,
    now: NaiveDateTime,
) -> Result<Vec<ValidationError>, TrackerError> {
    let preheat = Preheat::load(store, bundle)?;
    let ctx = ValidationContext::new(bundle, preheat);
    let access = DefaultImportAccessManager::new(store, now);
    let mut reporter = ValidationErrorReporter::new();
    store.in_read_transaction(|| SecurityOwnershipValidator::new(&access).validate(&ctx, &mut reporter))?;
    if reporter.has_errors() {
        tracing::info!(
            errors = reporter.errors().len(),
            strategy = %bundle.strategy,
            "import bundle failed security checks"
        );
    }
    Ok(reporter.into_errors())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::db::repository::fixtures::{at, World};
    use crate::db::repository::{get_event_by_uid, get_program_stage_by_uid};
    use crate::models::enums::ImportStrategy;
    use crate::models::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        TeType(String),
        Capture(String),
        Search(String),
        Enrollment {
            program: String,
            te: Option<String>,
            owner: Option<String>,
        },
        Event {
            stage: String,
            org_unit: String,
            owner: Option<String>,
            te: Option<String>,
        },
    }

    /// Records every check and never reports anything.
    #[derive(Default)]
    struct RecordingAccess {
        calls: RefCell<Vec<Call>>,
    }

    impl RecordingAccess {
        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    impl ImportAccessManager for RecordingAccess {
        fn check_te_type_write_access(
            &self,
            _: &mut ValidationErrorReporter,
            _: &User,
            te_type: &TrackedEntityType,
        ) -> Result<(), TrackerError> {
            self.calls.borrow_mut().push(Call::TeType(te_type.uid.clone()));
            Ok(())
        }

        fn check_org_unit_in_capture_scope(
            &self,
            _: &mut ValidationErrorReporter,
            _: &User,
            org_unit: &OrganisationUnit,
        ) -> Result<(), TrackerError> {
            self.calls.borrow_mut().push(Call::Capture(org_unit.uid.clone()));
            Ok(())
        }

        fn check_org_unit_in_search_scope(
            &self,
            _: &mut ValidationErrorReporter,
            _: &User,
            org_unit: &OrganisationUnit,
        ) -> Result<(), TrackerError> {
            self.calls.borrow_mut().push(Call::Search(org_unit.uid.clone()));
            Ok(())
        }

        fn check_write_enrollment_access(
            &self,
            _: &mut ValidationErrorReporter,
            _: &User,
            program: &Program,
            tracked_entity: Option<&str>,
            owner_org_unit: Option<&OrganisationUnit>,
        ) -> Result<(), TrackerError> {
            self.calls.borrow_mut().push(Call::Enrollment {
                program: program.uid.clone(),
                te: tracked_entity.map(String::from),
                owner: owner_org_unit.map(|ou| ou.uid.clone()),
            });
            Ok(())
        }

        fn check_event_write_access(
            &self,
            _: &mut ValidationErrorReporter,
            _: &User,
            access: EventWriteAccess<'_>,
        ) -> Result<(), TrackerError> {
            self.calls.borrow_mut().push(Call::Event {
                stage: access.program_stage.uid.clone(),
                org_unit: access.org_unit.uid.clone(),
                owner: access.owner_org_unit.map(|ou| ou.uid.clone()),
                te: access.tracked_entity.map(String::from),
            });
            Ok(())
        }
    }

    fn alice_payload() -> ImportTrackedEntity {
        ImportTrackedEntity {
            uid: World::TE_ALICE.into(),
            tracked_entity_type: World::TE_TYPE.into(),
            org_unit: World::OU_DISTRICT_A.into(),
        }
    }

    fn enrollment_payload() -> ImportEnrollment {
        ImportEnrollment {
            uid: World::EN_ALICE_OPEN.into(),
            tracked_entity: Some(World::TE_ALICE.into()),
            program: World::PROGRAM_OPEN.into(),
            org_unit: World::OU_DISTRICT_A.into(),
        }
    }

    fn event_payload(status: EventStatus) -> ImportEvent {
        ImportEvent {
            uid: World::EV_OPEN.into(),
            enrollment: Some(World::EN_ALICE_OPEN.into()),
            program: World::PROGRAM_OPEN.into(),
            program_stage: World::STAGE_OPEN.into(),
            org_unit: World::OU_DISTRICT_A.into(),
            status,
        }
    }

    fn person(world: &World) -> TrackedEntityType {
        world.tracked_entity(World::TE_ALICE).tracked_entity_type.unwrap()
    }

    fn run(bundle: &TrackerBundle, preheat: Preheat) -> (Vec<ValidationError>, Vec<Call>) {
        let access = RecordingAccess::default();
        let ctx = ValidationContext::new(bundle, preheat);
        let mut reporter = ValidationErrorReporter::new();
        SecurityOwnershipValidator::new(&access)
            .validate(&ctx, &mut reporter)
            .unwrap();
        (reporter.into_errors(), access.calls())
    }

    fn codes(errors: &[ValidationError]) -> Vec<TrackerErrorCode> {
        errors.iter().map(|e| e.code).collect()
    }

    #[test]
    fn created_tracked_entity_checks_capture_scope_and_type() {
        let world = World::new();
        let bundle = TrackerBundle::new(World::user_district_a(), ImportStrategy::Create)
            .with_tracked_entity(alice_payload());
        let preheat = Preheat::new()
            .with_org_unit(World::unit(World::OU_DISTRICT_A))
            .with_tracked_entity_type(person(&world));

        let (errors, calls) = run(&bundle, preheat);
        assert!(errors.is_empty());
        assert_eq!(
            calls,
            vec![
                Call::Capture(World::OU_DISTRICT_A.into()),
                Call::TeType(World::TE_TYPE.into())
            ]
        );
    }

    #[test]
    fn updated_tracked_entity_checks_search_scope_of_stored_unit() {
        let world = World::new();
        let payload = ImportTrackedEntity {
            org_unit: World::OU_DISTRICT_B.into(),
            ..alice_payload()
        };
        let bundle = TrackerBundle::new(World::user_district_a(), ImportStrategy::CreateAndUpdate)
            .with_tracked_entity(payload);
        let preheat = Preheat::new().with_tracked_entity(world.tracked_entity(World::TE_ALICE), 2);

        let (errors, calls) = run(&bundle, preheat);
        assert!(errors.is_empty());
        assert_eq!(calls[0], Call::Search(World::OU_DISTRICT_A.into()));
    }

    #[test]
    fn deleting_tracked_entity_with_only_deleted_enrollments_passes() {
        let world = World::new();
        let bundle = TrackerBundle::new(World::user_district_a(), ImportStrategy::Delete)
            .with_tracked_entity(alice_payload());
        let preheat = Preheat::new().with_tracked_entity(world.tracked_entity(World::TE_ALICE), 0);

        let (errors, calls) = run(&bundle, preheat);
        assert!(errors.is_empty());
        assert_eq!(calls[0], Call::Capture(World::OU_DISTRICT_A.into()));
    }

    #[test]
    fn deleting_tracked_entity_with_active_enrollment_needs_cascade_authority() {
        let world = World::new();
        let preheat = Preheat::new().with_tracked_entity(world.tracked_entity(World::TE_ALICE), 1);
        let bundle = TrackerBundle::new(World::user_district_a(), ImportStrategy::Delete)
            .with_tracked_entity(alice_payload());

        let (errors, _) = run(&bundle, preheat.clone());
        assert_eq!(codes(&errors), vec![TrackerErrorCode::E1100]);
        assert_eq!(errors[0].uid, World::TE_ALICE);
        assert_eq!(errors[0].entity_type, TrackerType::TrackedEntity);

        let authorized = World::user_district_a().with_authorities(&[authorities::TEI_CASCADE_DELETE]);
        let bundle = TrackerBundle::new(authorized, ImportStrategy::Delete).with_tracked_entity(alice_payload());
        let (errors, _) = run(&bundle, preheat);
        assert!(errors.is_empty());
    }

    #[test]
    fn deleting_enrollment_with_events_needs_cascade_authority() {
        let world = World::new();
        let preheat = Preheat::new()
            .with_enrollment(world.enrollment(World::EN_ALICE_OPEN), 2)
            .with_tracked_entity(world.tracked_entity(World::TE_ALICE), 2);
        let bundle = TrackerBundle::new(World::user_district_a(), ImportStrategy::Delete)
            .with_enrollment(enrollment_payload());

        let (errors, calls) = run(&bundle, preheat.clone());
        assert_eq!(codes(&errors), vec![TrackerErrorCode::E1103]);
        assert_eq!(
            calls,
            vec![
                Call::Capture(World::OU_DISTRICT_A.into()),
                Call::Enrollment {
                    program: World::PROGRAM_OPEN.into(),
                    te: Some(World::TE_ALICE.into()),
                    owner: Some(World::OU_DISTRICT_A.into()),
                },
            ]
        );

        let authorized =
            World::user_district_a().with_authorities(&[authorities::ENROLLMENT_CASCADE_DELETE]);
        let bundle = TrackerBundle::new(authorized, ImportStrategy::Delete).with_enrollment(enrollment_payload());
        let (errors, _) = run(&bundle, preheat);
        assert!(errors.is_empty());
    }

    #[test]
    fn updated_enrollment_skips_capture_scope_and_uses_owner_row() {
        let world = World::new();
        let payload = ImportEnrollment {
            uid: World::EN_ALICE_PROTECTED.into(),
            program: World::PROGRAM_PROTECTED.into(),
            ..enrollment_payload()
        };
        let preheat = Preheat::new()
            .with_enrollment(world.enrollment(World::EN_ALICE_PROTECTED), 0)
            .with_owner(World::TE_ALICE, World::PROGRAM_PROTECTED, World::unit(World::OU_DISTRICT_B));
        let bundle = TrackerBundle::new(World::user_district_a(), ImportStrategy::Update).with_enrollment(payload);

        let (_, calls) = run(&bundle, preheat);
        assert_eq!(
            calls,
            vec![Call::Enrollment {
                program: World::PROGRAM_PROTECTED.into(),
                te: Some(World::TE_ALICE.into()),
                owner: Some(World::OU_DISTRICT_B.into()),
            }]
        );
    }

    #[test]
    fn created_tracker_event_passes_tracked_entity_and_owner() {
        let world = World::new();
        let stage = get_program_stage_by_uid(&world.conn, World::STAGE_OPEN).unwrap().unwrap();
        let preheat = Preheat::new()
            .with_program(world.program(World::PROGRAM_OPEN))
            .with_program_stage(stage)
            .with_org_unit(World::unit(World::OU_DISTRICT_A))
            .with_enrollment(world.enrollment(World::EN_ALICE_OPEN), 2)
            .with_tracked_entity(world.tracked_entity(World::TE_ALICE), 2);
        let payload = ImportEvent {
            uid: "EvNewAAAAAA".into(),
            ..event_payload(EventStatus::Active)
        };
        let bundle = TrackerBundle::new(World::user_district_a(), ImportStrategy::Create).with_event(payload);

        let (errors, calls) = run(&bundle, preheat);
        assert!(errors.is_empty());
        assert_eq!(
            calls,
            vec![
                Call::Capture(World::OU_DISTRICT_A.into()),
                Call::Event {
                    stage: World::STAGE_OPEN.into(),
                    org_unit: World::OU_DISTRICT_A.into(),
                    owner: Some(World::OU_DISTRICT_A.into()),
                    te: Some(World::TE_ALICE.into()),
                },
            ]
        );
    }

    #[test]
    fn created_event_without_registration_has_no_owner() {
        let world = World::new();
        let stage = ProgramStage {
            id: 9,
            uid: "StageEventA".into(),
            name: "single".into(),
            program: World::PROGRAM_EVENT.into(),
            sharing: Sharing::default(),
        };
        let preheat = Preheat::new()
            .with_program(world.program(World::PROGRAM_EVENT))
            .with_program_stage(stage)
            .with_org_unit(World::unit(World::OU_FACILITY_A));
        let payload = ImportEvent {
            uid: "EvNewAAAAAA".into(),
            enrollment: None,
            program: World::PROGRAM_EVENT.into(),
            program_stage: "StageEventA".into(),
            org_unit: World::OU_FACILITY_A.into(),
            status: EventStatus::Active,
        };
        let bundle = TrackerBundle::new(World::user_district_a(), ImportStrategy::Create).with_event(payload);

        let (_, calls) = run(&bundle, preheat);
        assert_eq!(
            calls[1],
            Call::Event {
                stage: "StageEventA".into(),
                org_unit: World::OU_FACILITY_A.into(),
                owner: None,
                te: None,
            }
        );
    }

    #[test]
    fn reopening_completed_event_needs_authority() {
        let world = World::new();
        let completed = get_event_by_uid(&world.conn, World::EV_OPEN).unwrap().unwrap();
        assert_eq!(completed.status, EventStatus::Completed);
        let preheat = Preheat::new().with_event(completed);

        let bundle = TrackerBundle::new(World::user_district_a(), ImportStrategy::Update)
            .with_event(event_payload(EventStatus::Active));
        let (errors, calls) = run(&bundle, preheat.clone());
        assert_eq!(codes(&errors), vec![TrackerErrorCode::E1083]);
        assert!(!calls.iter().any(|c| matches!(c, Call::Capture(_))));

        let bundle = TrackerBundle::new(World::user_district_a(), ImportStrategy::Update)
            .with_event(event_payload(EventStatus::Completed));
        assert!(run(&bundle, preheat.clone()).0.is_empty());

        let authorized = World::user_district_a().with_authorities(&[authorities::UNCOMPLETE_EVENT]);
        let bundle = TrackerBundle::new(authorized, ImportStrategy::Update)
            .with_event(event_payload(EventStatus::Active));
        assert!(run(&bundle, preheat).0.is_empty());
    }

    #[test]
    fn one_failing_object_does_not_stop_the_others() {
        let world = World::new();
        let preheat = Preheat::new()
            .with_tracked_entity(world.tracked_entity(World::TE_ALICE), 1)
            .with_enrollment(world.enrollment(World::EN_ALICE_OPEN), 2);
        let bundle = TrackerBundle::new(World::user_district_a(), ImportStrategy::Delete)
            .with_tracked_entity(alice_payload())
            .with_enrollment(enrollment_payload());

        let (errors, _) = run(&bundle, preheat);
        assert_eq!(codes(&errors), vec![TrackerErrorCode::E1100, TrackerErrorCode::E1103]);
        assert_eq!(errors[1].uid, World::EN_ALICE_OPEN);
    }

    #[test]
    fn bundle_against_store_reports_scope_and_ownership() {
        let store = World::store();
        let bundle = TrackerBundle::new(World::user_district_a(), ImportStrategy::CreateAndUpdate)
            .with_enrollment(ImportEnrollment {
                uid: "EnNewAAAAAA".into(),
                tracked_entity: Some(World::TE_BOB.into()),
                program: World::PROGRAM_OPEN.into(),
                org_unit: World::OU_DISTRICT_B.into(),
            })
            .with_enrollment(ImportEnrollment {
                uid: "EnNewBBBBBB".into(),
                tracked_entity: Some(World::TE_ALICE.into()),
                program: World::PROGRAM_OPEN.into(),
                org_unit: World::OU_FACILITY_A.into(),
            });

        let errors = validate_bundle(&store, &bundle, at("2024-06-01 12:00:00")).unwrap();
        assert_eq!(codes(&errors), vec![TrackerErrorCode::E1000, TrackerErrorCode::E1102]);
        assert!(errors.iter().all(|e| e.uid == "EnNewAAAAAA"));

        let admin = TrackerBundle {
            user: World::superuser(),
            ..bundle
        };
        assert!(validate_bundle(&store, &admin, at("2024-06-01 12:00:00")).unwrap().is_empty());
    }
}
