//! Preheat: everything the import checks look up, resolved once per bundle.

use std::collections::{BTreeSet, HashMap};

use super::payload::{ImportEnrollment, ImportEvent, ImportTrackedEntity, TrackerBundle};
use crate::db::DatabaseError;
use crate::error::TrackerError;
use crate::export::store::{
    EnrollmentStore, EventStore, MetadataStore, OwnershipStore, ReadScope, TrackedEntityStore,
};
use crate::models::enums::ImportStrategy;
use crate::models::*;

/// Persistence the import validation reads through.
pub trait ImportStore:
    MetadataStore + TrackedEntityStore + EnrollmentStore + EventStore + OwnershipStore + ReadScope
{
    fn get_program_stage(&self, uid: &str) -> Result<Option<ProgramStage>, DatabaseError>;

    fn count_active_enrollments(&self, te_uid: &str) -> Result<i64, DatabaseError>;

    fn count_active_events(&self, enrollment_uid: &str) -> Result<i64, DatabaseError>;
}

#[derive(Debug, Clone, Default)]
pub struct Preheat {
    org_units: HashMap<String, OrganisationUnit>,
    tracked_entity_types: HashMap<String, TrackedEntityType>,
    programs: HashMap<String, Program>,
    program_stages: HashMap<String, ProgramStage>,
    tracked_entities: HashMap<String, TrackedEntity>,
    enrollments: HashMap<String, Enrollment>,
    events: HashMap<String, Event>,
    owners: HashMap<(String, String), OrganisationUnit>,
    active_enrollments: HashMap<String, i64>,
    active_events: HashMap<String, i64>,
}

impl Preheat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_org_unit(mut self, ou: OrganisationUnit) -> Self {
        self.org_units.insert(ou.uid.clone(), ou);
        self
    }

    pub fn with_tracked_entity_type(mut self, te_type: TrackedEntityType) -> Self {
        self.tracked_entity_types.insert(te_type.uid.clone(), te_type);
        self
    }

    pub fn with_program(mut self, program: Program) -> Self {
        self.programs.insert(program.uid.clone(), program);
        self
    }

    pub fn with_program_stage(mut self, stage: ProgramStage) -> Self {
        self.program_stages.insert(stage.uid.clone(), stage);
        self
    }

    /// Existing tracked entity with its number of non-deleted enrollments.
    pub fn with_tracked_entity(mut self, te: TrackedEntity, active_enrollments: i64) -> Self {
        self.active_enrollments.insert(te.uid.clone(), active_enrollments);
        self.tracked_entities.insert(te.uid.clone(), te);
        self
    }

    /// Existing enrollment with its number of non-deleted events.
    pub fn with_enrollment(mut self, enrollment: Enrollment, active_events: i64) -> Self {
        self.active_events.insert(enrollment.uid.clone(), active_events);
        self.enrollments.insert(enrollment.uid.clone(), enrollment);
        self
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.events.insert(event.uid.clone(), event);
        self
    }

    pub fn with_owner(mut self, te_uid: &str, program_uid: &str, ou: OrganisationUnit) -> Self {
        self.owners
            .insert((te_uid.to_string(), program_uid.to_string()), ou);
        self
    }

    /// Resolve every reference of `bundle` in one read transaction.
    pub fn load<S: ImportStore + ?Sized>(store: &S, bundle: &TrackerBundle) -> Result<Self, TrackerError> {
        store.in_read_transaction(|| {
            let refs = References::collect(bundle);
            let mut preheat = Preheat::new();

            for uid in &refs.org_units {
                if let Some(ou) = store.get_org_unit(uid)? {
                    preheat = preheat.with_org_unit(ou);
                }
            }
            for uid in &refs.tracked_entity_types {
                if let Some(te_type) = store.get_tracked_entity_type(uid)? {
                    preheat = preheat.with_tracked_entity_type(te_type);
                }
            }
            for uid in &refs.programs {
                if let Some(program) = store.get_program(uid)? {
                    preheat = preheat.with_program(program);
                }
            }
            for uid in &refs.program_stages {
                if let Some(stage) = store.get_program_stage(uid)? {
                    preheat = preheat.with_program_stage(stage);
                }
            }
            for uid in &refs.enrollments {
                if let Some(enrollment) = store.get_enrollment(uid)? {
                    let events = store.count_active_events(uid)?;
                    preheat = preheat.with_enrollment(enrollment, events);
                }
            }
            for uid in &refs.events {
                if let Some(event) = store.get_event(uid)? {
                    preheat = preheat.with_event(event);
                }
            }

            let mut tracked_entities = refs.tracked_entities;
            tracked_entities.extend(
                preheat
                    .enrollments
                    .values()
                    .filter_map(|e| e.tracked_entity_uid().map(String::from)),
            );
            for uid in &tracked_entities {
                if let Some(te) = store.get_tracked_entity(uid)? {
                    let enrollments = store.count_active_enrollments(uid)?;
                    preheat = preheat.with_tracked_entity(te, enrollments);
                }
            }

            for (te, program) in preheat.ownership_pairs(bundle) {
                if let Some(owner) = store.get_program_owner(&te, &program)? {
                    preheat = preheat.with_owner(&te, &program, owner.org_unit);
                }
            }

            tracing::debug!(
                tracked_entities = preheat.tracked_entities.len(),
                enrollments = preheat.enrollments.len(),
                events = preheat.events.len(),
                "preheat loaded"
            );
            Ok(preheat)
        })
    }

    /// (tracked entity, program) pairs whose owner the checks may ask for.
    fn ownership_pairs(&self, bundle: &TrackerBundle) -> BTreeSet<(String, String)> {
        let mut pairs = BTreeSet::new();
        for enrollment in &bundle.enrollments {
            let existing = self.enrollments.get(&enrollment.uid);
            let te = existing
                .and_then(|e| e.tracked_entity_uid())
                .or(enrollment.tracked_entity.as_deref());
            let program = existing.map_or(enrollment.program.as_str(), |e| e.program.uid.as_str());
            if let Some(te) = te {
                pairs.insert((te.to_string(), program.to_string()));
            }
        }
        for event in &bundle.events {
            let te = match self.events.get(&event.uid) {
                Some(existing) => existing.tracked_entity.as_ref().map(|t| t.uid.as_str()),
                None => event
                    .enrollment
                    .as_deref()
                    .and_then(|uid| self.enrollments.get(uid))
                    .and_then(|e| e.tracked_entity_uid()),
            };
            if let Some(te) = te {
                pairs.insert((te.to_string(), event.program.clone()));
            }
        }
        pairs
    }
}

#[derive(Default)]
struct References {
    org_units: BTreeSet<String>,
    tracked_entity_types: BTreeSet<String>,
    programs: BTreeSet<String>,
    program_stages: BTreeSet<String>,
    tracked_entities: BTreeSet<String>,
    enrollments: BTreeSet<String>,
    events: BTreeSet<String>,
}

impl References {
    fn collect(bundle: &TrackerBundle) -> Self {
        let mut refs = References::default();
        for te in &bundle.tracked_entities {
            refs.tracked_entities.insert(te.uid.clone());
            refs.tracked_entity_types.insert(te.tracked_entity_type.clone());
            refs.org_units.insert(te.org_unit.clone());
        }
        for enrollment in &bundle.enrollments {
            refs.enrollments.insert(enrollment.uid.clone());
            refs.programs.insert(enrollment.program.clone());
            refs.org_units.insert(enrollment.org_unit.clone());
            refs.tracked_entities.extend(enrollment.tracked_entity.clone());
        }
        for event in &bundle.events {
            refs.events.insert(event.uid.clone());
            refs.programs.insert(event.program.clone());
            refs.program_stages.insert(event.program_stage.clone());
            refs.org_units.insert(event.org_unit.clone());
            refs.enrollments.extend(event.enrollment.clone());
        }
        refs
    }
}

/// One bundle under validation together with its preheat.
pub struct ValidationContext<'a> {
    bundle: &'a TrackerBundle,
    preheat: Preheat,
}

impl<'a> ValidationContext<'a> {
    pub fn new(bundle: &'a TrackerBundle, preheat: Preheat) -> Self {
        Self { bundle, preheat }
    }

    pub fn bundle(&self) -> &TrackerBundle {
        self.bundle
    }

    pub fn user(&self) -> &User {
        &self.bundle.user
    }

    /// CREATE_AND_UPDATE becomes UPDATE for objects that already exist.
    fn resolve(&self, exists: bool) -> ImportStrategy {
        match self.bundle.strategy {
            ImportStrategy::CreateAndUpdate if exists => ImportStrategy::Update,
            ImportStrategy::CreateAndUpdate => ImportStrategy::Create,
            other => other,
        }
    }

    pub fn strategy_for_tracked_entity(&self, te: &ImportTrackedEntity) -> ImportStrategy {
        self.resolve(self.preheat.tracked_entities.contains_key(&te.uid))
    }

    pub fn strategy_for_enrollment(&self, enrollment: &ImportEnrollment) -> ImportStrategy {
        self.resolve(self.preheat.enrollments.contains_key(&enrollment.uid))
    }

    pub fn strategy_for_event(&self, event: &ImportEvent) -> ImportStrategy {
        self.resolve(self.preheat.events.contains_key(&event.uid))
    }

    pub fn org_unit(&self, uid: &str) -> Option<&OrganisationUnit> {
        self.preheat.org_units.get(uid)
    }

    pub fn tracked_entity_type(&self, uid: &str) -> Option<&TrackedEntityType> {
        self.preheat.tracked_entity_types.get(uid)
    }

    pub fn program(&self, uid: &str) -> Option<&Program> {
        self.preheat.programs.get(uid)
    }

    pub fn program_stage(&self, uid: &str) -> Option<&ProgramStage> {
        self.preheat.program_stages.get(uid)
    }

    pub fn tracked_entity(&self, uid: &str) -> Option<&TrackedEntity> {
        self.preheat.tracked_entities.get(uid)
    }

    pub fn enrollment(&self, uid: &str) -> Option<&Enrollment> {
        self.preheat.enrollments.get(uid)
    }

    pub fn event(&self, uid: &str) -> Option<&Event> {
        self.preheat.events.get(uid)
    }

    /// Tracked entity of an enrollment, stored or submitted in this bundle.
    pub fn tracked_entity_of_enrollment(&self, enrollment_uid: &str) -> Option<&str> {
        match self.enrollment(enrollment_uid) {
            Some(existing) => existing.tracked_entity_uid(),
            None => self
                .bundle
                .enrollments
                .iter()
                .find(|e| e.uid == enrollment_uid)
                .and_then(|e| e.tracked_entity.as_deref()),
        }
    }

    /// Program owner, falling back to the tracked entity's registering unit.
    pub fn owner_org_unit(&self, te_uid: &str, program_uid: &str) -> Option<&OrganisationUnit> {
        self.preheat
            .owners
            .get(&(te_uid.to_string(), program_uid.to_string()))
            .or_else(|| self.tracked_entity(te_uid).and_then(|te| te.org_unit.as_ref()))
    }

    pub fn tracked_entity_has_active_enrollments(&self, te_uid: &str) -> bool {
        self.preheat.active_enrollments.get(te_uid).is_some_and(|n| *n > 0)
    }

    pub fn enrollment_has_active_events(&self, enrollment_uid: &str) -> bool {
        self.preheat.active_events.get(enrollment_uid).is_some_and(|n| *n > 0)
    }
}
