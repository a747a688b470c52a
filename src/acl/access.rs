//! Per-entity read rules. Each check returns the list of violations;
//! an empty list means the caller may read the object.

use super::ownership::OwnershipAccessManager;
use super::resolver::AclResolver;
use crate::error::TrackerError;
use crate::export::context::RequestContext;
use crate::export::store::OwnershipStore;
use crate::models::*;

pub const OWNERSHIP_ACCESS_DENIED: &str = "OWNERSHIP_ACCESS_DENIED";

fn no_data_read(kind: &str, uid: &str) -> String {
    format!("User has no data read access to {kind}: {uid}")
}

fn no_org_unit_read(uid: &str) -> String {
    format!("User has no read access to organisation unit: {uid}")
}

fn in_search_scope(user: &User, org_unit: &OrganisationUnit) -> bool {
    user.is_super() || user.is_in_search_scope(org_unit)
}

pub struct TrackerAccessManager<'a, S: ?Sized> {
    store: &'a S,
    ownership: OwnershipAccessManager<'a, S>,
}

impl<'a, S> TrackerAccessManager<'a, S>
where
    S: AclResolver + OwnershipStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            ownership: OwnershipAccessManager::new(store),
        }
    }

    pub fn ownership(&self) -> &OwnershipAccessManager<'a, S> {
        &self.ownership
    }

    fn check_tracked_entity_type(
        &self,
        ctx: &RequestContext,
        te_type: Option<&TrackedEntityType>,
        errors: &mut Vec<String>,
    ) -> Result<(), TrackerError> {
        if let Some(te_type) = te_type {
            if !ctx
                .acl()
                .can_read_tracked_entity_type(self.store, ctx.user(), te_type.id)?
            {
                errors.push(no_data_read("tracked entity type", &te_type.uid));
            }
        }
        Ok(())
    }

    fn check_program(
        &self,
        ctx: &RequestContext,
        program: &Program,
        errors: &mut Vec<String>,
    ) -> Result<(), TrackerError> {
        if !ctx.acl().can_read_program(self.store, ctx.user(), program.id)? {
            errors.push(no_data_read("program", &program.uid));
        }
        Ok(())
    }

    pub fn can_read_tracked_entity(
        &self,
        ctx: &RequestContext,
        tracked_entity: &TrackedEntity,
    ) -> Result<Vec<String>, TrackerError> {
        let mut errors = Vec::new();
        if let Some(ou) = &tracked_entity.org_unit {
            if !in_search_scope(ctx.user(), ou) {
                errors.push(no_org_unit_read(&ou.uid));
            }
        }
        self.check_tracked_entity_type(ctx, tracked_entity.tracked_entity_type.as_ref(), &mut errors)?;
        Ok(errors)
    }

    pub fn can_read_enrollment(
        &self,
        ctx: &RequestContext,
        enrollment: &Enrollment,
        skip_ownership: bool,
    ) -> Result<Vec<String>, TrackerError> {
        let mut errors = Vec::new();
        let program = &enrollment.program;
        self.check_program(ctx, program, &mut errors)?;

        if program.is_registration() {
            self.check_tracked_entity_type(ctx, program.tracked_entity_type.as_ref(), &mut errors)?;
            if !skip_ownership
                && !self
                    .ownership
                    .has_access(ctx, enrollment.tracked_entity.as_ref(), program)?
            {
                errors.push(OWNERSHIP_ACCESS_DENIED.to_string());
            }
        } else if !in_search_scope(ctx.user(), &enrollment.org_unit) {
            errors.push(no_org_unit_read(&enrollment.org_unit.uid));
        }
        Ok(errors)
    }

    pub fn can_read_event(
        &self,
        ctx: &RequestContext,
        event: &Event,
        skip_ownership: bool,
    ) -> Result<Vec<String>, TrackerError> {
        let mut errors = Vec::new();
        let program = &event.program;
        self.check_program(ctx, program, &mut errors)?;

        if program.is_registration() {
            let stage = &event.program_stage;
            if !ctx.acl().can_read_program_stage(self.store, ctx.user(), stage.id)? {
                errors.push(no_data_read("program stage", &stage.uid));
            }
            self.check_tracked_entity_type(ctx, program.tracked_entity_type.as_ref(), &mut errors)?;
            if !skip_ownership
                && !self
                    .ownership
                    .has_access(ctx, event.tracked_entity.as_ref(), program)?
            {
                errors.push(OWNERSHIP_ACCESS_DENIED.to_string());
            }
        } else if !in_search_scope(ctx.user(), &event.org_unit) {
            errors.push(no_org_unit_read(&event.org_unit.uid));
        }
        Ok(errors)
    }

    fn can_read_item(
        &self,
        ctx: &RequestContext,
        item: &RelationshipItem,
    ) -> Result<Vec<String>, TrackerError> {
        match item {
            RelationshipItem::TrackedEntity(te) => self.can_read_tracked_entity(ctx, te),
            RelationshipItem::Enrollment(enrollment) => self.can_read_enrollment(ctx, enrollment, false),
            RelationshipItem::Event(event) => self.can_read_event(ctx, event, false),
        }
    }

    pub fn can_read_relationship(
        &self,
        ctx: &RequestContext,
        relationship: &Relationship,
    ) -> Result<Vec<String>, TrackerError> {
        let mut errors = Vec::new();
        let rel_type = &relationship.relationship_type;
        if !ctx
            .acl()
            .can_read_relationship_type(self.store, ctx.user(), rel_type.id)?
        {
            errors.push(no_data_read("relationship type", &rel_type.uid));
        }
        errors.extend(self.can_read_item(ctx, &relationship.from)?);
        errors.extend(self.can_read_item(ctx, &relationship.to)?);
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::World;
    use crate::export::store::{EnrollmentStore, EventStore, RelationshipStore, TrackedEntityStore};

    fn ctx(user: User) -> RequestContext {
        RequestContext::new(user)
    }

    #[test]
    fn enrollment_in_own_district_is_readable() {
        let store = World::store();
        let access = TrackerAccessManager::new(&store);
        let enrollment = store.get_enrollment(World::EN_ALICE_OPEN).unwrap().unwrap();
        let errors = access
            .can_read_enrollment(&ctx(World::user_district_a()), &enrollment, false)
            .unwrap();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn foreign_owner_is_denied_unless_skipped() {
        let store = World::store();
        let access = TrackerAccessManager::new(&store);
        let enrollment = store.get_enrollment(World::EN_BOB_OPEN).unwrap().unwrap();
        let ctx = ctx(World::user_district_a());

        let errors = access.can_read_enrollment(&ctx, &enrollment, false).unwrap();
        assert_eq!(errors, vec![OWNERSHIP_ACCESS_DENIED.to_string()]);
        assert!(access.can_read_enrollment(&ctx, &enrollment, true).unwrap().is_empty());
    }

    #[test]
    fn unreadable_program_is_reported_by_uid() {
        let store = World::store();
        let access = TrackerAccessManager::new(&store);
        let enrollment = store.get_enrollment(World::EN_BOB_HIDDEN).unwrap().unwrap();
        let errors = access
            .can_read_enrollment(&ctx(World::user_root()), &enrollment, false)
            .unwrap();
        assert_eq!(
            errors,
            vec![format!("User has no data read access to program: {}", World::PROGRAM_HIDDEN)]
        );
        assert!(access
            .can_read_enrollment(&ctx(World::superuser()), &enrollment, false)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn event_in_hidden_stage_is_unreadable() {
        let store = World::store();
        let access = TrackerAccessManager::new(&store);
        let ctx = ctx(World::user_district_a());
        let visible = store.get_event(World::EV_OPEN).unwrap().unwrap();
        let hidden = store.get_event(World::EV_HIDDEN_STAGE).unwrap().unwrap();

        assert!(access.can_read_event(&ctx, &visible, false).unwrap().is_empty());
        assert_eq!(
            access.can_read_event(&ctx, &hidden, false).unwrap(),
            vec![format!("User has no data read access to program stage: {}", World::STAGE_HIDDEN)]
        );
    }

    #[test]
    fn tracked_entity_outside_search_scope() {
        let store = World::store();
        let access = TrackerAccessManager::new(&store);
        let bob = store.get_tracked_entity(World::TE_BOB).unwrap().unwrap();
        let errors = access
            .can_read_tracked_entity(&ctx(World::user_district_a()), &bob)
            .unwrap();
        assert_eq!(
            errors,
            vec![format!("User has no read access to organisation unit: {}", World::OU_DISTRICT_B)]
        );
    }

    #[test]
    fn relationship_violations_accumulate_over_both_sides() {
        let store = World::store();
        let access = TrackerAccessManager::new(&store);
        let hidden = store.get_relationship(World::REL_HIDDEN).unwrap().unwrap();

        // district A cannot see Bob (from side) nor the hidden type
        let errors = access
            .can_read_relationship(&ctx(World::user_district_a()), &hidden)
            .unwrap();
        assert_eq!(errors.len(), 2, "{errors:?}");

        let open = store.get_relationship(World::REL_OPEN).unwrap().unwrap();
        assert!(access
            .can_read_relationship(&ctx(World::user_root()), &open)
            .unwrap()
            .is_empty());
    }
}
