//! Program ownership: which org unit owns a tracked entity's data in a
//! program, and whether the caller may act on that owner.

use crate::error::TrackerError;
use crate::export::context::RequestContext;
use crate::export::store::OwnershipStore;
use crate::models::enums::ProgramAccessLevel;
use crate::models::{OrganisationUnit, Program, TrackedEntity, User};

/// Scope rule of the program's access level applied to a known owner.
/// `temporary_grant` is only consulted for PROTECTED programs outside the
/// capture scope.
pub fn owner_in_scope<E>(
    user: &User,
    access_level: ProgramAccessLevel,
    owner: &OrganisationUnit,
    temporary_grant: impl FnOnce() -> Result<bool, E>,
) -> Result<bool, E> {
    match access_level {
        ProgramAccessLevel::Open | ProgramAccessLevel::Audited => Ok(user.is_in_search_scope(owner)),
        ProgramAccessLevel::Protected => {
            if user.is_in_capture_scope(owner) {
                Ok(true)
            } else {
                temporary_grant()
            }
        }
        ProgramAccessLevel::Closed => Ok(user.is_in_capture_scope(owner)),
    }
}

pub struct OwnershipAccessManager<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: OwnershipStore + ?Sized> OwnershipAccessManager<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Owner row for the program, falling back to the registering org unit.
    pub fn owner_org_unit(
        &self,
        tracked_entity: &TrackedEntity,
        program: &Program,
    ) -> Result<Option<OrganisationUnit>, TrackerError> {
        let owner = self
            .store
            .get_program_owner(&tracked_entity.uid, &program.uid)?
            .map(|o| o.org_unit);
        Ok(owner.or_else(|| tracked_entity.org_unit.clone()))
    }

    pub fn has_access(
        &self,
        ctx: &RequestContext,
        tracked_entity: Option<&TrackedEntity>,
        program: &Program,
    ) -> Result<bool, TrackerError> {
        let user = ctx.user();
        if user.is_super() || program.is_without_registration() {
            return Ok(true);
        }
        let Some(te) = tracked_entity else {
            return Ok(true);
        };
        if let Some(allowed) = ctx.cached_ownership(&te.uid, &program.uid) {
            return Ok(allowed);
        }

        let allowed = match self.owner_org_unit(te, program)? {
            Some(owner) => owner_in_scope(user, program.access_level, &owner, || {
                self.store
                    .has_temporary_ownership(&te.uid, &program.uid, &user.uid, ctx.now())
                    .map_err(TrackerError::from)
            })?,
            None => false,
        };

        if !allowed {
            tracing::trace!(te = %te.uid, program = %program.uid, user = %user.uid, "ownership denied");
        }
        ctx.cache_ownership(&te.uid, &program.uid, allowed);
        Ok(allowed)
    }
}
