//! Relationship export: lookup by UID and listing by one tracker object.

use super::context::RequestContext;
use super::page::{Page, PageParams};
use super::params::RelationshipOperationParams;
use super::store::TrackerStore;
use crate::acl::access::TrackerAccessManager;
use crate::error::TrackerError;
use crate::models::enums::RelationshipEntity;
use crate::models::Relationship;

pub struct RelationshipService<'a, S> {
    store: &'a S,
    access: TrackerAccessManager<'a, S>,
}

impl<'a, S: TrackerStore> RelationshipService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            access: TrackerAccessManager::new(store),
        }
    }

    pub fn get_relationship(&self, ctx: &RequestContext, uid: &str) -> Result<Relationship, TrackerError> {
        self.store.in_read_transaction(|| {
            let relationship = self
                .store
                .get_relationship(uid)?
                .filter(|r| !r.deleted)
                .ok_or_else(|| TrackerError::not_found("Relationship", uid))?;

            let errors = self.access.can_read_relationship(ctx, &relationship)?;
            if !errors.is_empty() {
                return Err(TrackerError::forbidden(errors.join(", ")));
            }
            Ok(relationship)
        })
    }

    pub fn get_relationships(
        &self,
        ctx: &RequestContext,
        params: &RelationshipOperationParams,
        page: &PageParams,
    ) -> Result<Page<Relationship>, TrackerError> {
        let (entity, uid) = target(params)?;
        self.store.in_read_transaction(|| {
            self.check_target_readable(ctx, entity, uid)?;
            let page = self
                .store
                .get_relationships_page_by_item(entity, uid, params.include_deleted, page)?;
            let mut visible = Vec::with_capacity(page.items.len());
            for relationship in &page.items {
                if self.access.can_read_relationship(ctx, relationship)?.is_empty() {
                    visible.push(relationship.clone());
                } else {
                    tracing::trace!(uid = %relationship.uid, "relationship filtered by access");
                }
            }
            tracing::debug!(%entity, item = %uid, count = visible.len(), "relationships exported");
            Ok(page.with_items(visible))
        })
    }

    /// Readable relationships of one item, unpaged. Used for nested
    /// relationship collections of enrollments and events.
    pub(crate) fn readable_relationships_of(
        &self,
        ctx: &RequestContext,
        entity: RelationshipEntity,
        uid: &str,
        include_deleted: bool,
    ) -> Result<Vec<Relationship>, TrackerError> {
        let mut visible = Vec::new();
        for relationship in self.store.get_relationships_by_item(entity, uid, include_deleted)? {
            if self.access.can_read_relationship(ctx, &relationship)?.is_empty() {
                visible.push(relationship);
            }
        }
        Ok(visible)
    }

    fn check_target_readable(
        &self,
        ctx: &RequestContext,
        entity: RelationshipEntity,
        uid: &str,
    ) -> Result<(), TrackerError> {
        let errors = match entity {
            RelationshipEntity::TrackedEntity => {
                let te = self
                    .store
                    .get_tracked_entity(uid)?
                    .filter(|te| !te.deleted)
                    .ok_or_else(|| TrackerError::not_found("TrackedEntity", uid))?;
                self.access.can_read_tracked_entity(ctx, &te)?
            }
            RelationshipEntity::Enrollment => {
                let enrollment = self
                    .store
                    .get_enrollment(uid)?
                    .filter(|e| !e.deleted)
                    .ok_or_else(|| TrackerError::not_found("Enrollment", uid))?;
                self.access.can_read_enrollment(ctx, &enrollment, false)?
            }
            RelationshipEntity::Event => {
                let event = self
                    .store
                    .get_event(uid)?
                    .filter(|e| !e.deleted)
                    .ok_or_else(|| TrackerError::not_found("Event", uid))?;
                self.access.can_read_event(ctx, &event, false)?
            }
        };
        if errors.is_empty() {
            Ok(())
        } else {
            Err(TrackerError::forbidden(format!(
                "User has no access to {}: {uid}",
                entity_name(entity)
            )))
        }
    }
}

fn entity_name(entity: RelationshipEntity) -> &'static str {
    match entity {
        RelationshipEntity::TrackedEntity => "TrackedEntity",
        RelationshipEntity::Enrollment => "Enrollment",
        RelationshipEntity::Event => "Event",
    }
}

fn target(params: &RelationshipOperationParams) -> Result<(RelationshipEntity, &str), TrackerError> {
    let given: Vec<(RelationshipEntity, &str)> = [
        (RelationshipEntity::TrackedEntity, params.tracked_entity.as_deref()),
        (RelationshipEntity::Enrollment, params.enrollment.as_deref()),
        (RelationshipEntity::Event, params.event.as_deref()),
    ]
    .into_iter()
    .filter_map(|(entity, uid)| uid.map(|uid| (entity, uid)))
    .collect();

    match given.as_slice() {
        [] => Err(TrackerError::bad_request(
            "Missing required parameter 'trackedEntity', 'enrollment' or 'event'.",
        )),
        [single] => Ok(*single),
        _ => Err(TrackerError::bad_request(
            "Only one of parameters 'trackedEntity', 'enrollment' or 'event' is allowed.",
        )),
    }
}
