//! Events of enrollments, filtered by read access.

use super::context::RequestContext;
use super::params::EventQueryParams;
use super::relationship::RelationshipService;
use super::store::TrackerStore;
use crate::acl::access::TrackerAccessManager;
use crate::error::TrackerError;
use crate::models::enums::RelationshipEntity;
use crate::models::Event;

pub struct EventService<'a, S> {
    store: &'a S,
    access: TrackerAccessManager<'a, S>,
    relationships: RelationshipService<'a, S>,
}

impl<'a, S: TrackerStore> EventService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            access: TrackerAccessManager::new(store),
            relationships: RelationshipService::new(store),
        }
    }

    /// Readable events of the requested enrollments, in store order.
    pub fn get_events(
        &self,
        ctx: &RequestContext,
        params: &EventQueryParams,
    ) -> Result<Vec<Event>, TrackerError> {
        let mut events = Vec::new();
        for mut event in self.store.get_events(params)? {
            let errors = self.access.can_read_event(ctx, &event, false)?;
            if !errors.is_empty() {
                tracing::trace!(uid = %event.uid, ?errors, "event filtered by access");
                continue;
            }
            if params.event_params.include_relationships {
                event.relationship_items = Some(self.relationships.readable_relationships_of(
                    ctx,
                    RelationshipEntity::Event,
                    &event.uid,
                    params.include_deleted,
                )?);
            }
            events.push(event);
        }
        Ok(events)
    }
}
