//! Enrollment export: ownership- and sharing-scoped retrieval with
//! optional nested events, relationships and attribute values.

use super::attribute::AttributeService;
use super::context::RequestContext;
use super::event::EventService;
use super::mapper::map_enrollment_params;
use super::page::{Page, PageParams};
use super::params::{
    EnrollmentOperationParams, EnrollmentParams, EnrollmentQueryParams, EventQueryParams,
};
use super::relationship::RelationshipService;
use super::store::TrackerStore;
use crate::acl::access::TrackerAccessManager;
use crate::error::TrackerError;
use crate::models::enums::{OrgUnitSelectionMode, RelationshipEntity};
use crate::models::Enrollment;
use crate::uid::is_valid_uid;

pub struct EnrollmentService<'a, S> {
    store: &'a S,
    access: TrackerAccessManager<'a, S>,
    events: EventService<'a, S>,
    relationships: RelationshipService<'a, S>,
    attributes: AttributeService<'a, S>,
}

impl<'a, S: TrackerStore> EnrollmentService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            access: TrackerAccessManager::new(store),
            events: EventService::new(store),
            relationships: RelationshipService::new(store),
            attributes: AttributeService::new(store),
        }
    }

    pub fn get_enrollment(&self, ctx: &RequestContext, uid: &str) -> Result<Enrollment, TrackerError> {
        self.get_enrollment_with(ctx, uid, EnrollmentParams::FALSE, false)
    }

    /// Single enrollment as a one-item page. Inaccessible and missing
    /// enrollments are both `NotFound`.
    pub fn get_enrollment_with(
        &self,
        ctx: &RequestContext,
        uid: &str,
        params: EnrollmentParams,
        include_deleted: bool,
    ) -> Result<Enrollment, TrackerError> {
        if !is_valid_uid(uid) {
            return Err(TrackerError::bad_request(format!("Invalid enrollment UID: {uid}")));
        }
        let operation = EnrollmentOperationParams {
            enrollment_params: params,
            include_deleted,
            ..EnrollmentOperationParams::for_enrollments([uid])
        };

        self.store.in_read_transaction(|| {
            let query = self.map_internal(ctx, &operation)?;
            let page = self.store.get_enrollments_page(&query, &PageParams::single())?;
            let mut enrollments = self.filter_and_build(ctx, page.items, &query, &operation)?;
            if enrollments.is_empty() {
                return Err(TrackerError::not_found("Enrollment", uid));
            }
            Ok(enrollments.swap_remove(0))
        })
    }

    /// Enrollments by UID without nested collections.
    pub fn get_enrollments_by_uids(
        &self,
        ctx: &RequestContext,
        uids: &[&str],
    ) -> Result<Vec<Enrollment>, TrackerError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let operation = EnrollmentOperationParams::for_enrollments(uids.iter().copied());
        self.store.in_read_transaction(|| {
            let query = self.map_internal(ctx, &operation)?;
            let candidates = self.store.get_enrollments(&query)?;
            self.filter_and_build(ctx, candidates, &query, &operation)
        })
    }

    pub fn get_enrollments(
        &self,
        ctx: &RequestContext,
        operation: &EnrollmentOperationParams,
    ) -> Result<Vec<Enrollment>, TrackerError> {
        self.store.in_read_transaction(|| {
            let query = map_enrollment_params(self.store, ctx, operation)?;
            let candidates = self.store.get_enrollments(&query)?;
            let enrollments = self.filter_and_build(ctx, candidates, &query, operation)?;
            tracing::debug!(count = enrollments.len(), mode = %query.org_unit_mode, "enrollments exported");
            Ok(enrollments)
        })
    }

    /// Paged export. The pager reflects the store's window, not the number
    /// of items left after access filtering.
    pub fn get_enrollments_paged(
        &self,
        ctx: &RequestContext,
        operation: &EnrollmentOperationParams,
        page_params: &PageParams,
    ) -> Result<Page<Enrollment>, TrackerError> {
        self.store.in_read_transaction(|| {
            let query = map_enrollment_params(self.store, ctx, operation)?;
            let mut page = self.store.get_enrollments_page(&query, page_params)?;
            let candidates = std::mem::take(&mut page.items);
            let enrollments = self.filter_and_build(ctx, candidates, &query, operation)?;
            tracing::debug!(
                page = page_params.page(),
                count = enrollments.len(),
                mode = %query.org_unit_mode,
                "enrollment page exported"
            );
            Ok(page.with_items(enrollments))
        })
    }

    /// Enrollment side of a relationship; `None` when missing or not visible.
    pub fn get_enrollment_in_relationship_item(
        &self,
        ctx: &RequestContext,
        uid: &str,
        include_deleted: bool,
    ) -> Result<Option<Enrollment>, TrackerError> {
        match self.get_enrollment_with(ctx, uid, EnrollmentParams::FALSE, include_deleted) {
            Ok(enrollment) => Ok(Some(enrollment)),
            Err(TrackerError::NotFound { .. } | TrackerError::Forbidden(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn get_orderable_fields(&self) -> Vec<&'static str> {
        self.store.get_orderable_fields()
    }

    /// Mapping of internally built params; a rejection is a defect here.
    fn map_internal(
        &self,
        ctx: &RequestContext,
        operation: &EnrollmentOperationParams,
    ) -> Result<EnrollmentQueryParams, TrackerError> {
        map_enrollment_params(self.store, ctx, operation).map_err(|err| match err {
            TrackerError::BadRequest(message) => {
                tracing::error!(%message, "enrollment params rejected");
                TrackerError::precondition("EnrollmentOperationParams")
            }
            other => other,
        })
    }

    fn filter_and_build(
        &self,
        ctx: &RequestContext,
        candidates: Vec<Enrollment>,
        query: &EnrollmentQueryParams,
        operation: &EnrollmentOperationParams,
    ) -> Result<Vec<Enrollment>, TrackerError> {
        let skip_ownership = query.org_unit_mode == OrgUnitSelectionMode::All;
        let mut result = Vec::with_capacity(candidates.len());
        for enrollment in candidates {
            if !skip_ownership
                && !self.access.ownership().has_access(
                    ctx,
                    enrollment.tracked_entity.as_ref(),
                    &enrollment.program,
                )?
            {
                tracing::trace!(uid = %enrollment.uid, "enrollment dropped: ownership");
                continue;
            }
            let errors = self.access.can_read_enrollment(ctx, &enrollment, skip_ownership)?;
            if !errors.is_empty() {
                tracing::trace!(uid = %enrollment.uid, ?errors, "enrollment dropped: access");
                continue;
            }
            result.push(self.sanitized(
                ctx,
                &enrollment,
                operation.enrollment_params,
                operation.include_deleted,
            )?);
        }
        Ok(result)
    }

    /// Field-by-field copy of a stored enrollment. Nested collections are
    /// filled only when requested.
    fn sanitized(
        &self,
        ctx: &RequestContext,
        enrollment: &Enrollment,
        params: EnrollmentParams,
        include_deleted: bool,
    ) -> Result<Enrollment, TrackerError> {
        let events = if params.include_events {
            let query = EventQueryParams {
                enrollments: [enrollment.uid.clone()].into(),
                include_deleted,
                event_params: params.event_params,
            };
            Some(self.events.get_events(ctx, &query)?)
        } else {
            None
        };

        let relationship_items = if params.include_relationships {
            Some(self.relationships.readable_relationships_of(
                ctx,
                RelationshipEntity::Enrollment,
                &enrollment.uid,
                include_deleted,
            )?)
        } else {
            None
        };

        let attributes = if params.include_attributes {
            let readable = self
                .attributes
                .get_all_user_readable_attributes(ctx, std::slice::from_ref(&enrollment.program))?;
            let values = enrollment
                .tracked_entity
                .iter()
                .flat_map(|te| te.attribute_values.iter())
                .filter(|value| readable.contains(&value.attribute))
                .cloned()
                .collect();
            Some(values)
        } else {
            None
        };

        Ok(Enrollment {
            id: enrollment.id,
            uid: enrollment.uid.clone(),
            tracked_entity: enrollment.tracked_entity.as_ref().map(|te| te.reference()),
            program: enrollment.program.clone(),
            org_unit: enrollment.org_unit.clone(),
            geometry: enrollment.geometry.clone(),
            created: enrollment.created,
            created_at_client: enrollment.created_at_client,
            last_updated: enrollment.last_updated,
            last_updated_at_client: enrollment.last_updated_at_client,
            status: enrollment.status,
            enrollment_date: enrollment.enrollment_date,
            occurred_date: enrollment.occurred_date,
            follow_up: enrollment.follow_up,
            completed_date: enrollment.completed_date,
            completed_by: enrollment.completed_by.clone(),
            stored_by: enrollment.stored_by.clone(),
            created_by: enrollment.created_by.clone(),
            last_updated_by: enrollment.last_updated_by.clone(),
            deleted: enrollment.deleted,
            notes: enrollment.notes.clone(),
            events,
            relationship_items,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::World;
    use crate::db::SqliteTrackerStore;
    use crate::models::user::authorities;
    use crate::models::User;

    fn ctx(user: User) -> RequestContext {
        RequestContext::new(user)
    }

    fn uids(enrollments: &[Enrollment]) -> Vec<&str> {
        enrollments.iter().map(|e| e.uid.as_str()).collect()
    }

    fn all_units(store: &SqliteTrackerStore, user: User) -> Vec<Enrollment> {
        let operation = EnrollmentOperationParams {
            org_unit_mode: Some(OrgUnitSelectionMode::All),
            ..Default::default()
        };
        EnrollmentService::new(store).get_enrollments(&ctx(user), &operation).unwrap()
    }

    #[test]
    fn district_user_sees_only_owned_readable_enrollments() {
        let store = World::store();
        let enrollments = EnrollmentService::new(&store)
            .get_enrollments(&ctx(World::user_district_a()), &EnrollmentOperationParams::default())
            .unwrap();
        // protected enrollment is registered in A but owned by B
        assert_eq!(uids(&enrollments), vec![World::EN_ALICE_OPEN]);
    }

    #[test]
    fn root_user_is_limited_by_program_sharing() {
        let store = World::store();
        let enrollments = EnrollmentService::new(&store)
            .get_enrollments(&ctx(World::user_root()), &EnrollmentOperationParams::default())
            .unwrap();
        assert_eq!(
            uids(&enrollments),
            vec![World::EN_ALICE_OPEN, World::EN_BOB_OPEN, World::EN_ALICE_PROTECTED]
        );
    }

    #[test]
    fn all_mode_skips_ownership_but_not_sharing() {
        let store = World::store();
        let user = World::user_district_a().with_authorities(&[authorities::SEARCH_IN_ALL_ORG_UNITS]);
        let enrollments = all_units(&store, user);
        assert_eq!(
            uids(&enrollments),
            vec![World::EN_ALICE_OPEN, World::EN_BOB_OPEN, World::EN_ALICE_PROTECTED]
        );
    }

    #[test]
    fn nested_collections_absent_unless_requested() {
        let store = World::store();
        let enrollment = EnrollmentService::new(&store)
            .get_enrollment(&ctx(World::user_district_a()), World::EN_ALICE_OPEN)
            .unwrap();
        assert!(enrollment.events.is_none());
        assert!(enrollment.relationship_items.is_none());
        assert!(enrollment.attributes.is_none());
        assert_eq!(enrollment.notes.len(), 1);

        let te = enrollment.tracked_entity.unwrap();
        assert_eq!(te.uid, World::TE_ALICE);
        assert!(te.attribute_values.is_empty());
        assert!(te.org_unit.is_none());

        let json = serde_json::to_value(
            EnrollmentService::new(&store)
                .get_enrollment(&ctx(World::user_district_a()), World::EN_ALICE_OPEN)
                .unwrap(),
        )
        .unwrap();
        assert!(json.get("events").is_none());
    }

    #[test]
    fn nested_collections_are_filtered_when_requested() {
        let store = World::store();
        let enrollment = EnrollmentService::new(&store)
            .get_enrollment_with(
                &ctx(World::user_district_a()),
                World::EN_ALICE_OPEN,
                EnrollmentParams::TRUE,
                false,
            )
            .unwrap();

        let events = enrollment.events.unwrap();
        assert_eq!(events.iter().map(|e| e.uid.as_str()).collect::<Vec<_>>(), vec![World::EV_OPEN]);
        // Bob sits outside district A, so the relationship to him is hidden
        assert_eq!(enrollment.relationship_items, Some(Vec::new()));
        let attributes = enrollment.attributes.unwrap();
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].attribute, World::ATTR_NAME);
    }

    #[test]
    fn relationships_honour_include_deleted() {
        let store = World::store();
        let service = EnrollmentService::new(&store);
        let params = EnrollmentParams::FALSE.with_include_relationships(true);
        let root = ctx(World::user_root());

        let visible = service
            .get_enrollment_with(&root, World::EN_ALICE_OPEN, params, false)
            .unwrap()
            .relationship_items
            .unwrap();
        assert_eq!(visible.iter().map(|r| r.uid.as_str()).collect::<Vec<_>>(), vec![World::REL_OPEN]);

        let with_deleted = service
            .get_enrollment_with(&root, World::EN_ALICE_OPEN, params, true)
            .unwrap()
            .relationship_items
            .unwrap();
        assert_eq!(
            with_deleted.iter().map(|r| r.uid.as_str()).collect::<Vec<_>>(),
            vec![World::REL_OPEN, World::REL_DELETED]
        );
    }

    #[test]
    fn requested_events_are_an_empty_list_when_there_are_none() {
        let store = World::store();
        let enrollment = EnrollmentService::new(&store)
            .get_enrollment_with(
                &ctx(World::user_root()),
                World::EN_BOB_OPEN,
                EnrollmentParams::FALSE.with_include_events(true),
                false,
            )
            .unwrap();
        assert_eq!(enrollment.events, Some(Vec::new()));

        let json = serde_json::to_value(&enrollment).unwrap();
        assert_eq!(json["events"], serde_json::json!([]));
    }

    #[test]
    fn inaccessible_enrollment_is_not_found() {
        let store = World::store();
        let err = EnrollmentService::new(&store)
            .get_enrollment(&ctx(World::user_district_a()), World::EN_BOB_OPEN)
            .unwrap_err();
        assert_eq!(err.to_string(), "Enrollment with id EnBobOpenAA could not be found.");
    }

    #[test]
    fn deleted_enrollment_needs_include_deleted() {
        let store = World::store();
        let service = EnrollmentService::new(&store);
        let user = ctx(World::user_district_a());
        assert!(service.get_enrollment(&user, World::EN_ALICE_DELETED).is_err());
        let enrollment = service
            .get_enrollment_with(&user, World::EN_ALICE_DELETED, EnrollmentParams::FALSE, true)
            .unwrap();
        assert!(enrollment.deleted);
    }

    #[test]
    fn invalid_uid_is_bad_request() {
        let store = World::store();
        let err = EnrollmentService::new(&store)
            .get_enrollment(&ctx(World::user_district_a()), "nope")
            .unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn relationship_item_lookup_hides_inaccessible() {
        let store = World::store();
        let service = EnrollmentService::new(&store);
        let user = ctx(World::user_district_a());
        assert!(service
            .get_enrollment_in_relationship_item(&user, World::EN_BOB_OPEN, false)
            .unwrap()
            .is_none());
        assert!(service
            .get_enrollment_in_relationship_item(&user, World::EN_ALICE_OPEN, false)
            .unwrap()
            .is_some());
    }

    #[test]
    fn by_uids_returns_visible_subset() {
        let store = World::store();
        let service = EnrollmentService::new(&store);
        let enrollments = service
            .get_enrollments_by_uids(
                &ctx(World::user_root()),
                &[World::EN_BOB_OPEN, World::EN_BOB_HIDDEN],
            )
            .unwrap();
        assert_eq!(uids(&enrollments), vec![World::EN_BOB_OPEN]);
        assert!(enrollments[0].events.is_none());
        assert!(service.get_enrollments_by_uids(&ctx(World::user_root()), &[]).unwrap().is_empty());
    }

    #[test]
    fn pager_reflects_store_window_not_filtered_count() {
        let store = World::store();
        let operation = EnrollmentOperationParams {
            org_units: [World::OU_ROOT.to_string()].into(),
            ..Default::default()
        };
        let page = EnrollmentService::new(&store)
            .get_enrollments_paged(
                &ctx(World::user_root()),
                &operation,
                &PageParams::new(1, 4, true).unwrap(),
            )
            .unwrap();
        // store window holds 1, 2, 3 and 5; the hidden-program enrollment is filtered
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.pager.total(), Some(4));
        assert_eq!(page.pager.page_count(), Some(1));

        let page = EnrollmentService::new(&store)
            .get_enrollments_paged(
                &ctx(World::user_root()),
                &operation,
                &PageParams::new(1, 2, false).unwrap(),
            )
            .unwrap();
        assert_eq!(page.pager.is_last_page(), Some(false));
        assert!(!page.pager.is_page_total());
    }

    #[test]
    fn orderable_fields_come_from_store() {
        let store = World::store();
        assert!(EnrollmentService::new(&store)
            .get_orderable_fields()
            .contains(&"enrolledAt"));
    }
}
