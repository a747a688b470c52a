//! Maps caller-facing enrollment parameters (UIDs) into a validated store
//! query (resolved metadata, effective org-unit mode).

use super::context::RequestContext;
use super::params::{EnrollmentOperationParams, EnrollmentOrderField, EnrollmentQueryParams};
use super::store::MetadataStore;
use crate::error::TrackerError;
use crate::models::enums::OrgUnitSelectionMode;
use crate::models::user::authorities;
use crate::models::{OrganisationUnit, User};
use crate::uid::is_valid_uid;

fn validate_uid(param: &str, uid: &str) -> Result<(), TrackerError> {
    if is_valid_uid(uid) {
        Ok(())
    } else {
        Err(TrackerError::bad_request(format!(
            "{param} contains an invalid UID: {uid}"
        )))
    }
}

fn resolve_mode(
    user: &User,
    requested: Option<OrgUnitSelectionMode>,
    has_org_units: bool,
) -> Result<OrgUnitSelectionMode, TrackerError> {
    let mode = requested.unwrap_or(if has_org_units {
        OrgUnitSelectionMode::Descendants
    } else {
        OrgUnitSelectionMode::Accessible
    });

    if mode.requires_org_units() && !has_org_units {
        return Err(TrackerError::bad_request(format!(
            "At least one org unit is required for orgUnitMode: {mode}. Please add an orgUnit or use a different orgUnitMode."
        )));
    }
    if !mode.requires_org_units() && has_org_units {
        return Err(TrackerError::bad_request(format!(
            "orgUnitMode {mode} cannot be used with orgUnits. Please remove the orgUnit parameter and try again."
        )));
    }
    if mode == OrgUnitSelectionMode::All && !user.is_authorized(authorities::SEARCH_IN_ALL_ORG_UNITS) {
        return Err(TrackerError::bad_request(
            "Current user is not authorized to query across all organisation units",
        ));
    }
    Ok(mode)
}

pub fn map_enrollment_params<S: MetadataStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    params: &EnrollmentOperationParams,
) -> Result<EnrollmentQueryParams, TrackerError> {
    let user = ctx.user();

    for uid in &params.enrollments {
        validate_uid("enrollments", uid)?;
    }

    let program = match &params.program {
        Some(uid) => {
            validate_uid("program", uid)?;
            Some(store.get_program(uid)?.ok_or_else(|| {
                TrackerError::bad_request(format!("Program is specified but does not exist: {uid}"))
            })?)
        }
        None => None,
    };

    let tracked_entity_type = match &params.tracked_entity_type {
        Some(uid) => {
            validate_uid("trackedEntityType", uid)?;
            Some(store.get_tracked_entity_type(uid)?.ok_or_else(|| {
                TrackerError::bad_request(format!(
                    "Tracked entity type is specified but does not exist: {uid}"
                ))
            })?)
        }
        None => None,
    };

    if let Some(uid) = &params.tracked_entity {
        validate_uid("trackedEntity", uid)?;
    }

    let mut org_units = Vec::with_capacity(params.org_units.len());
    for uid in &params.org_units {
        validate_uid("orgUnits", uid)?;
        let org_unit = store.get_org_unit(uid)?.ok_or_else(|| {
            TrackerError::bad_request(format!("Organisation unit does not exist: {uid}"))
        })?;
        if !user.is_super() && !user.is_in_search_scope(&org_unit) {
            return Err(TrackerError::bad_request(format!(
                "Organisation unit is not part of the search scope: {uid}"
            )));
        }
        org_units.push(org_unit);
    }

    let mut org_unit_mode = resolve_mode(user, params.org_unit_mode, !org_units.is_empty())?;
    match org_unit_mode {
        OrgUnitSelectionMode::Accessible if user.is_super() => {
            org_unit_mode = OrgUnitSelectionMode::All;
        }
        OrgUnitSelectionMode::Accessible => {
            org_units = user
                .effective_search_scope()
                .into_iter()
                .cloned()
                .collect::<Vec<OrganisationUnit>>();
        }
        OrgUnitSelectionMode::Capture => {
            org_units = user.capture_scope.clone();
        }
        _ => {}
    }

    let mut order = Vec::with_capacity(params.order.len());
    for o in &params.order {
        let field = EnrollmentOrderField::from_api_name(&o.field).ok_or_else(|| {
            let supported: Vec<&str> = EnrollmentOrderField::ALL.iter().map(|f| f.api_name()).collect();
            TrackerError::bad_request(format!(
                "Order by property `{}` is not supported. Supported are: {}",
                o.field,
                supported.join(", ")
            ))
        })?;
        order.push((field, o.direction));
    }

    Ok(EnrollmentQueryParams {
        enrollments: params.enrollments.clone(),
        program,
        tracked_entity_type,
        tracked_entity: params.tracked_entity.clone(),
        org_units,
        org_unit_mode,
        enrollment_status: params.enrollment_status,
        follow_up: params.follow_up,
        last_updated: params.last_updated,
        enrolled_after: params.enrolled_after,
        enrolled_before: params.enrolled_before,
        include_deleted: params.include_deleted,
        order,
    })
}
