use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::org_unit::OrganisationUnit;

/// Authority names checked by the access rules.
pub mod authorities {
    /// Superuser: bypasses sharing and scope checks.
    pub const ALL: &str = "ALL";
    pub const TEI_CASCADE_DELETE: &str = "F_TEI_CASCADE_DELETE";
    pub const ENROLLMENT_CASCADE_DELETE: &str = "F_ENROLLMENT_CASCADE_DELETE";
    pub const UNCOMPLETE_EVENT: &str = "F_UNCOMPLETE_EVENT";
    pub const SEARCH_IN_ALL_ORG_UNITS: &str = "F_TRACKED_ENTITY_INSTANCE_SEARCH_IN_ALL_ORGUNITS";
}

/// The authenticated caller of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub username: String,
    pub groups: Vec<String>,
    pub authorities: BTreeSet<String>,
    /// Org units where the user may create and write data.
    pub capture_scope: Vec<OrganisationUnit>,
    /// Org units where the user may search and read data.
    pub search_scope: Vec<OrganisationUnit>,
}

impl User {
    pub fn new(uid: &str, username: &str) -> Self {
        Self {
            uid: uid.to_string(),
            username: username.to_string(),
            ..Self::default()
        }
    }

    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups = groups.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn with_authorities(mut self, authorities: &[&str]) -> Self {
        self.authorities = authorities.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_capture_scope(mut self, units: Vec<OrganisationUnit>) -> Self {
        self.capture_scope = units;
        self
    }

    pub fn with_search_scope(mut self, units: Vec<OrganisationUnit>) -> Self {
        self.search_scope = units;
        self
    }

    pub fn is_super(&self) -> bool {
        self.authorities.contains(authorities::ALL)
    }

    pub fn is_authorized(&self, authority: &str) -> bool {
        self.is_super() || self.authorities.contains(authority)
    }

    pub fn is_in_capture_scope(&self, org_unit: &OrganisationUnit) -> bool {
        self.capture_scope.iter().any(|root| org_unit.is_descendant_of(root))
    }

    /// Search scope always includes the capture scope.
    pub fn is_in_search_scope(&self, org_unit: &OrganisationUnit) -> bool {
        self.is_in_capture_scope(org_unit)
            || self.search_scope.iter().any(|root| org_unit.is_descendant_of(root))
    }

    /// Roots of the search scope (search units plus capture units).
    pub fn effective_search_scope(&self) -> Vec<&OrganisationUnit> {
        let mut roots: Vec<&OrganisationUnit> = self.search_scope.iter().collect();
        for unit in &self.capture_scope {
            if !roots.iter().any(|r| r.uid == unit.uid) {
                roots.push(unit);
            }
        }
        roots
    }
}
