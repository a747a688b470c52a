use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::metadata::TrackedEntityType;
use super::org_unit::OrganisationUnit;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntityAttributeValue {
    /// Attribute UID.
    pub attribute: String,
    pub value: String,
    pub created: Option<NaiveDateTime>,
    pub last_updated: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntity {
    pub id: i64,
    pub uid: String,
    pub tracked_entity_type: Option<TrackedEntityType>,
    /// Registering org unit; fallback owner when no program owner exists.
    pub org_unit: Option<OrganisationUnit>,
    pub created: Option<NaiveDateTime>,
    pub last_updated: Option<NaiveDateTime>,
    pub inactive: bool,
    pub deleted: bool,
    pub attribute_values: Vec<TrackedEntityAttributeValue>,
}

impl TrackedEntity {
    /// Identity-only copy, used when another object points at this one.
    pub fn reference(&self) -> TrackedEntity {
        TrackedEntity {
            id: self.id,
            uid: self.uid.clone(),
            ..TrackedEntity::default()
        }
    }
}

/// Program-specific owner of a tracked entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntityProgramOwner {
    pub tracked_entity: String,
    pub program: String,
    pub org_unit: OrganisationUnit,
    pub created: NaiveDateTime,
    pub last_updated: NaiveDateTime,
}
