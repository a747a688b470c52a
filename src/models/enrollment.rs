use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::EnrollmentStatus;
use super::event::Event;
use super::metadata::Program;
use super::org_unit::OrganisationUnit;
use super::relationship::Relationship;
use super::tracked_entity::{TrackedEntity, TrackedEntityAttributeValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub uid: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub uid: String,
    pub value: String,
    pub stored_by: Option<String>,
    pub created: Option<NaiveDateTime>,
}

/// A tracked entity's participation in one program.
///
/// Values read from the store carry the full tracked entity. Values handed
/// out by the export services are sanitized: the tracked entity is reduced
/// to a reference and `events`, `relationship_items` and `attributes` are
/// `Some` only when they were requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: i64,
    pub uid: String,
    pub tracked_entity: Option<TrackedEntity>,
    pub program: Program,
    pub org_unit: OrganisationUnit,
    pub geometry: Option<String>,
    pub created: Option<NaiveDateTime>,
    pub created_at_client: Option<NaiveDateTime>,
    pub last_updated: Option<NaiveDateTime>,
    pub last_updated_at_client: Option<NaiveDateTime>,
    pub status: EnrollmentStatus,
    pub enrollment_date: Option<NaiveDateTime>,
    pub occurred_date: Option<NaiveDateTime>,
    pub follow_up: bool,
    pub completed_date: Option<NaiveDateTime>,
    pub completed_by: Option<String>,
    pub stored_by: Option<String>,
    pub created_by: Option<UserInfo>,
    pub last_updated_by: Option<UserInfo>,
    pub deleted: bool,
    pub notes: Vec<Note>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<Event>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_items: Option<Vec<Relationship>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<TrackedEntityAttributeValue>>,
}

impl Enrollment {
    pub fn tracked_entity_uid(&self) -> Option<&str> {
        self.tracked_entity.as_ref().map(|te| te.uid.as_str())
    }
}
