use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enrollment::{Note, UserInfo};
use super::enums::EventStatus;
use super::metadata::{Program, ProgramStage};
use super::org_unit::OrganisationUnit;
use super::relationship::Relationship;
use super::tracked_entity::TrackedEntity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValue {
    pub data_element: String,
    pub value: String,
    pub stored_by: Option<String>,
    pub created: Option<NaiveDateTime>,
    pub last_updated: Option<NaiveDateTime>,
}

/// One data-capture occurrence within a program stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub uid: String,
    /// UID of the owning enrollment.
    pub enrollment: String,
    /// Tracked entity of the owning enrollment; `None` for programs without registration.
    pub tracked_entity: Option<TrackedEntity>,
    pub program: Program,
    pub program_stage: ProgramStage,
    pub org_unit: OrganisationUnit,
    pub status: EventStatus,
    pub occurred_date: Option<NaiveDateTime>,
    pub scheduled_date: Option<NaiveDateTime>,
    pub geometry: Option<String>,
    pub created: Option<NaiveDateTime>,
    pub last_updated: Option<NaiveDateTime>,
    pub completed_date: Option<NaiveDateTime>,
    pub completed_by: Option<String>,
    pub stored_by: Option<String>,
    pub assigned_user: Option<UserInfo>,
    pub deleted: bool,
    pub data_values: Vec<DataValue>,
    pub notes: Vec<Note>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_items: Option<Vec<Relationship>>,
}
