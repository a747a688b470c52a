//! Program metadata referenced by tracker data: tracked entity types,
//! attributes, programs, program stages and relationship types.

use serde::{Deserialize, Serialize};

use super::enums::{ProgramAccessLevel, ProgramType, RelationshipEntity};
use super::sharing::Sharing;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntityAttribute {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub confidential: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntityType {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub sharing: Sharing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub program_type: ProgramType,
    pub access_level: ProgramAccessLevel,
    pub tracked_entity_type: Option<TrackedEntityType>,
    /// UIDs of the tracked entity attributes assigned to this program.
    pub attributes: Vec<String>,
    pub sharing: Sharing,
}

impl Program {
    pub fn is_registration(&self) -> bool {
        self.program_type == ProgramType::WithRegistration
    }

    pub fn is_without_registration(&self) -> bool {
        !self.is_registration()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramStage {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub program: String,
    pub sharing: Sharing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipType {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub from_entity: RelationshipEntity,
    pub to_entity: RelationshipEntity,
    pub bidirectional: bool,
    pub sharing: Sharing,
}
