use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enrollment::Enrollment;
use super::enums::RelationshipEntity;
use super::event::Event;
use super::metadata::RelationshipType;
use super::tracked_entity::TrackedEntity;

/// One side of a relationship: exactly one tracker object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipItem {
    TrackedEntity(TrackedEntity),
    Enrollment(Box<Enrollment>),
    Event(Box<Event>),
}

impl RelationshipItem {
    pub fn uid(&self) -> &str {
        match self {
            Self::TrackedEntity(te) => &te.uid,
            Self::Enrollment(enrollment) => &enrollment.uid,
            Self::Event(event) => &event.uid,
        }
    }

    pub fn entity(&self) -> RelationshipEntity {
        match self {
            Self::TrackedEntity(_) => RelationshipEntity::TrackedEntity,
            Self::Enrollment(_) => RelationshipEntity::Enrollment,
            Self::Event(_) => RelationshipEntity::Event,
        }
    }
}

/// Two-sided link between tracker objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: i64,
    pub uid: String,
    pub relationship_type: RelationshipType,
    pub from: RelationshipItem,
    pub to: RelationshipItem,
    pub deleted: bool,
    pub created: Option<NaiveDateTime>,
    pub created_at_client: Option<NaiveDateTime>,
    pub last_updated: Option<NaiveDateTime>,
}

impl Relationship {
    /// The side that is not `uid`, or `None` when `uid` is on neither side.
    pub fn other_side(&self, uid: &str) -> Option<&RelationshipItem> {
        if self.from.uid() == uid {
            Some(&self.to)
        } else if self.to.uid() == uid {
            Some(&self.from)
        } else {
            None
        }
    }
}
