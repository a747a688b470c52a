//! Inbound import objects. References to other objects are UIDs resolved
//! through the preheat.

use serde::{Deserialize, Serialize};

use crate::models::enums::{EventStatus, ImportStrategy};
use crate::models::User;
use crate::uid::generate_uid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTrackedEntity {
    pub uid: String,
    pub tracked_entity_type: String,
    pub org_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEnrollment {
    pub uid: String,
    pub tracked_entity: Option<String>,
    pub program: String,
    pub org_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEvent {
    pub uid: String,
    pub enrollment: Option<String>,
    pub program: String,
    pub program_stage: String,
    pub org_unit: String,
    #[serde(default = "default_event_status")]
    pub status: EventStatus,
}

fn default_event_status() -> EventStatus {
    EventStatus::Active
}

/// One import request: the submitting user, the requested strategy and the
/// objects to validate.
#[derive(Debug, Clone)]
pub struct TrackerBundle {
    pub user: User,
    pub strategy: ImportStrategy,
    pub tracked_entities: Vec<ImportTrackedEntity>,
    pub enrollments: Vec<ImportEnrollment>,
    pub events: Vec<ImportEvent>,
}

impl TrackerBundle {
    pub fn new(user: User, strategy: ImportStrategy) -> Self {
        Self {
            user,
            strategy,
            tracked_entities: Vec::new(),
            enrollments: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_tracked_entity(mut self, te: ImportTrackedEntity) -> Self {
        self.tracked_entities.push(te);
        self
    }

    pub fn with_enrollment(mut self, enrollment: ImportEnrollment) -> Self {
        self.enrollments.push(enrollment);
        self
    }

    pub fn with_event(mut self, event: ImportEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Give every object submitted without a UID a freshly generated one.
    pub fn assign_missing_uids(&mut self) {
        let uids = self
            .tracked_entities
            .iter_mut()
            .map(|te| &mut te.uid)
            .chain(self.enrollments.iter_mut().map(|e| &mut e.uid))
            .chain(self.events.iter_mut().map(|e| &mut e.uid));
        for uid in uids.filter(|uid| uid.is_empty()) {
            *uid = generate_uid();
        }
    }
}
