//! Operation-level parameters (what the caller asks for) and the
//! store-level query specs they are mapped into.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use crate::models::enums::{EnrollmentStatus, OrgUnitSelectionMode};
use crate::models::{OrganisationUnit, Program, TrackedEntityType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Caller-facing ordering by API field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: SortDirection,
}

impl Order {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// Enrollment fields the store can order by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentOrderField {
    Created,
    LastUpdated,
    EnrolledAt,
    OccurredAt,
    CompletedAt,
}

impl EnrollmentOrderField {
    pub const ALL: [EnrollmentOrderField; 5] = [
        Self::Created,
        Self::LastUpdated,
        Self::EnrolledAt,
        Self::OccurredAt,
        Self::CompletedAt,
    ];

    pub fn api_name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::LastUpdated => "lastUpdated",
            Self::EnrolledAt => "enrolledAt",
            Self::OccurredAt => "occurredAt",
            Self::CompletedAt => "completedAt",
        }
    }

    pub fn from_api_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.api_name() == name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventParams {
    pub include_relationships: bool,
}

impl EventParams {
    pub const FALSE: EventParams = EventParams {
        include_relationships: false,
    };
    pub const TRUE: EventParams = EventParams {
        include_relationships: true,
    };
}

/// Which nested collections an exported enrollment carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrollmentParams {
    pub include_events: bool,
    pub include_relationships: bool,
    pub include_attributes: bool,
    pub event_params: EventParams,
}

impl EnrollmentParams {
    pub const FALSE: EnrollmentParams = EnrollmentParams {
        include_events: false,
        include_relationships: false,
        include_attributes: false,
        event_params: EventParams::FALSE,
    };
    pub const TRUE: EnrollmentParams = EnrollmentParams {
        include_events: true,
        include_relationships: true,
        include_attributes: true,
        event_params: EventParams::TRUE,
    };

    pub fn with_include_events(mut self, include: bool) -> Self {
        self.include_events = include;
        self
    }

    pub fn with_include_relationships(mut self, include: bool) -> Self {
        self.include_relationships = include;
        self
    }

    pub fn with_include_attributes(mut self, include: bool) -> Self {
        self.include_attributes = include;
        self
    }
}

/// Enrollment export request as received from the caller (UIDs, not objects).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrollmentOperationParams {
    pub program: Option<String>,
    pub tracked_entity_type: Option<String>,
    pub tracked_entity: Option<String>,
    pub org_units: BTreeSet<String>,
    pub org_unit_mode: Option<OrgUnitSelectionMode>,
    pub enrollment_status: Option<EnrollmentStatus>,
    pub follow_up: Option<bool>,
    pub last_updated: Option<NaiveDateTime>,
    pub enrolled_after: Option<NaiveDateTime>,
    pub enrolled_before: Option<NaiveDateTime>,
    pub enrollments: BTreeSet<String>,
    pub include_deleted: bool,
    pub order: Vec<Order>,
    pub enrollment_params: EnrollmentParams,
}

impl EnrollmentOperationParams {
    pub fn for_enrollments<I, S>(uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enrollments: uids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Resolved, validated query handed to the enrollment store.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentQueryParams {
    pub enrollments: BTreeSet<String>,
    pub program: Option<Program>,
    pub tracked_entity_type: Option<TrackedEntityType>,
    pub tracked_entity: Option<String>,
    /// Explicit units for SELECTED/CHILDREN/DESCENDANTS, scope roots for
    /// ACCESSIBLE/CAPTURE, empty for ALL.
    pub org_units: Vec<OrganisationUnit>,
    pub org_unit_mode: OrgUnitSelectionMode,
    pub enrollment_status: Option<EnrollmentStatus>,
    pub follow_up: Option<bool>,
    pub last_updated: Option<NaiveDateTime>,
    pub enrolled_after: Option<NaiveDateTime>,
    pub enrolled_before: Option<NaiveDateTime>,
    pub include_deleted: bool,
    pub order: Vec<(EnrollmentOrderField, SortDirection)>,
}

impl Default for EnrollmentQueryParams {
    fn default() -> Self {
        Self {
            enrollments: BTreeSet::new(),
            program: None,
            tracked_entity_type: None,
            tracked_entity: None,
            org_units: Vec::new(),
            org_unit_mode: OrgUnitSelectionMode::All,
            enrollment_status: None,
            follow_up: None,
            last_updated: None,
            enrolled_after: None,
            enrolled_before: None,
            include_deleted: false,
            order: Vec::new(),
        }
    }
}

/// Event lookup scoped to a set of enrollments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQueryParams {
    pub enrollments: BTreeSet<String>,
    pub include_deleted: bool,
    pub event_params: EventParams,
}

/// Relationship export request: exactly one of the three targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipOperationParams {
    pub tracked_entity: Option<String>,
    pub enrollment: Option<String>,
    pub event: Option<String>,
    pub include_deleted: bool,
}
