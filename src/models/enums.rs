use serde::{Deserialize, Serialize};

/// Failed string -> enum conversion. Stored values surface it as
/// `DatabaseError::InvalidEnum`, inbound request values as `BadRequest`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for {field}: {value}")]
pub struct ParseEnumError {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ParseEnumError {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(EnrollmentStatus {
    Active => "ACTIVE",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

str_enum!(EventStatus {
    Active => "ACTIVE",
    Completed => "COMPLETED",
    Visited => "VISITED",
    Schedule => "SCHEDULE",
    Overdue => "OVERDUE",
    Skipped => "SKIPPED",
});

str_enum!(ProgramType {
    WithRegistration => "WITH_REGISTRATION",
    WithoutRegistration => "WITHOUT_REGISTRATION",
});

str_enum!(ProgramAccessLevel {
    Open => "OPEN",
    Audited => "AUDITED",
    Protected => "PROTECTED",
    Closed => "CLOSED",
});

str_enum!(OrgUnitSelectionMode {
    Selected => "SELECTED",
    Children => "CHILDREN",
    Descendants => "DESCENDANTS",
    Accessible => "ACCESSIBLE",
    Capture => "CAPTURE",
    All => "ALL",
});

impl OrgUnitSelectionMode {
    /// Modes that operate on an explicit list of org units.
    pub fn requires_org_units(&self) -> bool {
        matches!(self, Self::Selected | Self::Children | Self::Descendants)
    }
}

str_enum!(RelationshipEntity {
    TrackedEntity => "TRACKED_ENTITY_INSTANCE",
    Enrollment => "PROGRAM_INSTANCE",
    Event => "PROGRAM_STAGE_INSTANCE",
});

str_enum!(ImportStrategy {
    Create => "CREATE",
    Update => "UPDATE",
    CreateAndUpdate => "CREATE_AND_UPDATE",
    Delete => "DELETE",
});

impl ImportStrategy {
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create)
    }

    pub fn is_update(&self) -> bool {
        matches!(self, Self::Update)
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete)
    }

    pub fn is_update_or_delete(&self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }
}

str_enum!(TrackerType {
    TrackedEntity => "TRACKED_ENTITY",
    Enrollment => "ENROLLMENT",
    Event => "EVENT",
    Relationship => "RELATIONSHIP",
});

str_enum!(EndpointAction {
    Query => "QUERY",
    Aggregate => "AGGREGATE",
    Other => "OTHER",
});

str_enum!(EndpointItem {
    Event => "EVENT",
    Enrollment => "ENROLLMENT",
});

str_enum!(OutputType {
    Event => "EVENT",
    Enrollment => "ENROLLMENT",
});

str_enum!(DateRole {
    OccurredDate => "OCCURRED_DATE",
    EnrollmentDate => "ENROLLMENT_DATE",
    EventDate => "EVENT_DATE",
    ScheduledDate => "SCHEDULED_DATE",
    LastUpdated => "LAST_UPDATED",
});
