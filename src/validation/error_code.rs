use serde::{Deserialize, Serialize};

/// Import validation error codes raised by the security and ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackerErrorCode {
    E1000,
    E1001,
    E1003,
    E1083,
    E1091,
    E1095,
    E1100,
    E1102,
    E1103,
}

impl TrackerErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E1000 => "E1000",
            Self::E1001 => "E1001",
            Self::E1003 => "E1003",
            Self::E1083 => "E1083",
            Self::E1091 => "E1091",
            Self::E1095 => "E1095",
            Self::E1100 => "E1100",
            Self::E1102 => "E1102",
            Self::E1103 => "E1103",
        }
    }

    /// Message template; `{0}`, `{1}`, … are replaced by the arguments.
    pub fn template(&self) -> &'static str {
        match self {
            Self::E1000 => "User: `{0}`, has no write access to OrganisationUnit: `{1}`.",
            Self::E1001 => "User: `{0}`, has no data write access to TrackedEntityType: `{1}`.",
            Self::E1003 => "OrganisationUnit: `{0}` is not in the search scope of User: `{1}`.",
            Self::E1083 => "User: `{0}`, is not authorized to modify completed events.",
            Self::E1091 => "User: `{0}`, has no data write access to Program: `{1}`.",
            Self::E1095 => "User: `{0}`, has no data write access to ProgramStage: `{1}`.",
            Self::E1100 => {
                "User: `{0}`, is lacking 'F_TEI_CASCADE_DELETE' authority to delete TrackedEntity: `{1}`."
            }
            Self::E1102 => {
                "User: `{0}`, does not have access to the tracked entity: `{1}`, Program: `{2}`, combination."
            }
            Self::E1103 => {
                "User: `{0}`, is lacking 'F_ENROLLMENT_CASCADE_DELETE' authority to delete Enrollment : `{1}`."
            }
        }
    }

    pub fn format(&self, args: &[&str]) -> String {
        args.iter()
            .enumerate()
            .fold(self.template().to_string(), |message, (i, arg)| {
                message.replace(&format!("{{{i}}}"), arg)
            })
    }
}

impl std::fmt::Display for TrackerErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
