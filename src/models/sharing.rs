//! Object-level sharing (ACL) attached to metadata and tracker objects.
//!
//! Access strings follow the 8-character layout `MMDD----`:
//! chars 1-2 are metadata read/write, chars 3-4 are data read/write.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::user::User;

/// No access at all.
pub const ACCESS_DEFAULT: &str = "--------";
/// Metadata read/write, no data access.
pub const ACCESS_METADATA_READ_WRITE: &str = "rw------";
/// Data read only.
pub const ACCESS_DATA_READ: &str = "--r-----";
/// Data read and write.
pub const ACCESS_DATA_READ_WRITE: &str = "--rw----";
/// Metadata and data read/write.
pub const ACCESS_FULL: &str = "rwrw----";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEntry {
    pub access: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sharing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// `None` means the object carries no public restriction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<String>,
    #[serde(default)]
    pub users: BTreeMap<String, AccessEntry>,
    #[serde(default)]
    pub user_groups: BTreeMap<String, AccessEntry>,
}

impl Sharing {
    pub fn with_public(access: &str) -> Self {
        Self {
            public: Some(access.to_string()),
            ..Self::default()
        }
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn add_user_access(mut self, user_uid: &str, access: &str) -> Self {
        self.users.insert(
            user_uid.to_string(),
            AccessEntry {
                access: access.to_string(),
            },
        );
        self
    }

    pub fn add_user_group_access(mut self, group_uid: &str, access: &str) -> Self {
        self.user_groups.insert(
            group_uid.to_string(),
            AccessEntry {
                access: access.to_string(),
            },
        );
        self
    }

    pub fn can_data_read(&self, user: &User) -> bool {
        self.grants(user, can_read_data)
    }

    pub fn can_data_write(&self, user: &User) -> bool {
        self.grants(user, can_write_data)
    }

    fn grants(&self, user: &User, check: fn(&str) -> bool) -> bool {
        if user.is_super() {
            return true;
        }
        if self.public.as_deref().map_or(true, check) {
            return true;
        }
        if self
            .users
            .get(&user.uid)
            .is_some_and(|entry| check(&entry.access))
        {
            return true;
        }
        user.groups.iter().any(|group| {
            self.user_groups
                .get(group)
                .is_some_and(|entry| check(&entry.access))
        })
    }
}

/// Data read flag (third char), the `__r%` pattern of the SQL resolvers.
pub fn can_read_data(access: &str) -> bool {
    access.as_bytes().get(2) == Some(&b'r')
}

/// Data write flag (fourth char).
pub fn can_write_data(access: &str) -> bool {
    access.as_bytes().get(3) == Some(&b'w')
}
