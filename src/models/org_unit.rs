use serde::{Deserialize, Serialize};

/// Organisation unit positioned in the hierarchy by its materialized
/// `path` (`/root/child/…/self`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganisationUnit {
    pub id: i64,
    pub uid: String,
    pub code: Option<String>,
    pub name: String,
    pub path: String,
    pub hierarchy_level: i32,
}

impl OrganisationUnit {
    /// Build a unit under `parent` (or as a root), deriving path and level.
    pub fn new(id: i64, uid: &str, name: &str, parent: Option<&OrganisationUnit>) -> Self {
        let path = match parent {
            Some(p) => format!("{}/{uid}", p.path),
            None => format!("/{uid}"),
        };
        let hierarchy_level = parent.map_or(1, |p| p.hierarchy_level + 1);
        Self {
            id,
            uid: uid.to_string(),
            code: None,
            name: name.to_string(),
            path,
            hierarchy_level,
        }
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    /// UIDs along the path, root first, including this unit.
    pub fn path_uids(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// True when `ancestor` is this unit or any unit above it.
    pub fn is_descendant_of(&self, ancestor: &OrganisationUnit) -> bool {
        self.path_uids().any(|uid| uid == ancestor.uid)
    }

    /// True when this unit sits directly below `parent`.
    pub fn is_child_of(&self, parent: &OrganisationUnit) -> bool {
        let uids: Vec<&str> = self.path_uids().collect();
        uids.len() >= 2 && uids[uids.len() - 2] == parent.uid
    }
}
