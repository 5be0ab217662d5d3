//! Advisory dependency views used to render deletion-blocker reports.

use serde::{Deserialize, Serialize};

/// Entities that reference a permission. Both lists are alphabetically
/// sorted and never truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDependencies {
    pub permission: String,
    pub groups: Vec<String>,
    pub users: Vec<String>,
}

/// Users that are members of a group. Alphabetically sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDependencies {
    pub group: String,
    pub users: Vec<String>,
}
