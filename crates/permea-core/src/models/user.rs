//! User domain model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::access::Access;

/// A user, identified by email.
///
/// `groups` is a membership list (references by group name, fixed at
/// creation); `permissions` holds the user's own overrides, which take
/// precedence over both defaults and group rules during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub permissions: BTreeMap<String, Access>,
}

impl User {
    pub fn new(email: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            email: email.into(),
            groups,
            permissions: BTreeMap::new(),
        }
    }
}
