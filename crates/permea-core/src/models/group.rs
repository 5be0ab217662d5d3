//! Group domain model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::access::Access;

/// A named group carrying a map from permission name to access value.
///
/// Users reference groups by name; a group does not know its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub permissions: BTreeMap<String, Access>,
}

impl Group {
    /// A freshly created group has an empty permission map.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: BTreeMap::new(),
        }
    }
}
