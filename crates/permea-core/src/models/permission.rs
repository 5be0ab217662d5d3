//! Permission domain model.

use serde::{Deserialize, Serialize};

/// A named permission.
///
/// `name` is the unique, immutable identifier. Permissions flagged
/// `is_default` are granted to every user unless a group or user rule
/// overrides them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub name: String,
    pub description: String,
    pub is_default: bool,
}
