//! The two-valued access domain.

use serde::{Deserialize, Serialize};

/// Access value attached to a permission at group or user level.
///
/// Serialized as `"ALLOW"` / `"DENY"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Access {
    Allow,
    Deny,
}

impl Access {
    pub fn is_allow(self) -> bool {
        matches!(self, Access::Allow)
    }

    /// Render a resolved boolean back into the wire vocabulary.
    pub fn from_bool(allowed: bool) -> Self {
        if allowed { Access::Allow } else { Access::Deny }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Access::Allow => "ALLOW",
            Access::Deny => "DENY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ALLOW" => Some(Access::Allow),
            "DENY" => Some(Access::Deny),
            _ => None,
        }
    }
}
