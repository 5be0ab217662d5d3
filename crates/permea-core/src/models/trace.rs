//! Resolution trace (debug/explainability) model.

use serde::{Deserialize, Serialize};

use super::access::Access;

/// Precedence level a trace step was applied at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceLevel {
    Default,
    Group,
    User,
}

/// Action contributed by a single step. `None` marks a Default step for
/// a permission that is not flagged default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceAction {
    Allow,
    Deny,
    None,
}

impl From<Access> for TraceAction {
    fn from(access: Access) -> Self {
        match access {
            Access::Allow => TraceAction::Allow,
            Access::Deny => TraceAction::Deny,
        }
    }
}

/// One rule application in a resolution chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    pub level: TraceLevel,
    /// `"system"` for Default steps, the group name for Group steps,
    /// the user's email for User steps.
    pub source: String,
    pub action: TraceAction,
}

/// Full resolution chain for one permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceItem {
    pub permission: String,
    /// Value after the last applied step.
    pub final_result: Access,
    pub chain: Vec<TraceStep>,
}

/// Debug view of a full resolution run for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTrace {
    pub email: String,
    /// One item per permission, sorted alphabetically by name.
    pub permissions: Vec<TraceItem>,
}
