//! Audit history domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::group::Group;
use super::permission::Permission;
use super::user::User;

/// Kind of mutation recorded in a history entry.
///
/// Serialized as `"CREATE"` / `"UPDATE"` / `"DELETE"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Create => "CREATE",
            ChangeType::Update => "UPDATE",
            ChangeType::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE" => Some(ChangeType::Create),
            "UPDATE" => Some(ChangeType::Update),
            "DELETE" => Some(ChangeType::Delete),
            _ => None,
        }
    }
}

/// Which entity type a history entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    Permission,
    Group,
    User,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Permission => "Permission",
            EntityType::Group => "Group",
            EntityType::User => "User",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Permission" => Some(EntityType::Permission),
            "Group" => Some(EntityType::Group),
            "User" => Some(EntityType::User),
            _ => None,
        }
    }
}

/// Entity state captured after a mutation (or before, for deletions).
///
/// Tagged union with an explicit `type` discriminator so that history
/// rows round-trip through JSON without ambiguity. `Empty` is the
/// tombstone marker used when no snapshot could be captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntitySnapshot {
    Permission(Permission),
    Group(Group),
    User(User),
    Empty,
}

/// One immutable audit record. Created once per mutation through the
/// repository facade; never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp_utc: DateTime<Utc>,
    pub change_type: ChangeType,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub snapshot: EntitySnapshot,
    pub principal: Option<String>,
    pub reason: Option<String>,
}

/// Caller-supplied audit metadata attached to mutating operations.
///
/// Both fields are opaque to the core: `principal` identifies who made
/// the change, `reason` is free text.
#[derive(Debug, Clone, Default)]
pub struct Audit {
    pub principal: Option<String>,
    pub reason: Option<String>,
}

impl Audit {
    pub fn by(principal: impl Into<String>) -> Self {
        Self {
            principal: Some(principal.into()),
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_with_type_discriminator() {
        let snap = EntitySnapshot::Permission(Permission {
            name: "read".into(),
            description: "read access".into(),
            is_default: true,
        });
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["type"], "Permission");
        assert_eq!(json["name"], "read");

        let empty = serde_json::to_value(EntitySnapshot::Empty).unwrap();
        assert_eq!(empty["type"], "Empty");
    }

    #[test]
    fn change_type_round_trips_through_strings() {
        for ct in [ChangeType::Create, ChangeType::Update, ChangeType::Delete] {
            assert_eq!(ChangeType::parse(ct.as_str()), Some(ct));
        }
        assert_eq!(ChangeType::parse("RENAME"), None);
    }
}
