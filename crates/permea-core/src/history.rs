//! History recorder trait definition.
//!
//! The history log is strictly append-only: entries are created once
//! per mutation and never updated or deleted. Ordering is newest-first
//! by timestamp, ties broken by insertion order.

use crate::error::PermResult;
use crate::models::history::{ChangeType, EntitySnapshot, EntityType, HistoryEntry};

pub trait HistoryStore: Send + Sync {
    /// Append one entry, assigning its id and UTC timestamp.
    fn record(
        &self,
        change_type: ChangeType,
        entity_type: EntityType,
        entity_id: &str,
        snapshot: EntitySnapshot,
        principal: Option<&str>,
        reason: Option<&str>,
    ) -> impl Future<Output = PermResult<HistoryEntry>> + Send;

    /// Global history, newest-first. `skip = None` means 0; `count =
    /// None` means unbounded.
    fn get_history(
        &self,
        skip: Option<usize>,
        count: Option<usize>,
    ) -> impl Future<Output = PermResult<Vec<HistoryEntry>>> + Send;

    /// History for one entity, newest-first, unpaginated.
    fn get_entity_history(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> impl Future<Output = PermResult<Vec<HistoryEntry>>> + Send;
}
