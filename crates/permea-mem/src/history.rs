//! Insertion-ordered in-process history log.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use uuid::Uuid;

use permea_core::error::{PermError, PermResult};
use permea_core::history::HistoryStore;
use permea_core::models::history::{ChangeType, EntitySnapshot, EntityType, HistoryEntry};

/// Append-only history backed by a Vec in insertion order.
///
/// Queries stable-sort newest-first by timestamp, so entries with equal
/// timestamps keep their insertion order.
#[derive(Clone, Default)]
pub struct MemoryHistoryStore {
    entries: Arc<RwLock<Vec<HistoryEntry>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(&self) -> PermResult<Vec<HistoryEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| PermError::Internal("history lock poisoned".into()))?;
        let mut snapshot = entries.clone();
        snapshot.sort_by(|a, b| b.timestamp_utc.cmp(&a.timestamp_utc));
        Ok(snapshot)
    }
}

impl HistoryStore for MemoryHistoryStore {
    async fn record(
        &self,
        change_type: ChangeType,
        entity_type: EntityType,
        entity_id: &str,
        snapshot: EntitySnapshot,
        principal: Option<&str>,
        reason: Option<&str>,
    ) -> PermResult<HistoryEntry> {
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            timestamp_utc: Utc::now(),
            change_type,
            entity_type,
            entity_id: entity_id.to_owned(),
            snapshot,
            principal: principal.map(str::to_owned),
            reason: reason.map(str::to_owned),
        };
        self.entries
            .write()
            .map_err(|_| PermError::Internal("history lock poisoned".into()))?
            .push(entry.clone());
        Ok(entry)
    }

    async fn get_history(
        &self,
        skip: Option<usize>,
        count: Option<usize>,
    ) -> PermResult<Vec<HistoryEntry>> {
        let snapshot = self.newest_first()?;
        let skipped = snapshot.into_iter().skip(skip.unwrap_or(0));
        Ok(match count {
            Some(count) => skipped.take(count).collect(),
            None => skipped.collect(),
        })
    }

    async fn get_entity_history(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> PermResult<Vec<HistoryEntry>> {
        Ok(self
            .newest_first()?
            .into_iter()
            .filter(|entry| entry.entity_type == entity_type && entry.entity_id == entity_id)
            .collect())
    }
}
