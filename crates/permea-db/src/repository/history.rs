//! SurrealDB implementation of [`HistoryStore`].
//!
//! Rows live in the append-only `history` table; snapshots are stored
//! as JSON text so the tagged union round-trips unchanged.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use permea_core::error::{PermError, PermResult};
use permea_core::history::HistoryStore;
use permea_core::models::history::{ChangeType, EntitySnapshot, EntityType, HistoryEntry};

use crate::error::DbError;
use crate::retry::{self, RetryPolicy};

#[derive(Debug, SurrealValue)]
struct HistoryRow {
    entry_id: String,
    timestamp_utc: DateTime<Utc>,
    change_type: String,
    entity_type: String,
    entity_id: String,
    snapshot: String,
    principal: Option<String>,
    reason: Option<String>,
}

impl HistoryRow {
    fn try_into_entry(self) -> PermResult<HistoryEntry> {
        let id = Uuid::parse_str(&self.entry_id)
            .map_err(|e| DbError::Corrupt(format!("invalid history entry id: {e}")))?;
        let change_type = ChangeType::parse(&self.change_type).ok_or_else(|| {
            DbError::Corrupt(format!("invalid change type '{}'", self.change_type))
        })?;
        let entity_type = EntityType::parse(&self.entity_type).ok_or_else(|| {
            DbError::Corrupt(format!("invalid entity type '{}'", self.entity_type))
        })?;
        let snapshot: EntitySnapshot = serde_json::from_str(&self.snapshot)
            .map_err(|e| DbError::Corrupt(format!("invalid history snapshot: {e}")))?;

        Ok(HistoryEntry {
            id,
            timestamp_utc: self.timestamp_utc,
            change_type,
            entity_type,
            entity_id: self.entity_id,
            snapshot,
            principal: self.principal,
            reason: self.reason,
        })
    }
}

/// SurrealDB-backed history log.
#[derive(Clone)]
pub struct SurrealHistoryStore<C: Connection> {
    db: Surreal<C>,
    retry: RetryPolicy,
}

impl<C: Connection> SurrealHistoryStore<C> {
    pub fn new(db: Surreal<C>, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    async fn try_record(
        &self,
        entry_id: String,
        change_type: ChangeType,
        entity_type: EntityType,
        entity_id: &str,
        snapshot_json: String,
        principal: Option<&str>,
        reason: Option<&str>,
    ) -> PermResult<HistoryEntry> {
        // The timestamp comes from the database default so a retried
        // insert and its ordering agree with what was stored.
        let mut result = self
            .db
            .query(
                "CREATE history SET entry_id = $entry_id, \
                 change_type = $change_type, entity_type = $entity_type, \
                 entity_id = $entity_id, snapshot = $snapshot, \
                 principal = $principal, reason = $reason",
            )
            .bind(("entry_id", entry_id.clone()))
            .bind(("change_type", change_type.as_str()))
            .bind(("entity_type", entity_type.as_str()))
            .bind(("entity_id", entity_id.to_owned()))
            .bind(("snapshot", snapshot_json))
            .bind(("principal", principal.map(str::to_owned)))
            .bind(("reason", reason.map(str::to_owned)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        let rows: Vec<HistoryRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| {
                PermError::Internal(format!("create returned no history row for '{entry_id}'"))
            })?
            .try_into_entry()
    }

    async fn fetch_newest_first(&self, query: &str) -> PermResult<Vec<HistoryEntry>> {
        let mut result = self.db.query(query).await.map_err(DbError::from)?;
        let rows: Vec<HistoryRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter().map(HistoryRow::try_into_entry).collect()
    }
}

impl<C: Connection> HistoryStore for SurrealHistoryStore<C> {
    async fn record(
        &self,
        change_type: ChangeType,
        entity_type: EntityType,
        entity_id: &str,
        snapshot: EntitySnapshot,
        principal: Option<&str>,
        reason: Option<&str>,
    ) -> PermResult<HistoryEntry> {
        let snapshot_json = serde_json::to_string(&snapshot)
            .map_err(|e| PermError::Internal(format!("snapshot serialization failed: {e}")))?;
        // One id across retries so a replayed insert stays the same entry.
        let entry_id = Uuid::new_v4().to_string();

        retry::run(&self.retry, || {
            self.try_record(
                entry_id.clone(),
                change_type,
                entity_type,
                entity_id,
                snapshot_json.clone(),
                principal,
                reason,
            )
        })
        .await
    }

    async fn get_history(
        &self,
        skip: Option<usize>,
        count: Option<usize>,
    ) -> PermResult<Vec<HistoryEntry>> {
        let entries = retry::run(&self.retry, || {
            self.fetch_newest_first("SELECT * FROM history ORDER BY timestamp_utc DESC")
        })
        .await?;

        let skipped = entries.into_iter().skip(skip.unwrap_or(0));
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
        retry::run(&self.retry, || async {
            let mut result = self
                .db
                .query(
                    "SELECT * FROM history WHERE entity_type = $entity_type \
                     AND entity_id = $entity_id \
                     ORDER BY timestamp_utc DESC",
                )
                .bind(("entity_type", entity_type.as_str()))
                .bind(("entity_id", entity_id.to_owned()))
                .await
                .map_err(DbError::from)?;
            let rows: Vec<HistoryRow> = result.take(0).map_err(DbError::from)?;
            rows.into_iter().map(HistoryRow::try_into_entry).collect()
        })
        .await
    }
}
