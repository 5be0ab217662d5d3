//! Database-specific error types and conversions.

use permea_core::error::PermError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// A stored row could not be mapped back into a domain value.
    #[error("Malformed row: {0}")]
    Corrupt(String),
}

impl DbError {
    /// Connectivity and contention failures worth retrying. Everything
    /// else (constraint violations, malformed queries) fails fast.
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Surreal(err) => {
                let msg = err.to_string().to_lowercase();
                msg.contains("connection")
                    || msg.contains("timed out")
                    || msg.contains("timeout")
                    || msg.contains("websocket")
                    || msg.contains("unavailable")
            }
            _ => false,
        }
    }
}

/// Unique index violations surface as plain query errors; the message
/// is the only discriminator SurrealDB gives us.
pub(crate) fn is_unique_violation(err: &surrealdb::Error) -> bool {
    err.to_string().contains("already contains")
}

/// Sentinel thrown by guarded transactions when the target row is gone.
/// The THROW rolls the whole transaction back; callers map the error to
/// the NotFound `None`.
pub(crate) const MISSING_TARGET: &str = "missing_target_row";

pub(crate) fn is_missing_target(err: &surrealdb::Error) -> bool {
    err.to_string().contains(MISSING_TARGET)
}

/// Check a guarded-transaction response for the missing-target sentinel.
///
/// When a THROW aborts a transaction, SurrealDB reports the generic
/// "not executed due to a failed transaction" error on the sibling
/// statements, and `Response::check` surfaces whichever failed statement
/// comes first — so the sentinel must be looked for across every
/// statement error. Returns `Ok(true)` when the transaction succeeded,
/// `Ok(false)` when it was rolled back by the sentinel THROW, and the
/// first real error otherwise.
pub(crate) fn check_guarded(
    mut response: surrealdb::IndexedResults,
) -> Result<bool, surrealdb::Error> {
    let mut errors = response.take_errors();
    if errors.values().any(is_missing_target) {
        return Ok(false);
    }
    if let Some(key) = errors.keys().min().copied() {
        return Err(errors.remove(&key).expect("key taken from the same map"));
    }
    Ok(true)
}

impl From<DbError> for PermError {
    fn from(err: DbError) -> Self {
        if err.is_transient() {
            return PermError::Transient(err.to_string());
        }
        match err {
            DbError::Corrupt(msg) => PermError::Internal(msg),
            other => PermError::Storage(other.to_string()),
        }
    }
}
