//! Error types for the Permea system.
//!
//! "Not found" is deliberately absent from this enum: operations whose
//! target may not exist return `Option`/`bool` values instead, so the
//! calling layer can map them deterministically (e.g. to a 404).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PermError {
    /// A create collided with an existing identifier.
    #[error("Entity already exists: {entity} '{id}'")]
    Conflict { entity: String, id: String },

    /// A group or user permission entry referenced a permission name
    /// that does not exist.
    #[error("Unknown permission: '{name}'")]
    UnknownPermission { name: String },

    /// Backend connectivity or contention failure that persisted after
    /// the bounded retry policy was exhausted.
    #[error("Transient storage failure: {0}")]
    Transient(String),

    /// Non-transient backend failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unexpected internal failure, carrying the original cause.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type PermResult<T> = Result<T, PermError>;
