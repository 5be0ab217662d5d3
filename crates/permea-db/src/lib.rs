//! Permea Database — SurrealDB connection management, schema
//! migrations, and store/history implementations for the
//! `permea-core` traits.
//!
//! This crate provides:
//! - Connection management ([`DbConfig`], [`DbManager`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Store implementations ([`repository`])
//! - Bounded retry for transient failures ([`RetryPolicy`])

mod connection;
mod error;
pub mod repository;
mod retry;
mod schema;

use surrealdb::{Connection, Surreal};

use permea_core::service::PermissionsService;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use retry::RetryPolicy;
pub use schema::run_migrations;

use repository::{SurrealGroupStore, SurrealHistoryStore, SurrealPermissionStore, SurrealUserStore};

/// The repository facade wired to the SurrealDB backend.
pub type SurrealService<C> = PermissionsService<
    SurrealPermissionStore<C>,
    SurrealGroupStore<C>,
    SurrealUserStore<C>,
    SurrealHistoryStore<C>,
>;

/// Build a facade over an already connected and migrated database.
pub fn new_service<C: Connection>(db: Surreal<C>, retry: RetryPolicy) -> SurrealService<C> {
    PermissionsService::new(
        SurrealPermissionStore::new(db.clone(), retry),
        SurrealGroupStore::new(db.clone(), retry),
        SurrealUserStore::new(db.clone(), retry),
        SurrealHistoryStore::new(db, retry),
    )
}
