//! Permea in-process backend.
//!
//! Concurrent entity maps (DashMap, per-key locking) and an
//! insertion-ordered history log. Independent keys never block each
//! other; per-key read-modify-write is atomic via the map's entry API;
//! every read hands out an owned clone, so resolution always iterates
//! an immutable snapshot.

mod history;
mod store;

pub use history::MemoryHistoryStore;
pub use store::{MemoryGroupStore, MemoryPermissionStore, MemoryUserStore};

use permea_core::service::PermissionsService;

/// Facade wired to the in-process backend.
pub type MemoryService =
    PermissionsService<MemoryPermissionStore, MemoryGroupStore, MemoryUserStore, MemoryHistoryStore>;

/// Build a ready-to-use facade over fresh in-process stores.
pub fn new_service() -> MemoryService {
    PermissionsService::new(
        MemoryPermissionStore::new(),
        MemoryGroupStore::new(),
        MemoryUserStore::new(),
        MemoryHistoryStore::new(),
    )
}
