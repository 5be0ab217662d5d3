//! SurrealDB store and history implementations.

mod group;
mod history;
mod permission;
mod user;

pub use group::SurrealGroupStore;
pub use history::SurrealHistoryStore;
pub use permission::SurrealPermissionStore;
pub use user::SurrealUserStore;
