//! Entity store trait definitions.
//!
//! All operations are async. Lookups are keyed by the entity's unique
//! identifier (permission name, group name, user email). Operations
//! whose target may not exist return `Option` — `None` is the NotFound
//! signal, never an error — while duplicate creates fail with
//! [`PermError::Conflict`](crate::error::PermError::Conflict).
//!
//! Mutating operations return the post-change entity snapshot (or, for
//! `delete`, the pre-delete snapshot) so the facade can record one
//! history entry without a second read racing the mutation.
//!
//! Cancellation is cooperative: callers abandon an operation by
//! dropping its future. Durable implementations only observe this
//! between transactional steps, never inside one.

use std::collections::BTreeMap;

use crate::error::PermResult;
use crate::models::access::Access;
use crate::models::group::Group;
use crate::models::permission::Permission;
use crate::models::user::User;

pub trait PermissionStore: Send + Sync {
    /// Create a permission. Fails with `Conflict` if the name is taken.
    fn create(
        &self,
        name: &str,
        description: &str,
        is_default: bool,
    ) -> impl Future<Output = PermResult<Permission>> + Send;

    fn get(&self, name: &str) -> impl Future<Output = PermResult<Option<Permission>>> + Send;

    fn list(&self) -> impl Future<Output = PermResult<Vec<Permission>>> + Send;

    /// Replace the description. `None` if the permission does not exist.
    fn update_description(
        &self,
        name: &str,
        description: &str,
    ) -> impl Future<Output = PermResult<Option<Permission>>> + Send;

    /// Flip the default flag. `None` if the permission does not exist.
    fn set_default(
        &self,
        name: &str,
        is_default: bool,
    ) -> impl Future<Output = PermResult<Option<Permission>>> + Send;

    /// Delete by name, returning the pre-delete snapshot, or `None` if
    /// nothing was removed.
    fn delete(&self, name: &str) -> impl Future<Output = PermResult<Option<Permission>>> + Send;
}

pub trait GroupStore: Send + Sync {
    /// Create a group with an empty permission map. Fails with
    /// `Conflict` if the name is taken.
    fn create(&self, name: &str) -> impl Future<Output = PermResult<Group>> + Send;

    fn get(&self, name: &str) -> impl Future<Output = PermResult<Option<Group>>> + Send;

    fn list(&self) -> impl Future<Output = PermResult<Vec<Group>>> + Send;

    /// Insert or overwrite one permission entry. `None` if the group
    /// does not exist.
    fn set_permission(
        &self,
        name: &str,
        permission: &str,
        access: Access,
        assigned_by: Option<&str>,
    ) -> impl Future<Output = PermResult<Option<Group>>> + Send;

    /// Atomically clear and repopulate the whole permission map. A
    /// concurrent read observes either the fully-old or fully-new map.
    fn replace_permissions(
        &self,
        name: &str,
        permissions: &BTreeMap<String, Access>,
        assigned_by: Option<&str>,
    ) -> impl Future<Output = PermResult<Option<Group>>> + Send;

    /// Remove one permission entry. `None` if the group does not exist.
    fn remove_permission(
        &self,
        name: &str,
        permission: &str,
    ) -> impl Future<Output = PermResult<Option<Group>>> + Send;

    /// Delete by name, returning the pre-delete snapshot.
    fn delete(&self, name: &str) -> impl Future<Output = PermResult<Option<Group>>> + Send;
}

pub trait UserStore: Send + Sync {
    /// Create a user with its initial group membership list. Fails with
    /// `Conflict` if the email is taken. Membership is fixed at
    /// creation; there is no add/remove-group operation.
    fn create(
        &self,
        email: &str,
        groups: &[String],
        assigned_by: Option<&str>,
    ) -> impl Future<Output = PermResult<User>> + Send;

    fn get(&self, email: &str) -> impl Future<Output = PermResult<Option<User>>> + Send;

    fn list(&self) -> impl Future<Output = PermResult<Vec<User>>> + Send;

    fn set_permission(
        &self,
        email: &str,
        permission: &str,
        access: Access,
        assigned_by: Option<&str>,
    ) -> impl Future<Output = PermResult<Option<User>>> + Send;

    fn replace_permissions(
        &self,
        email: &str,
        permissions: &BTreeMap<String, Access>,
        assigned_by: Option<&str>,
    ) -> impl Future<Output = PermResult<Option<User>>> + Send;

    fn remove_permission(
        &self,
        email: &str,
        permission: &str,
    ) -> impl Future<Output = PermResult<Option<User>>> + Send;

    /// Delete unconditionally (no referential constraint points at a
    /// user), returning the pre-delete snapshot.
    fn delete(&self, email: &str) -> impl Future<Output = PermResult<Option<User>>> + Send;
}
