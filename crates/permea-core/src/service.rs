//! Repository facade — the single entry point composing the entity
//! stores, history recorder, integrity checker and resolution engine.
//!
//! Every mutating operation performs the store change first and, on
//! success, synchronously records exactly one history entry carrying
//! the snapshot the store returned. History recording is best-effort
//! relative to the primary mutation: a recording failure is logged and
//! never rolls back or fails the mutation it documents.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::error::{PermError, PermResult};
use crate::history::HistoryStore;
use crate::integrity;
use crate::integrity::IntegrityCheckResult;
use crate::models::access::Access;
use crate::models::dependency::{GroupDependencies, PermissionDependencies};
use crate::models::group::Group;
use crate::models::history::{Audit, ChangeType, EntitySnapshot, EntityType, HistoryEntry};
use crate::models::permission::Permission;
use crate::models::trace::PermissionTrace;
use crate::models::user::User;
use crate::resolve;
use crate::store::{GroupStore, PermissionStore, UserStore};

/// The repository facade.
///
/// Generic over the store and history implementations so the same
/// facade drives both the in-process and the durable backend.
#[derive(Clone)]
pub struct PermissionsService<P, G, U, H> {
    permissions: P,
    groups: G,
    users: U,
    history: H,
}

impl<P, G, U, H> PermissionsService<P, G, U, H>
where
    P: PermissionStore,
    G: GroupStore,
    U: UserStore,
    H: HistoryStore,
{
    pub fn new(permissions: P, groups: G, users: U, history: H) -> Self {
        Self {
            permissions,
            groups,
            users,
            history,
        }
    }

    /// Record one history entry; failures are logged, never propagated.
    async fn record(
        &self,
        change_type: ChangeType,
        entity_type: EntityType,
        entity_id: &str,
        snapshot: EntitySnapshot,
        audit: &Audit,
    ) {
        let outcome = self
            .history
            .record(
                change_type,
                entity_type,
                entity_id,
                snapshot,
                audit.principal.as_deref(),
                audit.reason.as_deref(),
            )
            .await;
        if let Err(err) = outcome {
            warn!(
                %err,
                change_type = change_type.as_str(),
                entity_type = entity_type.as_str(),
                entity_id,
                "History recording failed; the mutation it documents stands"
            );
        }
    }

    /// Reject references to permissions that do not exist at write time.
    async fn ensure_permission_exists(&self, name: &str) -> PermResult<()> {
        match self.permissions.get(name).await? {
            Some(_) => Ok(()),
            None => Err(PermError::UnknownPermission { name: name.into() }),
        }
    }

    // -------------------------------------------------------------------
    // Permissions
    // -------------------------------------------------------------------

    pub async fn create_permission(
        &self,
        name: &str,
        description: &str,
        is_default: bool,
        audit: &Audit,
    ) -> PermResult<Permission> {
        let permission = self.permissions.create(name, description, is_default).await?;
        self.record(
            ChangeType::Create,
            EntityType::Permission,
            name,
            EntitySnapshot::Permission(permission.clone()),
            audit,
        )
        .await;
        info!(name, is_default, "Created permission");
        Ok(permission)
    }

    pub async fn get_permission(&self, name: &str) -> PermResult<Option<Permission>> {
        self.permissions.get(name).await
    }

    pub async fn list_permissions(&self) -> PermResult<Vec<Permission>> {
        self.permissions.list().await
    }

    /// Returns `false` when the permission does not exist.
    pub async fn update_permission(
        &self,
        name: &str,
        description: &str,
        audit: &Audit,
    ) -> PermResult<bool> {
        match self.permissions.update_description(name, description).await? {
            Some(permission) => {
                self.record(
                    ChangeType::Update,
                    EntityType::Permission,
                    name,
                    EntitySnapshot::Permission(permission),
                    audit,
                )
                .await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Flip the default flag. Returns `false` when the permission does
    /// not exist.
    pub async fn set_permission_default(
        &self,
        name: &str,
        is_default: bool,
        audit: &Audit,
    ) -> PermResult<bool> {
        match self.permissions.set_default(name, is_default).await? {
            Some(permission) => {
                self.record(
                    ChangeType::Update,
                    EntityType::Permission,
                    name,
                    EntitySnapshot::Permission(permission),
                    audit,
                )
                .await;
                info!(name, is_default, "Updated permission default flag");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete a permission. The caller is expected to consult
    /// [`can_delete_permission`](Self::can_delete_permission) first;
    /// this operation itself only removes the entity.
    pub async fn delete_permission(&self, name: &str, audit: &Audit) -> PermResult<bool> {
        match self.permissions.delete(name).await? {
            Some(permission) => {
                self.record(
                    ChangeType::Delete,
                    EntityType::Permission,
                    name,
                    EntitySnapshot::Permission(permission),
                    audit,
                )
                .await;
                info!(name, "Deleted permission");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // -------------------------------------------------------------------
    // Groups
    // -------------------------------------------------------------------

    pub async fn create_group(&self, name: &str, audit: &Audit) -> PermResult<Group> {
        let group = self.groups.create(name).await?;
        self.record(
            ChangeType::Create,
            EntityType::Group,
            name,
            EntitySnapshot::Group(group.clone()),
            audit,
        )
        .await;
        info!(name, "Created group");
        Ok(group)
    }

    pub async fn get_group(&self, name: &str) -> PermResult<Option<Group>> {
        self.groups.get(name).await
    }

    pub async fn list_groups(&self) -> PermResult<Vec<Group>> {
        self.groups.list().await
    }

    /// Set one permission entry on a group. Returns `false` when the
    /// group does not exist.
    pub async fn set_group_permission(
        &self,
        name: &str,
        permission: &str,
        access: Access,
        audit: &Audit,
    ) -> PermResult<bool> {
        self.ensure_permission_exists(permission).await?;
        let updated = self
            .groups
            .set_permission(name, permission, access, audit.principal.as_deref())
            .await?;
        match updated {
            Some(group) => {
                self.record(
                    ChangeType::Update,
                    EntityType::Group,
                    name,
                    EntitySnapshot::Group(group),
                    audit,
                )
                .await;
                info!(name, permission, access = access.as_str(), "Set group permission");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Atomically replace a group's whole permission map.
    pub async fn replace_group_permissions(
        &self,
        name: &str,
        permissions: &BTreeMap<String, Access>,
        audit: &Audit,
    ) -> PermResult<bool> {
        for permission in permissions.keys() {
            self.ensure_permission_exists(permission).await?;
        }
        let updated = self
            .groups
            .replace_permissions(name, permissions, audit.principal.as_deref())
            .await?;
        match updated {
            Some(group) => {
                self.record(
                    ChangeType::Update,
                    EntityType::Group,
                    name,
                    EntitySnapshot::Group(group),
                    audit,
                )
                .await;
                info!(name, count = permissions.len(), "Replaced group permissions");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn remove_group_permission(
        &self,
        name: &str,
        permission: &str,
        audit: &Audit,
    ) -> PermResult<bool> {
        match self.groups.remove_permission(name, permission).await? {
            Some(group) => {
                self.record(
                    ChangeType::Update,
                    EntityType::Group,
                    name,
                    EntitySnapshot::Group(group),
                    audit,
                )
                .await;
                info!(name, permission, "Removed group permission");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete a group. The caller is expected to consult
    /// [`can_delete_group`](Self::can_delete_group) first.
    pub async fn delete_group(&self, name: &str, audit: &Audit) -> PermResult<bool> {
        match self.groups.delete(name).await? {
            Some(group) => {
                self.record(
                    ChangeType::Delete,
                    EntityType::Group,
                    name,
                    EntitySnapshot::Group(group),
                    audit,
                )
                .await;
                info!(name, "Deleted group");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // -------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------

    /// Create a user with its initial membership list. Group references
    /// are not validated here: a reference to a group that never
    /// existed, or is deleted later, is silently skipped at resolution.
    pub async fn create_user(
        &self,
        email: &str,
        groups: &[String],
        audit: &Audit,
    ) -> PermResult<User> {
        let user = self
            .users
            .create(email, groups, audit.principal.as_deref())
            .await?;
        self.record(
            ChangeType::Create,
            EntityType::User,
            email,
            EntitySnapshot::User(user.clone()),
            audit,
        )
        .await;
        info!(email, groups = groups.len(), "Created user");
        Ok(user)
    }

    pub async fn get_user(&self, email: &str) -> PermResult<Option<User>> {
        self.users.get(email).await
    }

    pub async fn list_users(&self) -> PermResult<Vec<User>> {
        self.users.list().await
    }

    pub async fn set_user_permission(
        &self,
        email: &str,
        permission: &str,
        access: Access,
        audit: &Audit,
    ) -> PermResult<bool> {
        self.ensure_permission_exists(permission).await?;
        let updated = self
            .users
            .set_permission(email, permission, access, audit.principal.as_deref())
            .await?;
        match updated {
            Some(user) => {
                self.record(
                    ChangeType::Update,
                    EntityType::User,
                    email,
                    EntitySnapshot::User(user),
                    audit,
                )
                .await;
                info!(email, permission, access = access.as_str(), "Set user permission");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn replace_user_permissions(
        &self,
        email: &str,
        permissions: &BTreeMap<String, Access>,
        audit: &Audit,
    ) -> PermResult<bool> {
        for permission in permissions.keys() {
            self.ensure_permission_exists(permission).await?;
        }
        let updated = self
            .users
            .replace_permissions(email, permissions, audit.principal.as_deref())
            .await?;
        match updated {
            Some(user) => {
                self.record(
                    ChangeType::Update,
                    EntityType::User,
                    email,
                    EntitySnapshot::User(user),
                    audit,
                )
                .await;
                info!(email, count = permissions.len(), "Replaced user permissions");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn remove_user_permission(
        &self,
        email: &str,
        permission: &str,
        audit: &Audit,
    ) -> PermResult<bool> {
        match self.users.remove_permission(email, permission).await? {
            Some(user) => {
                self.record(
                    ChangeType::Update,
                    EntityType::User,
                    email,
                    EntitySnapshot::User(user),
                    audit,
                )
                .await;
                info!(email, permission, "Removed user permission");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete a user. Unconditional: nothing references users.
    pub async fn delete_user(&self, email: &str, audit: &Audit) -> PermResult<bool> {
        match self.users.delete(email).await? {
            Some(user) => {
                self.record(
                    ChangeType::Delete,
                    EntityType::User,
                    email,
                    EntitySnapshot::User(user),
                    audit,
                )
                .await;
                info!(email, "Deleted user");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // -------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------

    /// Resolve the groups a user references, dropping references to
    /// groups that no longer exist.
    async fn resolved_groups(&self, user: &User) -> PermResult<Vec<Group>> {
        let mut groups = Vec::with_capacity(user.groups.len());
        for name in &user.groups {
            match self.groups.get(name).await? {
                Some(group) => groups.push(group),
                None => {
                    debug!(email = %user.email, group = %name, "Skipping unresolved group reference");
                }
            }
        }
        Ok(groups)
    }

    /// Effective permission map for a user, or `None` if the user does
    /// not exist (the sole not-found signal).
    pub async fn calculate_permissions(
        &self,
        email: &str,
    ) -> PermResult<Option<BTreeMap<String, bool>>> {
        let Some(user) = self.users.get(email).await? else {
            return Ok(None);
        };
        let groups = self.resolved_groups(&user).await?;
        let permissions = self.permissions.list().await?;
        let result = resolve::resolve(&user, &groups, &permissions);
        debug!(email, count = result.len(), "Calculated permissions");
        Ok(Some(result))
    }

    /// Step-by-step resolution trace, or `None` if the user does not
    /// exist.
    pub async fn calculate_permissions_debug(
        &self,
        email: &str,
    ) -> PermResult<Option<PermissionTrace>> {
        let Some(user) = self.users.get(email).await? else {
            return Ok(None);
        };
        let groups = self.resolved_groups(&user).await?;
        let permissions = self.permissions.list().await?;
        let items = resolve::resolve_trace(&user, &groups, &permissions);
        Ok(Some(PermissionTrace {
            email: email.to_owned(),
            permissions: items,
        }))
    }

    // -------------------------------------------------------------------
    // History
    // -------------------------------------------------------------------

    pub async fn get_history(
        &self,
        skip: Option<usize>,
        count: Option<usize>,
    ) -> PermResult<Vec<HistoryEntry>> {
        self.history.get_history(skip, count).await
    }

    pub async fn get_entity_history(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> PermResult<Vec<HistoryEntry>> {
        self.history.get_entity_history(entity_type, entity_id).await
    }

    // -------------------------------------------------------------------
    // Integrity
    // -------------------------------------------------------------------

    pub async fn can_delete_permission(&self, name: &str) -> PermResult<IntegrityCheckResult> {
        integrity::can_delete_permission(&self.groups, &self.users, name).await
    }

    pub async fn can_delete_group(&self, name: &str) -> PermResult<IntegrityCheckResult> {
        integrity::can_delete_group(&self.users, name).await
    }

    pub async fn permission_dependencies(&self, name: &str) -> PermResult<PermissionDependencies> {
        integrity::permission_dependencies(&self.groups, &self.users, name).await
    }

    pub async fn group_dependencies(&self, name: &str) -> PermResult<GroupDependencies> {
        integrity::group_dependencies(&self.users, name).await
    }
}
