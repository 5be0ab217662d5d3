//! Referential-integrity checks over the entity store.
//!
//! Read-only analysis answering "can this entity be deleted" and "what
//! depends on this entity". The pass/fail checks are authoritative for
//! the deletion guard; the dependency views are advisory, used by
//! callers to render reports.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PermResult;
use crate::models::dependency::{GroupDependencies, PermissionDependencies};
use crate::store::{GroupStore, UserStore};

/// Outcome of a deletion guard check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityCheckResult {
    pub is_valid: bool,
    pub reason: Option<String>,
}

impl IntegrityCheckResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// A permission can be deleted only when no group and no user maps it.
///
/// Group references take priority in the reported reason: if any group
/// uses the permission, only group names are listed, even when users
/// reference it too.
pub async fn can_delete_permission<G, U>(
    groups: &G,
    users: &U,
    permission: &str,
) -> PermResult<IntegrityCheckResult>
where
    G: GroupStore,
    U: UserStore,
{
    let mut referencing_groups: Vec<String> = groups
        .list()
        .await?
        .into_iter()
        .filter(|g| g.permissions.contains_key(permission))
        .map(|g| g.name)
        .collect();
    referencing_groups.sort();

    if !referencing_groups.is_empty() {
        return Ok(IntegrityCheckResult::invalid(format!(
            "Permission is used by groups: {}",
            referencing_groups.join(", ")
        )));
    }

    let mut referencing_users: Vec<String> = users
        .list()
        .await?
        .into_iter()
        .filter(|u| u.permissions.contains_key(permission))
        .map(|u| u.email)
        .collect();
    referencing_users.sort();

    if !referencing_users.is_empty() {
        return Ok(IntegrityCheckResult::invalid(format!(
            "Permission is used by users: {}",
            referencing_users.join(", ")
        )));
    }

    Ok(IntegrityCheckResult::valid())
}

/// A group can be deleted only when no user lists it as a membership.
pub async fn can_delete_group<U>(users: &U, group: &str) -> PermResult<IntegrityCheckResult>
where
    U: UserStore,
{
    let mut members: Vec<String> = users
        .list()
        .await?
        .into_iter()
        .filter(|u| u.groups.iter().any(|g| g == group))
        .map(|u| u.email)
        .collect();
    members.sort();

    if !members.is_empty() {
        return Ok(IntegrityCheckResult::invalid(format!(
            "Group is assigned to users: {}",
            members.join(", ")
        )));
    }

    Ok(IntegrityCheckResult::valid())
}

/// Advisory view of everything referencing a permission.
pub async fn permission_dependencies<G, U>(
    groups: &G,
    users: &U,
    permission: &str,
) -> PermResult<PermissionDependencies>
where
    G: GroupStore,
    U: UserStore,
{
    let mut referencing_groups: Vec<String> = groups
        .list()
        .await?
        .into_iter()
        .filter(|g| g.permissions.contains_key(permission))
        .map(|g| g.name)
        .collect();
    referencing_groups.sort();

    let mut referencing_users: Vec<String> = users
        .list()
        .await?
        .into_iter()
        .filter(|u| u.permissions.contains_key(permission))
        .map(|u| u.email)
        .collect();
    referencing_users.sort();

    debug!(
        permission,
        groups = referencing_groups.len(),
        users = referencing_users.len(),
        "Collected permission dependencies"
    );

    Ok(PermissionDependencies {
        permission: permission.to_owned(),
        groups: referencing_groups,
        users: referencing_users,
    })
}

/// Advisory view of every user that is a member of a group.
pub async fn group_dependencies<U>(users: &U, group: &str) -> PermResult<GroupDependencies>
where
    U: UserStore,
{
    let mut members: Vec<String> = users
        .list()
        .await?
        .into_iter()
        .filter(|u| u.groups.iter().any(|g| g == group))
        .map(|u| u.email)
        .collect();
    members.sort();

    Ok(GroupDependencies {
        group: group.to_owned(),
        users: members,
    })
}

/// Standalone integrity checker composing the two stores it reads.
///
/// Generic over store implementations so the checker has no dependency
/// on any backend crate.
pub struct IntegrityChecker<G, U> {
    groups: G,
    users: U,
}

impl<G, U> IntegrityChecker<G, U>
where
    G: GroupStore,
    U: UserStore,
{
    pub fn new(groups: G, users: U) -> Self {
        Self { groups, users }
    }

    pub async fn can_delete_permission(&self, name: &str) -> PermResult<IntegrityCheckResult> {
        can_delete_permission(&self.groups, &self.users, name).await
    }

    pub async fn can_delete_group(&self, name: &str) -> PermResult<IntegrityCheckResult> {
        can_delete_group(&self.users, name).await
    }

    pub async fn permission_dependencies(&self, name: &str) -> PermResult<PermissionDependencies> {
        permission_dependencies(&self.groups, &self.users, name).await
    }

    pub async fn group_dependencies(&self, name: &str) -> PermResult<GroupDependencies> {
        group_dependencies(&self.users, name).await
    }
}
