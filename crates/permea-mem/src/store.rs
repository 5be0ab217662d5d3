//! DashMap-backed entity stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use permea_core::error::{PermError, PermResult};
use permea_core::models::access::Access;
use permea_core::models::group::Group;
use permea_core::models::permission::Permission;
use permea_core::models::user::User;
use permea_core::store::{GroupStore, PermissionStore, UserStore};

/// In-process permission store keyed by permission name.
#[derive(Clone, Default)]
pub struct MemoryPermissionStore {
    map: Arc<DashMap<String, Permission>>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionStore for MemoryPermissionStore {
    async fn create(
        &self,
        name: &str,
        description: &str,
        is_default: bool,
    ) -> PermResult<Permission> {
        match self.map.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(PermError::Conflict {
                entity: "permission".into(),
                id: name.into(),
            }),
            Entry::Vacant(slot) => {
                let permission = Permission {
                    name: name.to_owned(),
                    description: description.to_owned(),
                    is_default,
                };
                slot.insert(permission.clone());
                Ok(permission)
            }
        }
    }

    async fn get(&self, name: &str) -> PermResult<Option<Permission>> {
        Ok(self.map.get(name).map(|entry| entry.clone()))
    }

    async fn list(&self) -> PermResult<Vec<Permission>> {
        Ok(self.map.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn update_description(
        &self,
        name: &str,
        description: &str,
    ) -> PermResult<Option<Permission>> {
        Ok(self.map.get_mut(name).map(|mut entry| {
            entry.description = description.to_owned();
            entry.clone()
        }))
    }

    async fn set_default(&self, name: &str, is_default: bool) -> PermResult<Option<Permission>> {
        Ok(self.map.get_mut(name).map(|mut entry| {
            entry.is_default = is_default;
            entry.clone()
        }))
    }

    async fn delete(&self, name: &str) -> PermResult<Option<Permission>> {
        Ok(self.map.remove(name).map(|(_, permission)| permission))
    }
}

/// In-process group store keyed by group name.
#[derive(Clone, Default)]
pub struct MemoryGroupStore {
    map: Arc<DashMap<String, Group>>,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GroupStore for MemoryGroupStore {
    async fn create(&self, name: &str) -> PermResult<Group> {
        match self.map.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(PermError::Conflict {
                entity: "group".into(),
                id: name.into(),
            }),
            Entry::Vacant(slot) => {
                let group = Group::new(name);
                slot.insert(group.clone());
                Ok(group)
            }
        }
    }

    async fn get(&self, name: &str) -> PermResult<Option<Group>> {
        Ok(self.map.get(name).map(|entry| entry.clone()))
    }

    async fn list(&self) -> PermResult<Vec<Group>> {
        Ok(self.map.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn set_permission(
        &self,
        name: &str,
        permission: &str,
        access: Access,
        _assigned_by: Option<&str>,
    ) -> PermResult<Option<Group>> {
        Ok(self.map.get_mut(name).map(|mut entry| {
            entry.permissions.insert(permission.to_owned(), access);
            entry.clone()
        }))
    }

    async fn replace_permissions(
        &self,
        name: &str,
        permissions: &BTreeMap<String, Access>,
        _assigned_by: Option<&str>,
    ) -> PermResult<Option<Group>> {
        // Whole-map swap under the per-key write lock: concurrent reads
        // observe the fully-old or fully-new map, never a mix.
        Ok(self.map.get_mut(name).map(|mut entry| {
            entry.permissions = permissions.clone();
            entry.clone()
        }))
    }

    async fn remove_permission(&self, name: &str, permission: &str) -> PermResult<Option<Group>> {
        Ok(self.map.get_mut(name).map(|mut entry| {
            entry.permissions.remove(permission);
            entry.clone()
        }))
    }

    async fn delete(&self, name: &str) -> PermResult<Option<Group>> {
        Ok(self.map.remove(name).map(|(_, group)| group))
    }
}

/// In-process user store keyed by email.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    map: Arc<DashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryUserStore {
    async fn create(
        &self,
        email: &str,
        groups: &[String],
        _assigned_by: Option<&str>,
    ) -> PermResult<User> {
        match self.map.entry(email.to_owned()) {
            Entry::Occupied(_) => Err(PermError::Conflict {
                entity: "user".into(),
                id: email.into(),
            }),
            Entry::Vacant(slot) => {
                let user = User::new(email, groups.to_vec());
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn get(&self, email: &str) -> PermResult<Option<User>> {
        Ok(self.map.get(email).map(|entry| entry.clone()))
    }

    async fn list(&self) -> PermResult<Vec<User>> {
        Ok(self.map.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn set_permission(
        &self,
        email: &str,
        permission: &str,
        access: Access,
        _assigned_by: Option<&str>,
    ) -> PermResult<Option<User>> {
        Ok(self.map.get_mut(email).map(|mut entry| {
            entry.permissions.insert(permission.to_owned(), access);
            entry.clone()
        }))
    }

    async fn replace_permissions(
        &self,
        email: &str,
        permissions: &BTreeMap<String, Access>,
        _assigned_by: Option<&str>,
    ) -> PermResult<Option<User>> {
        Ok(self.map.get_mut(email).map(|mut entry| {
            entry.permissions = permissions.clone();
            entry.clone()
        }))
    }

    async fn remove_permission(&self, email: &str, permission: &str) -> PermResult<Option<User>> {
        Ok(self.map.get_mut(email).map(|mut entry| {
            entry.permissions.remove(permission);
            entry.clone()
        }))
    }

    async fn delete(&self, email: &str) -> PermResult<Option<User>> {
        Ok(self.map.remove(email).map(|(_, user)| user))
    }
}
