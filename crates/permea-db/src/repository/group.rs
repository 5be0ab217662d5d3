//! SurrealDB implementation of [`GroupStore`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use permea_core::error::{PermError, PermResult};
use permea_core::models::access::Access;
use permea_core::models::group::Group;
use permea_core::store::GroupStore;

use crate::error::{DbError, MISSING_TARGET, check_guarded, is_unique_violation};
use crate::retry::{self, RetryPolicy};

#[derive(Debug, SurrealValue)]
struct GroupRow {
    name: String,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct GroupPermissionRow {
    group_name: String,
    permission_name: String,
    access: String,
    #[allow(dead_code)]
    assigned_by: Option<String>,
}

impl GroupPermissionRow {
    fn parsed_access(&self) -> PermResult<Access> {
        Access::parse(&self.access).ok_or_else(|| {
            DbError::Corrupt(format!(
                "invalid access value '{}' on group '{}'",
                self.access, self.group_name
            ))
            .into()
        })
    }
}

/// SurrealDB-backed group store. Permission entries live in the
/// `group_permission` link table, one row per entry.
#[derive(Clone)]
pub struct SurrealGroupStore<C: Connection> {
    db: Surreal<C>,
    retry: RetryPolicy,
}

impl<C: Connection> SurrealGroupStore<C> {
    pub fn new(db: Surreal<C>, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    async fn entries_for(&self, name: &str) -> PermResult<BTreeMap<String, Access>> {
        let mut result = self
            .db
            .query("SELECT * FROM group_permission WHERE group_name = $name")
            .bind(("name", name.to_owned()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupPermissionRow> = result.take(0).map_err(DbError::from)?;

        let mut permissions = BTreeMap::new();
        for row in rows {
            let access = row.parsed_access()?;
            permissions.insert(row.permission_name, access);
        }
        Ok(permissions)
    }

    async fn load(&self, name: &str) -> PermResult<Option<Group>> {
        let mut result = self
            .db
            .query("SELECT * FROM group WHERE name = $name LIMIT 1")
            .bind(("name", name.to_owned()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(Group {
            name: row.name,
            permissions: self.entries_for(name).await?,
        }))
    }

    async fn try_create(&self, name: &str) -> PermResult<Group> {
        let result = self
            .db
            .query("CREATE group SET name = $name")
            .bind(("name", name.to_owned()))
            .await
            .map_err(DbError::from)?;

        match result.check() {
            Ok(_) => Ok(Group::new(name)),
            Err(err) if is_unique_violation(&err) => Err(PermError::Conflict {
                entity: "group".into(),
                id: name.to_owned(),
            }),
            Err(err) => Err(DbError::from(err).into()),
        }
    }

    async fn try_list(&self) -> PermResult<Vec<Group>> {
        let mut result = self
            .db
            .query("SELECT * FROM group ORDER BY name ASC; SELECT * FROM group_permission;")
            .await
            .map_err(DbError::from)?;
        let group_rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let entry_rows: Vec<GroupPermissionRow> = result.take(1).map_err(DbError::from)?;

        let mut entries: BTreeMap<String, BTreeMap<String, Access>> = BTreeMap::new();
        for row in entry_rows {
            let access = row.parsed_access()?;
            entries
                .entry(row.group_name.clone())
                .or_default()
                .insert(row.permission_name, access);
        }

        Ok(group_rows
            .into_iter()
            .map(|row| {
                let permissions = entries.remove(&row.name).unwrap_or_default();
                Group {
                    name: row.name,
                    permissions,
                }
            })
            .collect())
    }

    async fn try_set_permission(
        &self,
        name: &str,
        permission: &str,
        access: Access,
        assigned_by: Option<&str>,
    ) -> PermResult<Option<Group>> {
        // Delete-then-create upsert keyed by the unique pair index. The
        // existence guard runs inside the same transaction, so a
        // concurrent group deletion rolls the link row back instead of
        // leaving it orphaned.
        let result = self
            .db
            .query(format!(
                "BEGIN TRANSACTION; \
                 LET $rows = (SELECT name FROM group WHERE name = $group); \
                 IF array::len($rows) = 0 {{ THROW '{MISSING_TARGET}' }}; \
                 DELETE group_permission WHERE group_name = $group \
                 AND permission_name = $permission; \
                 CREATE group_permission SET group_name = $group, \
                 permission_name = $permission, access = $access_value, \
                 assigned_by = $assigned_by; \
                 COMMIT TRANSACTION;"
            ))
            .bind(("group", name.to_owned()))
            .bind(("permission", permission.to_owned()))
            .bind(("access_value", access.as_str()))
            .bind(("assigned_by", assigned_by.map(str::to_owned)))
            .await
            .map_err(DbError::from)?;

        match check_guarded(result) {
            Ok(true) => self.load(name).await,
            Ok(false) => Ok(None),
            Err(err) => Err(DbError::from(err).into()),
        }
    }

    async fn try_replace_permissions(
        &self,
        name: &str,
        permissions: &BTreeMap<String, Access>,
        assigned_by: Option<&str>,
    ) -> PermResult<Option<Group>> {
        // Guard, clear and repopulate in one transaction so a failure
        // rolls back to the fully-old map.
        let mut sql = format!(
            "BEGIN TRANSACTION; \
             LET $rows = (SELECT name FROM group WHERE name = $group); \
             IF array::len($rows) = 0 {{ THROW '{MISSING_TARGET}' }}; \
             DELETE group_permission WHERE group_name = $group; "
        );
        for i in 0..permissions.len() {
            sql.push_str(&format!(
                "CREATE group_permission SET group_name = $group, \
                 permission_name = $p{i}, access = $a{i}, \
                 assigned_by = $assigned_by; "
            ));
        }
        sql.push_str("COMMIT TRANSACTION;");

        let mut request = self
            .db
            .query(sql)
            .bind(("group", name.to_owned()))
            .bind(("assigned_by", assigned_by.map(str::to_owned)));
        for (i, (permission, access)) in permissions.iter().enumerate() {
            request = request
                .bind((format!("p{i}"), permission.clone()))
                .bind((format!("a{i}"), access.as_str()));
        }
        let result = request.await.map_err(DbError::from)?;

        match check_guarded(result) {
            Ok(true) => self.load(name).await,
            Ok(false) => Ok(None),
            Err(err) => Err(DbError::from(err).into()),
        }
    }

    async fn try_remove_permission(
        &self,
        name: &str,
        permission: &str,
    ) -> PermResult<Option<Group>> {
        let result = self
            .db
            .query(format!(
                "BEGIN TRANSACTION; \
                 LET $rows = (SELECT name FROM group WHERE name = $group); \
                 IF array::len($rows) = 0 {{ THROW '{MISSING_TARGET}' }}; \
                 DELETE group_permission WHERE group_name = $group \
                 AND permission_name = $permission; \
                 COMMIT TRANSACTION;"
            ))
            .bind(("group", name.to_owned()))
            .bind(("permission", permission.to_owned()))
            .await
            .map_err(DbError::from)?;

        match check_guarded(result) {
            Ok(true) => self.load(name).await,
            Ok(false) => Ok(None),
            Err(err) => Err(DbError::from(err).into()),
        }
    }

    async fn try_delete(&self, name: &str) -> PermResult<Option<Group>> {
        // The snapshot reads share the transaction with the deletes, so
        // the returned state is exactly what was removed. Membership
        // rows in user_group are left in place: a user keeps its
        // reference and resolution skips the vanished group.
        let mut result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 SELECT * FROM group WHERE name = $name LIMIT 1; \
                 SELECT * FROM group_permission WHERE group_name = $name; \
                 DELETE group_permission WHERE group_name = $name; \
                 DELETE group WHERE name = $name; \
                 COMMIT TRANSACTION;",
            )
            .bind(("name", name.to_owned()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        // Statement 0 is BEGIN TRANSACTION, so the SELECTs start at 1.
        let rows: Vec<GroupRow> = result.take(1).map_err(DbError::from)?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let entry_rows: Vec<GroupPermissionRow> = result.take(2).map_err(DbError::from)?;

        let mut permissions = BTreeMap::new();
        for entry in entry_rows {
            let access = entry.parsed_access()?;
            permissions.insert(entry.permission_name, access);
        }

        Ok(Some(Group {
            name: row.name,
            permissions,
        }))
    }
}

impl<C: Connection> GroupStore for SurrealGroupStore<C> {
    async fn create(&self, name: &str) -> PermResult<Group> {
        retry::run(&self.retry, || self.try_create(name)).await
    }

    async fn get(&self, name: &str) -> PermResult<Option<Group>> {
        retry::run(&self.retry, || self.load(name)).await
    }

    async fn list(&self) -> PermResult<Vec<Group>> {
        retry::run(&self.retry, || self.try_list()).await
    }

    async fn set_permission(
        &self,
        name: &str,
        permission: &str,
        access: Access,
        assigned_by: Option<&str>,
    ) -> PermResult<Option<Group>> {
        retry::run(&self.retry, || {
            self.try_set_permission(name, permission, access, assigned_by)
        })
        .await
    }

    async fn replace_permissions(
        &self,
        name: &str,
        permissions: &BTreeMap<String, Access>,
        assigned_by: Option<&str>,
    ) -> PermResult<Option<Group>> {
        retry::run(&self.retry, || {
            self.try_replace_permissions(name, permissions, assigned_by)
        })
        .await
    }

    async fn remove_permission(&self, name: &str, permission: &str) -> PermResult<Option<Group>> {
        retry::run(&self.retry, || self.try_remove_permission(name, permission)).await
    }

    async fn delete(&self, name: &str) -> PermResult<Option<Group>> {
        retry::run(&self.retry, || self.try_delete(name)).await
    }
}
