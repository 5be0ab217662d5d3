//! SurrealDB implementation of [`UserStore`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use permea_core::error::{PermError, PermResult};
use permea_core::models::access::Access;
use permea_core::models::user::User;
use permea_core::store::UserStore;

use crate::error::{DbError, MISSING_TARGET, check_guarded, is_unique_violation};
use crate::retry::{self, RetryPolicy};

#[derive(Debug, SurrealValue)]
struct UserRow {
    email: String,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct UserPermissionRow {
    user_email: String,
    permission_name: String,
    access: String,
    #[allow(dead_code)]
    assigned_by: Option<String>,
}

impl UserPermissionRow {
    fn parsed_access(&self) -> PermResult<Access> {
        Access::parse(&self.access).ok_or_else(|| {
            DbError::Corrupt(format!(
                "invalid access value '{}' on user '{}'",
                self.access, self.user_email
            ))
            .into()
        })
    }
}

#[derive(Debug, SurrealValue)]
struct UserGroupRow {
    user_email: String,
    group_name: String,
    #[allow(dead_code)]
    assigned_by: Option<String>,
}

/// SurrealDB-backed user store. Permission overrides live in
/// `user_permission`, memberships in `user_group` (written once at
/// creation and only removed when the user is deleted, so a vanished
/// group stays referenced).
#[derive(Clone)]
pub struct SurrealUserStore<C: Connection> {
    db: Surreal<C>,
    retry: RetryPolicy,
}

impl<C: Connection> SurrealUserStore<C> {
    pub fn new(db: Surreal<C>, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    async fn load(&self, email: &str) -> PermResult<Option<User>> {
        // Membership rows come back in the order the list was given at
        // creation, matching what `create` returned.
        let mut result = self
            .db
            .query(
                "SELECT * FROM user WHERE email = $email LIMIT 1; \
                 SELECT * FROM user_group WHERE user_email = $email \
                 ORDER BY position ASC; \
                 SELECT * FROM user_permission WHERE user_email = $email;",
            )
            .bind(("email", email.to_owned()))
            .await
            .map_err(DbError::from)?;

        let user_rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let Some(row) = user_rows.into_iter().next() else {
            return Ok(None);
        };
        let group_rows: Vec<UserGroupRow> = result.take(1).map_err(DbError::from)?;
        let permission_rows: Vec<UserPermissionRow> = result.take(2).map_err(DbError::from)?;

        let mut permissions = BTreeMap::new();
        for entry in permission_rows {
            let access = entry.parsed_access()?;
            permissions.insert(entry.permission_name, access);
        }

        Ok(Some(User {
            email: row.email,
            groups: group_rows.into_iter().map(|g| g.group_name).collect(),
            permissions,
        }))
    }

    async fn try_create(
        &self,
        email: &str,
        groups: &[String],
        assigned_by: Option<&str>,
    ) -> PermResult<User> {
        // The user row and its membership rows commit as one unit.
        let mut sql = String::from(
            "BEGIN TRANSACTION; \
             CREATE user SET email = $email; ",
        );
        for i in 0..groups.len() {
            sql.push_str(&format!(
                "CREATE user_group SET user_email = $email, group_name = $g{i}, \
                 position = {i}, assigned_by = $assigned_by; "
            ));
        }
        sql.push_str("COMMIT TRANSACTION;");

        let mut request = self
            .db
            .query(sql)
            .bind(("email", email.to_owned()))
            .bind(("assigned_by", assigned_by.map(str::to_owned)));
        for (i, group) in groups.iter().enumerate() {
            request = request.bind((format!("g{i}"), group.clone()));
        }

        match request.await.map_err(DbError::from)?.check() {
            Ok(_) => Ok(User::new(email, groups.to_vec())),
            Err(err) if is_unique_violation(&err) => Err(PermError::Conflict {
                entity: "user".into(),
                id: email.to_owned(),
            }),
            Err(err) => Err(DbError::from(err).into()),
        }
    }

    async fn try_list(&self) -> PermResult<Vec<User>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM user ORDER BY email ASC; \
                 SELECT * FROM user_group ORDER BY position ASC; \
                 SELECT * FROM user_permission;",
            )
            .await
            .map_err(DbError::from)?;
        let user_rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let group_rows: Vec<UserGroupRow> = result.take(1).map_err(DbError::from)?;
        let permission_rows: Vec<UserPermissionRow> = result.take(2).map_err(DbError::from)?;

        let mut memberships: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in group_rows {
            memberships.entry(row.user_email).or_default().push(row.group_name);
        }
        let mut overrides: BTreeMap<String, BTreeMap<String, Access>> = BTreeMap::new();
        for row in permission_rows {
            let access = row.parsed_access()?;
            overrides
                .entry(row.user_email.clone())
                .or_default()
                .insert(row.permission_name, access);
        }

        Ok(user_rows
            .into_iter()
            .map(|row| {
                let groups = memberships.remove(&row.email).unwrap_or_default();
                let permissions = overrides.remove(&row.email).unwrap_or_default();
                User {
                    email: row.email,
                    groups,
                    permissions,
                }
            })
            .collect())
    }

    async fn try_set_permission(
        &self,
        email: &str,
        permission: &str,
        access: Access,
        assigned_by: Option<&str>,
    ) -> PermResult<Option<User>> {
        // In-transaction guard: a concurrent user deletion throws and
        // rolls the override row back instead of orphaning it.
        let result = self
            .db
            .query(format!(
                "BEGIN TRANSACTION; \
                 LET $rows = (SELECT email FROM user WHERE email = $email); \
                 IF array::len($rows) = 0 {{ THROW '{MISSING_TARGET}' }}; \
                 DELETE user_permission WHERE user_email = $email \
                 AND permission_name = $permission; \
                 CREATE user_permission SET user_email = $email, \
                 permission_name = $permission, access = $access_value, \
                 assigned_by = $assigned_by; \
                 COMMIT TRANSACTION;"
            ))
            .bind(("email", email.to_owned()))
            .bind(("permission", permission.to_owned()))
            .bind(("access_value", access.as_str()))
            .bind(("assigned_by", assigned_by.map(str::to_owned)))
            .await
            .map_err(DbError::from)?;

        match check_guarded(result) {
            Ok(true) => self.load(email).await,
            Ok(false) => Ok(None),
            Err(err) => Err(DbError::from(err).into()),
        }
    }

    async fn try_replace_permissions(
        &self,
        email: &str,
        permissions: &BTreeMap<String, Access>,
        assigned_by: Option<&str>,
    ) -> PermResult<Option<User>> {
        let mut sql = format!(
            "BEGIN TRANSACTION; \
             LET $rows = (SELECT email FROM user WHERE email = $email); \
             IF array::len($rows) = 0 {{ THROW '{MISSING_TARGET}' }}; \
             DELETE user_permission WHERE user_email = $email; "
        );
        for i in 0..permissions.len() {
            sql.push_str(&format!(
                "CREATE user_permission SET user_email = $email, \
                 permission_name = $p{i}, access = $a{i}, \
                 assigned_by = $assigned_by; "
            ));
        }
        sql.push_str("COMMIT TRANSACTION;");

        let mut request = self
            .db
            .query(sql)
            .bind(("email", email.to_owned()))
            .bind(("assigned_by", assigned_by.map(str::to_owned)));
        for (i, (permission, access)) in permissions.iter().enumerate() {
            request = request
                .bind((format!("p{i}"), permission.clone()))
                .bind((format!("a{i}"), access.as_str()));
        }
        let result = request.await.map_err(DbError::from)?;

        match check_guarded(result) {
            Ok(true) => self.load(email).await,
            Ok(false) => Ok(None),
            Err(err) => Err(DbError::from(err).into()),
        }
    }

    async fn try_remove_permission(
        &self,
        email: &str,
        permission: &str,
    ) -> PermResult<Option<User>> {
        let result = self
            .db
            .query(format!(
                "BEGIN TRANSACTION; \
                 LET $rows = (SELECT email FROM user WHERE email = $email); \
                 IF array::len($rows) = 0 {{ THROW '{MISSING_TARGET}' }}; \
                 DELETE user_permission WHERE user_email = $email \
                 AND permission_name = $permission; \
                 COMMIT TRANSACTION;"
            ))
            .bind(("email", email.to_owned()))
            .bind(("permission", permission.to_owned()))
            .await
            .map_err(DbError::from)?;

        match check_guarded(result) {
            Ok(true) => self.load(email).await,
            Ok(false) => Ok(None),
            Err(err) => Err(DbError::from(err).into()),
        }
    }

    async fn try_delete(&self, email: &str) -> PermResult<Option<User>> {
        // Snapshot reads and deletes commit as one unit, so the
        // returned state is exactly what was removed.
        let mut result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 SELECT * FROM user WHERE email = $email LIMIT 1; \
                 SELECT * FROM user_group WHERE user_email = $email \
                 ORDER BY position ASC; \
                 SELECT * FROM user_permission WHERE user_email = $email; \
                 DELETE user_permission WHERE user_email = $email; \
                 DELETE user_group WHERE user_email = $email; \
                 DELETE user WHERE email = $email; \
                 COMMIT TRANSACTION;",
            )
            .bind(("email", email.to_owned()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        // Statement 0 is BEGIN TRANSACTION, so the SELECTs start at 1.
        let user_rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let Some(row) = user_rows.into_iter().next() else {
            return Ok(None);
        };
        let group_rows: Vec<UserGroupRow> = result.take(2).map_err(DbError::from)?;
        let permission_rows: Vec<UserPermissionRow> = result.take(3).map_err(DbError::from)?;

        let mut permissions = BTreeMap::new();
        for entry in permission_rows {
            let access = entry.parsed_access()?;
            permissions.insert(entry.permission_name, access);
        }

        Ok(Some(User {
            email: row.email,
            groups: group_rows.into_iter().map(|g| g.group_name).collect(),
            permissions,
        }))
    }
}

impl<C: Connection> UserStore for SurrealUserStore<C> {
    async fn create(
        &self,
        email: &str,
        groups: &[String],
        assigned_by: Option<&str>,
    ) -> PermResult<User> {
        retry::run(&self.retry, || self.try_create(email, groups, assigned_by)).await
    }

    async fn get(&self, email: &str) -> PermResult<Option<User>> {
        retry::run(&self.retry, || self.load(email)).await
    }

    async fn list(&self) -> PermResult<Vec<User>> {
        retry::run(&self.retry, || self.try_list()).await
    }

    async fn set_permission(
        &self,
        email: &str,
        permission: &str,
        access: Access,
        assigned_by: Option<&str>,
    ) -> PermResult<Option<User>> {
        retry::run(&self.retry, || {
            self.try_set_permission(email, permission, access, assigned_by)
        })
        .await
    }

    async fn replace_permissions(
        &self,
        email: &str,
        permissions: &BTreeMap<String, Access>,
        assigned_by: Option<&str>,
    ) -> PermResult<Option<User>> {
        retry::run(&self.retry, || {
            self.try_replace_permissions(email, permissions, assigned_by)
        })
        .await
    }

    async fn remove_permission(&self, email: &str, permission: &str) -> PermResult<Option<User>> {
        retry::run(&self.retry, || self.try_remove_permission(email, permission)).await
    }

    async fn delete(&self, email: &str) -> PermResult<Option<User>> {
        retry::run(&self.retry, || self.try_delete(email)).await
    }
}
