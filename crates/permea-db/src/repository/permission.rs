//! SurrealDB implementation of [`PermissionStore`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use permea_core::error::{PermError, PermResult};
use permea_core::models::permission::Permission;
use permea_core::store::PermissionStore;

use crate::error::{DbError, is_unique_violation};
use crate::retry::{self, RetryPolicy};

#[derive(Debug, SurrealValue)]
struct PermissionRow {
    name: String,
    description: String,
    is_default: bool,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Permission {
            name: row.name,
            description: row.description,
            is_default: row.is_default,
        }
    }
}

/// SurrealDB-backed permission store.
#[derive(Clone)]
pub struct SurrealPermissionStore<C: Connection> {
    db: Surreal<C>,
    retry: RetryPolicy,
}

impl<C: Connection> SurrealPermissionStore<C> {
    pub fn new(db: Surreal<C>, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    async fn try_create(
        &self,
        name: &str,
        description: &str,
        is_default: bool,
    ) -> PermResult<Permission> {
        let result = self
            .db
            .query(
                "CREATE permission SET name = $name, \
                 description = $description, is_default = $is_default",
            )
            .bind(("name", name.to_owned()))
            .bind(("description", description.to_owned()))
            .bind(("is_default", is_default))
            .await
            .map_err(DbError::from)?;

        let mut result = match result.check() {
            Ok(result) => result,
            Err(err) if is_unique_violation(&err) => {
                return Err(PermError::Conflict {
                    entity: "permission".into(),
                    id: name.to_owned(),
                });
            }
            Err(err) => return Err(DbError::from(err).into()),
        };

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter().next().map(Permission::from).ok_or_else(|| {
            PermError::Internal(format!("create returned no permission row for '{name}'"))
        })
    }

    async fn try_get(&self, name: &str) -> PermResult<Option<Permission>> {
        let mut result = self
            .db
            .query("SELECT * FROM permission WHERE name = $name LIMIT 1")
            .bind(("name", name.to_owned()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(Permission::from))
    }

    async fn try_list(&self) -> PermResult<Vec<Permission>> {
        let mut result = self
            .db
            .query("SELECT * FROM permission ORDER BY name ASC")
            .await
            .map_err(DbError::from)?;
        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    /// UPDATE matches zero or one row thanks to the unique name index;
    /// an empty result is the NotFound signal.
    async fn try_update(&self, name: &str, query: &str, value: String) -> PermResult<Option<Permission>> {
        let result = self
            .db
            .query(query)
            .bind(("name", name.to_owned()))
            .bind(("value", value))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;
        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(Permission::from))
    }

    async fn try_delete(&self, name: &str) -> PermResult<Option<Permission>> {
        // Snapshot read and deletes commit as one unit. Link rows
        // referencing the name go with the permission record.
        let mut result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 SELECT * FROM permission WHERE name = $name LIMIT 1; \
                 DELETE group_permission WHERE permission_name = $name; \
                 DELETE user_permission WHERE permission_name = $name; \
                 DELETE permission WHERE name = $name; \
                 COMMIT TRANSACTION;",
            )
            .bind(("name", name.to_owned()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        // Statement 0 is BEGIN TRANSACTION, so the SELECT is at 1.
        let rows: Vec<PermissionRow> = result.take(1).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(Permission::from))
    }
}

impl<C: Connection> PermissionStore for SurrealPermissionStore<C> {
    async fn create(
        &self,
        name: &str,
        description: &str,
        is_default: bool,
    ) -> PermResult<Permission> {
        retry::run(&self.retry, || self.try_create(name, description, is_default)).await
    }

    async fn get(&self, name: &str) -> PermResult<Option<Permission>> {
        retry::run(&self.retry, || self.try_get(name)).await
    }

    async fn list(&self) -> PermResult<Vec<Permission>> {
        retry::run(&self.retry, || self.try_list()).await
    }

    async fn update_description(
        &self,
        name: &str,
        description: &str,
    ) -> PermResult<Option<Permission>> {
        retry::run(&self.retry, || {
            self.try_update(
                name,
                "UPDATE permission SET description = $value, \
                 updated_at = time::now() WHERE name = $name",
                description.to_owned(),
            )
        })
        .await
    }

    async fn set_default(&self, name: &str, is_default: bool) -> PermResult<Option<Permission>> {
        retry::run(&self.retry, || async {
            let result = self
                .db
                .query(
                    "UPDATE permission SET is_default = $is_default, \
                     updated_at = time::now() WHERE name = $name",
                )
                .bind(("name", name.to_owned()))
                .bind(("is_default", is_default))
                .await
                .map_err(DbError::from)?;
            let mut result = result.check().map_err(DbError::from)?;
            let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
            Ok(rows.into_iter().next().map(Permission::from))
        })
        .await
    }

    async fn delete(&self, name: &str) -> PermResult<Option<Permission>> {
        retry::run(&self.retry, || self.try_delete(name)).await
    }
}
