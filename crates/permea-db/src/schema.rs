//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! Entities are keyed by their natural identifier (permission name,
//! group name, user email) with UNIQUE indexes enforcing the key.
//! Enums are stored as strings with ASSERT constraints.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Permissions
-- =======================================================================
DEFINE TABLE permission SCHEMAFULL;
DEFINE FIELD name ON TABLE permission TYPE string;
DEFINE FIELD description ON TABLE permission TYPE string;
DEFINE FIELD is_default ON TABLE permission TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE permission TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE permission TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_permission_name ON TABLE permission \
    COLUMNS name UNIQUE;

-- =======================================================================
-- Groups
-- =======================================================================
DEFINE TABLE group SCHEMAFULL;
DEFINE FIELD name ON TABLE group TYPE string;
DEFINE FIELD created_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_name ON TABLE group COLUMNS name UNIQUE;

-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Group permission entries
-- =======================================================================
DEFINE TABLE group_permission SCHEMAFULL;
DEFINE FIELD group_name ON TABLE group_permission TYPE string;
DEFINE FIELD permission_name ON TABLE group_permission TYPE string;
DEFINE FIELD access ON TABLE group_permission TYPE string \
    ASSERT $value IN ['ALLOW', 'DENY'];
DEFINE FIELD assigned_by ON TABLE group_permission \
    TYPE option<string>;
DEFINE FIELD assigned_at ON TABLE group_permission TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_permission ON TABLE group_permission \
    COLUMNS group_name, permission_name UNIQUE;

-- =======================================================================
-- User permission overrides
-- =======================================================================
DEFINE TABLE user_permission SCHEMAFULL;
DEFINE FIELD user_email ON TABLE user_permission TYPE string;
DEFINE FIELD permission_name ON TABLE user_permission TYPE string;
DEFINE FIELD access ON TABLE user_permission TYPE string \
    ASSERT $value IN ['ALLOW', 'DENY'];
DEFINE FIELD assigned_by ON TABLE user_permission \
    TYPE option<string>;
DEFINE FIELD assigned_at ON TABLE user_permission TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_permission ON TABLE user_permission \
    COLUMNS user_email, permission_name UNIQUE;

-- =======================================================================
-- User group memberships (fixed at user creation)
-- =======================================================================
DEFINE TABLE user_group SCHEMAFULL;
DEFINE FIELD user_email ON TABLE user_group TYPE string;
DEFINE FIELD group_name ON TABLE user_group TYPE string;
-- Preserves the order of the membership list given at creation.
DEFINE FIELD position ON TABLE user_group TYPE int;
DEFINE FIELD assigned_by ON TABLE user_group TYPE option<string>;
DEFINE FIELD assigned_at ON TABLE user_group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_group ON TABLE user_group \
    COLUMNS user_email, group_name UNIQUE;

-- =======================================================================
-- History (append-only)
-- =======================================================================
DEFINE TABLE history SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD entry_id ON TABLE history TYPE string;
DEFINE FIELD timestamp_utc ON TABLE history TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD change_type ON TABLE history TYPE string \
    ASSERT $value IN ['CREATE', 'UPDATE', 'DELETE'];
DEFINE FIELD entity_type ON TABLE history TYPE string \
    ASSERT $value IN ['Permission', 'Group', 'User'];
DEFINE FIELD entity_id ON TABLE history TYPE string;
DEFINE FIELD snapshot ON TABLE history TYPE string;
DEFINE FIELD principal ON TABLE history TYPE option<string>;
DEFINE FIELD reason ON TABLE history TYPE option<string>;
DEFINE INDEX idx_history_time ON TABLE history COLUMNS timestamp_utc;
DEFINE INDEX idx_history_entity ON TABLE history \
    COLUMNS entity_type, entity_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
