//! Database schema migrations.
//!
//! Version 1 created the records table with its creation-time index.
//! Version 2 adds the url and video_id lookup indexes. Every statement is
//! `IF NOT EXISTS`, so migrating over an index someone already created is a
//! no-op rather than an error.

use std::collections::BTreeSet;

use rusqlite::Connection;
use tracing::info;

use tubedigest_core::error::DigestError;

/// Schema version this build expects.
pub const SCHEMA_VERSION: i64 = 2;

pub const IDX_CREATED_AT: &str = "idx_records_created_at";
pub const IDX_URL: &str = "idx_records_url";
pub const IDX_VIDEO_ID: &str = "idx_records_video_id";

/// Run all pending migrations up to [`SCHEMA_VERSION`].
pub fn run_migrations(conn: &Connection) -> Result<(), DigestError> {
    migrate_to(conn, SCHEMA_VERSION)
}

/// Run pending migrations up to and including `target`.
///
/// The whole upgrade runs inside one `BEGIN IMMEDIATE` transaction: a
/// concurrent opener blocks on the write lock, then observes the new version
/// and applies nothing.
pub fn migrate_to(conn: &Connection, target: i64) -> Result<(), DigestError> {
    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| DigestError::StoreWrite(format!("Failed to begin migration: {}", e)))?;

    match apply_pending(conn, target) {
        Ok(()) => conn
            .execute_batch("COMMIT;")
            .map_err(|e| DigestError::StoreWrite(format!("Failed to commit migration: {}", e))),
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

fn apply_pending(conn: &Connection, target: i64) -> Result<(), DigestError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| DigestError::StoreWrite(format!("Failed to create migrations table: {}", e)))?;

    let current = current_version(conn)?;

    if current < 1 && target >= 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: records");
    }

    if current < 2 && target >= 2 {
        apply_v2(conn)?;
        info!("Applied migration v2: lookup_indexes");
    }

    Ok(())
}

/// Highest applied migration, 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<i64, DigestError> {
    let table_exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations')",
            [],
            |row| row.get(0),
        )
        .map_err(|e| DigestError::StoreRead(format!("Failed to inspect schema: {}", e)))?;
    if !table_exists {
        return Ok(0);
    }

    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| DigestError::StoreRead(format!("Failed to query migration version: {}", e)))
}

/// Names of the explicitly created indexes on the records table.
pub fn index_names(conn: &Connection) -> Result<BTreeSet<String>, DigestError> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'index' AND tbl_name = 'records' AND sql IS NOT NULL",
        )
        .map_err(|e| DigestError::StoreRead(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| DigestError::StoreRead(e.to_string()))?;

    let mut names = BTreeSet::new();
    for row in rows {
        names.insert(row.map_err(|e| DigestError::StoreRead(e.to_string()))?);
    }
    Ok(names)
}

/// Whether the named index exists.
pub fn has_index(conn: &Connection, name: &str) -> Result<bool, DigestError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1)",
        rusqlite::params![name],
        |row| row.get(0),
    )
    .map_err(|e| DigestError::StoreRead(format!("Failed to inspect index {}: {}", name, e)))
}

/// Version 1: records table and creation-time index.
fn apply_v1(conn: &Connection) -> Result<(), DigestError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            url         TEXT NOT NULL,
            video_id    TEXT NOT NULL,
            metadata    TEXT NOT NULL DEFAULT '{}',
            summary     TEXT NOT NULL,
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_records_created_at
            ON records (created_at DESC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'records');
        ",
    )
    .map_err(|e| DigestError::StoreWrite(format!("Failed to apply migration v1: {}", e)))
}

/// Version 2: url and video_id lookup indexes.
///
/// Also re-asserts the creation-time index so a store that lost it gets it
/// back on upgrade.
fn apply_v2(conn: &Connection) -> Result<(), DigestError> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_records_created_at
            ON records (created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_records_url
            ON records (url, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_records_video_id
            ON records (video_id, created_at DESC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (2, 'lookup_indexes');
        ",
    )
    .map_err(|e| DigestError::StoreWrite(format!("Failed to apply migration v2: {}", e)))
}
