//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex for thread-safe access.
//! Configures WAL mode and recommended PRAGMAs on initialization.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use tubedigest_core::error::DigestError;

use crate::migrations;

/// How long an open waits for another process holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Thread-safe SQLite database wrapper.
///
/// The connection is behind a Mutex since rusqlite Connection is not Sync;
/// every read and write is serialized, which keeps the records table and its
/// indexes consistent under overlapping readers and writers.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path and upgrade it to the
    /// current schema version.
    pub fn new(path: &Path) -> Result<Self, DigestError> {
        Self::open_at_version(path, migrations::SCHEMA_VERSION)
    }

    /// Open (or create) a database, migrating no further than `version`.
    ///
    /// A database already past `version` is left as is.
    pub fn open_at_version(path: &Path, version: i64) -> Result<Self, DigestError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| DigestError::StoreRead(format!("Failed to open database: {}", e)))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| DigestError::StoreRead(format!("Failed to set busy timeout: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -16384;",
        )
        .map_err(|e| DigestError::StoreRead(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(|conn| migrations::migrate_to(conn, version))?;
        Ok(db)
    }

    /// Open an in-memory database at the current schema version (for testing).
    pub fn in_memory() -> Result<Self, DigestError> {
        Self::in_memory_at_version(migrations::SCHEMA_VERSION)
    }

    /// Open an in-memory database migrated no further than `version`.
    pub fn in_memory_at_version(version: i64) -> Result<Self, DigestError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DigestError::StoreRead(format!("Failed to open in-memory db: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(|conn| migrations::migrate_to(conn, version))?;
        Ok(db)
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure, so the closure must
    /// not call back into `with_conn`.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DigestError>
    where
        F: FnOnce(&Connection) -> Result<T, DigestError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DigestError::StoreRead(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Highest applied schema version.
    pub fn schema_version(&self) -> Result<i64, DigestError> {
        self.with_conn(migrations::current_version)
    }

    /// Names of the secondary indexes on the records table.
    pub fn index_names(&self) -> Result<BTreeSet<String>, DigestError> {
        self.with_conn(migrations::index_names)
    }

    /// Upgrade to the current schema version. Safe to call any number of times.
    pub fn upgrade(&self) -> Result<(), DigestError> {
        self.with_conn(|conn| migrations::migrate_to(conn, migrations::SCHEMA_VERSION))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
