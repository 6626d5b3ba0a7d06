//! tubedigest storage crate - SQLite persistence for pipeline results.
//!
//! Provides a WAL-mode SQLite database with versioned migrations and the
//! append-only `RecordStore` with its secondary-index lookups.

pub mod db;
pub mod migrations;
pub mod records;

pub use db::Database;
pub use migrations::SCHEMA_VERSION;
pub use records::RecordStore;
