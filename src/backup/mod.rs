//! Backup export and import.
//!
//! This module snapshots the whole Kai dataset into one JSON document and
//! restores it:
//!
//! - **Export**: every table in [`TABLE_ORDER`] → [`BackupDocument`]
//! - **Import**: document → store, one transaction, referential checks
//!   suspended, unknown columns dropped
//! - **Files**: atomic writes and envelope-tolerant reads for the CLI
//!
//! # Document Format
//!
//! ```json
//! {"version":1,"generated_at":"2025-01-20T10:00:00Z","tables":{"goals":[{"id":1,"name":"Learn X"}],"phases":[]}}
//! ```
//!
//! # Example
//!
//! ```ignore
//! use kai::backup::BackupEngine;
//!
//! let mut engine = BackupEngine::new(&mut storage);
//! let document = engine.export()?;
//! let summary = engine.import_document(&document)?;
//! ```

mod access;
mod columns;
mod engine;
mod file;
mod guard;
mod types;

pub use access::TableAccess;
pub use columns::ColumnCache;
pub use engine::{backup_filename, extract_backup_payload, BackupEngine};
pub use file::{atomic_write, read_backup_file, sha256_hex};
pub use guard::ReferentialChecksSuspended;
pub use types::{
    is_known_table, BackupDocument, BackupError, BackupResult, ExportEnvelope, ImportEnvelope,
    ImportSummary, Row, BACKUP_VERSION, TABLE_ORDER,
};
