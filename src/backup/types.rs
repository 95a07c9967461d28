//! Backup document types.
//!
//! The document is the portable snapshot handed to the browser client and
//! written to disk by the CLI. Rows are kept as untyped JSON objects so a
//! document exported against an older or newer schema still parses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Format version written into every exported document.
pub const BACKUP_VERSION: u32 = 1;

/// Tables covered by a backup, parents ahead of their dependents.
///
/// Clearing and re-insertion both walk this list front to back. Clearing a
/// parent before its children is only safe because referential checks are
/// suspended for the whole import.
pub const TABLE_ORDER: &[&str] = &[
    "users",
    "goals",
    "phases",
    "tasks",
    "ideas",
    "knowledge",
    "important_notes",
    "habits",
    "habit_logs",
    "daily_logs",
];

/// A single table row: column name to scalar value.
pub type Row = Map<String, Value>;

/// Returns true if `table` is one of the tables covered by a backup.
#[must_use]
pub fn is_known_table(table: &str) -> bool {
    TABLE_ORDER.contains(&table)
}

/// A full snapshot of every table in [`TABLE_ORDER`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    /// Document format version.
    pub version: u32,
    /// ISO8601 UTC timestamp of the snapshot.
    pub generated_at: String,
    /// Rows per table. Empty tables are present with an empty list.
    pub tables: BTreeMap<String, Vec<Row>>,
}

impl BackupDocument {
    /// Total number of rows across all tables.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Row count for one table, or `None` if the table is absent.
    #[must_use]
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(Vec::len)
    }
}

/// Outcome of a successful import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Tables that were cleared and repopulated, in restore order.
    pub tables: Vec<String>,
    /// Row count per touched table, measured after commit.
    pub counts: BTreeMap<String, u64>,
}

impl ImportSummary {
    /// Total rows across all touched tables.
    #[must_use]
    pub fn total_rows(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Response body of the export endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEnvelope {
    /// Suggested download name, e.g. `kai-backup-20250120-100000.json`.
    pub filename: String,
    /// The snapshot itself.
    pub backup: BackupDocument,
}

/// Response body of the import endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEnvelope {
    pub restored: ImportSummary,
}

/// Backup-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Malformed import payload. Raised before the store is touched.
    #[error("{0}")]
    Validation(String),

    /// A read or write against the store failed.
    #[error("{0}")]
    Store(String),

    /// An import failed and was rolled back.
    #[error("Import failed: {0}")]
    Import(String),

    /// IO error while reading or writing a backup file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackupError {
    /// HTTP status the API surfaces this error with.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 422,
            Self::Json(_) => 400,
            Self::Store(_) | Self::Import(_) | Self::Io(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for BackupError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}

/// Result type for backup operations.
pub type BackupResult<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_has_parents_first() {
        let pos = |t: &str| TABLE_ORDER.iter().position(|x| *x == t).unwrap();
        assert!(pos("users") < pos("goals"));
        assert!(pos("goals") < pos("phases"));
        assert!(pos("phases") < pos("tasks"));
        assert!(pos("habits") < pos("habit_logs"));
    }

    #[test]
    fn test_import_error_message() {
        let err = BackupError::Import("UNIQUE constraint failed: goals.id".to_string());
        assert_eq!(err.to_string(), "Import failed: UNIQUE constraint failed: goals.id");
        assert_eq!(err.http_status(), 500);
        assert_eq!(BackupError::Validation("x".into()).http_status(), 422);
    }

    #[test]
    fn test_document_counts() {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::from(1));
        let mut tables = BTreeMap::new();
        tables.insert("goals".to_string(), vec![row]);
        tables.insert("phases".to_string(), Vec::new());
        let doc = BackupDocument {
            version: BACKUP_VERSION,
            generated_at: "2025-01-20T10:00:00Z".to_string(),
            tables,
        };
        assert_eq!(doc.total_rows(), 1);
        assert_eq!(doc.row_count("phases"), Some(0));
        assert_eq!(doc.row_count("tasks"), None);
    }
}
