//! The backup engine: snapshot and restore over a [`TableAccess`] store.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::backup::access::TableAccess;
use crate::backup::columns::ColumnCache;
use crate::backup::guard::ReferentialChecksSuspended;
use crate::backup::types::{
    is_known_table, BackupDocument, BackupError, BackupResult, ExportEnvelope, ImportSummary,
    BACKUP_VERSION, TABLE_ORDER,
};

/// Snapshots and restores every table in [`TABLE_ORDER`].
///
/// The engine borrows its store for its whole lifetime and keeps a
/// [`ColumnCache`] so each table is introspected once. Build one per request
/// if imports can run concurrently against a changing schema.
pub struct BackupEngine<'a, A: TableAccess + ?Sized> {
    access: &'a mut A,
    columns: ColumnCache,
}

impl<'a, A: TableAccess + ?Sized> BackupEngine<'a, A> {
    #[must_use]
    pub fn new(access: &'a mut A) -> Self {
        Self {
            access,
            columns: ColumnCache::new(),
        }
    }

    /// Drop every cached column set so the next import re-reads the schema.
    pub fn clear_column_cache(&mut self) {
        self.columns.clear();
    }

    /// Snapshot every table into a fresh document.
    ///
    /// Read-only. Empty tables are included as empty lists.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Store`] if any table cannot be read.
    pub fn export(&mut self) -> BackupResult<BackupDocument> {
        let mut tables = BTreeMap::new();
        for &table in TABLE_ORDER {
            let rows = self.access.select_all(table)?;
            debug!(table, rows = rows.len(), "exported table");
            tables.insert(table.to_string(), rows);
        }

        let document = BackupDocument {
            version: BACKUP_VERSION,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            tables,
        };
        info!(rows = document.total_rows(), "backup exported");
        Ok(document)
    }

    /// Snapshot every table and wrap it with a download filename.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Store`] if any table cannot be read.
    pub fn export_envelope(&mut self) -> BackupResult<ExportEnvelope> {
        let backup = self.export()?;
        Ok(ExportEnvelope {
            filename: backup_filename(Utc::now()),
            backup,
        })
    }

    /// Restore a backup document, replacing the contents of every table it
    /// carries.
    ///
    /// Tables are cleared and repopulated in [`TABLE_ORDER`] inside one
    /// transaction with referential checks suspended. Unknown tables, table
    /// entries that are not lists, rows that are not objects, and rows with
    /// no known columns are skipped.
    ///
    /// # Errors
    ///
    /// - [`BackupError::Validation`] if `tables` is missing or not an object.
    ///   The store is not touched.
    /// - [`BackupError::Import`] if any store operation fails. Nothing is
    ///   committed.
    /// - [`BackupError::Store`] if the post-commit row counts cannot be read.
    pub fn import(&mut self, document: &Value) -> BackupResult<ImportSummary> {
        let tables = document
            .get("tables")
            .and_then(Value::as_object)
            .ok_or_else(|| BackupError::Validation("Backup payload missing tables".to_string()))?;

        match document.get("version").and_then(Value::as_u64) {
            Some(v) if v == u64::from(BACKUP_VERSION) => {}
            other => warn!(version = ?other, "importing backup with unexpected version"),
        }
        for name in tables.keys().filter(|name| !is_known_table(name)) {
            debug!(table = %name, "ignoring unknown table");
        }

        let touched = {
            let mut access = ReferentialChecksSuspended::acquire(&mut *self.access)
                .map_err(|e| BackupError::Import(e.to_string()))?;
            access
                .begin_transaction()
                .map_err(|e| BackupError::Import(e.to_string()))?;

            let outcome = restore_tables(&mut *access, &mut self.columns, tables)
                .and_then(|touched| access.commit().map(|()| touched));

            match outcome {
                Ok(touched) => touched,
                Err(e) => {
                    // A failed rollback leaves the transaction open; the
                    // caller has to settle the store before reusing it.
                    if let Err(rollback_err) = access.rollback() {
                        error!(error = %e, rollback_error = %rollback_err, "import failed and rollback failed");
                        return Err(BackupError::Import(format!(
                            "{e} (rollback failed: {rollback_err})"
                        )));
                    }
                    warn!(error = %e, "import rolled back");
                    return Err(BackupError::Import(e.to_string()));
                }
            }
        };

        let mut counts = BTreeMap::new();
        for table in &touched {
            counts.insert(table.clone(), self.access.count(table)?);
        }

        let summary = ImportSummary {
            tables: touched,
            counts,
        };
        info!(
            tables = summary.tables.len(),
            rows = summary.total_rows(),
            "backup imported"
        );
        Ok(summary)
    }

    /// Restore a typed document.
    ///
    /// # Errors
    ///
    /// Same as [`import`](Self::import).
    pub fn import_document(&mut self, document: &BackupDocument) -> BackupResult<ImportSummary> {
        let value = serde_json::to_value(document)?;
        self.import(&value)
    }
}

/// Clear and repopulate each present table. Runs inside the caller's
/// transaction; returns the touched tables in order.
fn restore_tables<A: TableAccess + ?Sized>(
    access: &mut A,
    columns: &mut ColumnCache,
    tables: &Map<String, Value>,
) -> BackupResult<Vec<String>> {
    let mut touched = Vec::new();

    for &table in TABLE_ORDER {
        let Some(entry) = tables.get(table) else {
            continue;
        };
        let Some(rows) = entry.as_array() else {
            debug!(table, "skipping table entry that is not a list");
            continue;
        };

        access.delete_all(table)?;
        access.reset_auto_increment(table)?;

        let mut inserted = 0usize;
        let mut skipped = 0usize;
        for row in rows {
            let Some(row) = row.as_object() else {
                skipped += 1;
                continue;
            };
            let filtered = columns.filter_row(access, table, row)?;
            if filtered.is_empty() {
                skipped += 1;
                continue;
            }
            access.insert(table, &filtered)?;
            inserted += 1;
        }

        debug!(table, inserted, skipped, "restored table");
        touched.push(table.to_string());
    }

    Ok(touched)
}

/// Download name for a backup taken at `now`: `kai-backup-YYYYMMDD-HHMMSS.json`.
#[must_use]
pub fn backup_filename(now: DateTime<Utc>) -> String {
    format!("kai-backup-{}.json", now.format("%Y%m%d-%H%M%S"))
}

/// Pull the document out of an import request body `{ "backup": {...} }`.
///
/// # Errors
///
/// Returns [`BackupError::Validation`] if `backup` is missing or not an object.
pub fn extract_backup_payload(body: &Value) -> BackupResult<&Value> {
    body.get("backup")
        .filter(|backup| backup.is_object())
        .ok_or_else(|| BackupError::Validation("Backup payload is required".to_string()))
}
