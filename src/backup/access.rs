//! Store collaborator used by the backup engine.

use crate::backup::types::{BackupResult, Row};

/// The operations a store must provide for snapshot and restore.
///
/// Table names passed in always come from
/// [`TABLE_ORDER`](crate::backup::TABLE_ORDER), and insert columns are
/// always a subset of [`list_columns`](Self::list_columns), so
/// implementations may interpolate both as quoted identifiers.
pub trait TableAccess {
    /// Live column names of `table`, in schema order.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be introspected.
    fn list_columns(&mut self, table: &str) -> BackupResult<Vec<String>>;

    /// Every row of `table`, all columns.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn select_all(&mut self, table: &str) -> BackupResult<Vec<Row>>;

    /// Delete every row of `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_all(&mut self, table: &str) -> BackupResult<()>;

    /// Restart the auto-increment counter of `table` at 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    fn reset_auto_increment(&mut self, table: &str) -> BackupResult<()>;

    /// Insert one row holding exactly the given columns.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    fn insert(&mut self, table: &str, row: &Row) -> BackupResult<()>;

    /// Number of rows in `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn count(&mut self, table: &str) -> BackupResult<u64>;

    /// # Errors
    ///
    /// Returns an error if a transaction cannot be started.
    fn begin_transaction(&mut self) -> BackupResult<()>;

    /// # Errors
    ///
    /// Returns an error if the commit fails.
    fn commit(&mut self) -> BackupResult<()>;

    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    fn rollback(&mut self) -> BackupResult<()>;

    /// Turn off foreign-key enforcement for this connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the setting cannot be changed.
    fn disable_referential_checks(&mut self) -> BackupResult<()>;

    /// Turn foreign-key enforcement back on for this connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the setting cannot be changed.
    fn enable_referential_checks(&mut self) -> BackupResult<()>;
}
