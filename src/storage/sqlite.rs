//! SQLite storage implementation.
//!
//! This module provides the storage backend for Kai using SQLite and
//! implements [`TableAccess`] so the backup engine can snapshot and restore
//! it.

use crate::backup::{BackupError, BackupResult, Row, TableAccess};
use crate::error::{Error, Result};
use crate::storage::schema::apply_schema;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::Connection;
use serde_json::Value;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Whether foreign-key enforcement is currently on.
    ///
    /// # Errors
    ///
    /// Returns an error if the pragma cannot be read.
    pub fn referential_checks_enabled(&self) -> Result<bool> {
        let on: i64 = self
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        Ok(on == 1)
    }

    /// Return the connection to its idle state: no open transaction and
    /// foreign keys enforced.
    ///
    /// # Errors
    ///
    /// Returns an error if the open transaction can't be rolled back or
    /// enforcement can't be switched back on.
    pub fn settle(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        if !self.referential_checks_enabled()? {
            return Err(Error::Other(
                "foreign keys still disabled after rollback".to_string(),
            ));
        }
        Ok(())
    }

    fn has_sequence_table(&self) -> rusqlite::Result<bool> {
        self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'sqlite_sequence')",
            [],
            |row| row.get(0),
        )
    }
}

impl TableAccess for SqliteStorage {
    fn list_columns(&mut self, table: &str) -> BackupResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map([table], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(columns)
    }

    fn select_all(&mut self, table: &str) -> BackupResult<Vec<Row>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt
            .query_map([], |row| {
                let mut out = Row::new();
                for (idx, name) in names.iter().enumerate() {
                    out.insert(name.clone(), sql_to_json(row.get_ref(idx)?));
                }
                Ok(out)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn delete_all(&mut self, table: &str) -> BackupResult<()> {
        self.conn
            .execute(&format!("DELETE FROM {}", quote_ident(table)), [])?;
        Ok(())
    }

    fn reset_auto_increment(&mut self, table: &str) -> BackupResult<()> {
        // No sequence row means the next rowid starts at 1
        if self.has_sequence_table()? {
            self.conn
                .execute("DELETE FROM sqlite_sequence WHERE name = ?1", [table])?;
        }
        Ok(())
    }

    fn insert(&mut self, table: &str, row: &Row) -> BackupResult<()> {
        let columns: Vec<String> = row.keys().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        );

        let values = row
            .iter()
            .map(|(column, value)| json_to_sql(column, value))
            .collect::<BackupResult<Vec<SqlValue>>>()?;
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(rusqlite::params_from_iter(values.iter()))?;
        Ok(())
    }

    fn count(&mut self, table: &str) -> BackupResult<u64> {
        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    fn begin_transaction(&mut self) -> BackupResult<()> {
        // IMMEDIATE takes the write lock up front
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> BackupResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> BackupResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    // SQLite ignores foreign_keys changes inside a transaction, so these
    // must run outside BEGIN/COMMIT.
    fn disable_referential_checks(&mut self) -> BackupResult<()> {
        self.conn.pragma_update(None, "foreign_keys", "OFF")?;
        Ok(())
    }

    fn enable_referential_checks(&mut self) -> BackupResult<()> {
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }
}

/// Quote an identifier for interpolation into SQL.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Convert a stored value to its JSON form.
///
/// BLOBs become lowercase hex; non-finite reals become null.
fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => {
            let mut hex = String::with_capacity(bytes.len() * 2);
            for byte in bytes {
                let _ = write!(hex, "{byte:02x}");
            }
            Value::String(hex)
        }
    }
}

/// Convert a JSON value to an SQL parameter.
///
/// Integers beyond the i64 range are rejected rather than stored as a
/// rounded REAL.
fn json_to_sql(column: &str, value: &Value) -> BackupResult<SqlValue> {
    let converted = match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if n.is_u64() {
                return Err(BackupError::Store(format!(
                    "integer {n} out of range for column {column}"
                )));
            } else {
                SqlValue::Real(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    };
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_list_columns_in_schema_order() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let columns = storage.list_columns("phases").unwrap();
        assert_eq!(columns[0], "id");
        assert_eq!(columns[1], "goal_id");
        assert!(columns.contains(&"end_date".to_string()));
    }

    #[test]
    fn test_list_columns_unknown_table_is_empty() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(storage.list_columns("nope").unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_select_all() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .insert("goals", &row(json!({"id": 7, "name": "Learn X", "status": "active"})))
            .unwrap();

        let rows = storage.select_all("goals").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(7));
        assert_eq!(rows[0]["name"], json!("Learn X"));
        assert_eq!(rows[0]["description"], Value::Null);
        assert_eq!(storage.count("goals").unwrap(), 1);
    }

    #[test]
    fn test_bool_stored_as_integer() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .insert("habits", &row(json!({"name": "Read", "is_active": false})))
            .unwrap();
        let rows = storage.select_all("habits").unwrap();
        assert_eq!(rows[0]["is_active"], json!(0));
    }

    #[test]
    fn test_reset_auto_increment_restarts_at_one() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        for name in ["a", "b", "c"] {
            storage.insert("goals", &row(json!({"name": name}))).unwrap();
        }
        storage.delete_all("goals").unwrap();
        storage.reset_auto_increment("goals").unwrap();
        storage.insert("goals", &row(json!({"name": "fresh"}))).unwrap();

        let id: i64 = storage
            .conn()
            .query_row("SELECT id FROM goals WHERE name = 'fresh'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_referential_checks_toggle() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(storage.referential_checks_enabled().unwrap());

        storage.disable_referential_checks().unwrap();
        assert!(!storage.referential_checks_enabled().unwrap());
        storage
            .insert("phases", &row(json!({"goal_id": 42, "name": "Orphan"})))
            .unwrap();

        storage.enable_referential_checks().unwrap();
        assert!(storage.referential_checks_enabled().unwrap());
    }

    #[test]
    fn test_rollback_discards_changes() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.begin_transaction().unwrap();
        storage.insert("goals", &row(json!({"name": "temp"}))).unwrap();
        storage.rollback().unwrap();
        assert_eq!(storage.count("goals").unwrap(), 0);

        // No open transaction: rollback is a no-op
        storage.rollback().unwrap();
    }

    #[test]
    fn test_integer_beyond_i64_rejected() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let err = storage
            .insert(
                "daily_logs",
                &row(json!({"log_date": "2025-01-02", "mood": 9_223_372_036_854_775_808_u64})),
            )
            .unwrap_err();

        assert!(matches!(err, BackupError::Store(_)));
        assert!(err.to_string().contains("mood"));
        assert_eq!(storage.count("daily_logs").unwrap(), 0);

        storage
            .insert("daily_logs", &row(json!({"log_date": "2025-01-03", "mood": i64::MAX})))
            .unwrap();
        let rows = storage.select_all("daily_logs").unwrap();
        assert_eq!(rows[0]["mood"], json!(i64::MAX));
    }

    #[test]
    fn test_settle_closes_open_transaction() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.disable_referential_checks().unwrap();
        storage.begin_transaction().unwrap();
        storage.insert("goals", &row(json!({"name": "stuck"}))).unwrap();

        storage.settle().unwrap();

        assert!(storage.conn().is_autocommit());
        assert!(storage.referential_checks_enabled().unwrap());
        assert_eq!(storage.count("goals").unwrap(), 0);
    }

    #[test]
    fn test_blob_exported_as_hex() {
        assert_eq!(
            sql_to_json(ValueRef::Blob(&[0x00, 0xab, 0x10])),
            json!("00ab10")
        );
        assert_eq!(sql_to_json(ValueRef::Real(f64::NAN)), Value::Null);
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("goals"), "\"goals\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
