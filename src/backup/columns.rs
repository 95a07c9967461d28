//! Per-engine cache of live table columns.

use std::collections::HashMap;

use tracing::debug;

use crate::backup::access::TableAccess;
use crate::backup::types::{BackupResult, Row};

/// Column names per table, fetched lazily from the store.
///
/// Assumes the schema does not change while the owning engine is alive.
/// Call [`clear`](Self::clear) if it might.
#[derive(Debug, Default)]
pub struct ColumnCache {
    columns: HashMap<String, Vec<String>>,
}

impl ColumnCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns of `table`, introspecting the store on first use only.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot list the columns.
    pub fn columns_for<A: TableAccess + ?Sized>(
        &mut self,
        access: &mut A,
        table: &str,
    ) -> BackupResult<&[String]> {
        if !self.columns.contains_key(table) {
            let live = access.list_columns(table)?;
            debug!(table, columns = live.len(), "introspected columns");
            self.columns.insert(table.to_string(), live);
        }
        Ok(self.columns.get(table).map(Vec::as_slice).unwrap_or_default())
    }

    /// Reduce `row` to the columns `table` currently has, in schema order.
    ///
    /// Columns the schema doesn't know are dropped. The result may be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot list the columns.
    pub fn filter_row<A: TableAccess + ?Sized>(
        &mut self,
        access: &mut A,
        table: &str,
        row: &Row,
    ) -> BackupResult<Row> {
        let columns = self.columns_for(access, table)?;
        let mut filtered = Row::new();
        for column in columns {
            if let Some(value) = row.get(column) {
                filtered.insert(column.clone(), value.clone());
            }
        }
        Ok(filtered)
    }

    /// Forget every cached column set.
    pub fn clear(&mut self) {
        self.columns.clear();
    }

    /// Number of tables currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_drops_unknown_columns() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut cache = ColumnCache::new();

        let filtered = cache
            .filter_row(
                &mut storage,
                "goals",
                &row(json!({"name": "Learn X", "legacy_flag": true, "id": 3})),
            )
            .unwrap();

        let keys: Vec<&str> = filtered.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "name"]);
        assert_eq!(filtered["id"], json!(3));
    }

    #[test]
    fn test_filter_can_be_empty() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut cache = ColumnCache::new();

        let filtered = cache
            .filter_row(&mut storage, "goals", &row(json!({"nope": 1})))
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut cache = ColumnCache::new();
        cache.columns_for(&mut storage, "goals").unwrap();
        cache.columns_for(&mut storage, "goals").unwrap();
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
