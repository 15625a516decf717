//! In-memory store for testing.

use crate::conn::StoreConnection;
use crate::error::{StoreError, StoreResult};
use crate::value::{KeyValue, Row, Value};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One table: rows keyed by primary key plus a generated-key counter.
#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<KeyValue, Row>,
    next_key: i64,
}

impl Table {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_key: 1,
        }
    }

    fn generate_key(&mut self) -> KeyValue {
        let key = KeyValue::Int(self.next_key);
        self.next_key += 1;
        key
    }

    /// Keeps the generator ahead of explicitly supplied integer keys.
    fn observe_key(&mut self, key: &KeyValue) {
        if let KeyValue::Int(v) = key {
            self.next_key = self.next_key.max(v + 1);
        }
    }
}

/// An in-memory row store.
///
/// This store keeps all tables in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral data that doesn't need persistence
///
/// Tables must be created up front with [`MemoryStore::create_table`];
/// operations against an unknown table fail with `TableNotFound`.
///
/// The store itself is cheap to clone; clones share the same tables.
/// Connections are obtained with [`MemoryStore::connect`] and see the
/// shared tables until closed.
///
/// # Example
///
/// ```rust
/// use rowmap_store::{MemoryStore, Row, StoreConnection, Value};
///
/// let store = MemoryStore::new();
/// store.create_table("users");
///
/// let mut conn = store.connect();
/// let row = Row::from_iter([("name", Value::text("Alice"))]);
/// let key = conn.insert("users", None, row).unwrap();
/// assert_eq!(store.row_count("users").unwrap(), 1);
/// assert!(conn.select("users", &key).unwrap().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table if it does not already exist.
    pub fn create_table(&self, name: impl Into<String>) {
        self.tables
            .write()
            .entry(name.into())
            .or_insert_with(Table::new);
    }

    /// Opens a connection onto this store's tables.
    #[must_use]
    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection {
            tables: Arc::clone(&self.tables),
            closed: false,
        }
    }

    /// Returns the number of rows in `table`.
    ///
    /// Useful for asserting physical store state in tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    pub fn row_count(&self, table: &str) -> StoreResult<usize> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;
        Ok(t.rows.len())
    }

    /// Returns a copy of the row stored under `key` in `table`.
    ///
    /// Useful for asserting physical store state in tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    pub fn row(&self, table: &str, key: &KeyValue) -> StoreResult<Option<Row>> {
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;
        Ok(t.rows.get(key).cloned())
    }
}

/// A connection onto a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryConnection {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    closed: bool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            Err(StoreError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

impl StoreConnection for MemoryConnection {
    fn insert(&mut self, table: &str, key: Option<KeyValue>, row: Row) -> StoreResult<KeyValue> {
        self.ensure_open()?;
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;

        let key = match key {
            Some(key) => {
                if t.rows.contains_key(&key) {
                    return Err(StoreError::duplicate_key(table, key.to_string()));
                }
                t.observe_key(&key);
                key
            }
            None => t.generate_key(),
        };

        t.rows.insert(key.clone(), row);
        Ok(key)
    }

    fn update(&mut self, table: &str, key: &KeyValue, row: Row) -> StoreResult<u64> {
        self.ensure_open()?;
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;

        match t.rows.get_mut(key) {
            Some(stored) => {
                stored.apply(&row);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete(&mut self, table: &str, key: &KeyValue) -> StoreResult<u64> {
        self.ensure_open()?;
        let mut tables = self.tables.write();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;

        Ok(u64::from(t.rows.remove(key).is_some()))
    }

    fn select(&self, table: &str, key: &KeyValue) -> StoreResult<Option<Row>> {
        self.ensure_open()?;
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;

        Ok(t.rows.get(key).cloned())
    }

    fn select_by_column(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> StoreResult<Vec<(KeyValue, Row)>> {
        self.ensure_open()?;
        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| StoreError::table_not_found(table))?;

        Ok(t.rows
            .iter()
            .filter(|(_, row)| row.get(column) == Some(value))
            .map(|(k, row)| (k.clone(), row.clone()))
            .collect())
    }

    fn close(&mut self) -> StoreResult<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_table(name: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table(name);
        store
    }

    fn row(name: &str, age: i64) -> Row {
        Row::from_iter([("name", Value::text(name)), ("age", Value::Int(age))])
    }

    #[test]
    fn insert_generates_sequential_keys() {
        let store = store_with_table("users");
        let mut conn = store.connect();

        let k1 = conn.insert("users", None, row("a", 1)).unwrap();
        let k2 = conn.insert("users", None, row("b", 2)).unwrap();

        assert_eq!(k1, KeyValue::Int(1));
        assert_eq!(k2, KeyValue::Int(2));
    }

    #[test]
    fn insert_with_supplied_key() {
        let store = store_with_table("users");
        let mut conn = store.connect();

        let key = conn
            .insert("users", Some(KeyValue::Int(42)), row("a", 1))
            .unwrap();
        assert_eq!(key, KeyValue::Int(42));

        // Generator stays ahead of supplied keys
        let next = conn.insert("users", None, row("b", 2)).unwrap();
        assert_eq!(next, KeyValue::Int(43));
    }

    #[test]
    fn insert_duplicate_key_fails() {
        let store = store_with_table("users");
        let mut conn = store.connect();

        conn.insert("users", Some(KeyValue::Int(1)), row("a", 1))
            .unwrap();
        let result = conn.insert("users", Some(KeyValue::Int(1)), row("b", 2));

        assert!(matches!(result, Err(StoreError::DuplicateKey { .. })));
    }

    #[test]
    fn unknown_table_fails() {
        let store = MemoryStore::new();
        let mut conn = store.connect();

        let result = conn.insert("nope", None, Row::new());
        assert!(matches!(result, Err(StoreError::TableNotFound { .. })));

        let result = conn.select("nope", &KeyValue::Int(1));
        assert!(matches!(result, Err(StoreError::TableNotFound { .. })));
    }

    #[test]
    fn update_applies_partial_row() {
        let store = store_with_table("users");
        let mut conn = store.connect();
        let key = conn.insert("users", None, row("John", 20)).unwrap();

        let update = Row::from_iter([("name", Value::text("James"))]);
        let affected = conn.update("users", &key, update).unwrap();
        assert_eq!(affected, 1);

        let stored = conn.select("users", &key).unwrap().unwrap();
        assert_eq!(stored.get("name"), Some(&Value::text("James")));
        assert_eq!(stored.get("age"), Some(&Value::Int(20)));
    }

    #[test]
    fn update_missing_key_affects_zero_rows() {
        let store = store_with_table("users");
        let mut conn = store.connect();

        let affected = conn.update("users", &KeyValue::Int(9), Row::new()).unwrap();
        assert_eq!(affected, 0);
    }

    #[test]
    fn delete_reports_rows_affected() {
        let store = store_with_table("users");
        let mut conn = store.connect();
        let key = conn.insert("users", None, row("a", 1)).unwrap();

        assert_eq!(conn.delete("users", &key).unwrap(), 1);
        assert_eq!(conn.delete("users", &key).unwrap(), 0);
        assert!(conn.select("users", &key).unwrap().is_none());
    }

    #[test]
    fn select_by_column_filters() {
        let store = store_with_table("person");
        let mut conn = store.connect();

        let mut r1 = row("a", 1);
        r1.set("team_id", Value::Int(7));
        let mut r2 = row("b", 2);
        r2.set("team_id", Value::Int(7));
        let mut r3 = row("c", 3);
        r3.set("team_id", Value::Int(8));

        conn.insert("person", None, r1).unwrap();
        conn.insert("person", None, r2).unwrap();
        conn.insert("person", None, r3).unwrap();

        let rows = conn
            .select_by_column("person", "team_id", &Value::Int(7))
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn connections_share_tables() {
        let store = store_with_table("users");
        let mut c1 = store.connect();
        let key = c1.insert("users", None, row("a", 1)).unwrap();
        c1.close().unwrap();

        let c2 = store.connect();
        assert!(c2.select("users", &key).unwrap().is_some());
    }

    #[test]
    fn closed_connection_rejects_operations() {
        let store = store_with_table("users");
        let mut conn = store.connect();

        conn.close().unwrap();
        assert!(conn.is_closed());
        // Closing twice is a no-op
        conn.close().unwrap();

        let result = conn.select("users", &KeyValue::Int(1));
        assert!(matches!(result, Err(StoreError::ConnectionClosed)));
    }

    #[test]
    fn row_count_tracks_inserts_and_deletes() {
        let store = store_with_table("users");
        let mut conn = store.connect();

        assert_eq!(store.row_count("users").unwrap(), 0);
        let key = conn.insert("users", None, row("a", 1)).unwrap();
        assert_eq!(store.row_count("users").unwrap(), 1);
        conn.delete("users", &key).unwrap();
        assert_eq!(store.row_count("users").unwrap(), 0);
    }
}
