//! Physical reads and writes against the store connection.
//!
//! `Persister` and `Loader` are the only code paths that touch the
//! store. They translate entity metadata plus values into connection
//! calls and propagate store failures unchanged.

use crate::error::CoreResult;
use crate::schema::EntityMetadata;
use rowmap_store::{KeyValue, Row, StoreConnection, Value};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// The connection handle shared between the persister, loader, and
/// session for one unit of work.
pub(crate) type SharedConnection = Rc<RefCell<Box<dyn StoreConnection>>>;

/// Performs physical inserts, updates, and deletes for one entity
/// instance given its metadata and values.
#[derive(Clone)]
pub struct Persister {
    conn: SharedConnection,
}

impl Persister {
    pub(crate) fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Inserts a row; `None` key asks the store to generate one.
    /// Returns the key the row was stored under.
    pub fn insert(
        &self,
        meta: &'static EntityMetadata,
        key: Option<KeyValue>,
        row: Row,
    ) -> CoreResult<KeyValue> {
        debug!(entity = meta.entity, table = meta.table, "insert");
        let stored = self.conn.borrow_mut().insert(meta.table, key, row)?;
        Ok(stored)
    }

    /// Applies a (possibly partial) row onto the stored row.
    pub fn update(
        &self,
        meta: &'static EntityMetadata,
        key: &KeyValue,
        row: Row,
    ) -> CoreResult<u64> {
        debug!(entity = meta.entity, table = meta.table, id = %key, "update");
        let affected = self.conn.borrow_mut().update(meta.table, key, row)?;
        Ok(affected)
    }

    /// Deletes the stored row.
    pub fn delete(&self, meta: &'static EntityMetadata, key: &KeyValue) -> CoreResult<u64> {
        debug!(entity = meta.entity, table = meta.table, id = %key, "delete");
        let affected = self.conn.borrow_mut().delete(meta.table, key)?;
        Ok(affected)
    }
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister").finish_non_exhaustive()
    }
}

/// Performs physical selects for one entity instance or a
/// foreign-key-fetched set.
#[derive(Clone)]
pub struct Loader {
    conn: SharedConnection,
}

impl Loader {
    pub(crate) fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// Reads the row for an identifier, `None` when absent.
    pub fn find_by_id(
        &self,
        meta: &'static EntityMetadata,
        key: &KeyValue,
    ) -> CoreResult<Option<Row>> {
        debug!(entity = meta.entity, table = meta.table, id = %key, "load");
        let row = self.conn.borrow().select(meta.table, key)?;
        Ok(row)
    }

    /// Reads every row of `table` whose `join_column` equals `value`.
    /// Used to resolve lazy to-many associations.
    pub fn find_by_foreign_key(
        &self,
        table: &str,
        join_column: &str,
        value: &Value,
    ) -> CoreResult<Vec<(KeyValue, Row)>> {
        debug!(table, join_column, "load by foreign key");
        let rows = self.conn.borrow().select_by_column(table, join_column, value)?;
        Ok(rows)
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader").finish_non_exhaustive()
    }
}
