//! Store connection trait definition.

use crate::error::StoreResult;
use crate::value::{KeyValue, Row, Value};

/// A low-level row-store connection.
///
/// Connections are **opaque row stores**. They move untyped rows in and
/// out of named tables keyed by a primary-key value. The persistence
/// engine owns all entity interpretation - connections do not understand
/// identity maps, snapshots, or lifecycle status.
///
/// # Invariants
///
/// - `insert` with `None` key assigns a fresh generated key and returns it
/// - `insert` with a supplied key stores under exactly that key
/// - `update`/`delete` report the number of rows affected (0 or 1)
/// - after `close`, every operation fails with `ConnectionClosed`
///
/// # Implementors
///
/// - [`super::MemoryConnection`] - For testing and ephemeral storage
pub trait StoreConnection {
    /// Inserts a row into `table`.
    ///
    /// When `key` is `None` the store assigns the next generated key.
    /// The key the row was stored under is returned either way.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist, the key is already
    /// present, or the connection is closed.
    fn insert(&mut self, table: &str, key: Option<KeyValue>, row: Row) -> StoreResult<KeyValue>;

    /// Applies `row` onto the row stored under `key` in `table`.
    ///
    /// Columns present in `row` overwrite; absent columns are untouched.
    /// Returns the number of rows affected (0 when the key is absent).
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the connection
    /// is closed.
    fn update(&mut self, table: &str, key: &KeyValue, row: Row) -> StoreResult<u64>;

    /// Deletes the row stored under `key` in `table`.
    ///
    /// Returns the number of rows affected (0 when the key is absent).
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the connection
    /// is closed.
    fn delete(&mut self, table: &str, key: &KeyValue) -> StoreResult<u64>;

    /// Reads the row stored under `key` in `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the connection
    /// is closed.
    fn select(&self, table: &str, key: &KeyValue) -> StoreResult<Option<Row>>;

    /// Reads every row of `table` whose `column` equals `value`.
    ///
    /// This is the foreign-key read used to resolve lazy associations.
    /// Rows are returned with the key they are stored under.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the connection
    /// is closed.
    fn select_by_column(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> StoreResult<Vec<(KeyValue, Row)>>;

    /// Closes the connection.
    ///
    /// Closing an already-closed connection is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing the underlying resources fails.
    fn close(&mut self) -> StoreResult<()>;

    /// Returns true if the connection has been closed.
    fn is_closed(&self) -> bool;
}
