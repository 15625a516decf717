//! # rowmap Store
//!
//! Store connection contract and reference implementation for rowmap.
//!
//! This crate provides the lowest-level store abstraction the persistence
//! engine is built on. Connections are **row stores**: they accept and
//! return untyped rows keyed by table name and primary-key value, and
//! know nothing about entities, identity maps, or snapshots. All of that
//! interpretation belongs to `rowmap_core`.
//!
//! ## Design Principles
//!
//! - Connections speak rows and key values, never objects
//! - Every call is synchronous and blocking
//! - No SQL text is owned here; a connection is free to be backed by
//!   anything that can honor the contract
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - In-memory tables for tests and ephemeral use
//!
//! ## Example
//!
//! ```rust
//! use rowmap_store::{MemoryStore, Row, StoreConnection, Value};
//!
//! let store = MemoryStore::new();
//! store.create_table("users");
//!
//! let mut conn = store.connect();
//! let row = Row::from_iter([("name", Value::text("Alice"))]);
//! let key = conn.insert("users", None, row).unwrap();
//! assert!(conn.select("users", &key).unwrap().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conn;
mod error;
mod memory;
mod value;

pub use conn::StoreConnection;
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryConnection, MemoryStore};
pub use value::{KeyValue, Row, Value};
