//! Error types for store connections.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The named table does not exist.
    #[error("table not found: {table}")]
    TableNotFound {
        /// Name of the table.
        table: String,
    },

    /// An insert supplied a key that is already present.
    #[error("duplicate key {key} in table {table}")]
    DuplicateKey {
        /// The table where the collision occurred.
        table: String,
        /// Display form of the colliding key.
        key: String,
    },

    /// A value was used as a key but is not a legal key type.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of why the value is not usable as a key.
        message: String,
    },

    /// The connection has been closed.
    #[error("store connection is closed")]
    ConnectionClosed,
}

impl StoreError {
    /// Creates a table-not-found error.
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    /// Creates a duplicate-key error.
    pub fn duplicate_key(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Creates an invalid-key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}
