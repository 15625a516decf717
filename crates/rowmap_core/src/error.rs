//! Error types for the persistence engine.

use rowmap_store::{KeyValue, StoreError};
use thiserror::Error;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in persistence operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No row exists for the requested identifier.
    #[error("{entity} not found for id {id}")]
    NotFound {
        /// Entity name.
        entity: &'static str,
        /// The identifier that was looked up.
        id: KeyValue,
    },

    /// The operation is not legal in the current state.
    ///
    /// This is always a programming or usage error: an invalid status
    /// transition, a second live instance for a key, a merge against a
    /// read-only entity, a double-open of a session, and so on. It is
    /// never retryable.
    #[error("illegal state: {message}")]
    IllegalState {
        /// Description of the violated rule.
        message: String,
    },

    /// A row could not be mapped onto an entity.
    #[error("row mapping failed for {entity}: {message}")]
    Mapping {
        /// Entity name.
        entity: &'static str,
        /// Description of the mapping failure.
        message: String,
    },

    /// A physical store call failed; propagated unchanged.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Releasing an underlying resource failed.
    #[error("resource release failed: {message}")]
    Resource {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(entity: &'static str, id: KeyValue) -> Self {
        Self::NotFound { entity, id }
    }

    /// Creates an illegal-state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates a row-mapping error.
    pub fn mapping(entity: &'static str, message: impl Into<String>) -> Self {
        Self::Mapping {
            entity,
            message: message.into(),
        }
    }

    /// Creates a resource-release error.
    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource {
            message: message.into(),
        }
    }
}
