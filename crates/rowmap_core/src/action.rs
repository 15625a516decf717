//! Deferred write ordering.

use crate::error::CoreResult;
use crate::schema::EntityMetadata;
use crate::write::Persister;
use rowmap_store::{KeyValue, Row};
use std::collections::VecDeque;
use tracing::debug;

/// When physical writes run relative to the mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// Every mutating operation executes its write immediately; the
    /// action queue is bypassed.
    #[default]
    Auto,
    /// Mutating operations enqueue; writes materialize on `flush()`
    /// or on session close.
    Commit,
}

/// A deferred unit of physical work: one insert, update, or delete
/// plus the data needed to perform it.
///
/// Actions of any kind execute strictly in enqueue order; there is no
/// reordering or coalescing across kinds.
#[derive(Debug, Clone)]
pub enum EntityAction {
    /// Insert a row under a caller-supplied key.
    Insert {
        /// Descriptor of the target entity type.
        meta: &'static EntityMetadata,
        /// The supplied key.
        key: KeyValue,
        /// The row to insert.
        row: Row,
    },
    /// Apply a partial row onto a stored row.
    Update {
        /// Descriptor of the target entity type.
        meta: &'static EntityMetadata,
        /// The key of the row to update.
        key: KeyValue,
        /// The changed columns only.
        row: Row,
    },
    /// Delete a stored row.
    Delete {
        /// Descriptor of the target entity type.
        meta: &'static EntityMetadata,
        /// The key of the row to delete.
        key: KeyValue,
    },
}

impl EntityAction {
    pub(crate) fn execute(&self, persister: &Persister) -> CoreResult<()> {
        match self {
            Self::Insert { meta, key, row } => {
                persister.insert(meta, Some(key.clone()), row.clone())?;
            }
            Self::Update { meta, key, row } => {
                persister.update(meta, key, row.clone())?;
            }
            Self::Delete { meta, key } => {
                persister.delete(meta, key)?;
            }
        }
        Ok(())
    }
}

/// FIFO queue of deferred write actions for one unit of work.
///
/// Created per session, appended to by listeners in manual flush
/// mode, drained by `flush()` or session close, and owned exclusively
/// by one session.
#[derive(Debug, Default)]
pub struct ActionQueue {
    actions: VecDeque<EntityAction>,
}

impl ActionQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action, preserving FIFO order.
    pub fn append(&mut self, action: EntityAction) {
        self.actions.push_back(action);
    }

    /// Executes every queued action in enqueue order.
    ///
    /// Each action is removed only after it succeeds. A failure aborts
    /// the drain and propagates; already-executed actions remain
    /// committed at the store and the failed action plus everything
    /// behind it stays queued.
    pub fn execute_all(&mut self, persister: &Persister) -> CoreResult<()> {
        if !self.actions.is_empty() {
            debug!(actions = self.actions.len(), "draining action queue");
        }
        while let Some(action) = self.actions.front() {
            action.execute(persister)?;
            self.actions.pop_front();
        }
        Ok(())
    }

    /// Empties the queue without executing anything.
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Returns the number of queued actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
