//! Typed lifecycle events and their listeners.
//!
//! Every session operation becomes a typed event published through
//! [`EventPublisher`], which routes each event kind to exactly one
//! listener. Listeners receive a [`SessionContext`] view of the
//! session's persistence context and action queue for the duration of
//! the call and never retain it.

mod delete;
mod flush;
mod load;
mod merge;
mod persist;

pub use delete::DeleteListener;
pub use flush::FlushListener;
pub use load::LoadListener;
pub use merge::MergeListener;
pub use persist::PersistListener;

use crate::action::{ActionQueue, EntityAction, FlushMode};
use crate::context::{Managed, PersistenceContext};
use crate::error::CoreResult;
use crate::schema::Entity;
use crate::write::{Loader, Persister, SharedConnection};
use rowmap_store::KeyValue;
use std::marker::PhantomData;

/// Requests a load of `(T, id)`.
#[derive(Debug)]
pub struct LoadEvent<T: Entity> {
    /// The identifier to load.
    pub id: KeyValue,
    _marker: PhantomData<T>,
}

impl<T: Entity> LoadEvent<T> {
    /// Creates a load event.
    #[must_use]
    pub fn of(id: KeyValue) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }
}

/// Requests that a transient entity become managed.
#[derive(Debug)]
pub struct PersistEvent<T: Entity> {
    /// The entity to persist.
    pub entity: T,
}

impl<T: Entity> PersistEvent<T> {
    /// Creates a persist event.
    #[must_use]
    pub fn of(entity: T) -> Self {
        Self { entity }
    }
}

/// Requests that detached state be merged onto the managed instance
/// carrying the same identifier.
#[derive(Debug)]
pub struct MergeEvent<T: Entity> {
    /// The detached entity.
    pub entity: T,
}

impl<T: Entity> MergeEvent<T> {
    /// Creates a merge event.
    #[must_use]
    pub fn of(entity: T) -> Self {
        Self { entity }
    }
}

/// Requests removal of the entity under `id`.
#[derive(Debug)]
pub struct DeleteEvent<T: Entity> {
    /// The identifier to remove.
    pub id: KeyValue,
    _marker: PhantomData<T>,
}

impl<T: Entity> DeleteEvent<T> {
    /// Creates a delete event.
    #[must_use]
    pub fn of(id: KeyValue) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }
}

/// Requests a drain of the action queue.
#[derive(Debug)]
pub struct FlushEvent;

/// The per-call view a listener works against.
///
/// Bundles mutable borrows of the session's persistence context and
/// action queue with the active flush mode. Constructed fresh for each
/// published event; listeners must not keep it beyond the call.
pub struct SessionContext<'a> {
    /// The session's identity map.
    pub context: &'a mut PersistenceContext,
    /// The session's deferred-write queue.
    pub queue: &'a mut ActionQueue,
    /// The active flush mode.
    pub flush_mode: FlushMode,
}

impl SessionContext<'_> {
    /// Runs a write now (auto mode) or defers it (manual mode).
    pub(crate) fn schedule(
        &mut self,
        action: EntityAction,
        persister: &Persister,
    ) -> CoreResult<()> {
        match self.flush_mode {
            FlushMode::Auto => action.execute(persister),
            FlushMode::Commit => {
                self.queue.append(action);
                Ok(())
            }
        }
    }
}

/// Routes each lifecycle event to the one listener responsible for
/// that event kind. No chaining, no broadcast.
///
/// `on_load` and `on_merge` return the resulting managed instance.
/// `on_persist` always returns a handle usable as the persisted (but
/// possibly not yet flushed) entity; when the identifier is
/// store-generated the insert runs immediately so the handle carries
/// the generated key. `on_delete` and `on_flush` are effect-only.
#[derive(Debug)]
pub struct EventPublisher {
    load: LoadListener,
    persist: PersistListener,
    merge: MergeListener,
    delete: DeleteListener,
    flush: FlushListener,
}

impl EventPublisher {
    /// Builds the default listener set over one connection.
    pub(crate) fn new(conn: &SharedConnection) -> Self {
        Self {
            load: LoadListener::new(Loader::new(conn.clone())),
            persist: PersistListener::new(Persister::new(conn.clone())),
            merge: MergeListener::new(Persister::new(conn.clone())),
            delete: DeleteListener::new(Persister::new(conn.clone())),
            flush: FlushListener::new(Persister::new(conn.clone())),
        }
    }

    /// Publishes a load event.
    pub fn on_load<T: Entity>(
        &self,
        event: LoadEvent<T>,
        ctx: &mut SessionContext<'_>,
    ) -> CoreResult<Managed<T>> {
        self.load.on_load(event, ctx)
    }

    /// Publishes a persist event.
    pub fn on_persist<T: Entity>(
        &self,
        event: PersistEvent<T>,
        ctx: &mut SessionContext<'_>,
    ) -> CoreResult<Managed<T>> {
        self.persist.on_persist(event, ctx)
    }

    /// Publishes a merge event.
    pub fn on_merge<T: Entity>(
        &self,
        event: MergeEvent<T>,
        ctx: &mut SessionContext<'_>,
    ) -> CoreResult<Managed<T>> {
        self.merge.on_merge(event, ctx)
    }

    /// Publishes a delete event.
    pub fn on_delete<T: Entity>(
        &self,
        event: DeleteEvent<T>,
        ctx: &mut SessionContext<'_>,
    ) -> CoreResult<()> {
        self.delete.on_delete(event, ctx)
    }

    /// Publishes a flush event.
    pub fn on_flush(&self, event: FlushEvent, ctx: &mut SessionContext<'_>) -> CoreResult<()> {
        self.flush.on_flush(event, ctx)
    }

    /// Returns the loader shared with the load listener, used for
    /// association resolution.
    pub(crate) fn loader(&self) -> &Loader {
        self.load.loader()
    }
}
