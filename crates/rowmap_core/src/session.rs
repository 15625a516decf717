//! Sessions and the session factory.
//!
//! A [`Session`] is one unit of work: it owns a store connection, an
//! identity map, an action queue, and the listener set, and exposes the
//! find/persist/merge/remove operations. A [`SessionFactory`] holds the
//! entity registry and hands out sessions one at a time.

use crate::action::{ActionQueue, FlushMode};
use crate::assoc::Association;
use crate::context::{EntityKey, EntityStatus, Managed, PersistenceContext};
use crate::error::{CoreError, CoreResult};
use crate::event::{
    DeleteEvent, EventPublisher, FlushEvent, LoadEvent, MergeEvent, PersistEvent, SessionContext,
};
use crate::schema::{Entity, EntityMetadata, MetadataRegistry};
use crate::write::SharedConnection;
use rowmap_store::{KeyValue, StoreConnection};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{error, info, warn};

/// One unit of work over one store connection.
///
/// A session is single-threaded and exclusive: its factory refuses to
/// open a second session until this one is closed. All entity access
/// inside the unit of work goes through the session so the identity
/// map stays authoritative.
pub struct Session {
    conn: SharedConnection,
    registry: Rc<MetadataRegistry>,
    publisher: EventPublisher,
    context: PersistenceContext,
    queue: ActionQueue,
    flush_mode: FlushMode,
    slot: Rc<Cell<bool>>,
    closed: bool,
}

impl Session {
    fn new(
        conn: Box<dyn StoreConnection>,
        registry: Rc<MetadataRegistry>,
        slot: Rc<Cell<bool>>,
    ) -> Self {
        let conn: SharedConnection = Rc::new(RefCell::new(conn));
        let publisher = EventPublisher::new(&conn);
        Self {
            conn,
            registry,
            publisher,
            context: PersistenceContext::new(),
            queue: ActionQueue::new(),
            flush_mode: FlushMode::default(),
            slot,
            closed: false,
        }
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed {
            return Err(CoreError::illegal_state("session is closed"));
        }
        Ok(())
    }

    /// Returns the managed instance for `(T, id)`, loading it from the
    /// store on the first access within this unit of work.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no row exists for the identifier or it
    /// was removed earlier in this session.
    pub fn find<T: Entity>(&mut self, id: impl Into<KeyValue>) -> CoreResult<Managed<T>> {
        self.ensure_open()?;
        self.registry.expect_registered::<T>()?;
        let mut ctx = SessionContext {
            context: &mut self.context,
            queue: &mut self.queue,
            flush_mode: self.flush_mode,
        };
        self.publisher.on_load(LoadEvent::of(id.into()), &mut ctx)
    }

    /// Makes a transient entity managed and schedules or performs its
    /// insert, returning the managed handle.
    ///
    /// When the entity's identifier is store-generated and unset, the
    /// insert runs immediately regardless of flush mode and the handle
    /// carries the generated identifier on return.
    pub fn persist<T: Entity>(&mut self, entity: T) -> CoreResult<Managed<T>> {
        self.ensure_open()?;
        self.registry.expect_registered::<T>()?;
        let mut ctx = SessionContext {
            context: &mut self.context,
            queue: &mut self.queue,
            flush_mode: self.flush_mode,
        };
        self.publisher.on_persist(PersistEvent::of(entity), &mut ctx)
    }

    /// Merges detached state onto the managed instance with the same
    /// identifier, writing only the columns that differ from the
    /// snapshot. A merge whose values all match is a no-op.
    pub fn merge<T: Entity>(&mut self, entity: T) -> CoreResult<Managed<T>> {
        self.ensure_open()?;
        self.registry.expect_registered::<T>()?;
        let mut ctx = SessionContext {
            context: &mut self.context,
            queue: &mut self.queue,
            flush_mode: self.flush_mode,
        };
        self.publisher.on_merge(MergeEvent::of(entity), &mut ctx)
    }

    /// Removes the entity under `id` from the unit of work and
    /// schedules its physical delete. Idempotent.
    pub fn remove<T: Entity>(&mut self, id: impl Into<KeyValue>) -> CoreResult<()> {
        self.ensure_open()?;
        self.registry.expect_registered::<T>()?;
        let mut ctx = SessionContext {
            context: &mut self.context,
            queue: &mut self.queue,
            flush_mode: self.flush_mode,
        };
        self.publisher.on_delete(DeleteEvent::<T>::of(id.into()), &mut ctx)
    }

    /// Executes every queued write in enqueue order.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        let mut ctx = SessionContext {
            context: &mut self.context,
            queue: &mut self.queue,
            flush_mode: self.flush_mode,
        };
        self.publisher.on_flush(FlushEvent, &mut ctx)
    }

    /// Detaches every managed instance and drops all queued writes
    /// without executing them.
    pub fn clear(&mut self) {
        self.context.clear();
        self.queue.clear();
    }

    /// Returns true if a live managed instance exists for `(T, id)`.
    #[must_use]
    pub fn contains<T: Entity>(&self, id: &KeyValue) -> bool {
        self.context.get::<T>(id).is_some()
    }

    /// Marks the managed instance for `(T, id)` read-only. Later
    /// merges and removes against it fail.
    pub fn mark_read_only<T: Entity>(&mut self, id: impl Into<KeyValue>) -> CoreResult<()> {
        self.ensure_open()?;
        let key = EntityKey::of::<T>(id.into());
        self.context.transition(&key, EntityStatus::ReadOnly)
    }

    /// Resolves a lazy association through this session's connection,
    /// reading the store only on the first access.
    pub fn load_association<'a, T: Entity>(
        &self,
        assoc: &'a mut Association<T>,
    ) -> CoreResult<&'a [T]> {
        self.ensure_open()?;
        self.registry.expect_registered::<T>()?;
        assoc.get_or_load(self.publisher.loader())
    }

    /// Returns the registered descriptor for `T`.
    pub fn metadata<T: Entity>(&self) -> CoreResult<&'static EntityMetadata> {
        self.registry.expect_registered::<T>()
    }

    /// Switches the flush mode.
    ///
    /// Already queued actions stay queued; only future operations are
    /// affected.
    pub fn set_flush_mode(&mut self, mode: FlushMode) {
        self.flush_mode = mode;
    }

    /// Returns the active flush mode.
    #[must_use]
    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    /// Flushes pending writes, detaches everything, releases the
    /// factory slot, and closes the connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Propagates a flush failure first; the slot and connection are
    /// released either way. A connection that fails to close surfaces
    /// as a resource error.
    pub fn close(&mut self) -> CoreResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let flush_result = {
            let mut ctx = SessionContext {
                context: &mut self.context,
                queue: &mut self.queue,
                flush_mode: self.flush_mode,
            };
            self.publisher.on_flush(FlushEvent, &mut ctx)
        };
        self.context.clear();
        self.queue.clear();
        self.slot.set(false);

        let close_result = self.conn.borrow_mut().close();
        info!("session closed");

        flush_result?;
        close_result.map_err(|err| {
            error!(error = %err, "closing store connection failed");
            CoreError::resource(err.to_string())
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            if !self.queue.is_empty() {
                warn!(
                    actions = self.queue.len(),
                    "session dropped without close, discarding queued writes"
                );
            }
            self.slot.set(false);
            if let Err(err) = self.conn.borrow_mut().close() {
                warn!(error = %err, "closing store connection failed during drop");
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("flush_mode", &self.flush_mode)
            .field("queued", &self.queue.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Opens sessions over caller-supplied store connections.
///
/// The factory owns the entity registry and enforces exclusivity: at
/// most one of its sessions is open at a time, and opening another
/// before closing the first is an illegal state.
#[derive(Debug)]
pub struct SessionFactory {
    registry: Rc<MetadataRegistry>,
    slot: Rc<Cell<bool>>,
}

impl SessionFactory {
    /// Creates a factory over a registry of entity types.
    #[must_use]
    pub fn new(registry: MetadataRegistry) -> Self {
        Self {
            registry: Rc::new(registry),
            slot: Rc::new(Cell::new(false)),
        }
    }

    /// Opens a session over `conn`.
    ///
    /// # Errors
    ///
    /// Returns an illegal-state error while a previously opened session
    /// is still live.
    pub fn open_session(&self, conn: Box<dyn StoreConnection>) -> CoreResult<Session> {
        if self.slot.get() {
            return Err(CoreError::illegal_state(
                "a session is already open for this factory",
            ));
        }
        self.slot.set(true);
        info!("session opened");
        Ok(Session::new(
            conn,
            Rc::clone(&self.registry),
            Rc::clone(&self.slot),
        ))
    }

    /// Returns true if a session opened by this factory is still live.
    #[must_use]
    pub fn has_open_session(&self) -> bool {
        self.slot.get()
    }
}
