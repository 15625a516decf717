//! Listener for load events.

use crate::context::{EntityKey, EntityStatus, Managed, Snapshot};
use crate::error::{CoreError, CoreResult};
use crate::event::{LoadEvent, SessionContext};
use crate::schema::Entity;
use crate::write::Loader;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Resolves a load against the identity map first and the store
/// second, so repeated loads of one identifier within a unit of work
/// observe the same instance.
#[derive(Debug)]
pub struct LoadListener {
    loader: Loader,
}

impl LoadListener {
    pub(crate) fn new(loader: Loader) -> Self {
        Self { loader }
    }

    pub(crate) fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Returns the managed instance for the event's identifier,
    /// reading the row from the store only on an identity-map miss.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no row exists for the identifier, or
    /// when the identifier was removed earlier in this unit of work
    /// (even if the physical delete is still queued).
    pub fn on_load<T: Entity>(
        &self,
        event: LoadEvent<T>,
        ctx: &mut SessionContext<'_>,
    ) -> CoreResult<Managed<T>> {
        let meta = T::metadata();
        if let Some(handle) = ctx.context.get::<T>(&event.id) {
            trace!(entity = meta.entity, id = %event.id, "identity map hit");
            return Ok(handle);
        }

        let key = EntityKey::of::<T>(event.id.clone());
        match ctx.context.status(&key) {
            // Removed in this unit of work; the store row may still
            // exist while the delete is queued, but it must not be
            // observable again.
            Some(EntityStatus::Deleted | EntityStatus::Gone) => {
                return Err(CoreError::not_found(meta.entity, event.id));
            }
            Some(status) => {
                return Err(CoreError::illegal_state(format!(
                    "cannot load {key} while it is {status:?}"
                )));
            }
            None => {}
        }

        ctx.context.begin_loading(key.clone())?;
        let row = match self.loader.find_by_id(meta, &event.id) {
            Ok(Some(row)) => row,
            Ok(None) => {
                ctx.context.abandon_loading(&key);
                return Err(CoreError::not_found(meta.entity, event.id));
            }
            Err(err) => {
                ctx.context.abandon_loading(&key);
                return Err(err);
            }
        };
        let entity = match T::from_row(&event.id, &row) {
            Ok(entity) => entity,
            Err(err) => {
                ctx.context.abandon_loading(&key);
                return Err(err);
            }
        };

        let snapshot = Snapshot::of(&entity);
        let handle: Managed<T> = Rc::new(RefCell::new(entity));
        ctx.context.put(event.id, &handle, EntityStatus::Managed)?;
        ctx.context.save_snapshot(key, snapshot);
        Ok(handle)
    }
}
