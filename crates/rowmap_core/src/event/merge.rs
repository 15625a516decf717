//! Listener for merge events.

use crate::action::EntityAction;
use crate::context::{EntityKey, EntityStatus, Managed, Snapshot};
use crate::error::{CoreError, CoreResult};
use crate::event::{MergeEvent, SessionContext};
use crate::schema::{Entity, EntityIdentifier};
use crate::write::Persister;
use tracing::trace;

/// Applies detached state onto the managed instance with the same
/// identifier.
///
/// The write is computed by dirty check against the stored snapshot:
/// only columns that actually differ go into the update row, and a
/// merge whose values all match the snapshot performs no write at all.
#[derive(Debug)]
pub struct MergeListener {
    persister: Persister,
}

impl MergeListener {
    pub(crate) fn new(persister: Persister) -> Self {
        Self { persister }
    }

    /// Merges the event's entity state, returning the managed handle.
    ///
    /// # Errors
    ///
    /// Returns an illegal-state error when the identifier is unset,
    /// the target is read-only, or no managed instance and snapshot
    /// exist for the identifier in this unit of work.
    pub fn on_merge<T: Entity>(
        &self,
        event: MergeEvent<T>,
        ctx: &mut SessionContext<'_>,
    ) -> CoreResult<Managed<T>> {
        let meta = T::metadata();
        let ident = EntityIdentifier::resolve(&event.entity)?;
        let key = ident.key().cloned().ok_or_else(|| {
            CoreError::illegal_state(format!(
                "cannot merge {}: identifier is unset",
                meta.entity
            ))
        })?;
        let entity_key = EntityKey::of::<T>(key.clone());

        if ctx.context.status(&entity_key) == Some(EntityStatus::ReadOnly) {
            return Err(CoreError::illegal_state(format!(
                "{entity_key} is read-only"
            )));
        }
        let handle = ctx.context.get::<T>(&key).ok_or_else(|| {
            CoreError::illegal_state(format!(
                "cannot merge {entity_key}: not managed in this unit of work"
            ))
        })?;
        let previous = ctx.context.snapshot(&entity_key).cloned().ok_or_else(|| {
            CoreError::illegal_state(format!("no snapshot recorded for {entity_key}"))
        })?;

        let incoming = Snapshot::of(&event.entity);
        if previous.is_same_as(&incoming) {
            trace!(entity = meta.entity, id = %key, "merge is clean, no write");
            return Ok(handle);
        }

        ctx.context.transition(&entity_key, EntityStatus::Saving)?;
        let changed = previous.changed_columns(&incoming);
        ctx.schedule(
            EntityAction::Update {
                meta,
                key,
                row: changed,
            },
            &self.persister,
        )?;

        *handle.borrow_mut() = event.entity;
        ctx.context.save_snapshot(entity_key.clone(), incoming);
        ctx.context.transition(&entity_key, EntityStatus::Managed)?;
        Ok(handle)
    }
}
