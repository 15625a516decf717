//! Listener for delete events.

use crate::action::EntityAction;
use crate::context::{EntityKey, EntityStatus};
use crate::error::CoreResult;
use crate::event::{DeleteEvent, SessionContext};
use crate::schema::Entity;
use crate::write::Persister;
use tracing::trace;

/// Removes an entity from the unit of work and schedules its physical
/// delete.
///
/// Removal is idempotent: deleting an identifier that is untracked or
/// already removed is a no-op. After removal the entry stays in the
/// context as a tombstone, so a later load of the same identifier
/// reports not-found even while the physical delete is still queued.
#[derive(Debug)]
pub struct DeleteListener {
    persister: Persister,
}

impl DeleteListener {
    pub(crate) fn new(persister: Persister) -> Self {
        Self { persister }
    }

    /// Removes the entity under the event's identifier.
    ///
    /// # Errors
    ///
    /// Returns an illegal-state error when the entity is read-only.
    pub fn on_delete<T: Entity>(
        &self,
        event: DeleteEvent<T>,
        ctx: &mut SessionContext<'_>,
    ) -> CoreResult<()> {
        let meta = T::metadata();
        let key = EntityKey::of::<T>(event.id.clone());
        match ctx.context.status(&key) {
            None | Some(EntityStatus::Deleted | EntityStatus::Gone) => {
                trace!(entity = meta.entity, id = %event.id, "remove is a no-op");
                return Ok(());
            }
            Some(_) => {}
        }

        ctx.context.transition(&key, EntityStatus::Deleted)?;
        ctx.schedule(
            EntityAction::Delete {
                meta,
                key: event.id,
            },
            &self.persister,
        )?;
        ctx.context.transition(&key, EntityStatus::Gone)?;
        ctx.context.remove_snapshot(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionQueue, FlushMode};
    use crate::error::CoreError;
    use crate::event::{LoadEvent, LoadListener};
    use crate::testutil::{empty_context, person_store, seed_person, Person};
    use crate::write::Loader;
    use rowmap_store::KeyValue;

    #[test]
    fn delete_removes_row_and_tombstones_the_key() {
        let (store, conn) = person_store();
        seed_person(&store, 1, "John");
        let load = LoadListener::new(Loader::new(conn.clone()));
        let delete = DeleteListener::new(Persister::new(conn.clone()));

        let mut context = empty_context();
        let mut queue = ActionQueue::new();
        let mut ctx = SessionContext {
            context: &mut context,
            queue: &mut queue,
            flush_mode: FlushMode::Auto,
        };

        load.on_load(LoadEvent::<Person>::of(KeyValue::Int(1)), &mut ctx)
            .unwrap();
        delete
            .on_delete(DeleteEvent::<Person>::of(KeyValue::Int(1)), &mut ctx)
            .unwrap();

        assert_eq!(store.row_count("person").unwrap(), 0);
        let result = load.on_load(LoadEvent::<Person>::of(KeyValue::Int(1)), &mut ctx);
        assert!(matches!(result, Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn deleted_key_stays_unobservable_while_delete_is_queued() {
        let (store, conn) = person_store();
        seed_person(&store, 1, "John");
        let load = LoadListener::new(Loader::new(conn.clone()));
        let delete = DeleteListener::new(Persister::new(conn.clone()));

        let mut context = empty_context();
        let mut queue = ActionQueue::new();
        let mut ctx = SessionContext {
            context: &mut context,
            queue: &mut queue,
            flush_mode: FlushMode::Commit,
        };

        load.on_load(LoadEvent::<Person>::of(KeyValue::Int(1)), &mut ctx)
            .unwrap();
        delete
            .on_delete(DeleteEvent::<Person>::of(KeyValue::Int(1)), &mut ctx)
            .unwrap();

        // Physical row still present, logically removed
        assert_eq!(store.row_count("person").unwrap(), 1);
        assert_eq!(ctx.queue.len(), 1);
        let result = load.on_load(LoadEvent::<Person>::of(KeyValue::Int(1)), &mut ctx);
        assert!(matches!(result, Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn second_delete_is_a_no_op() {
        let (store, conn) = person_store();
        seed_person(&store, 1, "John");
        let load = LoadListener::new(Loader::new(conn.clone()));
        let delete = DeleteListener::new(Persister::new(conn.clone()));

        let mut context = empty_context();
        let mut queue = ActionQueue::new();
        let mut ctx = SessionContext {
            context: &mut context,
            queue: &mut queue,
            flush_mode: FlushMode::Auto,
        };

        load.on_load(LoadEvent::<Person>::of(KeyValue::Int(1)), &mut ctx)
            .unwrap();
        delete
            .on_delete(DeleteEvent::<Person>::of(KeyValue::Int(1)), &mut ctx)
            .unwrap();
        delete
            .on_delete(DeleteEvent::<Person>::of(KeyValue::Int(1)), &mut ctx)
            .unwrap();

        assert_eq!(store.row_count("person").unwrap(), 0);
    }

    #[test]
    fn delete_of_untracked_identifier_is_a_no_op() {
        let (store, conn) = person_store();
        seed_person(&store, 1, "John");
        let delete = DeleteListener::new(Persister::new(conn));

        let mut context = empty_context();
        let mut queue = ActionQueue::new();
        let mut ctx = SessionContext {
            context: &mut context,
            queue: &mut queue,
            flush_mode: FlushMode::Auto,
        };

        delete
            .on_delete(DeleteEvent::<Person>::of(KeyValue::Int(1)), &mut ctx)
            .unwrap();

        // Never managed in this unit of work, so nothing happened
        assert_eq!(store.row_count("person").unwrap(), 1);
    }

    #[test]
    fn delete_of_read_only_entity_fails() {
        let (store, conn) = person_store();
        seed_person(&store, 1, "John");
        let load = LoadListener::new(Loader::new(conn.clone()));
        let delete = DeleteListener::new(Persister::new(conn.clone()));

        let mut context = empty_context();
        let mut queue = ActionQueue::new();
        let mut ctx = SessionContext {
            context: &mut context,
            queue: &mut queue,
            flush_mode: FlushMode::Auto,
        };

        load.on_load(LoadEvent::<Person>::of(KeyValue::Int(1)), &mut ctx)
            .unwrap();
        let key = EntityKey::of::<Person>(KeyValue::Int(1));
        ctx.context.transition(&key, EntityStatus::ReadOnly).unwrap();

        let result = delete.on_delete(DeleteEvent::<Person>::of(KeyValue::Int(1)), &mut ctx);
        assert!(matches!(result, Err(CoreError::IllegalState { .. })));
        assert_eq!(store.row_count("person").unwrap(), 1);
    }
}
