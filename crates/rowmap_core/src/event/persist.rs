//! Listener for persist events.

use crate::action::EntityAction;
use crate::context::{EntityStatus, Managed, Snapshot};
use crate::error::{CoreError, CoreResult};
use crate::event::{PersistEvent, SessionContext};
use crate::schema::{Entity, EntityIdentifier};
use crate::write::Persister;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// Turns a transient entity into a managed one.
///
/// The write path is decided from the identifier state before any
/// physical call. A store-generated identifier that is still unset
/// forces the insert to run immediately, in either flush mode, because
/// the instance cannot be keyed into the identity map without it. A
/// supplied identifier goes through the normal scheduling path, so in
/// manual flush mode the insert waits in the queue.
#[derive(Debug)]
pub struct PersistListener {
    persister: Persister,
}

impl PersistListener {
    pub(crate) fn new(persister: Persister) -> Self {
        Self { persister }
    }

    /// Registers the entity and schedules or performs its insert,
    /// returning the managed handle.
    ///
    /// Persisting an identifier that is already managed returns the
    /// existing instance untouched.
    ///
    /// # Errors
    ///
    /// Returns an illegal-state error when the identifier is unset
    /// under the assigned strategy.
    pub fn on_persist<T: Entity>(
        &self,
        event: PersistEvent<T>,
        ctx: &mut SessionContext<'_>,
    ) -> CoreResult<Managed<T>> {
        let meta = T::metadata();
        let mut entity = event.entity;
        let ident = EntityIdentifier::resolve(&entity)?;

        if let Some(key) = ident.key() {
            if let Some(existing) = ctx.context.get::<T>(key) {
                trace!(entity = meta.entity, id = %key, "already managed");
                return Ok(existing);
            }
        }

        let key = if ident.requires_generated_key() {
            let key = self.persister.insert(meta, None, entity.to_row())?;
            entity.set_id_value(key.clone().into_value());
            key
        } else {
            match ident.key() {
                Some(key) => key.clone(),
                None => {
                    return Err(CoreError::illegal_state(format!(
                        "cannot persist {}: assigned identifier is unset",
                        meta.entity
                    )));
                }
            }
        };

        let snapshot = Snapshot::of(&entity);
        let row = entity.to_row();
        let handle: Managed<T> = Rc::new(RefCell::new(entity));
        let entity_key = ctx
            .context
            .put(key.clone(), &handle, EntityStatus::Managed)?;
        ctx.context.save_snapshot(entity_key, snapshot);

        if !ident.requires_generated_key() {
            ctx.schedule(EntityAction::Insert { meta, key, row }, &self.persister)?;
        }
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionQueue, FlushMode};
    use crate::context::EntityKey;
    use crate::testutil::{empty_context, person_store, Person};
    use rowmap_store::KeyValue;

    fn listener(conn: &crate::write::SharedConnection) -> PersistListener {
        PersistListener::new(Persister::new(conn.clone()))
    }

    #[test]
    fn generated_id_inserts_immediately_even_in_manual_mode() {
        let (store, conn) = person_store();
        let listener = listener(&conn);

        let mut context = empty_context();
        let mut queue = ActionQueue::new();
        let mut ctx = SessionContext {
            context: &mut context,
            queue: &mut queue,
            flush_mode: FlushMode::Commit,
        };

        let handle = listener
            .on_persist(PersistEvent::of(Person::new(None, "John")), &mut ctx)
            .unwrap();

        // Key was generated and written back
        let id = handle.borrow().id.unwrap();
        assert_eq!(store.row_count("person").unwrap(), 1);
        assert!(ctx.queue.is_empty());
        assert!(ctx
            .context
            .get::<Person>(&KeyValue::Int(id))
            .is_some());
    }

    #[test]
    fn supplied_id_defers_insert_in_manual_mode() {
        let (store, conn) = person_store();
        let listener = listener(&conn);

        let mut context = empty_context();
        let mut queue = ActionQueue::new();
        let mut ctx = SessionContext {
            context: &mut context,
            queue: &mut queue,
            flush_mode: FlushMode::Commit,
        };

        listener
            .on_persist(PersistEvent::of(Person::new(Some(1), "James")), &mut ctx)
            .unwrap();

        // Managed in memory, not yet physically inserted
        assert!(ctx.context.get::<Person>(&KeyValue::Int(1)).is_some());
        assert_eq!(store.row_count("person").unwrap(), 0);
        assert_eq!(ctx.queue.len(), 1);
    }

    #[test]
    fn supplied_id_inserts_immediately_in_auto_mode() {
        let (store, conn) = person_store();
        let listener = listener(&conn);

        let mut context = empty_context();
        let mut queue = ActionQueue::new();
        let mut ctx = SessionContext {
            context: &mut context,
            queue: &mut queue,
            flush_mode: FlushMode::Auto,
        };

        listener
            .on_persist(PersistEvent::of(Person::new(Some(1), "James")), &mut ctx)
            .unwrap();

        assert_eq!(store.row_count("person").unwrap(), 1);
        assert!(ctx.queue.is_empty());
    }

    #[test]
    fn repersisting_a_managed_id_returns_existing_instance() {
        let (store, conn) = person_store();
        let listener = listener(&conn);

        let mut context = empty_context();
        let mut queue = ActionQueue::new();
        let mut ctx = SessionContext {
            context: &mut context,
            queue: &mut queue,
            flush_mode: FlushMode::Auto,
        };

        let first = listener
            .on_persist(PersistEvent::of(Person::new(Some(1), "James")), &mut ctx)
            .unwrap();
        let second = listener
            .on_persist(PersistEvent::of(Person::new(Some(1), "other")), &mut ctx)
            .unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.borrow().name, "James");
        assert_eq!(store.row_count("person").unwrap(), 1);
    }

    #[test]
    fn assigned_strategy_with_unset_id_is_rejected() {
        use crate::schema::{ColumnMeta, EntityMetadata, IdColumnMeta, IdStrategy};
        use rowmap_store::{Row, Value};

        #[derive(Debug)]
        struct Tag {
            id: Option<String>,
            label: String,
        }

        static TAG_META: EntityMetadata = EntityMetadata {
            entity: "Tag",
            table: "tag",
            id: IdColumnMeta {
                name: "id",
                strategy: IdStrategy::Assigned,
            },
            columns: &[ColumnMeta { name: "label" }],
            associations: &[],
        };

        impl Entity for Tag {
            fn metadata() -> &'static EntityMetadata {
                &TAG_META
            }
            fn id_value(&self) -> Value {
                self.id.clone().map_or(Value::Null, Value::Text)
            }
            fn set_id_value(&mut self, id: Value) {
                self.id = id.as_text().map(str::to_string);
            }
            fn to_row(&self) -> Row {
                Row::from_iter([("label", Value::text(self.label.clone()))])
            }
            fn from_row(id: &KeyValue, row: &Row) -> CoreResult<Self> {
                Ok(Self {
                    id: match id {
                        KeyValue::Text(v) => Some(v.clone()),
                        KeyValue::Int(_) => None,
                    },
                    label: row
                        .get("label")
                        .and_then(Value::as_text)
                        .unwrap_or_default()
                        .to_string(),
                })
            }
        }

        let (_store, conn) = person_store();
        let listener = listener(&conn);

        let mut context = empty_context();
        let mut queue = ActionQueue::new();
        let mut ctx = SessionContext {
            context: &mut context,
            queue: &mut queue,
            flush_mode: FlushMode::Auto,
        };

        let result = listener.on_persist(
            PersistEvent::of(Tag {
                id: None,
                label: "x".into(),
            }),
            &mut ctx,
        );
        assert!(matches!(result, Err(CoreError::IllegalState { .. })));
    }

    #[test]
    fn snapshot_is_taken_at_persist_time() {
        let (_store, conn) = person_store();
        let listener = listener(&conn);

        let mut context = empty_context();
        let mut queue = ActionQueue::new();
        let mut ctx = SessionContext {
            context: &mut context,
            queue: &mut queue,
            flush_mode: FlushMode::Auto,
        };

        listener
            .on_persist(PersistEvent::of(Person::new(Some(1), "James")), &mut ctx)
            .unwrap();

        let key = EntityKey::of::<Person>(KeyValue::Int(1));
        let snap = ctx.context.snapshot(&key).unwrap();
        assert!(snap.is_same_as(&Snapshot::of(&Person::new(Some(1), "James"))));
    }
}
