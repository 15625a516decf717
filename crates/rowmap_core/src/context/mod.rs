//! Persistence context: the identity map and per-instance status.

mod snapshot;

pub use snapshot::{Snapshot, SnapshotStore};

use crate::error::{CoreError, CoreResult};
use crate::schema::Entity;
use rowmap_store::KeyValue;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// The one live in-memory instance of a row within a unit of work.
///
/// A persistence context is single-threaded by contract, so shared
/// ownership is `Rc` and mutation goes through `RefCell`. Instance
/// identity is compared with `Rc::ptr_eq`.
pub type Managed<T> = Rc<RefCell<T>>;

/// Identifies one logical row: entity type plus identifier value.
///
/// Keys are immutable and value-equal; two keys with equal type and
/// identifier are interchangeable. This is the sole index into the
/// persistence context and the snapshot store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    type_id: TypeId,
    entity: &'static str,
    id: KeyValue,
}

impl EntityKey {
    /// Builds the key for entity type `T` and identifier `id`.
    #[must_use]
    pub fn of<T: Entity>(id: KeyValue) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            entity: T::metadata().entity,
            id,
        }
    }

    /// Returns the entity name.
    #[must_use]
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Returns the identifier value.
    #[must_use]
    pub fn id(&self) -> &KeyValue {
        &self.id
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.id)
    }
}

/// Lifecycle status of a managed instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStatus {
    /// A load is in flight; the instance is not yet observable.
    Loading,
    /// Tracked and writable.
    Managed,
    /// Tracked but rejects merges.
    ReadOnly,
    /// An update is in flight.
    Saving,
    /// A delete is in flight; the instance is no longer observable.
    Deleted,
    /// Deleted and detached; about to be purged.
    Gone,
}

impl EntityStatus {
    /// Returns true if a context lookup may observe an instance in
    /// this status.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Managed | Self::ReadOnly | Self::Saving)
    }

    /// Returns true if the transition from `self` to `to` is legal.
    #[must_use]
    pub fn can_transition(self, to: EntityStatus) -> bool {
        matches!(
            (self, to),
            (Self::Loading, Self::Managed)
                | (Self::Managed, Self::ReadOnly)
                | (Self::Managed, Self::Saving)
                | (Self::Managed, Self::Deleted)
                | (Self::Saving, Self::Managed)
                | (Self::Deleted, Self::Gone)
        )
    }
}

/// Book-keeping for one managed instance.
///
/// Every instance physically present in the context has exactly one
/// entry; a `Loading` entry may exist briefly without an instance
/// while the load is in flight.
#[derive(Debug, Clone)]
pub struct EntityEntry {
    key: EntityKey,
    status: EntityStatus,
}

impl EntityEntry {
    fn new(key: EntityKey, status: EntityStatus) -> Self {
        Self { key, status }
    }

    /// Returns the owning key.
    #[must_use]
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> EntityStatus {
        self.status
    }

    fn transition(&mut self, to: EntityStatus) -> CoreResult<()> {
        if self.status.can_transition(to) {
            self.status = to;
            Ok(())
        } else {
            Err(CoreError::illegal_state(format!(
                "invalid status transition {:?} -> {to:?} for {}",
                self.status, self.key
            )))
        }
    }
}

/// The identity map for one unit of work.
///
/// Owns the key-to-instance and key-to-entry maps plus the snapshot
/// store, and is the single source of truth for "is this row already
/// represented in memory". Mutated only by listener logic invoked
/// through the event publisher, never concurrently.
#[derive(Debug, Default)]
pub struct PersistenceContext {
    entities: HashMap<EntityKey, Rc<dyn Any>>,
    entries: HashMap<EntityKey, EntityEntry>,
    snapshots: SnapshotStore,
}

impl PersistenceContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the managed instance for `(T, id)`.
    ///
    /// Only instances in a live status (`Managed`, `ReadOnly`,
    /// `Saving`) are observable; `Loading`, `Deleted`, and `Gone` are
    /// treated as misses so callers never see a half-loaded or removed
    /// instance.
    #[must_use]
    pub fn get<T: Entity>(&self, id: &KeyValue) -> Option<Managed<T>> {
        let key = EntityKey::of::<T>(id.clone());
        let entry = self.entries.get(&key)?;
        if !entry.status.is_live() {
            return None;
        }
        self.entities.get(&key)?.clone().downcast::<RefCell<T>>().ok()
    }

    /// Registers an instance under its key with an initial status.
    ///
    /// Re-putting the same instance is allowed (status transitions are
    /// validated); registering a *different* live instance under an
    /// occupied key violates the identity-map invariant and fails.
    pub fn put<T: Entity>(
        &mut self,
        id: KeyValue,
        handle: &Managed<T>,
        status: EntityStatus,
    ) -> CoreResult<EntityKey> {
        let key = EntityKey::of::<T>(id);
        let as_any: Rc<dyn Any> = handle.clone();

        match self.entries.get(&key) {
            None => {
                // Fresh registration: loads enter as Loading, persists as Managed
                if !matches!(status, EntityStatus::Loading | EntityStatus::Managed) {
                    return Err(CoreError::illegal_state(format!(
                        "cannot register {key} with initial status {status:?}"
                    )));
                }
            }
            Some(entry) => {
                if let Some(existing) = self.entities.get(&key) {
                    if !Rc::ptr_eq(existing, &as_any) {
                        return Err(CoreError::illegal_state(format!(
                            "another instance is already managed for {key}"
                        )));
                    }
                }
                if entry.status != status && !entry.status.can_transition(status) {
                    return Err(CoreError::illegal_state(format!(
                        "invalid status transition {:?} -> {status:?} for {key}",
                        entry.status
                    )));
                }
            }
        }

        self.entities.insert(key.clone(), as_any);
        self.entries
            .insert(key.clone(), EntityEntry::new(key.clone(), status));
        Ok(key)
    }

    /// Marks a key as loading before the physical read runs.
    ///
    /// The entry exists without an instance until the load completes.
    pub fn begin_loading(&mut self, key: EntityKey) -> CoreResult<()> {
        if let Some(entry) = self.entries.get(&key) {
            return Err(CoreError::illegal_state(format!(
                "cannot load {key}: entry already present with status {:?}",
                entry.status
            )));
        }
        self.entries
            .insert(key.clone(), EntityEntry::new(key, EntityStatus::Loading));
        Ok(())
    }

    /// Drops a dangling `Loading` entry after a failed load.
    pub fn abandon_loading(&mut self, key: &EntityKey) {
        if let Some(entry) = self.entries.get(key) {
            if entry.status == EntityStatus::Loading {
                self.entries.remove(key);
            }
        }
    }

    /// Transitions the entry for `key` to a new status.
    ///
    /// # Errors
    ///
    /// Fails when no entry exists or the transition is not in the
    /// legal set (for example, writing to a deleted entity).
    pub fn transition(&mut self, key: &EntityKey, to: EntityStatus) -> CoreResult<()> {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| CoreError::illegal_state(format!("no entry for {key}")))?;
        entry.transition(to)
    }

    /// Returns the status of the entry for `key`, if present.
    #[must_use]
    pub fn status(&self, key: &EntityKey) -> Option<EntityStatus> {
        self.entries.get(key).map(EntityEntry::status)
    }

    /// Removes the instance and entry for `key`.
    pub fn purge(&mut self, key: &EntityKey) {
        self.entities.remove(key);
        self.entries.remove(key);
    }

    /// Returns the snapshot for `key`.
    #[must_use]
    pub fn snapshot(&self, key: &EntityKey) -> Option<&Snapshot> {
        self.snapshots.get(key)
    }

    /// Stores a snapshot for `key`, returning the displaced one.
    pub fn save_snapshot(&mut self, key: EntityKey, snapshot: Snapshot) -> Option<Snapshot> {
        self.snapshots.save(key, snapshot)
    }

    /// Removes the snapshot for `key`.
    pub fn remove_snapshot(&mut self, key: &EntityKey) {
        self.snapshots.remove(key);
    }

    /// Drops every instance, entry, and snapshot. Idempotent.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.entries.clear();
        self.snapshots.clear();
    }
}
