//! Field-value snapshots for dirty checking.

use crate::context::EntityKey;
use crate::schema::Entity;
use rowmap_store::Row;
use std::collections::HashMap;

/// An immutable copy of an entity's persistable column values, taken
/// at the moment the entity became managed.
///
/// A snapshot is never mutated in place; a merge that writes replaces
/// it wholesale after the write succeeds. Comparison is field-wise
/// over every persistable column, with null equal to null.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    values: Row,
}

impl Snapshot {
    /// Takes a snapshot of an entity's current values.
    pub fn of<T: Entity>(entity: &T) -> Self {
        Self {
            values: entity.to_row(),
        }
    }

    /// Returns true if every compared column value is equal.
    #[must_use]
    pub fn is_same_as(&self, other: &Snapshot) -> bool {
        self.values == other.values
    }

    /// Returns the columns of `newer` that differ from this snapshot.
    ///
    /// This is the minimal update row for a dirty entity: columns equal
    /// to the snapshot are left out.
    #[must_use]
    pub fn changed_columns(&self, newer: &Snapshot) -> Row {
        newer
            .values
            .iter()
            .filter(|(name, value)| self.values.get(name) != Some(value))
            .map(|(name, value)| (name, value.clone()))
            .collect()
    }

    /// Returns the snapshot's column values.
    #[must_use]
    pub fn values(&self) -> &Row {
        &self.values
    }
}

/// Keyed store of snapshots for one unit of work.
///
/// Absence of a snapshot for a key means "not yet tracked": no dirty
/// check is possible and the caller must persist, not merge.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: HashMap<EntityKey, Snapshot>,
}

impl SnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a snapshot, returning the displaced one if any.
    pub fn save(&mut self, key: EntityKey, snapshot: Snapshot) -> Option<Snapshot> {
        self.snapshots.insert(key, snapshot)
    }

    /// Returns the snapshot for a key.
    #[must_use]
    pub fn get(&self, key: &EntityKey) -> Option<&Snapshot> {
        self.snapshots.get(key)
    }

    /// Removes the snapshot for a key.
    pub fn remove(&mut self, key: &EntityKey) -> Option<Snapshot> {
        self.snapshots.remove(key)
    }

    /// Drops every snapshot.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
