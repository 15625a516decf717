//! Lazy to-many associations.
//!
//! An association is either an unloaded foreign-key reference or the
//! loaded entities, and the two states are explicit in the type. The
//! physical read runs at most once; after it the reference is gone and
//! every later access reuses the loaded vector.

use crate::error::CoreResult;
use crate::schema::{AssociationMeta, Entity};
use crate::write::Loader;
use rowmap_store::Value;

/// The foreign-key read an unloaded association will perform.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyRef {
    /// Table holding the associated rows.
    pub table: &'static str,
    /// Foreign-key column on that table.
    pub join_column: &'static str,
    /// The owning entity's identifier value to match.
    pub value: Value,
}

impl ForeignKeyRef {
    /// Builds the reference for an association of an owner with
    /// identifier value `value`.
    #[must_use]
    pub fn of(meta: &AssociationMeta, value: Value) -> Self {
        Self {
            table: meta.table,
            join_column: meta.join_column,
            value,
        }
    }
}

/// A to-many association that loads on first access.
#[derive(Debug)]
pub enum Association<T> {
    /// Not yet read; holds the pending foreign-key reference.
    Unloaded(ForeignKeyRef),
    /// Read; holds the associated entities.
    Loaded(Vec<T>),
}

impl<T: Entity> Association<T> {
    /// Creates an unloaded association.
    #[must_use]
    pub fn unloaded(fk: ForeignKeyRef) -> Self {
        Self::Unloaded(fk)
    }

    /// Creates an association already holding its entities.
    #[must_use]
    pub fn loaded(entities: Vec<T>) -> Self {
        Self::Loaded(entities)
    }

    /// Returns true once the association has been read.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Returns the loaded entities, resolving the foreign-key read on
    /// first access.
    ///
    /// # Errors
    ///
    /// Propagates store and row-mapping failures; the association
    /// stays unloaded so the read can be retried.
    pub fn get_or_load(&mut self, loader: &Loader) -> CoreResult<&[T]> {
        if let Self::Unloaded(fk) = self {
            let rows = loader.find_by_foreign_key(fk.table, fk.join_column, &fk.value)?;
            let mut entities = Vec::with_capacity(rows.len());
            for (key, row) in &rows {
                entities.push(T::from_row(key, row)?);
            }
            *self = Self::Loaded(entities);
        }
        match self {
            Self::Loaded(entities) => Ok(entities),
            Self::Unloaded(_) => unreachable!("association was just loaded"),
        }
    }

    /// Returns the loaded entities without triggering a read.
    #[must_use]
    pub fn as_loaded(&self) -> Option<&[T]> {
        match self {
            Self::Loaded(entities) => Some(entities),
            Self::Unloaded(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{person_store, seed_person, Person};
    use rowmap_store::{KeyValue, Row, StoreConnection, Value};

    fn fk(value: i64) -> ForeignKeyRef {
        ForeignKeyRef {
            table: "person",
            join_column: "team_id",
            value: Value::Int(value),
        }
    }

    fn seed_team_member(store: &rowmap_store::MemoryStore, id: i64, name: &str, team: i64) {
        let mut conn = store.connect();
        conn.insert(
            "person",
            Some(KeyValue::Int(id)),
            Row::from_iter([
                ("name", Value::text(name)),
                ("team_id", Value::Int(team)),
            ]),
        )
        .unwrap();
    }

    #[test]
    fn first_access_loads_matching_rows() {
        let (store, conn) = person_store();
        seed_team_member(&store, 1, "a", 7);
        seed_team_member(&store, 2, "b", 7);
        seed_team_member(&store, 3, "c", 8);
        let loader = Loader::new(conn);

        let mut assoc: Association<Person> = Association::unloaded(fk(7));
        assert!(!assoc.is_loaded());

        let members = assoc.get_or_load(&loader).unwrap();
        assert_eq!(members.len(), 2);
        assert!(assoc.is_loaded());
    }

    #[test]
    fn later_accesses_reuse_the_loaded_set() {
        let (store, conn) = person_store();
        seed_team_member(&store, 1, "a", 7);
        let loader = Loader::new(conn);

        let mut assoc: Association<Person> = Association::unloaded(fk(7));
        assert_eq!(assoc.get_or_load(&loader).unwrap().len(), 1);

        // A row added after the load is not observed
        seed_team_member(&store, 2, "b", 7);
        assert_eq!(assoc.get_or_load(&loader).unwrap().len(), 1);
    }

    #[test]
    fn no_matches_loads_empty() {
        let (store, conn) = person_store();
        seed_person(&store, 1, "a");
        let loader = Loader::new(conn);

        let mut assoc: Association<Person> = Association::unloaded(fk(7));
        assert!(assoc.get_or_load(&loader).unwrap().is_empty());
        assert!(assoc.is_loaded());
    }

    #[test]
    fn failed_load_leaves_association_unloaded() {
        let (store, conn) = person_store();
        let loader = Loader::new(conn);
        drop(store);

        let mut assoc: Association<Person> = Association::unloaded(ForeignKeyRef {
            table: "missing",
            join_column: "team_id",
            value: Value::Int(1),
        });
        assert!(assoc.get_or_load(&loader).is_err());
        assert!(!assoc.is_loaded());
    }
}
