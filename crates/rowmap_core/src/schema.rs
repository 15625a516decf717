//! Static entity schema descriptors.
//!
//! The engine never inspects entities at runtime. Each entity type
//! carries a `&'static` [`EntityMetadata`] descriptor plus the value
//! extraction and row construction methods of the [`Entity`] trait,
//! and a [`MetadataRegistry`] records which types a session factory
//! knows about.

use crate::error::{CoreError, CoreResult};
use rowmap_store::{KeyValue, Row, Value};
use std::any::TypeId;
use std::collections::HashMap;

/// How identifier values are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategy {
    /// The store generates the identifier on insert.
    Generated,
    /// The caller supplies the identifier.
    Assigned,
}

/// A persistable (non-identifier) column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column name.
    pub name: &'static str,
}

/// The identifier column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdColumnMeta {
    /// Column name.
    pub name: &'static str,
    /// Assignment strategy.
    pub strategy: IdStrategy,
}

/// A to-many association resolved through a foreign-key read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationMeta {
    /// Table holding the associated rows.
    pub table: &'static str,
    /// Foreign-key column on the associated table.
    pub join_column: &'static str,
}

/// Static description of one entity type.
#[derive(Debug, Clone, Copy)]
pub struct EntityMetadata {
    /// Entity name, used in keys and error messages.
    pub entity: &'static str,
    /// Table the entity maps to.
    pub table: &'static str,
    /// Identifier column.
    pub id: IdColumnMeta,
    /// Persistable columns, in row order. Transient fields are simply
    /// not listed.
    pub columns: &'static [ColumnMeta],
    /// To-many associations.
    pub associations: &'static [AssociationMeta],
}

/// A type the engine can manage.
///
/// Implementations describe themselves entirely at compile time: a
/// static metadata descriptor and hand-written (or generated) value
/// conversion methods. No runtime introspection is involved.
pub trait Entity: Sized + 'static {
    /// Returns the static descriptor for this type.
    fn metadata() -> &'static EntityMetadata;

    /// Returns the identifier value, `Value::Null` when unset.
    fn id_value(&self) -> Value;

    /// Stores an identifier assigned by the store.
    fn set_id_value(&mut self, id: Value);

    /// Extracts the persistable columns as a row, in metadata order.
    /// The identifier is never part of the row.
    fn to_row(&self) -> Row;

    /// Reconstructs an entity from its key and stored row.
    ///
    /// # Errors
    ///
    /// Returns a mapping error when a required column is missing or
    /// has an unexpected type.
    fn from_row(id: &KeyValue, row: &Row) -> CoreResult<Self>;
}

/// Pairs the identifier column descriptor with an entity's current
/// identifier value.
///
/// The insert path is decided from this before any physical call:
/// an empty identifier under the `Generated` strategy means the insert
/// must run immediately to obtain the key; an empty identifier under
/// `Assigned` is a usage error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIdentifier {
    strategy: IdStrategy,
    value: Option<KeyValue>,
}

impl EntityIdentifier {
    /// Resolves the identifier state of `entity`.
    ///
    /// # Errors
    ///
    /// Returns an illegal-state error when the identifier value is not
    /// a legal key type.
    pub fn resolve<T: Entity>(entity: &T) -> CoreResult<Self> {
        let meta = T::metadata();
        let value = match entity.id_value() {
            Value::Null => None,
            other => Some(KeyValue::try_from(other).map_err(|e| {
                CoreError::illegal_state(format!("{} identifier: {e}", meta.entity))
            })?),
        };
        Ok(Self {
            strategy: meta.id.strategy,
            value,
        })
    }

    /// Returns true if the identifier value is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Returns true if the insert must run immediately to obtain a
    /// store-generated identifier.
    #[must_use]
    pub fn requires_generated_key(&self) -> bool {
        self.is_empty() && self.strategy == IdStrategy::Generated
    }

    /// Returns the identifier value, if set.
    #[must_use]
    pub fn key(&self) -> Option<&KeyValue> {
        self.value.as_ref()
    }
}

/// Lookup of entity descriptors keyed by type, built once at factory
/// construction by explicit registration.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    by_type: HashMap<TypeId, &'static EntityMetadata>,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type, builder style.
    #[must_use]
    pub fn with<T: Entity>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Registers an entity type.
    pub fn register<T: Entity>(&mut self) {
        self.by_type.insert(TypeId::of::<T>(), T::metadata());
    }

    /// Returns the descriptor for `T`.
    ///
    /// # Errors
    ///
    /// Returns an illegal-state error when `T` was never registered.
    pub fn expect_registered<T: Entity>(&self) -> CoreResult<&'static EntityMetadata> {
        self.by_type.get(&TypeId::of::<T>()).copied().ok_or_else(|| {
            CoreError::illegal_state(format!(
                "entity type {} is not registered",
                T::metadata().entity
            ))
        })
    }
}

/// Reads a required column out of a row.
///
/// # Errors
///
/// Returns a mapping error naming the entity and column when absent.
pub fn require_column<'a>(
    row: &'a Row,
    entity: &'static str,
    name: &str,
) -> CoreResult<&'a Value> {
    row.get(name)
        .ok_or_else(|| CoreError::mapping(entity, format!("missing column {name}")))
}
