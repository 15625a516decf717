//! Shared fixtures for unit tests.

use crate::context::PersistenceContext;
use crate::error::CoreResult;
use crate::schema::{
    require_column, ColumnMeta, Entity, EntityMetadata, IdColumnMeta, IdStrategy,
};
use crate::write::SharedConnection;
use rowmap_store::{KeyValue, MemoryStore, Row, Value};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Person {
    pub id: Option<i64>,
    pub name: String,
}

pub(crate) static PERSON_META: EntityMetadata = EntityMetadata {
    entity: "Person",
    table: "person",
    id: IdColumnMeta {
        name: "id",
        strategy: IdStrategy::Generated,
    },
    columns: &[ColumnMeta { name: "name" }],
    associations: &[],
};

impl Entity for Person {
    fn metadata() -> &'static EntityMetadata {
        &PERSON_META
    }

    fn id_value(&self) -> Value {
        self.id.map_or(Value::Null, Value::Int)
    }

    fn set_id_value(&mut self, id: Value) {
        self.id = id.as_int();
    }

    fn to_row(&self) -> Row {
        Row::from_iter([("name", Value::text(self.name.clone()))])
    }

    fn from_row(id: &KeyValue, row: &Row) -> CoreResult<Self> {
        let name = require_column(row, "Person", "name")?
            .as_text()
            .ok_or_else(|| crate::error::CoreError::mapping("Person", "name is not text"))?
            .to_string();
        Ok(Self {
            id: match id {
                KeyValue::Int(v) => Some(*v),
                KeyValue::Text(_) => None,
            },
            name,
        })
    }
}

impl Person {
    pub fn new(id: Option<i64>, name: &str) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A store with the person table created, plus a shared connection
/// into it.
pub(crate) fn person_store() -> (MemoryStore, SharedConnection) {
    let store = MemoryStore::new();
    store.create_table("person");
    let conn: SharedConnection = Rc::new(RefCell::new(Box::new(store.connect())));
    (store, conn)
}

/// Inserts a person row directly, bypassing the engine.
pub(crate) fn seed_person(store: &MemoryStore, id: i64, name: &str) {
    let mut conn = store.connect();
    use rowmap_store::StoreConnection;
    conn.insert(
        "person",
        Some(KeyValue::Int(id)),
        Row::from_iter([("name", Value::text(name))]),
    )
    .unwrap();
}

pub(crate) fn empty_context() -> PersistenceContext {
    PersistenceContext::new()
}
