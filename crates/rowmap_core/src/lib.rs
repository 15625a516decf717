//! Object/relational persistence engine.
//!
//! `rowmap_core` keeps one in-memory instance per row (the identity
//! map), detects changes by snapshot comparison, and runs every
//! lifecycle operation through typed events with one listener each.
//! Writes either execute immediately or collect in a FIFO action
//! queue, depending on the session's flush mode.
//!
//! The entry point is a [`SessionFactory`] built over a
//! [`MetadataRegistry`] of entity types; each [`Session`] it opens is
//! one single-threaded unit of work over one store connection.
//!
//! ```
//! use rowmap_core::{MetadataRegistry, SessionFactory};
//! use rowmap_store::MemoryStore;
//! # use rowmap_core::CoreResult;
//! # fn demo() -> CoreResult<()> {
//! let store = MemoryStore::new();
//! let factory = SessionFactory::new(MetadataRegistry::new());
//! let mut session = factory.open_session(Box::new(store.connect()))?;
//! session.close()?;
//! # Ok(())
//! # }
//! # demo().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod assoc;
pub mod context;
pub mod error;
pub mod event;
pub mod schema;
pub mod session;
pub mod write;

#[cfg(test)]
pub(crate) mod testutil;

pub use action::{ActionQueue, EntityAction, FlushMode};
pub use assoc::{Association, ForeignKeyRef};
pub use context::{
    EntityKey, EntityStatus, Managed, PersistenceContext, Snapshot, SnapshotStore,
};
pub use error::{CoreError, CoreResult};
pub use event::EventPublisher;
pub use schema::{
    AssociationMeta, ColumnMeta, Entity, EntityIdentifier, EntityMetadata, IdColumnMeta,
    IdStrategy, MetadataRegistry,
};
pub use session::{Session, SessionFactory};
pub use write::{Loader, Persister};

pub use rowmap_store::{KeyValue, Row, StoreConnection, Value};
