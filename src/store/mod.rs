//! Store - the persistence backend seam.
//!
//! A unit of work never talks to storage directly. It drives a `Connection`
//! obtained from a `Store` through a fixed primitive set:
//!
//! ```text
//! connect ─► begin ─► fetch/ids* ─► flush(changes) ─► commit ─► close
//!                                        └──────────► rollback ─► close
//! ```
//!
//! `InMemoryStore` is the included adapter. SQL or document backends
//! implement the same two traits.

mod in_memory;

use std::sync::Arc;

use thiserror::Error;

pub use in_memory::{InMemoryConnection, InMemoryStore, StoreConfig, StoreStats};

/// A pending write produced by a unit of work at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Put {
        collection: &'static str,
        id: String,
        document: Vec<u8>,
    },
    Delete {
        collection: &'static str,
        id: String,
    },
}

impl Change {
    pub fn collection(&self) -> &'static str {
        match self {
            Change::Put { collection, .. } | Change::Delete { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Change::Put { id, .. } | Change::Delete { id, .. } => id,
        }
    }
}

/// Error type for backend operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No connection could be opened (pool exhausted, backend down).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A primitive was called outside of an active transaction.
    #[error("no active transaction for {0}")]
    NoTransaction(&'static str),

    #[error("store lock poisoned during {0}")]
    Poisoned(&'static str),

    #[error("store error: {0}")]
    Backend(String),
}

/// Opens connections to a persistence backend.
///
/// Every `Store` is also a [`UnitOfWorkManager`](crate::UnitOfWorkManager).
pub trait Store: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Connection>, StoreError>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn connect(&self) -> Result<Box<dyn Connection>, StoreError> {
        (**self).connect()
    }
}

/// One transactional session against a backend.
///
/// Connections are owned by exactly one unit of work and never shared
/// between threads concurrently.
pub trait Connection: Send {
    fn begin(&mut self) -> Result<(), StoreError>;

    /// Fetch a document by id, seeing this connection's own flushed writes.
    fn fetch(&mut self, collection: &str, id: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// List the ids stored in a collection.
    fn ids(&mut self, collection: &str) -> Result<Vec<String>, StoreError>;

    /// Send pending writes to the backend within the open transaction.
    fn flush(&mut self, changes: Vec<Change>) -> Result<(), StoreError>;

    fn commit(&mut self) -> Result<(), StoreError>;

    fn rollback(&mut self) -> Result<(), StoreError>;

    /// Release the underlying resource. Must be safe to call more than once.
    fn close(&mut self);
}
