//! Unit of Work - transaction boundary and entity-store access.
//!
//! ```text
//! UnitOfWorkManager::start()
//!        │
//!        ▼
//!  UnitOfWork (Open) ──commit()──► Committed
//!        │
//!        └──rollback() / drop / failed commit──► RolledBack
//! ```

mod tracker;
mod unit_of_work;

use std::sync::Arc;

use crate::error::UnitOfWorkError;
use crate::store::{Store, StoreError};

pub use unit_of_work::{TxState, UnitOfWork};

pub(crate) use tracker::{decode, encode, Entry};

/// Factory for units of work.
///
/// Every call to `start` returns a new, open unit of work bound to its own
/// connection, so two request contexts can never share one. Implementations
/// must be safe to call concurrently.
pub trait UnitOfWorkManager: Send + Sync {
    fn start(&self) -> Result<UnitOfWork, UnitOfWorkError>;
}

// Blanket implementation: any Store can start units of work
impl<S: Store> UnitOfWorkManager for S {
    fn start(&self) -> Result<UnitOfWork, UnitOfWorkError> {
        let connection = self.connect().map_err(|err| match err {
            StoreError::Unavailable(message) => UnitOfWorkError::ResourceUnavailable(message),
            other => UnitOfWorkError::ResourceUnavailable(other.to_string()),
        })?;
        UnitOfWork::begin(connection)
    }
}

/// Shared, type-erased manager handle for injecting into handlers.
pub type SharedUnitOfWorkManager = Arc<dyn UnitOfWorkManager>;
