use thiserror::Error;

use crate::store::StoreError;
use crate::uow::TxState;

/// Errors raised by a unit of work and the repositories it exposes.
#[derive(Debug, Error)]
pub enum UnitOfWorkError {
    /// The transactional resource could not be acquired or opened.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// An operation was attempted on a unit of work that is not open.
    #[error("cannot {operation}: unit of work is {state}")]
    TransactionState {
        operation: &'static str,
        state: TxState,
    },

    #[error("{collection}:{id} not found")]
    NotFound { collection: &'static str, id: String },

    #[error("{collection}:{id} already exists")]
    AlreadyExists { collection: &'static str, id: String },

    #[error("entity serialization failed for {collection}: {message}")]
    Serde {
        collection: &'static str,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl UnitOfWorkError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, UnitOfWorkError::NotFound { .. })
    }
}
