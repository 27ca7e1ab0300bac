use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::entity::Entity;
use crate::error::UnitOfWorkError;
use crate::repository::Repository;
use crate::store::{Connection, StoreError};

use super::tracker::Tracker;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a [`UnitOfWork`]. `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Open,
    Committed,
    RolledBack,
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxState::Open => write!(f, "open"),
            TxState::Committed => write!(f, "committed"),
            TxState::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// A single atomic transaction scope.
///
/// Obtained from a [`UnitOfWorkManager`](super::UnitOfWorkManager). Entities
/// are read and written through [`repository`](Self::repository); nothing
/// reaches the store until [`commit`](Self::commit).
///
/// Exactly one of commit or rollback happens per instance. Dropping an open
/// unit of work rolls it back, so an early return or a `?` in a handler can
/// never leave a partial write behind.
///
/// ```ignore
/// let mut tx = uow.start()?;
/// tx.repository::<Product>()?.add(Product::new("foo"))?;
/// tx.commit()?;
/// ```
pub struct UnitOfWork {
    id: u64,
    state: TxState,
    connection: Box<dyn Connection>,
    pub(crate) tracker: Tracker,
}

impl UnitOfWork {
    /// Begin a transaction on a freshly opened connection.
    pub fn begin(mut connection: Box<dyn Connection>) -> Result<Self, UnitOfWorkError> {
        if let Err(err) = connection.begin() {
            connection.close();
            return Err(UnitOfWorkError::ResourceUnavailable(err.to_string()));
        }

        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(uow = id, "unit of work started");

        Ok(Self {
            id,
            state: TxState::Open,
            connection,
            tracker: Tracker::default(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == TxState::Open
    }

    /// Typed repository for `E`, bound to this unit of work.
    pub fn repository<E: Entity>(&mut self) -> Result<Repository<'_, E>, UnitOfWorkError> {
        self.ensure_open("access repository")?;
        Ok(Repository::new(self))
    }

    /// Flush every tracked change and commit the underlying transaction.
    ///
    /// If flushing or committing fails the transaction is rolled back, the
    /// unit of work becomes `RolledBack`, and the error is returned.
    pub fn commit(&mut self) -> Result<(), UnitOfWorkError> {
        self.ensure_open("commit")?;

        let result = self
            .tracker
            .changes()
            .and_then(|changes| {
                let count = changes.len();
                self.connection.flush(changes)?;
                Ok(count)
            })
            .and_then(|count| {
                self.connection.commit()?;
                Ok(count)
            });

        match result {
            Ok(count) => {
                self.finish(TxState::Committed);
                tracing::debug!(uow = self.id, changes = count, "unit of work committed");
                Ok(())
            }
            Err(err) => {
                tracing::debug!(uow = self.id, error = %err, "commit failed, rolling back");
                self.abort();
                Err(err)
            }
        }
    }

    /// Discard every pending change and roll the transaction back.
    pub fn rollback(&mut self) -> Result<(), UnitOfWorkError> {
        self.ensure_open("rollback")?;
        let result = self.connection.rollback();
        self.finish(TxState::RolledBack);
        tracing::debug!(uow = self.id, "unit of work rolled back");
        result.map_err(UnitOfWorkError::from)
    }

    pub(crate) fn ensure_open(&self, operation: &'static str) -> Result<(), UnitOfWorkError> {
        if self.state == TxState::Open {
            Ok(())
        } else {
            Err(UnitOfWorkError::TransactionState {
                operation,
                state: self.state,
            })
        }
    }

    pub(crate) fn connection(&mut self) -> &mut dyn Connection {
        self.connection.as_mut()
    }

    /// Roll back after a failure; the original error wins over a rollback error.
    fn abort(&mut self) {
        if let Err(err) = self.connection.rollback() {
            if !matches!(err, StoreError::NoTransaction(_)) {
                tracing::warn!(uow = self.id, error = %err, "rollback after failed commit also failed");
            }
        }
        self.finish(TxState::RolledBack);
    }

    fn finish(&mut self, state: TxState) {
        self.tracker.clear();
        self.connection.close();
        self.state = state;
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.state == TxState::Open {
            tracing::debug!(uow = self.id, "unit of work dropped without commit, rolling back");
            self.abort();
        }
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
