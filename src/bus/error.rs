//! Error types for command and event handlers.

use thiserror::Error;

use crate::error::UnitOfWorkError;

/// Error type for dispatch and handler operations.
///
/// Handlers return this from `handle`; `MessageBus::send` hands it back to
/// the caller exactly as the handler produced it.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// `send` found zero, or more than one, handler for the command type.
    #[error("cannot resolve handler for {command}: {registered} registered, expected exactly 1")]
    Resolution {
        command: &'static str,
        registered: usize,
    },
    /// A listener raised a follow-up event beyond the bus's cascade depth.
    #[error("event {event} dropped: cascade depth {depth} exceeds the limit")]
    CascadeLimit { event: &'static str, depth: usize },
    /// Business logic rejected the command (validation, invariant violation).
    #[error("rejected: {0}")]
    Rejected(String),
    /// Aggregate or resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Payload decode / deserialization failed.
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    /// Unit of work or repository error.
    #[error(transparent)]
    UnitOfWork(#[from] UnitOfWorkError),
    #[error("handler error: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn other<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        HandlerError::Other(err.into())
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, HandlerError::Resolution { .. })
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}
