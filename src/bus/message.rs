//! Commands, events, and the handler traits that consume them.

use std::any::{Any, TypeId};

use crate::error::UnitOfWorkError;
use crate::uow::{TxState, UnitOfWork};

use super::error::HandlerError;

/// An immutable request to change state. Routed to exactly one handler.
///
/// `NAME` identifies the command in logs and errors; routing uses the Rust
/// type itself.
pub trait Command: Send + 'static {
    const NAME: &'static str;
}

/// An immutable notice that state changed. Routed to zero or more handlers.
pub trait Event: Send + 'static {
    const NAME: &'static str;
}

/// Handles one command type.
///
/// A fresh handler is built from its factory for every `send`, so fields
/// hold injected collaborators (a `UnitOfWorkManager`, config) rather than
/// state carried between commands.
///
/// Handlers start a unit of work, mutate entities through repositories,
/// commit once, and let errors propagate: the unit of work rolls itself back
/// when it goes out of scope uncommitted.
pub trait CommandHandler<C: Command> {
    fn handle(&mut self, command: C, ctx: &mut Context) -> Result<(), HandlerError>;
}

/// Handles one event type.
pub trait EventHandler<E: Event> {
    fn handle(&mut self, event: &E, ctx: &mut Context) -> Result<(), HandlerError>;
}

/// An event queued on a [`Context`], waiting to be published.
pub(crate) struct RaisedEvent {
    pub(crate) type_id: TypeId,
    pub(crate) name: &'static str,
    pub(crate) payload: Box<dyn Any + Send>,
}

impl RaisedEvent {
    pub(crate) fn new<E: Event>(event: E) -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            name: E::NAME,
            payload: Box::new(event),
        }
    }
}

/// The context passed to every handler invocation.
///
/// Events raised here are published by the bus after the handler returns
/// `Ok`. A handler that fails has its raised events discarded.
pub struct Context {
    message: &'static str,
    raised: Vec<RaisedEvent>,
}

impl Context {
    pub(crate) fn new(message: &'static str) -> Self {
        Self {
            message,
            raised: Vec::new(),
        }
    }

    /// Name of the command or event being handled.
    pub fn message_name(&self) -> &'static str {
        self.message
    }

    /// Queue an event for publication once this handler succeeds.
    ///
    /// The bus cannot see the handler's unit of work, so the handler must
    /// only raise events describing writes it has committed. Prefer
    /// [`raise_committed`](Self::raise_committed) when a unit of work is at hand.
    pub fn raise<E: Event>(&mut self, event: E) {
        self.raised.push(RaisedEvent::new(event));
    }

    /// Queue an event describing the writes of `uow`, which must be committed.
    ///
    /// Fails with `TransactionState` for an open or rolled back unit of work,
    /// and nothing is queued.
    pub fn raise_committed<E: Event>(
        &mut self,
        uow: &UnitOfWork,
        event: E,
    ) -> Result<(), UnitOfWorkError> {
        if uow.state() != TxState::Committed {
            return Err(UnitOfWorkError::TransactionState {
                operation: "raise event",
                state: uow.state(),
            });
        }
        self.raise(event);
        Ok(())
    }

    /// Number of events raised so far.
    pub fn raised(&self) -> usize {
        self.raised.len()
    }

    pub(crate) fn take_raised(&mut self) -> Vec<RaisedEvent> {
        std::mem::take(&mut self.raised)
    }
}
