//! Message Bus - command and event dispatch.
//!
//! ## Architecture
//!
//! ```text
//! caller ──send(cmd)──► MessageBus ──exactly one──► CommandHandler
//!                           │                           │ start / commit
//!                           │                           ▼
//!                           │                      UnitOfWork
//!                           │◄──── raised events ───────┘
//!                           ▼
//!              publish ──► EventHandler, EventHandler, ...
//! ```
//!
//! Routing is by Rust type. Each registration is a zero-argument factory;
//! the bus builds a fresh handler for every dispatch so request-scoped
//! collaborators never leak between commands.

mod error;
mod message;
mod message_bus;
mod registry;
mod sink;

pub use error::HandlerError;
pub use message::{Command, CommandHandler, Context, Event, EventHandler};
pub use message_bus::{MessageBus, MessageBusBuilder, DEFAULT_MAX_CASCADE_DEPTH};
pub use sink::{ErrorSink, ListenerFailure, PublishReport, TracingErrorSink};
