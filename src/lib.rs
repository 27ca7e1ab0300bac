//! Transactional command/event dispatch.
//!
//! Three pieces make up the core:
//!
//! - [`UnitOfWork`]: one atomic transaction, started from a
//!   [`UnitOfWorkManager`], rolled back unless explicitly committed.
//! - [`Repository`]: typed add/get/delete over an [`Entity`], valid only
//!   while its unit of work is open.
//! - [`MessageBus`]: sends each command to exactly one handler and publishes
//!   events to any number of handlers.
//!
//! ```ignore
//! use transact_rust::{Command, CommandHandler, Context, HandlerError, InMemoryStore,
//!     MessageBus, SharedUnitOfWorkManager};
//!
//! #[derive(Command)]
//! struct CreateProduct { id: String, name: String }
//!
//! struct CreateProductHandler { uow: SharedUnitOfWorkManager }
//!
//! impl CommandHandler<CreateProduct> for CreateProductHandler {
//!     fn handle(&mut self, cmd: CreateProduct, ctx: &mut Context) -> Result<(), HandlerError> {
//!         let mut tx = self.uow.start()?;
//!         tx.repository::<Product>()?.add(Product::new(cmd.id, cmd.name))?;
//!         tx.commit()?;
//!         ctx.raise_committed(&tx, ProductCreated)?;
//!         Ok(())
//!     }
//! }
//! ```

// Lets the derive macros refer to `transact_rust::...` from inside this crate.
extern crate self as transact_rust;

pub mod bus;
mod entity;
mod error;
mod repository;
pub mod store;
mod uow;

pub use bus::{
    Command, CommandHandler, Context, ErrorSink, Event, EventHandler, HandlerError,
    ListenerFailure, MessageBus, MessageBusBuilder, PublishReport, TracingErrorSink,
};
pub use entity::Entity;
pub use error::UnitOfWorkError;
pub use repository::Repository;
pub use store::{Change, Connection, InMemoryStore, Store, StoreConfig, StoreError, StoreStats};
pub use uow::{SharedUnitOfWorkManager, TxState, UnitOfWork, UnitOfWorkManager};

pub use transact_rust_macros::{Command, Entity, Event};
