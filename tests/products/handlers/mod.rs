pub mod create_product;

use transact_rust::{Context, EventHandler, HandlerError};

use crate::support::{Log, ProductCreated, ProductRenamed};

/// Listener that records product activity.
pub struct ActivityLog {
    log: Log,
}

impl ActivityLog {
    pub fn new(log: Log) -> Self {
        Self { log }
    }
}

impl EventHandler<ProductCreated> for ActivityLog {
    fn handle(&mut self, event: &ProductCreated, _ctx: &mut Context) -> Result<(), HandlerError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("created {}", event.name));
        Ok(())
    }
}

impl EventHandler<ProductRenamed> for ActivityLog {
    fn handle(&mut self, event: &ProductRenamed, _ctx: &mut Context) -> Result<(), HandlerError> {
        self.log
            .lock()
            .unwrap()
            .push(format!("renamed {} to {}", event.from, event.to));
        Ok(())
    }
}
