//! Handler: CreateProduct
//!
//! Begin a transaction, add the product, commit, then raise ProductCreated.

use transact_rust::{CommandHandler, Context, HandlerError, SharedUnitOfWorkManager};

use crate::support::{CreateProduct, Product, ProductCreated};

pub struct CreateProductHandler {
    uow: SharedUnitOfWorkManager,
}

impl CreateProductHandler {
    pub fn new(uow: SharedUnitOfWorkManager) -> Self {
        Self { uow }
    }
}

impl CommandHandler<CreateProduct> for CreateProductHandler {
    fn handle(&mut self, cmd: CreateProduct, ctx: &mut Context) -> Result<(), HandlerError> {
        if cmd.name.trim().is_empty() {
            return Err(HandlerError::Rejected("product name is blank".into()));
        }

        let mut tx = self.uow.start()?;
        tx.repository::<Product>()?
            .add(Product::new(cmd.id.clone(), cmd.name.clone()))?;
        tx.commit()?;

        ctx.raise_committed(
            &tx,
            ProductCreated {
                id: cmd.id,
                name: cmd.name,
            },
        )?;
        Ok(())
    }
}
