//! Test domain: products, their commands and events, plus store doubles.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use transact_rust::{
    Change, Command, Connection, Entity, Event, InMemoryStore, MessageBus,
    SharedUnitOfWorkManager, Store, StoreError, UnitOfWorkManager,
};

use crate::handlers::{
    create_product::CreateProductHandler, import_products::ImportProductsHandler,
    update_product_name::UpdateProductNameHandler, ActivityLog,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "products")]
pub struct Product {
    pub id: String,
    pub name: String,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Command payload: create a product with a generated id.
#[derive(Debug, Command)]
pub struct CreateProduct {
    pub id: String,
    pub name: String,
}

impl CreateProduct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
        }
    }
}

/// Command payload: rename an existing product.
#[derive(Debug, Command)]
#[message(name = "product.rename")]
pub struct UpdateProductName {
    pub id: String,
    pub name: String,
}

/// Command payload: create many products in one transaction.
#[derive(Debug, Command)]
pub struct ImportProducts {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Event)]
pub struct ProductCreated {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Event)]
pub struct ProductRenamed {
    pub id: String,
    pub from: String,
    pub to: String,
}

pub type Log = Arc<Mutex<Vec<String>>>;

/// A bus wired with every product handler, sharing one store.
pub fn product_bus(uow: SharedUnitOfWorkManager, log: Log) -> MessageBus {
    MessageBus::builder()
        .command::<CreateProduct, _, _>({
            let uow = uow.clone();
            move || CreateProductHandler::new(uow.clone())
        })
        .command::<UpdateProductName, _, _>({
            let uow = uow.clone();
            move || UpdateProductNameHandler::new(uow.clone())
        })
        .command::<ImportProducts, _, _>({
            let uow = uow.clone();
            move || ImportProductsHandler::new(uow.clone())
        })
        .event::<ProductCreated, _, _>({
            let log = log.clone();
            move || ActivityLog::new(log.clone())
        })
        .event::<ProductRenamed, _, _>({
            let log = log.clone();
            move || ActivityLog::new(log.clone())
        })
        .build()
}

/// Every product visible to a fresh unit of work.
pub fn committed_products(uow: &dyn UnitOfWorkManager) -> Vec<Product> {
    let mut tx = uow.start().unwrap();
    let mut products = tx.repository::<Product>().unwrap().find(|_| true).unwrap();
    products.sort_by(|a, b| a.name.cmp(&b.name));
    products
}

pub fn seed(uow: &dyn UnitOfWorkManager, product: Product) {
    let mut tx = uow.start().unwrap();
    tx.repository::<Product>().unwrap().add(product).unwrap();
    tx.commit().unwrap();
}

/// A store whose connections fail at commit, after accepting the flush.
#[derive(Clone, Default)]
pub struct FailingCommitStore {
    pub inner: InMemoryStore,
}

impl Store for FailingCommitStore {
    fn connect(&self) -> Result<Box<dyn Connection>, StoreError> {
        Ok(Box::new(FailingCommitConnection {
            inner: self.inner.connect()?,
        }))
    }
}

struct FailingCommitConnection {
    inner: Box<dyn Connection>,
}

impl Connection for FailingCommitConnection {
    fn begin(&mut self) -> Result<(), StoreError> {
        self.inner.begin()
    }

    fn fetch(&mut self, collection: &str, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.fetch(collection, id)
    }

    fn ids(&mut self, collection: &str) -> Result<Vec<String>, StoreError> {
        self.inner.ids(collection)
    }

    fn flush(&mut self, changes: Vec<Change>) -> Result<(), StoreError> {
        self.inner.flush(changes)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".into()))
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.inner.rollback()
    }

    fn close(&mut self) {
        self.inner.close()
    }
}
