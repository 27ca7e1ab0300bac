use std::sync::Arc;

use transact_rust::{
    CommandHandler, Context, HandlerError, InMemoryStore, MessageBus, SharedUnitOfWorkManager,
    StoreConfig, TxState, UnitOfWorkError, UnitOfWorkManager,
};

use crate::handlers::{
    import_products::ImportProductsHandler, update_product_name::UpdateProductNameHandler,
    ActivityLog,
};
use crate::support::{
    committed_products, product_bus, seed, CreateProduct, ImportProducts, Log, Product,
    ProductCreated, UpdateProductName,
};

fn setup() -> (InMemoryStore, SharedUnitOfWorkManager, Log, MessageBus) {
    let store = InMemoryStore::new();
    let uow: SharedUnitOfWorkManager = Arc::new(store.clone());
    let log: Log = Arc::default();
    let bus = product_bus(uow.clone(), log.clone());
    (store, uow, log, bus)
}

#[test]
fn create_product_persists_and_notifies() {
    let (store, uow, log, bus) = setup();

    bus.send(CreateProduct::new("foo")).unwrap();

    let products = committed_products(uow.as_ref());
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "foo");
    assert_eq!(*log.lock().unwrap(), vec!["created foo"]);

    let stats = store.stats();
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.open, 0);
}

#[test]
fn rename_product_updates_the_stored_name() {
    let (_store, uow, log, bus) = setup();
    seed(uow.as_ref(), Product::new("p-1", "foo"));

    bus.send(UpdateProductName {
        id: "p-1".into(),
        name: "bar".into(),
    })
    .unwrap();

    assert_eq!(committed_products(uow.as_ref()), vec![Product::new("p-1", "bar")]);
    assert_eq!(*log.lock().unwrap(), vec!["renamed foo to bar"]);
}

#[test]
fn rename_unknown_product_is_not_found() {
    let (store, _uow, log, bus) = setup();

    let err = bus
        .send(UpdateProductName {
            id: "missing".into(),
            name: "bar".into(),
        })
        .unwrap_err();

    assert!(matches!(
        err,
        HandlerError::UnitOfWork(UnitOfWorkError::NotFound { collection: "products", .. })
    ));
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(store.stats().rollbacks, 1);
}

/// Renames, then looks at the product from a second unit of work before committing.
struct PeekingRename {
    uow: SharedUnitOfWorkManager,
    seen: Log,
}

impl CommandHandler<UpdateProductName> for PeekingRename {
    fn handle(&mut self, cmd: UpdateProductName, _ctx: &mut Context) -> Result<(), HandlerError> {
        let mut tx = self.uow.start()?;
        tx.repository::<Product>()?.get(&cmd.id)?.name = cmd.name;

        let mut outside = self.uow.start()?;
        let observed = outside.repository::<Product>()?.get(&cmd.id)?.name.clone();
        self.seen.lock().unwrap().push(observed);

        tx.commit()?;
        Ok(())
    }
}

#[test]
fn pending_rename_is_invisible_to_other_units_of_work() {
    let store = InMemoryStore::new();
    let uow: SharedUnitOfWorkManager = Arc::new(store.clone());
    seed(uow.as_ref(), Product::new("p-1", "foo"));

    let seen: Log = Arc::default();
    let bus = MessageBus::builder()
        .command::<UpdateProductName, _, _>({
            let uow = uow.clone();
            let seen = seen.clone();
            move || PeekingRename {
                uow: uow.clone(),
                seen: seen.clone(),
            }
        })
        .build();

    bus.send(UpdateProductName {
        id: "p-1".into(),
        name: "bar".into(),
    })
    .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["foo"]);
    assert_eq!(committed_products(uow.as_ref())[0].name, "bar");
}

#[test]
fn unregistered_command_invokes_nothing() {
    let store = InMemoryStore::new();
    let uow: SharedUnitOfWorkManager = Arc::new(store.clone());
    // Every other product command is wired to the store; CreateProduct is not.
    let bus = MessageBus::builder()
        .command::<UpdateProductName, _, _>({
            let uow = uow.clone();
            move || UpdateProductNameHandler::new(uow.clone())
        })
        .command::<ImportProducts, _, _>({
            let uow = uow.clone();
            move || ImportProductsHandler::new(uow.clone())
        })
        .build();

    let err = bus.send(CreateProduct::new("foo")).unwrap_err();

    assert!(matches!(
        err,
        HandlerError::Resolution {
            command: "CreateProduct",
            registered: 0
        }
    ));
    let stats = store.stats();
    assert_eq!(stats.opened, 0);
    assert_eq!(stats.open, 0);

    // The same bus does reach the store for a registered command.
    bus.send(ImportProducts {
        names: vec!["alpha".into()],
    })
    .unwrap();
    assert_eq!(store.stats().commits, 1);
    assert_eq!(store.stats().open, 0);
}

/// Raises its event without ever committing.
struct UncommittedCreate {
    uow: SharedUnitOfWorkManager,
}

impl CommandHandler<CreateProduct> for UncommittedCreate {
    fn handle(&mut self, cmd: CreateProduct, ctx: &mut Context) -> Result<(), HandlerError> {
        let mut tx = self.uow.start()?;
        tx.repository::<Product>()?
            .add(Product::new(cmd.id.clone(), cmd.name.clone()))?;
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

#[test]
fn events_are_not_raised_for_uncommitted_work() {
    let store = InMemoryStore::new();
    let uow: SharedUnitOfWorkManager = Arc::new(store.clone());
    let log: Log = Arc::default();
    let bus = MessageBus::builder()
        .command::<CreateProduct, _, _>({
            let uow = uow.clone();
            move || UncommittedCreate { uow: uow.clone() }
        })
        .event::<ProductCreated, _, _>({
            let log = log.clone();
            move || ActivityLog::new(log.clone())
        })
        .build();

    let err = bus.send(CreateProduct::new("foo")).unwrap_err();

    assert!(matches!(
        err,
        HandlerError::UnitOfWork(UnitOfWorkError::TransactionState {
            state: TxState::Open,
            ..
        })
    ));
    assert!(log.lock().unwrap().is_empty());
    assert!(committed_products(uow.as_ref()).is_empty());
    assert_eq!(store.stats().commits, 0);
}

#[test]
fn failed_import_leaves_no_products_behind() {
    let (store, uow, log, bus) = setup();

    let err = bus
        .send(ImportProducts {
            names: vec!["alpha".into(), "beta".into(), " ".into(), "delta".into()],
        })
        .unwrap_err();

    assert!(matches!(err, HandlerError::Rejected(ref reason) if reason.contains("row 2")));
    assert!(committed_products(uow.as_ref()).is_empty());
    assert!(log.lock().unwrap().is_empty());

    let stats = store.stats();
    assert_eq!(stats.commits, 0);
    assert_eq!(stats.rollbacks, 2); // the import, then the read above
    assert_eq!(stats.open, 0);
}

#[test]
fn successful_import_raises_one_event_per_product() {
    let (_store, uow, log, bus) = setup();

    bus.send(ImportProducts {
        names: vec!["alpha".into(), "beta".into()],
    })
    .unwrap();

    assert_eq!(committed_products(uow.as_ref()).len(), 2);
    assert_eq!(*log.lock().unwrap(), vec!["created alpha", "created beta"]);
}

#[test]
fn blank_name_is_rejected_before_any_transaction() {
    let (store, _uow, _log, bus) = setup();

    let err = bus.send(CreateProduct::new("")).unwrap_err();

    assert!(matches!(err, HandlerError::Rejected(_)));
    assert_eq!(store.stats().opened, 0);
}

#[test]
fn exhausted_store_surfaces_resource_unavailable() {
    let store = InMemoryStore::with_config(StoreConfig::default().max_connections(1));
    let uow: SharedUnitOfWorkManager = Arc::new(store.clone());
    let bus = product_bus(uow.clone(), Arc::default());

    let _held = uow.start().unwrap();
    let err = bus.send(CreateProduct::new("foo")).unwrap_err();

    assert!(matches!(
        err,
        HandlerError::UnitOfWork(UnitOfWorkError::ResourceUnavailable(_))
    ));
}
