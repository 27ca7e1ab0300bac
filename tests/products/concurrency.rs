use std::sync::Arc;
use std::thread;

use transact_rust::{InMemoryStore, SharedUnitOfWorkManager};

use crate::support::{committed_products, product_bus, CreateProduct, Log};

#[test]
fn concurrent_sends_use_independent_units_of_work() {
    let store = InMemoryStore::new();
    let uow: SharedUnitOfWorkManager = Arc::new(store.clone());
    let log: Log = Arc::default();
    let bus = product_bus(uow.clone(), log.clone());

    thread::scope(|scope| {
        for worker in 0..8 {
            let bus = bus.clone();
            scope.spawn(move || {
                for n in 0..10 {
                    bus.send(CreateProduct::new(format!("w{}-{}", worker, n)))
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(committed_products(uow.as_ref()).len(), 80);
    assert_eq!(log.lock().unwrap().len(), 80);

    let stats = store.stats();
    assert_eq!(stats.commits, 80);
    assert_eq!(stats.open, 0);
}
