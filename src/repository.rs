//! Repository - typed CRUD view over one entity type inside a unit of work.

use std::marker::PhantomData;

use crate::entity::Entity;
use crate::error::UnitOfWorkError;
use crate::uow::{decode, encode, Entry, UnitOfWork};

/// CRUD access to entities of type `E`, scoped to one open [`UnitOfWork`].
///
/// Obtained from [`UnitOfWork::repository`]. Reads see this transaction's
/// own pending writes; nothing is durable until the unit of work commits.
///
/// ```ignore
/// let mut products = tx.repository::<Product>()?;
/// products.add(Product::new("p-1", "foo"))?;
/// products.get("p-1")?.name = "bar".into(); // tracked, saved on commit
/// tx.commit()?;
/// ```
pub struct Repository<'a, E> {
    uow: &'a mut UnitOfWork,
    _marker: PhantomData<E>,
}

impl<'a, E: Entity> Repository<'a, E> {
    pub(crate) fn new(uow: &'a mut UnitOfWork) -> Self {
        Self {
            uow,
            _marker: PhantomData,
        }
    }

    /// Schedule a new entity for insertion.
    ///
    /// Fails with `AlreadyExists` if an entity with the same id is visible
    /// to this transaction.
    pub fn add(&mut self, entity: E) -> Result<(), UnitOfWorkError> {
        self.uow.ensure_open("add")?;
        let id = entity.id().to_string();

        let tracked = match self.uow.tracker.collection::<E>().entries.get(&id) {
            Some(Entry::Deleted) => Some(false),
            Some(_) => Some(true),
            None => None,
        };
        let exists = match tracked {
            Some(exists) => exists,
            None => self.uow.connection().fetch(E::COLLECTION, &id)?.is_some(),
        };
        if exists {
            return Err(UnitOfWorkError::AlreadyExists {
                collection: E::COLLECTION,
                id,
            });
        }

        tracing::trace!(collection = E::COLLECTION, id = %id, "entity added");
        self.uow
            .tracker
            .collection::<E>()
            .entries
            .insert(id, Entry::Added(entity));
        Ok(())
    }

    /// Fetch an entity by id.
    ///
    /// The returned reference is tracked: mutate it in place and the change
    /// is written when the unit of work commits.
    pub fn get(&mut self, id: &str) -> Result<&mut E, UnitOfWorkError> {
        self.uow.ensure_open("get")?;
        self.load(id)?;

        self.uow
            .tracker
            .collection::<E>()
            .entries
            .get_mut(id)
            .and_then(Entry::entity_mut)
            .ok_or_else(|| not_found::<E>(id))
    }

    /// Schedule an entity for removal. A later `get` in the same transaction
    /// reports `NotFound`.
    pub fn delete(&mut self, id: &str) -> Result<(), UnitOfWorkError> {
        self.uow.ensure_open("delete")?;
        if !self.load(id)? {
            return Err(not_found::<E>(id));
        }

        tracing::trace!(collection = E::COLLECTION, id = %id, "entity deleted");
        self.uow
            .tracker
            .collection::<E>()
            .entries
            .insert(id.to_string(), Entry::Deleted);
        Ok(())
    }

    /// Whether an entity with this id is visible to the transaction.
    pub fn contains(&mut self, id: &str) -> Result<bool, UnitOfWorkError> {
        self.uow.ensure_open("contains")?;
        self.load(id)
    }

    /// All visible entities matching a predicate, as copies.
    ///
    /// Merges committed rows with this transaction's pending adds and
    /// deletes. Every matched entity becomes tracked.
    pub fn find<F>(&mut self, predicate: F) -> Result<Vec<E>, UnitOfWorkError>
    where
        F: Fn(&E) -> bool,
    {
        self.uow.ensure_open("find")?;
        let mut ids = self.uow.connection().ids(E::COLLECTION)?;
        for id in self.uow.tracker.collection::<E>().entries.keys() {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids.sort();

        let mut found = Vec::new();
        for id in ids {
            if !self.load(&id)? {
                continue;
            }
            let entity = self
                .uow
                .tracker
                .collection::<E>()
                .entries
                .get_mut(&id)
                .and_then(Entry::entity_mut);
            if let Some(entity) = entity {
                if predicate(&*entity) {
                    found.push(entity.clone());
                }
            }
        }
        Ok(found)
    }

    /// Make sure `id` is tracked, fetching it from the connection if needed.
    /// Returns whether the entity is visible (tracked and not deleted).
    fn load(&mut self, id: &str) -> Result<bool, UnitOfWorkError> {
        if let Some(entry) = self.uow.tracker.collection::<E>().entries.get(id) {
            return Ok(!matches!(entry, Entry::Deleted));
        }

        let Some(document) = self.uow.connection().fetch(E::COLLECTION, id)? else {
            return Ok(false);
        };
        let entity: E = decode(&document)?;
        // Snapshot the re-encoded form so an untouched entity compares equal.
        let snapshot = encode(&entity)?;
        self.uow.tracker.collection::<E>().entries.insert(
            id.to_string(),
            Entry::Loaded { entity, snapshot },
        );
        Ok(true)
    }
}

fn not_found<E: Entity>(id: &str) -> UnitOfWorkError {
    UnitOfWorkError::NotFound {
        collection: E::COLLECTION,
        id: id.to_string(),
    }
}
