//! Identity map and change tracking for one unit of work.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};

use crate::entity::Entity;
use crate::error::UnitOfWorkError;
use crate::store::Change;

/// Tracked state of a single entity.
pub(crate) enum Entry<E> {
    /// Loaded from the store. `snapshot` is the document as fetched.
    Loaded { entity: E, snapshot: Vec<u8> },
    /// Scheduled for insertion by `add`.
    Added(E),
    /// Scheduled for removal.
    Deleted,
}

impl<E> Entry<E> {
    pub(crate) fn entity_mut(&mut self) -> Option<&mut E> {
        match self {
            Entry::Loaded { entity, .. } | Entry::Added(entity) => Some(entity),
            Entry::Deleted => None,
        }
    }
}

/// Type-erased view of a per-entity-type collection of entries.
trait TrackedCollection: Send {
    fn changes(&self) -> Result<Vec<Change>, UnitOfWorkError>;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct Collection<E: Entity> {
    pub(crate) entries: BTreeMap<String, Entry<E>>,
}

impl<E: Entity> TrackedCollection for Collection<E> {
    fn changes(&self) -> Result<Vec<Change>, UnitOfWorkError> {
        let mut changes = Vec::new();
        for (id, entry) in &self.entries {
            match entry {
                Entry::Loaded { entity, snapshot } => {
                    let document = encode(entity)?;
                    if &document != snapshot {
                        changes.push(Change::Put {
                            collection: E::COLLECTION,
                            id: id.clone(),
                            document,
                        });
                    }
                }
                Entry::Added(entity) => changes.push(Change::Put {
                    collection: E::COLLECTION,
                    id: id.clone(),
                    document: encode(entity)?,
                }),
                Entry::Deleted => changes.push(Change::Delete {
                    collection: E::COLLECTION,
                    id: id.clone(),
                }),
            }
        }
        Ok(changes)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Every entity checked out through a unit of work, grouped by type.
#[derive(Default)]
pub(crate) struct Tracker {
    collections: HashMap<TypeId, Box<dyn TrackedCollection>>,
}

impl Tracker {
    pub(crate) fn collection<E: Entity>(&mut self) -> &mut Collection<E> {
        let tracked = self
            .collections
            .entry(TypeId::of::<E>())
            .or_insert_with(|| {
                Box::new(Collection::<E> {
                    entries: BTreeMap::new(),
                })
            });
        match tracked.as_any_mut().downcast_mut::<Collection<E>>() {
            Some(collection) => collection,
            // Keyed by TypeId::of::<E>, so the downcast cannot miss.
            None => unreachable!("tracked collection type mismatch"),
        }
    }

    /// Collect the writes needed to persist every tracked entity.
    pub(crate) fn changes(&self) -> Result<Vec<Change>, UnitOfWorkError> {
        let mut changes = Vec::new();
        for collection in self.collections.values() {
            changes.extend(collection.changes()?);
        }
        Ok(changes)
    }

    pub(crate) fn clear(&mut self) {
        self.collections.clear();
    }
}

pub(crate) fn encode<E: Entity>(entity: &E) -> Result<Vec<u8>, UnitOfWorkError> {
    serde_json::to_vec(entity).map_err(|e| UnitOfWorkError::Serde {
        collection: E::COLLECTION,
        message: e.to_string(),
    })
}

pub(crate) fn decode<E: Entity>(document: &[u8]) -> Result<E, UnitOfWorkError> {
    serde_json::from_slice(document).map_err(|e| UnitOfWorkError::Serde {
        collection: E::COLLECTION,
        message: e.to_string(),
    })
}
