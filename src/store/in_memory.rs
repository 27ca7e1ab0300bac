//! InMemoryStore - HashMap-backed store for testing and development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use super::{Change, Connection, Store, StoreError};

/// Configuration for an [`InMemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of simultaneously open connections. `None` is unlimited.
    #[serde(default)]
    pub max_connections: Option<usize>,
}

impl StoreConfig {
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }
}

/// Point-in-time counters for an [`InMemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Connections opened over the store's lifetime.
    pub opened: u64,
    /// Connections currently open.
    pub open: usize,
    pub commits: u64,
    pub rollbacks: u64,
}

#[derive(Default)]
struct Shared {
    rows: RwLock<HashMap<String, Vec<u8>>>,
    config: StoreConfig,
    open: AtomicUsize,
    opened: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

/// In-memory store backed by a HashMap.
///
/// Storage key is `"COLLECTION:id"`. Clone-friendly via Arc; clones share
/// the same rows.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                ..Shared::default()
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            opened: self.shared.opened.load(Ordering::SeqCst),
            open: self.shared.open.load(Ordering::SeqCst),
            commits: self.shared.commits.load(Ordering::SeqCst),
            rollbacks: self.shared.rollbacks.load(Ordering::SeqCst),
        }
    }

    fn make_key(collection: &str, id: &str) -> String {
        format!("{}:{}", collection, id)
    }

    fn acquire_slot(&self) -> Result<(), StoreError> {
        let limit = self.shared.config.max_connections;
        self.shared
            .open
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |open| match limit {
                Some(max) if open >= max => None,
                _ => Some(open + 1),
            })
            .map_err(|open| {
                StoreError::Unavailable(format!("connection limit reached ({} open)", open))
            })?;
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Store for InMemoryStore {
    fn connect(&self) -> Result<Box<dyn Connection>, StoreError> {
        self.acquire_slot()?;
        Ok(Box::new(InMemoryConnection {
            shared: Arc::clone(&self.shared),
            active: false,
            staged: Vec::new(),
            closed: false,
        }))
    }
}

/// A connection to an [`InMemoryStore`].
///
/// Flushed changes are staged on the connection and applied to the shared
/// rows under a single write lock at commit, so other connections never see
/// a partial transaction.
pub struct InMemoryConnection {
    shared: Arc<Shared>,
    active: bool,
    staged: Vec<Change>,
    closed: bool,
}

impl InMemoryConnection {
    fn ensure_active(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.active && !self.closed {
            Ok(())
        } else {
            Err(StoreError::NoTransaction(operation))
        }
    }

    fn staged_document(&self, collection: &str, id: &str) -> Option<Option<&Vec<u8>>> {
        self.staged
            .iter()
            .rev()
            .find(|change| change.collection() == collection && change.id() == id)
            .map(|change| match change {
                Change::Put { document, .. } => Some(document),
                Change::Delete { .. } => None,
            })
    }
}

impl Connection for InMemoryConnection {
    fn begin(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Unavailable("connection closed".into()));
        }
        self.active = true;
        self.staged.clear();
        Ok(())
    }

    fn fetch(&mut self, collection: &str, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_active("fetch")?;
        if let Some(staged) = self.staged_document(collection, id) {
            return Ok(staged.cloned());
        }

        let rows = self
            .shared
            .rows
            .read()
            .map_err(|_| StoreError::Poisoned("fetch"))?;
        Ok(rows.get(&InMemoryStore::make_key(collection, id)).cloned())
    }

    fn ids(&mut self, collection: &str) -> Result<Vec<String>, StoreError> {
        self.ensure_active("ids")?;
        let prefix = format!("{}:", collection);
        let mut ids: Vec<String> = {
            let rows = self
                .shared
                .rows
                .read()
                .map_err(|_| StoreError::Poisoned("ids"))?;
            rows.keys()
                .filter_map(|key| key.strip_prefix(&prefix))
                .map(str::to_string)
                .collect()
        };

        for change in self.staged.iter().filter(|c| c.collection() == collection) {
            match change {
                Change::Put { id, .. } if !ids.contains(id) => ids.push(id.clone()),
                Change::Delete { id, .. } => ids.retain(|existing| existing != id),
                _ => {}
            }
        }

        ids.sort();
        Ok(ids)
    }

    fn flush(&mut self, changes: Vec<Change>) -> Result<(), StoreError> {
        self.ensure_active("flush")?;
        self.staged.extend(changes);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_active("commit")?;
        {
            let mut rows = self
                .shared
                .rows
                .write()
                .map_err(|_| StoreError::Poisoned("commit"))?;
            for change in self.staged.drain(..) {
                match change {
                    Change::Put {
                        collection,
                        id,
                        document,
                    } => {
                        rows.insert(InMemoryStore::make_key(collection, &id), document);
                    }
                    Change::Delete { collection, id } => {
                        rows.remove(&InMemoryStore::make_key(collection, &id));
                    }
                }
            }
        }
        self.active = false;
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.ensure_active("rollback")?;
        self.staged.clear();
        self.active = false;
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        if self.active {
            self.staged.clear();
            self.active = false;
            self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        }
        self.closed = true;
        self.shared.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for InMemoryConnection {
    fn drop(&mut self) {
        self.close();
    }
}
