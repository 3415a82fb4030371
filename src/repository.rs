//! Keyed JSON collections
//!
//! Progress, favorites and feedback are all id → record maps persisted as a
//! JSON array under one storage key. [`KeyedRepository`] owns the in-memory
//! copy, loads it once, and writes the whole collection back after every
//! mutation. Malformed stored data is logged and treated as absent.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::storage::KeyValueStore;

/// A record addressable by a string id
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for crate::types::SessionProgress {
    fn key(&self) -> &str {
        &self.session_id
    }
}

impl Keyed for crate::types::FavoriteEntry {
    fn key(&self) -> &str {
        &self.session_id
    }
}

impl Keyed for crate::types::SessionFeedback {
    fn key(&self) -> &str {
        &self.session_id
    }
}

/// In-memory collection mirrored to a [`KeyValueStore`] entry
pub struct KeyedRepository<T, S> {
    store: S,
    storage_key: String,
    records: BTreeMap<String, T>,
}

impl<T, S> KeyedRepository<T, S>
where
    T: Keyed + Serialize + DeserializeOwned,
    S: KeyValueStore,
{
    /// Open the collection stored under `storage_key`
    pub fn open(store: S, storage_key: impl Into<String>) -> Self {
        let mut repo = Self {
            store,
            storage_key: storage_key.into(),
            records: BTreeMap::new(),
        };
        repo.reload();
        repo
    }

    /// Re-read the collection from the store, discarding the in-memory copy
    pub fn reload(&mut self) {
        self.records = self.load();
    }

    fn load(&self) -> BTreeMap<String, T> {
        let raw = match self.store.get(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeMap::new(),
            Err(e) => {
                warn!(key = %self.storage_key, error = %e, "Failed to read stored records");
                return BTreeMap::new();
            }
        };

        let items: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(key = %self.storage_key, error = %e, "Stored records are not a JSON array, ignoring");
                return BTreeMap::new();
            }
        };

        let mut records = BTreeMap::new();
        for (index, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<T>(item) {
                Ok(record) => {
                    records.insert(record.key().to_string(), record);
                }
                Err(e) => {
                    warn!(key = %self.storage_key, index, error = %e, "Skipping malformed record");
                }
            }
        }
        debug!(key = %self.storage_key, count = records.len(), "Loaded records");
        records
    }

    fn persist(&self) {
        let items: Vec<&T> = self.records.values().collect();
        let json = match serde_json::to_string(&items) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %self.storage_key, error = %e, "Failed to serialize records");
                return;
            }
        };
        if let Err(e) = self.store.set(&self.storage_key, &json) {
            warn!(key = %self.storage_key, error = %e, "Failed to write records, keeping in-memory copy");
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Records ordered by id
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or replace the record with the same key
    pub fn upsert(&mut self, record: T) {
        self.records.insert(record.key().to_string(), record);
        self.persist();
    }

    /// Apply `f` to an existing record and persist. Returns false if absent.
    pub fn update<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        match self.records.get_mut(id) {
            Some(record) => {
                f(record);
                self.persist();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        let removed = self.records.remove(id);
        if removed.is_some() {
            self.persist();
        }
        removed
    }

    /// Keep only records matching `keep`. Returns the number removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.records.len();
        self.records.retain(|_, record| keep(record));
        let removed = before - self.records.len();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    /// Drop every record and the storage entry itself
    pub fn clear(&mut self) {
        self.records.clear();
        if let Err(e) = self.store.remove(&self.storage_key) {
            warn!(key = %self.storage_key, error = %e, "Failed to remove stored records");
        }
    }
}
