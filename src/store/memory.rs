//! In-memory coordination store

use super::{KeyValue, KvStore};
use crate::common::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

struct Inner {
    revision: i64,
    entries: BTreeMap<String, (Vec<u8>, i64)>,
}

/// In-memory store with a global revision counter.
///
/// Linearizable by construction (one mutex). Can be switched unavailable to
/// exercise the transport-failure paths of its callers.
pub struct MemStore {
    inner: Mutex<Inner>,
    available: AtomicBool,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                revision: 0,
                entries: BTreeMap::new(),
            }),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing (or regaining) the store quorum
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Current store revision
    pub fn revision(&self) -> Result<i64> {
        Ok(self.lock()?.revision)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::StoreTransport("store unavailable".into()));
        }
        self.inner
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".into()))
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemStore {
    async fn get(&self, key: &str) -> Result<Vec<KeyValue>> {
        let inner = self.lock()?;
        Ok(inner
            .entries
            .get(key)
            .map(|(value, rev)| KeyValue {
                key: key.to_string(),
                value: value.clone(),
                mod_revision: *rev,
            })
            .into_iter()
            .collect())
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>> {
        let inner = self.lock()?;
        Ok(inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, (value, rev))| KeyValue {
                key: k.clone(),
                value: value.clone(),
                mod_revision: *rev,
            })
            .collect())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut inner = self.lock()?;
        inner.revision += 1;
        let rev = inner.revision;
        inner.entries.insert(key.to_string(), (value, rev));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let mut inner = self.lock()?;
        match inner.entries.remove(key) {
            Some(_) => {
                inner.revision += 1;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
