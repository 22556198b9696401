//! In-memory key-value backend.
//!
//! Keys live in a [`BTreeMap`] behind a [`parking_lot::RwLock`], so prefix
//! scans are ordered range reads. Data is lost when the process exits.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::backend::{KeyValue, KvBackend};
use crate::error::{BackendError, BackendResult};

/// Cheaply cloneable; all clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Write a value unconditionally. Used to seed fixtures.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.data.write().insert(key.into(), value.into());
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn put_if_absent(&self, key: &str, value: Bytes) -> BackendResult<()> {
        let mut data = self.data.write();
        if data.contains_key(key) {
            return Err(BackendError::Conflict {
                key: key.to_string(),
            });
        }
        data.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<bool> {
        Ok(self.data.write().remove(key).is_some())
    }

    async fn scan_prefix(&self, prefix: &str) -> BackendResult<Vec<KeyValue>> {
        let data = self.data.read();
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| KeyValue::new(key.clone(), value.clone()))
            .collect())
    }
}
