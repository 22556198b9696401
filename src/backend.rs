//! Key-value backend contract.
//!
//! The versioned store only needs four primitives from durable storage:
//! exact-key get, insert-if-absent, exact-key delete, and a prefix scan.
//! Keys are UTF-8 composite keys; values are opaque bytes.
//!
//! Backends are shared across concurrent operations and must be `Send + Sync`.
//! They do not apply timeouts themselves; the store bounds every call.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BackendResult;

/// Key-value pair returned from prefix scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Bytes,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Value stored at `key`, or `None` when absent
    async fn get(&self, key: &str) -> BackendResult<Option<Bytes>>;

    /// Store `value` at `key` only if the key is absent.
    ///
    /// Fails with [`Conflict`](crate::error::BackendError::Conflict) when a
    /// value is already present; the existing value is left untouched.
    async fn put_if_absent(&self, key: &str, value: Bytes) -> BackendResult<()>;

    /// Remove `key`. Returns whether a value was removed.
    async fn delete(&self, key: &str) -> BackendResult<bool>;

    /// Every pair whose key starts with `prefix`, ordered by key
    async fn scan_prefix(&self, prefix: &str) -> BackendResult<Vec<KeyValue>>;
}
