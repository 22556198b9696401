//! Versioned schema store
//!
//! Records are immutable: a version is either created once or deleted.
//! The store guarantees single-key atomicity only. Saving requires the
//! exact key to be absent; the rule that a new version must succeed the
//! family's latest is checked by the caller before the write, so two
//! concurrent saves to the same family can both succeed with different
//! versions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::backend::KvBackend;
use crate::checksum::Checksum;
use crate::document::{self, OutputFormat};
use crate::error::{BackendResult, SchemaError, StoreError, StoreResult};
use crate::identity::{self, SchemaIdentity};
use crate::version::SchemaVersion;

/// Default bound on a single backend call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A stored schema version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub identity: SchemaIdentity,
    /// Canonical (compact JSON) text of the schema
    pub schema: String,
    pub checksum: Checksum,
    pub created_at: DateTime<Utc>,
}

impl SchemaRecord {
    /// The schema in canonical structured form
    pub fn document(&self) -> Result<Value, SchemaError> {
        document::parse(&self.schema).map_err(|e| SchemaError::InvalidSchemaSyntax(e.to_string()))
    }

    /// The schema rendered as YAML or pretty JSON
    pub fn render(&self, format: OutputFormat) -> Result<String, SchemaError> {
        document::render(&self.document()?, format)
            .map_err(|e| SchemaError::InvalidSchemaSyntax(e.to_string()))
    }
}

/// What is written under a composite key. The identity is the key itself.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    schema: String,
    checksum: Checksum,
    created_at: DateTime<Utc>,
}

/// Versioned store over a key-value backend
#[derive(Clone)]
pub struct VersionedStore {
    backend: Arc<dyn KvBackend>,
    timeout: Duration,
}

impl VersionedStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self::with_timeout(backend, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(backend: Arc<dyn KvBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one backend call under the per-call timeout. A timeout is
    /// reported as `Unavailable`, indistinguishable from a connection failure.
    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = BackendResult<T>>,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Unavailable(format!(
                "{op} timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Persist a new version in canonical form.
    ///
    /// Fails with `AlreadyExists` if this exact identity is already stored.
    pub async fn save(&self, identity: &SchemaIdentity, schema_document: &str) -> StoreResult<SchemaRecord> {
        let canonical = document::parse(schema_document)
            .map_err(|e| SchemaError::InvalidSchemaSyntax(e.to_string()))?;
        let schema = document::to_canonical_string(&canonical);
        let stored = StoredRecord {
            checksum: Checksum::of_text(&schema),
            schema,
            created_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&stored).map_err(|e| StoreError::Corrupted {
            key: identity.to_string(),
            reason: e.to_string(),
        })?;

        let key = identity::encode_key(identity);
        debug!(%key, "saving schema");
        self.bounded("put", self.backend.put_if_absent(&key, Bytes::from(bytes)))
            .await?;
        info!(%key, checksum = %stored.checksum, "schema saved");

        Ok(SchemaRecord {
            identity: identity.clone(),
            schema: stored.schema,
            checksum: stored.checksum,
            created_at: stored.created_at,
        })
    }

    /// Exact-key lookup; `None` when nothing is stored there
    pub async fn get(&self, identity: &SchemaIdentity) -> StoreResult<Option<SchemaRecord>> {
        let key = identity::encode_key(identity);
        debug!(%key, "getting schema");
        match self.bounded("get", self.backend.get(&key)).await? {
            Some(bytes) => Ok(Some(Self::decode_record(identity.clone(), &key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Exact-key delete; `NotFound` when nothing was stored there
    pub async fn delete(&self, identity: &SchemaIdentity) -> StoreResult<()> {
        let key = identity::encode_key(identity);
        debug!(%key, "deleting schema");
        if self.bounded("delete", self.backend.delete(&key)).await? {
            info!(%key, "schema deleted");
            Ok(())
        } else {
            Err(StoreError::NotFound { key })
        }
    }

    /// Every version of the family, ascending by semver precedence
    pub async fn list_by_prefix(&self, family: &SchemaIdentity) -> StoreResult<Vec<SchemaRecord>> {
        let prefix = identity::scan_prefix(family);
        debug!(%prefix, "scanning schema family");
        let pairs = self.bounded("scan", self.backend.scan_prefix(&prefix)).await?;

        let mut versioned = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let decoded = identity::decode_key(&pair.key)
                .and_then(|id| {
                    let version = SchemaVersion::parse(id.version_str())
                        .map_err(|_| StoreError::MalformedKey(pair.key.clone()))?;
                    Ok((id, version))
                })
                .and_then(|(id, version)| {
                    let record = Self::decode_record(id, &pair.key, &pair.value)?;
                    Ok((version, record))
                });
            match decoded {
                Ok(entry) => versioned.push(entry),
                Err(e) => {
                    error!(key = %pair.key, error = %e, "integrity fault during family scan");
                    return Err(e);
                }
            }
        }

        versioned.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(versioned.into_iter().map(|(_, record)| record).collect())
    }

    /// Version string of the family's highest version, if any
    pub async fn latest_version(&self, family: &SchemaIdentity) -> StoreResult<Option<String>> {
        let records = self.list_by_prefix(family).await?;
        Ok(records
            .last()
            .map(|record| record.identity.version_str().to_string()))
    }

    fn decode_record(identity: SchemaIdentity, key: &str, bytes: &[u8]) -> StoreResult<SchemaRecord> {
        let stored: StoredRecord = serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupted {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        if !stored.checksum.verify(&stored.schema) {
            return Err(StoreError::Corrupted {
                key: key.to_string(),
                reason: format!("checksum mismatch, expected {}", stored.checksum),
            });
        }
        Ok(SchemaRecord {
            identity,
            schema: stored.schema,
            checksum: stored.checksum,
            created_at: stored.created_at,
        })
    }
}
