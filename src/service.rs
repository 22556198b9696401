//! Schema service
//!
//! Wires request validation, permission checks, the versioned store, and the
//! schema validator into the five registry operations. Each operation returns
//! an [`Outcome`] carrying a status code and message; only permission and
//! namespace failures are returned as errors.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, warn};

use crate::authz::{
    Authorizer, CallerIdentity, PermissionCheck, PERM_SCHEMA_DEL, PERM_SCHEMA_GET, PERM_SCHEMA_PUT,
    RES_NAMESPACE, RES_SCHEMA,
};
use crate::error::{RequestError, ServiceError, StoreError};
use crate::events::{EventPublisher, SchemaPublished};
use crate::identity::{self, SchemaIdentity};
use crate::namespace::NamespaceDirectory;
use crate::request::{self, SaveSchemaRequest, ValidateConfigurationRequest};
use crate::store::{SchemaRecord, VersionedStore};
use crate::validator::{self, ValidationOutcome};
use crate::version::SchemaVersion;

/// Status codes, numerically aligned with gRPC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Ok = 0,
    InvalidArgument = 3,
    NotFound = 5,
    AlreadyExists = 6,
    Internal = 13,
    Unavailable = 14,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Result of one registry operation
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub status: Status,
    pub message: String,
    pub payload: Option<T>,
}

impl<T> Outcome<T> {
    pub fn ok(message: impl Into<String>, payload: Option<T>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
            payload,
        }
    }

    pub fn failed(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            payload: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

impl<T> From<RequestError> for Outcome<T> {
    fn from(err: RequestError) -> Self {
        Outcome::failed(Status::InvalidArgument, err.to_string())
    }
}

impl<T> From<StoreError> for Outcome<T> {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::AlreadyExists { .. } => Status::AlreadyExists,
            StoreError::NotFound { .. } => Status::NotFound,
            StoreError::Unavailable(_) => Status::Unavailable,
            StoreError::InvalidKey { .. } | StoreError::Document(_) => Status::InvalidArgument,
            StoreError::MalformedKey(_) | StoreError::Corrupted { .. } => {
                error!(error = %err, "store integrity fault");
                Status::Internal
            }
        };
        Outcome::failed(status, err.to_string())
    }
}

pub const SAVED_MESSAGE: &str = "Schema saved successfully!";
pub const RETRIEVED_MESSAGE: &str = "Schema retrieved successfully!";
pub const DELETED_MESSAGE: &str = "Schema deleted successfully!";
pub const VERSIONS_MESSAGE: &str = "Schema versions retrieved successfully!";

/// The registry operations over injected collaborators
#[derive(Clone)]
pub struct SchemaService {
    store: VersionedStore,
    authorizer: Arc<dyn Authorizer>,
    namespaces: Arc<dyn NamespaceDirectory>,
    events: EventPublisher,
}

impl SchemaService {
    pub fn new(
        store: VersionedStore,
        authorizer: Arc<dyn Authorizer>,
        namespaces: Arc<dyn NamespaceDirectory>,
        events: EventPublisher,
    ) -> Self {
        Self {
            store,
            authorizer,
            namespaces,
            events,
        }
    }

    pub fn store(&self) -> &VersionedStore {
        &self.store
    }

    async fn require(&self, caller: &CallerIdentity, check: PermissionCheck<'_>) -> Result<(), ServiceError> {
        if self.authorizer.authorize(caller, check).await {
            Ok(())
        } else {
            warn!(permission = check.permission, resource = check.resource_id, "permission denied");
            Err(ServiceError::PermissionDenied {
                permission: check.permission,
            })
        }
    }

    async fn require_namespace(&self, identity: &SchemaIdentity) -> Result<(), ServiceError> {
        let exists = self
            .namespaces
            .namespace_exists(&identity.organization, &identity.namespace)
            .await
            .map_err(|e| ServiceError::NamespaceDirectory(e.to_string()))?;
        if exists {
            Ok(())
        } else {
            Err(ServiceError::NamespaceNotFound {
                organization: identity.organization.clone(),
                namespace: identity.namespace.clone(),
            })
        }
    }

    /// Publish a new schema version.
    ///
    /// The version must succeed the family's current latest version. The
    /// check and the write are separate backend calls, so concurrent saves to
    /// one family are only serialized per exact key.
    pub async fn save(&self, caller: &CallerIdentity, request: &SaveSchemaRequest) -> Result<Outcome<()>, ServiceError> {
        let identity = &request.identity;
        self.require_namespace(identity).await?;
        let resource_id = identity.namespace_resource_id();
        self.require(
            caller,
            PermissionCheck {
                permission: PERM_SCHEMA_PUT,
                resource_kind: RES_NAMESPACE,
                resource_id: &resource_id,
            },
        )
        .await?;

        if let Err(e) = request::validate_save(request) {
            warn!(field = e.field, reason = %e.reason, "rejected save request");
            return Ok(e.into());
        }

        let latest = match self.store.latest_version(identity).await {
            Ok(latest) => latest,
            Err(e) => return Ok(e.into()),
        };
        if let Some(latest) = latest {
            if !Self::succeeds(identity.version_str(), &latest) {
                return Ok(Outcome::failed(
                    Status::InvalidArgument,
                    format!(
                        "Provided version is not latest! Please provide a version that succeeds '{latest}'!"
                    ),
                ));
            }
        }

        if let Err(e) = self.store.save(identity, &request.schema).await {
            return Ok(e.into());
        }
        self.events.publish(SchemaPublished {
            identity: identity.clone(),
        });
        Ok(Outcome::ok(SAVED_MESSAGE, Some(())))
    }

    fn succeeds(candidate: &str, latest: &str) -> bool {
        match (SchemaVersion::parse(candidate), SchemaVersion::parse(latest)) {
            (Ok(candidate), Ok(latest)) => candidate.succeeds(&latest),
            _ => false,
        }
    }

    /// Fetch one exact version. A missing schema is not an error.
    pub async fn get(
        &self,
        caller: &CallerIdentity,
        identity: &SchemaIdentity,
    ) -> Result<Outcome<SchemaRecord>, ServiceError> {
        let resource_id = identity.schema_resource_id();
        self.require(
            caller,
            PermissionCheck {
                permission: PERM_SCHEMA_GET,
                resource_kind: RES_SCHEMA,
                resource_id: &resource_id,
            },
        )
        .await?;
        if let Err(e) = request::validate_lookup(identity) {
            return Ok(e.into());
        }

        Ok(match self.store.get(identity).await {
            Ok(Some(record)) => Outcome::ok(RETRIEVED_MESSAGE, Some(record)),
            Ok(None) => Outcome::ok(
                format!("No schema with key '{}' found!", identity::encode_key(identity)),
                None,
            ),
            Err(e) => e.into(),
        })
    }

    /// Delete one exact version
    pub async fn delete(&self, caller: &CallerIdentity, identity: &SchemaIdentity) -> Result<Outcome<()>, ServiceError> {
        let resource_id = identity.schema_resource_id();
        self.require(
            caller,
            PermissionCheck {
                permission: PERM_SCHEMA_DEL,
                resource_kind: RES_SCHEMA,
                resource_id: &resource_id,
            },
        )
        .await?;
        if let Err(e) = request::validate_lookup(identity) {
            return Ok(e.into());
        }

        Ok(match self.store.delete(identity).await {
            Ok(()) => Outcome::ok(DELETED_MESSAGE, Some(())),
            Err(e) => e.into(),
        })
    }

    /// Validate a configuration against a stored schema version
    pub async fn validate(
        &self,
        caller: &CallerIdentity,
        request: &ValidateConfigurationRequest,
    ) -> Result<Outcome<ValidationOutcome>, ServiceError> {
        let identity = &request.identity;
        let resource_id = identity.schema_resource_id();
        self.require(
            caller,
            PermissionCheck {
                permission: PERM_SCHEMA_GET,
                resource_kind: RES_SCHEMA,
                resource_id: &resource_id,
            },
        )
        .await?;
        if let Err(e) = request::validate_configuration_request(request) {
            return Ok(e.into());
        }

        let record = match self.store.get(identity).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Ok(StoreError::NotFound {
                    key: identity::encode_key(identity),
                }
                .into())
            }
            Err(e) => return Ok(e.into()),
        };

        Ok(match validator::validate_configuration(&request.configuration, &record.schema) {
            Ok(outcome) => Outcome::ok(outcome.message.clone(), Some(outcome)),
            Err(e) => Outcome::failed(Status::InvalidArgument, e.to_string()),
        })
    }

    /// Every stored version of a family, ascending
    pub async fn list_versions(
        &self,
        caller: &CallerIdentity,
        family: &SchemaIdentity,
    ) -> Result<Outcome<Vec<SchemaRecord>>, ServiceError> {
        let resource_id = family.namespace_resource_id();
        self.require(
            caller,
            PermissionCheck {
                permission: PERM_SCHEMA_PUT,
                resource_kind: RES_NAMESPACE,
                resource_id: &resource_id,
            },
        )
        .await?;
        if let Err(e) = request::validate_versions_request(family) {
            return Ok(e.into());
        }

        Ok(match self.store.list_by_prefix(family).await {
            Ok(records) if records.is_empty() => Outcome::ok(
                format!("No schema with prefix '{}' found!", identity::encode_prefix(family)),
                Some(records),
            ),
            Ok(records) => Outcome::ok(VERSIONS_MESSAGE, Some(records)),
            Err(e) => e.into(),
        })
    }
}
