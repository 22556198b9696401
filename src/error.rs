//! Error types for the schema registry
//!
//! Each layer owns its error enum. The service layer folds the store and
//! request errors into structured outcomes; only [`ServiceError`] crosses the
//! external boundary as a failure.

use std::sync::Arc;

use thiserror::Error;

/// A shareable boxed error used to keep source chains on backend failures.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type for document and schema validation
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Result type for backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Result type for versioned store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures while parsing or compiling schema and configuration documents
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Invalid schema syntax: {0}")]
    InvalidSchemaSyntax(String),

    #[error("Invalid JSON schema: {0}")]
    InvalidSchemaDocument(String),

    #[error("Invalid configuration syntax: {0}")]
    InvalidConfigurationSyntax(String),
}

/// A rejected request: which field was wrong and why
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct RequestError {
    pub field: &'static str,
    pub reason: String,
}

impl RequestError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Version strings that do not follow `v`-prefixed semver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("version '{0}' is missing the 'v' prefix")]
    MissingPrefix(String),

    #[error("version '{version}' is not valid semver: {reason}")]
    Malformed { version: String, reason: String },
}

/// Errors raised by a key-value backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Key already present: {key}")]
    Conflict { key: String },

    #[error("Key cannot be stored by this backend: {key}")]
    InvalidKey { key: String },
}

impl BackendError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Unavailable {
            message: context.into(),
            source: Some(Arc::new(source)),
        }
    }
}

/// Versioned store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Key '{key}' already exists!")]
    AlreadyExists { key: String },

    #[error("No schema with key '{key}' found!")]
    NotFound { key: String },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Key '{key}' cannot be stored by this backend")]
    InvalidKey { key: String },

    #[error("Malformed key in store: {0}")]
    MalformedKey(String),

    #[error("Stored record '{key}' is corrupted: {reason}")]
    Corrupted { key: String, reason: String },

    #[error(transparent)]
    Document(#[from] SchemaError),
}

impl StoreError {
    /// Integrity faults abort the operation and are never caused by the caller.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(self, StoreError::MalformedKey(_) | StoreError::Corrupted { .. })
    }
}

impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Conflict { key } => StoreError::AlreadyExists { key },
            BackendError::InvalidKey { key } => StoreError::InvalidKey { key },
            other @ BackendError::Unavailable { .. } => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Failures surfaced at the transport level rather than as an outcome
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("permission denied: {permission}")]
    PermissionDenied { permission: &'static str },

    #[error("namespace '{organization}/{namespace}' not found")]
    NamespaceNotFound {
        organization: String,
        namespace: String,
    },

    #[error("namespace directory unavailable: {0}")]
    NamespaceDirectory(String),
}
