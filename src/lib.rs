//! Configuration Schema Registry
//!
//! A registry for versioned configuration schemas. Organizations publish
//! named, semantically versioned JSON/YAML schemas under a namespace, fetch
//! them back, list their version history, delete individual versions, and
//! validate configuration documents against a stored version.
//!
//! ## Features
//!
//! - **Immutable Versions**: A version is written once; there is no update
//! - **Monotonic Publishing**: Each new version must succeed the family's latest
//! - **JSON or YAML**: Documents are normalized to one canonical form
//! - **Checksum Validation**: SHA256 checksums guard every stored record
//! - **Draft 7 Validation**: Schemas and configurations are checked with JSON-Schema Draft 7
//!
//! ## Key Layout
//!
//! ```text
//! acme/prod/database/v1.0.0
//! acme/prod/database/v1.1.0
//! acme/prod/database/v2.0.0-rc.1
//! └──┬─┘└─┬┘└───┬──┘└──┬─────┘
//!  org   ns   name   version
//! ```

pub mod authz;
pub mod backend;
pub mod checksum;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod fs;
pub mod identity;
pub mod memory;
pub mod namespace;
pub mod request;
pub mod service;
pub mod store;
pub mod validator;
pub mod version;

pub use authz::{AllowAll, Authorizer, CallerIdentity, TokenAuthorizer};
pub use backend::{KeyValue, KvBackend};
pub use checksum::Checksum;
pub use config::RegistryConfig;
pub use error::{BackendError, RequestError, SchemaError, ServiceError, StoreError};
pub use events::{EventDispatcher, EventPublisher, SchemaPublished};
pub use fs::FsBackend;
pub use identity::SchemaIdentity;
pub use memory::MemoryBackend;
pub use namespace::{NamespaceDirectory, StaticNamespaces};
pub use request::{SaveSchemaRequest, ValidateConfigurationRequest};
pub use service::{Outcome, SchemaService, Status};
pub use store::{SchemaRecord, VersionedStore};
pub use validator::ValidationOutcome;
pub use version::SchemaVersion;
