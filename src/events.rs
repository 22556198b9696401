//! Post-commit events
//!
//! A successful save emits [`SchemaPublished`]. The [`EventDispatcher`] owns
//! delivery to the relationship registrar: it retries with a fixed backoff and
//! logs failures. Nothing here can fail a save.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::authz::{RES_ORG, RES_SCHEMA};
use crate::identity::SchemaIdentity;

/// Emitted once a schema version has been committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaPublished {
    pub identity: SchemaIdentity,
}

/// A typed resource reference in the authorization graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    pub id: String,
}

impl SchemaPublished {
    /// The organization that owns the schema
    pub fn owner(&self) -> ResourceRef {
        ResourceRef {
            kind: RES_ORG.to_string(),
            id: self.identity.organization.clone(),
        }
    }

    /// The published schema version
    pub fn resource(&self) -> ResourceRef {
        ResourceRef {
            kind: RES_SCHEMA.to_string(),
            id: self.identity.schema_resource_id(),
        }
    }
}

#[derive(Error, Debug)]
#[error("relationship registration failed: {0}")]
pub struct RegistrationError(pub String);

/// Records that `to` inherits permissions from `from`
#[async_trait]
pub trait RelationshipRegistrar: Send + Sync {
    async fn register_inheritance(&self, from: &ResourceRef, to: &ResourceRef) -> Result<(), RegistrationError>;
}

/// Registrar that only logs. Used when no authorization service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRegistrar;

#[async_trait]
impl RelationshipRegistrar for LoggingRegistrar {
    async fn register_inheritance(&self, from: &ResourceRef, to: &ResourceRef) -> Result<(), RegistrationError> {
        info!(from = %from.id, to = %to.id, "inheritance relationship (not forwarded)");
        Ok(())
    }
}

/// Delivery settings for the dispatcher
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub queue_capacity: usize,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(200),
            queue_capacity: 256,
        }
    }
}

/// Handle used by the service to emit events. Never blocks a save.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: Option<mpsc::Sender<SchemaPublished>>,
}

impl EventPublisher {
    /// Publisher that discards every event
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn publish(&self, event: SchemaPublished) {
        let Some(sender) = &self.sender else {
            debug!(identity = %event.identity, "event publishing disabled");
            return;
        };
        if let Err(e) = sender.try_send(event) {
            let event = match e {
                mpsc::error::TrySendError::Full(event) | mpsc::error::TrySendError::Closed(event) => event,
            };
            warn!(identity = %event.identity, "event queue unavailable, relationship not registered");
        }
    }
}

/// Background task delivering published events to a registrar
pub struct EventDispatcher {
    publisher: EventPublisher,
    worker: JoinHandle<()>,
}

impl EventDispatcher {
    /// Start the delivery task on the current runtime
    pub fn spawn(registrar: Arc<dyn RelationshipRegistrar>, policy: DispatchPolicy) -> Self {
        let (sender, mut receiver) = mpsc::channel::<SchemaPublished>(policy.queue_capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                deliver(registrar.as_ref(), &event, policy).await;
            }
            debug!("event dispatcher drained");
        });
        Self {
            publisher: EventPublisher {
                sender: Some(sender),
            },
            worker,
        }
    }

    pub fn publisher(&self) -> EventPublisher {
        self.publisher.clone()
    }

    /// Stop accepting events and wait for queued ones to be delivered.
    ///
    /// Publishers cloned from this dispatcher keep the queue open until they
    /// are dropped as well.
    pub async fn shutdown(self) {
        drop(self.publisher);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "event dispatcher task failed");
        }
    }
}

async fn deliver(registrar: &dyn RelationshipRegistrar, event: &SchemaPublished, policy: DispatchPolicy) {
    let (from, to) = (event.owner(), event.resource());
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match registrar.register_inheritance(&from, &to).await {
            Ok(()) => {
                debug!(schema = %to.id, attempt, "relationship registered");
                return;
            }
            Err(e) if attempt < attempts => {
                warn!(schema = %to.id, attempt, error = %e, "relationship registration failed, retrying");
                tokio::time::sleep(policy.retry_backoff).await;
            }
            Err(e) => {
                warn!(schema = %to.id, attempt, error = %e, "giving up on relationship registration");
            }
        }
    }
}
