//! Permission checks
//!
//! The registry asks an [`Authorizer`] whether a caller holds a permission on
//! a resource. Permission names and resource kinds match the ones the
//! authorization service registers for schemas.

use std::collections::HashSet;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const PERM_SCHEMA_GET: &str = "config.get";
pub const PERM_SCHEMA_PUT: &str = "config.put";
/// Deletion is guarded by the same permission as publishing.
pub const PERM_SCHEMA_DEL: &str = "config.put";

pub const RES_ORG: &str = "org";
pub const RES_NAMESPACE: &str = "namespace";
pub const RES_SCHEMA: &str = "schema";

/// The caller on whose behalf an operation runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    token: Option<String>,
}

impl CallerIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// A permission on a concrete resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionCheck<'a> {
    pub permission: &'static str,
    pub resource_kind: &'static str,
    pub resource_id: &'a str,
}

impl PermissionCheck<'_> {
    /// Encoded grant as carried in a token's `permissions` claim
    pub fn grant(&self) -> String {
        format!("{}|{}|{}", self.permission, self.resource_kind, self.resource_id)
    }
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, caller: &CallerIdentity, check: PermissionCheck<'_>) -> bool;
}

/// Grants everything. For local, single-operator use.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _caller: &CallerIdentity, _check: PermissionCheck<'_>) -> bool {
        true
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PermissionClaims {
    /// Comma-separated `permission|kind|id` grants
    permissions: String,
}

/// Authorizes from an HS256-signed token whose `permissions` claim lists
/// the caller's grants.
#[derive(Clone)]
pub struct TokenAuthorizer {
    key: DecodingKey,
    validation: Validation,
}

impl TokenAuthorizer {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is honored when present but not required.
        validation.required_spec_claims = HashSet::new();
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    fn grants(&self, token: &str) -> Option<Vec<String>> {
        match decode::<PermissionClaims>(token, &self.key, &self.validation) {
            Ok(data) => Some(
                data.claims
                    .permissions
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .collect(),
            ),
            Err(e) => {
                warn!(error = %e, "rejecting caller token");
                None
            }
        }
    }
}

#[async_trait]
impl Authorizer for TokenAuthorizer {
    async fn authorize(&self, caller: &CallerIdentity, check: PermissionCheck<'_>) -> bool {
        let Some(token) = caller.token() else {
            debug!("no token provided");
            return false;
        };
        let Some(grants) = self.grants(token) else {
            return false;
        };
        let required = check.grant();
        let allowed = grants.iter().any(|g| *g == required);
        if !allowed {
            debug!(%required, "required permission not found");
        }
        allowed
    }
}
