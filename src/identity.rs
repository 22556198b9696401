//! Schema identity and key composition
//!
//! A schema is addressed by `organization/namespace/name/version`. The
//! composite key addresses exactly one record; the prefix key
//! (`organization/namespace/name`) addresses every version of one schema.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Separator between key components. Request validation keeps it out of every field.
pub const KEY_SEPARATOR: char = '/';

/// Who a schema belongs to, what it is called, and (optionally) which version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaIdentity {
    pub organization: String,
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SchemaIdentity {
    pub fn new(
        organization: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            namespace: namespace.into(),
            name: name.into(),
            version: Some(version.into()),
        }
    }

    /// An identity naming a whole version family
    pub fn family(
        organization: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            namespace: namespace.into(),
            name: name.into(),
            version: None,
        }
    }

    /// Same family, different version
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..self.clone()
        }
    }

    pub fn version_str(&self) -> &str {
        self.version.as_deref().unwrap_or_default()
    }

    /// Resource id used for namespace-scoped permission checks
    pub fn namespace_resource_id(&self) -> String {
        format!("{}{}{}", self.organization, KEY_SEPARATOR, self.namespace)
    }

    /// Resource id used for schema-scoped permission checks
    pub fn schema_resource_id(&self) -> String {
        encode_key(self)
    }
}

impl fmt::Display for SchemaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(_) => f.write_str(&encode_key(self)),
            None => f.write_str(&encode_prefix(self)),
        }
    }
}

/// Composite key of a single record.
///
/// A missing version encodes as an empty last component; callers validate
/// that a version is present before touching storage.
pub fn encode_key(identity: &SchemaIdentity) -> String {
    let mut key = encode_prefix(identity);
    key.push(KEY_SEPARATOR);
    key.push_str(identity.version_str());
    key
}

/// Prefix key of a version family, without a trailing separator
pub fn encode_prefix(identity: &SchemaIdentity) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        identity.organization,
        identity.namespace,
        identity.name,
        sep = KEY_SEPARATOR
    )
}

/// Scan prefix for a family: the prefix key plus one separator, so `app`
/// never matches keys of `app-v2`.
pub fn scan_prefix(identity: &SchemaIdentity) -> String {
    let mut prefix = encode_prefix(identity);
    prefix.push(KEY_SEPARATOR);
    prefix
}

/// Split a composite key back into its identity
pub fn decode_key(key: &str) -> Result<SchemaIdentity, StoreError> {
    let tokens: Vec<&str> = key.split(KEY_SEPARATOR).collect();
    match tokens.as_slice() {
        [organization, namespace, name, version] => Ok(SchemaIdentity::new(
            *organization,
            *namespace,
            *name,
            *version,
        )),
        _ => Err(StoreError::MalformedKey(key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_key_and_prefix() {
        let id = SchemaIdentity::new("acme", "prod", "db", "v1.2.0");
        assert_eq!(encode_key(&id), "acme/prod/db/v1.2.0");
        assert_eq!(encode_prefix(&id), "acme/prod/db");
        assert_eq!(scan_prefix(&id), "acme/prod/db/");
        assert_eq!(id.namespace_resource_id(), "acme/prod");
    }

    #[test]
    fn test_decode_inverts_encode() {
        let id = SchemaIdentity::new("acme", "prod", "db", "v1.2.0-rc.1+build.7");
        assert_eq!(decode_key(&encode_key(&id)).unwrap(), id);
    }

    #[test]
    fn test_decode_rejects_wrong_arity() {
        assert!(matches!(
            decode_key("acme/prod/db"),
            Err(StoreError::MalformedKey(_))
        ));
        assert!(matches!(
            decode_key("acme/prod/db/v1.0.0/extra"),
            Err(StoreError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_display_family_and_exact() {
        let family = SchemaIdentity::family("acme", "prod", "db");
        assert_eq!(family.to_string(), "acme/prod/db");
        assert_eq!(family.with_version("v2.0.0").to_string(), "acme/prod/db/v2.0.0");
    }
}
