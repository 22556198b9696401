//! Namespace existence checks
//!
//! Publishing is refused unless the target namespace exists. The registry
//! does not own namespaces; it asks a [`NamespaceDirectory`].

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("namespace lookup failed: {0}")]
pub struct NamespaceError(pub String);

#[async_trait]
pub trait NamespaceDirectory: Send + Sync {
    async fn namespace_exists(&self, organization: &str, namespace: &str) -> Result<bool, NamespaceError>;
}

/// A fixed list of `organization/namespace` pairs. An empty list accepts
/// every namespace.
#[derive(Debug, Clone, Default)]
pub struct StaticNamespaces {
    known: HashSet<(String, String)>,
}

impl StaticNamespaces {
    /// Accept every namespace
    pub fn open() -> Self {
        Self::default()
    }

    /// Entries are written `organization/namespace`; malformed entries are skipped.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known = entries
            .into_iter()
            .filter_map(|entry| {
                let (org, ns) = entry.as_ref().split_once('/')?;
                (!org.is_empty() && !ns.is_empty() && !ns.contains('/'))
                    .then(|| (org.to_string(), ns.to_string()))
            })
            .collect();
        Self { known }
    }

    pub fn is_open(&self) -> bool {
        self.known.is_empty()
    }
}

#[async_trait]
impl NamespaceDirectory for StaticNamespaces {
    async fn namespace_exists(&self, organization: &str, namespace: &str) -> Result<bool, NamespaceError> {
        if self.is_open() {
            return Ok(true);
        }
        Ok(self
            .known
            .contains(&(organization.to_string(), namespace.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_directory() {
        assert!(StaticNamespaces::open().namespace_exists("any", "thing").await.unwrap());
    }

    #[tokio::test]
    async fn test_listed_namespaces() {
        let dir = StaticNamespaces::from_entries(["acme/prod", "acme/dev", "broken", "a/b/c"]);
        assert!(dir.namespace_exists("acme", "prod").await.unwrap());
        assert!(!dir.namespace_exists("acme", "staging").await.unwrap());
        assert!(!dir.namespace_exists("a", "b/c").await.unwrap());
    }
}
