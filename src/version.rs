//! Schema versioning utilities
//!
//! Versions are written with a leading `v` (`v1.4.0`, `v2.0.0-rc.1`).
//! Precedence follows semver: build metadata never affects ordering.

use std::cmp::Ordering;
use std::fmt;

use semver::Version;

use crate::error::VersionError;

/// A parsed schema version
#[derive(Debug, Clone)]
pub struct SchemaVersion {
    version: Version,
}

impl SchemaVersion {
    /// Parse a `v`-prefixed version string
    pub fn parse(version_str: &str) -> Result<Self, VersionError> {
        let bare = version_str
            .strip_prefix('v')
            .ok_or_else(|| VersionError::MissingPrefix(version_str.to_string()))?;
        let version = Version::parse(bare).map_err(|e| VersionError::Malformed {
            version: version_str.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { version })
    }

    pub fn is_valid(version_str: &str) -> bool {
        Self::parse(version_str).is_ok()
    }

    /// Semver precedence, ignoring build metadata
    pub fn precedence(&self, other: &SchemaVersion) -> Ordering {
        let (a, b) = (&self.version, &other.version);
        a.major
            .cmp(&b.major)
            .then(a.minor.cmp(&b.minor))
            .then(a.patch.cmp(&b.patch))
            .then_with(|| match (a.pre.is_empty(), b.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => a.pre.cmp(&b.pre),
            })
    }

    /// Whether this version may follow `latest` in a family
    pub fn succeeds(&self, latest: &SchemaVersion) -> bool {
        self.precedence(latest) == Ordering::Greater
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.version)
    }
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.precedence(other) == Ordering::Equal
    }
}

impl Eq for SchemaVersion {}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence(other)
    }
}

/// Compare two version strings by semver precedence
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, VersionError> {
    Ok(SchemaVersion::parse(a)?.precedence(&SchemaVersion::parse(b)?))
}
