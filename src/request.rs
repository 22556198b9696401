//! Request types and their validation
//!
//! Validation is pure and runs before any storage access. Every failure
//! names the offending field.

use serde::{Deserialize, Serialize};

use crate::error::RequestError;
use crate::identity::{SchemaIdentity, KEY_SEPARATOR};
use crate::validator;
use crate::version::SchemaVersion;

/// Publish a new schema version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSchemaRequest {
    pub identity: SchemaIdentity,
    /// Schema document, JSON or YAML
    pub schema: String,
}

/// Check a configuration document against a stored schema version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateConfigurationRequest {
    pub identity: SchemaIdentity,
    /// Configuration document, JSON or YAML
    pub configuration: String,
}

fn non_empty(field: &'static str, value: &str) -> Result<(), RequestError> {
    if value.is_empty() {
        return Err(RequestError::new(field, format!("{field} cannot be empty")));
    }
    Ok(())
}

fn no_separator(field: &'static str, value: &str) -> Result<(), RequestError> {
    if value.contains(KEY_SEPARATOR) {
        return Err(RequestError::new(
            field,
            format!("{field} must not contain '{KEY_SEPARATOR}'"),
        ));
    }
    Ok(())
}

/// Key components double as path segments in the file-system backend
fn path_safe(field: &'static str, value: &str) -> Result<(), RequestError> {
    if value == "." || value == ".." {
        return Err(RequestError::new(field, format!("{field} must not be '{value}'")));
    }
    if value.contains('\\') {
        return Err(RequestError::new(field, format!("{field} must not contain '\\'")));
    }
    Ok(())
}

/// Identity checks shared by every operation
pub fn validate_identity(identity: &SchemaIdentity, version_required: bool) -> Result<(), RequestError> {
    non_empty("organization", &identity.organization)?;
    non_empty("namespace", &identity.namespace)?;
    non_empty("name", &identity.name)?;
    no_separator("organization", &identity.organization)?;
    no_separator("namespace", &identity.namespace)?;
    no_separator("name", &identity.name)?;
    path_safe("organization", &identity.organization)?;
    path_safe("namespace", &identity.namespace)?;
    path_safe("name", &identity.name)?;

    let version = identity.version_str();
    if version_required {
        non_empty("version", version)?;
        if !SchemaVersion::is_valid(version) {
            return Err(RequestError::new(
                "version",
                "schema version must be a valid SemVer string with 'v' prefix",
            ));
        }
    }
    no_separator("version", version)?;
    path_safe("version", version)
}

pub fn validate_save(request: &SaveSchemaRequest) -> Result<(), RequestError> {
    validate_identity(&request.identity, true)?;
    non_empty("schema", &request.schema)?;
    validator::check_schema_well_formed(&request.schema)
        .map_err(|e| RequestError::new("schema", e.to_string()))?;
    Ok(())
}

/// Get and delete address one exact version
pub fn validate_lookup(identity: &SchemaIdentity) -> Result<(), RequestError> {
    validate_identity(identity, true)
}

pub fn validate_configuration_request(request: &ValidateConfigurationRequest) -> Result<(), RequestError> {
    validate_identity(&request.identity, true)?;
    non_empty("configuration", &request.configuration)
}

/// Listing versions addresses a family; a version is not required
pub fn validate_versions_request(identity: &SchemaIdentity) -> Result<(), RequestError> {
    validate_identity(identity, false)
}
