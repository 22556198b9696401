//! JSON-Schema validation of schemas and configurations
//!
//! Every schema is compiled as JSON-Schema Draft 7, both when it is published
//! and when a configuration is validated against it. Compilation also checks
//! the schema against the Draft 7 meta-schema.

use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document;
use crate::error::{Result, SchemaError};

/// The JSON-Schema draft used for every compilation
pub const SCHEMA_DRAFT: Draft = Draft::Draft7;

/// Message reported for a configuration that satisfies its schema
pub const VALID_CONFIGURATION_MESSAGE: &str = "The configuration is valid!";

/// Result of checking one configuration against one schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub message: String,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            valid: true,
            message: VALID_CONFIGURATION_MESSAGE.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

fn compile(schema: &Value) -> Result<JSONSchema> {
    JSONSchema::options()
        .with_draft(SCHEMA_DRAFT)
        .compile(schema)
        .map_err(|e| SchemaError::InvalidSchemaDocument(e.to_string()))
}

/// Parse a schema document and make sure it compiles.
///
/// Returns the canonical form so callers do not parse twice.
pub fn check_schema_well_formed(document: &str) -> Result<Value> {
    let schema = document::parse(document)
        .map_err(|e| SchemaError::InvalidSchemaSyntax(e.to_string()))?;
    compile(&schema)?;
    Ok(schema)
}

/// Validate a configuration document against a schema document.
///
/// When the configuration violates the schema, the message is the first
/// error yielded by the `jsonschema` evaluator; its ordering is defined by
/// that crate, not here.
pub fn validate_configuration(configuration: &str, schema: &str) -> Result<ValidationOutcome> {
    let instance = document::parse(configuration)
        .map_err(|e| SchemaError::InvalidConfigurationSyntax(e.to_string()))?;
    let schema = document::parse(schema)
        .map_err(|e| SchemaError::InvalidSchemaSyntax(e.to_string()))?;
    validate_value(&instance, &schema)
}

/// Validate already-parsed documents
pub fn validate_value(instance: &Value, schema: &Value) -> Result<ValidationOutcome> {
    let compiled = compile(schema)?;
    let outcome = match compiled.validate(instance) {
        Ok(()) => ValidationOutcome::valid(),
        Err(mut errors) => match errors.next() {
            Some(first) => ValidationOutcome::invalid(first.to_string()),
            None => ValidationOutcome::valid(),
        },
    };
    Ok(outcome)
}
