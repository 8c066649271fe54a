//! JSON Schema compilation and content validation (spec §4.4, `Validate`).
//!
//! Validation is total: a validation failure is a normal [`ValidationOutcome`]
//! value, not an error-return in the transport-edge sense (spec §4.4). The
//! coordination layer is the one that turns `Invalid` into a domain
//! rejection before ever proposing to consensus.

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// JSON Pointer to the offending location, e.g. `/port`.
    pub field_path: String,
    pub message: String,
    /// Debug rendering of the offending value (full fidelity `Value`
    /// equality isn't needed here, only a human-readable reproduction).
    pub offending_value: String,
}

/// The result of validating content against a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Valid,
    Errors(Vec<FieldError>),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

/// Parses `schema_text` as JSON and compiles it as a JSON Schema,
/// rejecting malformed JSON or a structurally invalid schema with
/// [`SchemaError::Invalid`] (spec §4.4, `Create`/`Update`).
pub fn compile(schema_text: &str) -> Result<(), SchemaError> {
    let schema_value: serde_json::Value =
        serde_json::from_str(schema_text).map_err(|e| SchemaError::Invalid {
            reason: format!("schema_text is not valid JSON: {e}"),
        })?;

    jsonschema::validator_for(&schema_value).map_err(|e| SchemaError::Invalid {
        reason: format!("not a valid JSON Schema: {e}"),
    })?;

    Ok(())
}

/// Validates `content` against `schema_text`, reporting every failing
/// field rather than short-circuiting on the first one (spec §4.4,
/// "Errors report field path, message, and offending value").
#[tracing::instrument(skip(schema_text, content))]
pub fn validate(
    schema_text: &str,
    content: &serde_json::Value,
) -> Result<ValidationOutcome, SchemaError> {
    let schema_value: serde_json::Value =
        serde_json::from_str(schema_text).map_err(|e| SchemaError::Invalid {
            reason: format!("schema_text is not valid JSON: {e}"),
        })?;

    let validator = jsonschema::validator_for(&schema_value).map_err(|e| SchemaError::Invalid {
        reason: format!("not a valid JSON Schema: {e}"),
    })?;

    let errors: Vec<FieldError> = validator
        .iter_errors(content)
        .map(|err| FieldError {
            field_path: err.instance_path.to_string(),
            message: err.to_string(),
            offending_value: err.instance.to_string(),
        })
        .collect();

    if errors.is_empty() {
        tracing::debug!("content validated against schema");
        Ok(ValidationOutcome::Valid)
    } else {
        tracing::warn!(error_count = errors.len(), "content failed schema validation");
        Ok(ValidationOutcome::Errors(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORT_SCHEMA: &str = r#"{
        "type": "object",
        "properties": { "port": { "type": "integer", "minimum": 1, "maximum": 65535 } },
        "required": ["port"]
    }"#;

    #[test]
    fn conforming_content_is_valid() {
        let outcome = validate(PORT_SCHEMA, &serde_json::json!({"port": 8080})).unwrap();
        assert!(outcome.is_valid());
    }

    #[test]
    fn out_of_range_content_is_rejected_with_field_path() {
        let outcome = validate(PORT_SCHEMA, &serde_json::json!({"port": 99999})).unwrap();
        match outcome {
            ValidationOutcome::Errors(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field_path, "/port");
            }
            ValidationOutcome::Valid => panic!("expected validation errors"),
        }
    }

    #[test]
    fn malformed_schema_text_is_invalid() {
        let err = compile("{not json").unwrap_err();
        assert!(matches!(err, SchemaError::Invalid { .. }));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let outcome = validate(PORT_SCHEMA, &serde_json::json!({})).unwrap();
        assert!(!outcome.is_valid());
    }
}
