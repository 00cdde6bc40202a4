//! JSON Schema checks for capability inputs.

use crate::error::ToolError;
use serde_json::Value;

/// Check that `schema` compiles.
pub fn validate_schema(schema: &Value) -> Result<(), ToolError> {
    jsonschema::Validator::new(schema)
        .map(|_| ())
        .map_err(|e| ToolError::InvalidSchema(e.to_string()))
}

/// Validate a tool input against a capability's input schema.
///
/// Every violation is reported, joined with `"; "`.
pub fn validate_input(schema: &Value, input: &Value) -> Result<(), ToolError> {
    let validator = jsonschema::Validator::new(schema)
        .map_err(|e| ToolError::InvalidSchema(e.to_string()))?;
    if validator.is_valid(input) {
        return Ok(());
    }
    let errors: Vec<String> = validator.iter_errors(input).map(|e| e.to_string()).collect();
    Err(ToolError::InvalidInput(errors.join("; ")))
}
