use jsonschema::JSONSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{GenerationError, SchemaDescriptor};

use super::response_parsing::truncate_message;

/// Compiled JSON Schema for one [`SchemaDescriptor`].
pub struct SchemaValidator {
    schema_name: String,
    compiled_schema: JSONSchema,
}

impl SchemaValidator {
    pub fn new(schema: &SchemaDescriptor) -> Result<Self, GenerationError> {
        schema.validate()?;
        let json_schema = schema.to_json_schema();
        let compiled_schema = JSONSchema::compile(&json_schema).map_err(|err| {
            GenerationError::internal(format!(
                "failed to compile JSON schema for '{}': {err}",
                schema.name()
            ))
        })?;
        Ok(Self {
            schema_name: schema.name().to_string(),
            compiled_schema,
        })
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn validate_json(&self, text: &str) -> Result<Value, GenerationError> {
        let value: Value = serde_json::from_str(text).map_err(|err| {
            GenerationError::malformed_output(
                format!(
                    "output is not valid JSON ({err}): {}",
                    truncate_message(text)
                ),
                text,
            )
        })?;
        self.validate_value(value)
    }

    pub fn validate_value(&self, value: Value) -> Result<Value, GenerationError> {
        let violations = self
            .compiled_schema
            .validate(&value)
            .err()
            .map(describe_violations);

        if let Some(details) = violations {
            return Err(GenerationError::malformed_output(
                format!(
                    "output does not satisfy schema '{}': {details}",
                    self.schema_name
                ),
                value.to_string(),
            ));
        }
        Ok(value)
    }

    pub fn decode<T: DeserializeOwned>(&self, value: Value) -> Result<T, GenerationError> {
        let raw = value.to_string();
        serde_json::from_value(value).map_err(|err| {
            GenerationError::malformed_output(
                format!(
                    "output matched schema '{}' but did not decode: {err}",
                    self.schema_name
                ),
                raw,
            )
        })
    }

    pub fn validate_typed<T: DeserializeOwned>(&self, text: &str) -> Result<T, GenerationError> {
        let value = self.validate_json(text)?;
        self.decode(value)
    }
}

fn describe_violations<'a, I>(errors: I) -> String
where
    I: IntoIterator<Item = jsonschema::ValidationError<'a>>,
{
    errors
        .into_iter()
        .map(|err| {
            let path = err.instance_path.to_string();
            if path.is_empty() {
                err.to_string()
            } else {
                format!("{path}: {err}")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
