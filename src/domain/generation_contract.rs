use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{GenerationError, SchemaDescriptor};

/// A typed value that can describe its own schema to a backend.
pub trait StructuredOutput: Serialize + DeserializeOwned {
    fn schema() -> SchemaDescriptor;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub schema: SchemaDescriptor,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, schema: SchemaDescriptor) -> Self {
        Self {
            prompt: prompt.into(),
            schema,
        }
    }

    pub fn for_output<T: StructuredOutput>(prompt: impl Into<String>) -> Self {
        Self::new(prompt, T::schema())
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.prompt.trim().is_empty() {
            return Err(GenerationError::invalid_request("prompt must not be empty"));
        }
        self.schema.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationUsage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl GenerationUsage {
    /// Returns `None` when the backend reported no counts at all.
    pub fn from_counts(
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
        total_tokens: Option<u32>,
    ) -> Option<Self> {
        let total_tokens = total_tokens.or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => input.checked_add(output),
            _ => None,
        });

        if input_tokens.is_none() && output_tokens.is_none() && total_tokens.is_none() {
            return None;
        }

        Some(Self {
            input_tokens,
            output_tokens,
            total_tokens,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub backend: String,
    pub model: String,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub provider_request_id: Option<String>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<GenerationUsage>,
}

/// A value that already passed schema validation, plus call metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub value: Value,
    pub metadata: GenerationMetadata,
}

impl GenerationOutput {
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, GenerationError> {
        T::deserialize(&self.value).map_err(|err| {
            GenerationError::malformed_output(
                format!(
                    "output did not decode into {}: {err}",
                    std::any::type_name::<T>()
                ),
                self.value.to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{GenerationMetadata, GenerationOutput, GenerationRequest, GenerationUsage};
    use crate::domain::{FieldDescriptor, GenerationError, LedgerAccount, SchemaDescriptor};

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new("Greeting").field(FieldDescriptor::string("text", "Greeting text"))
    }

    #[test]
    fn validate_rejects_blank_prompt() {
        let error = GenerationRequest::new("   ", schema())
            .validate()
            .expect_err("blank prompt must fail");

        assert!(matches!(
            error,
            GenerationError::InvalidRequest { message } if message == "prompt must not be empty"
        ));
    }

    #[test]
    fn validate_rejects_schema_without_fields() {
        let error = GenerationRequest::new("say hi", SchemaDescriptor::new("Nothing"))
            .validate()
            .expect_err("schema without fields must fail");

        assert!(matches!(error, GenerationError::InvalidRequest { .. }));
    }

    #[test]
    fn for_output_uses_type_schema() {
        let request = GenerationRequest::for_output::<LedgerAccount>("a cash account");

        assert_eq!(request.schema.name(), "LedgerAccount");
        request.validate().expect("ledger account request should be valid");
    }

    #[test]
    fn usage_from_counts_derives_total() {
        assert_eq!(
            GenerationUsage::from_counts(Some(12), Some(8), None),
            Some(GenerationUsage {
                input_tokens: Some(12),
                output_tokens: Some(8),
                total_tokens: Some(20),
            })
        );
        assert_eq!(GenerationUsage::from_counts(None, None, None), None);
    }

    #[test]
    fn into_typed_reports_decode_failure_as_malformed_output() {
        let output = GenerationOutput {
            value: json!({ "name": "Cash" }),
            metadata: GenerationMetadata::default(),
        };

        let error = output
            .into_typed::<LedgerAccount>()
            .expect_err("incomplete value must not decode");

        assert!(matches!(error, GenerationError::MalformedOutput { .. }));
    }
}
