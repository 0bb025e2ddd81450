use crate::domain::{GenerationError, GenerationRequest};

use super::config::SchemaDelivery;

const SCHEMA_PREAMBLE: &str = "You must respond with valid JSON that matches this exact schema:";
const JSON_ONLY_INSTRUCTION: &str = "Respond ONLY with valid JSON, no other text or explanations.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    pub system: Option<String>,
    pub user: String,
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// Appends the pretty-printed JSON Schema and a JSON-only instruction to
    /// the caller's prompt.
    pub fn augment(request: &GenerationRequest) -> Result<String, GenerationError> {
        let schema = render_schema(request)?;
        let prompt = request.prompt.trim();
        Ok(format!(
            "{prompt}\n\n{SCHEMA_PREAMBLE}\n{schema}\n\n{JSON_ONLY_INSTRUCTION}"
        ))
    }

    pub fn build(
        request: &GenerationRequest,
        delivery: SchemaDelivery,
        system_prompt: Option<&str>,
    ) -> Result<BuiltPrompt, GenerationError> {
        let user = match delivery {
            SchemaDelivery::Prompt => Self::augment(request)?,
            SchemaDelivery::ResponseFormat => request.prompt.trim().to_string(),
        };
        let system = system_prompt
            .map(str::trim)
            .filter(|system| !system.is_empty())
            .map(str::to_owned);

        Ok(BuiltPrompt { system, user })
    }
}

pub(crate) fn render_schema(request: &GenerationRequest) -> Result<String, GenerationError> {
    serde_json::to_string_pretty(&request.schema.to_json_schema()).map_err(|err| {
        GenerationError::internal(format!(
            "failed to render JSON schema for '{}': {err}",
            request.schema.name()
        ))
    })
}
