use reqwest::StatusCode;
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    GenerationError, GenerationMetadata, GenerationOutput, GenerationRequest, GenerationUsage,
};

use super::config::{NativeBackend, NativeParseConfig};
use super::env::{
    read_env_var, resolve_base_url, resolve_credential, resolve_model, resolve_timeout,
};
use super::generator::StructuredGenerator;
use super::http::{HttpReply, build_client, classify_status, send_json};
use super::response_parsing::{
    non_empty_owned, null_as_default, strip_code_fence, truncate_message,
};
use super::schema_validator::SchemaValidator;

const BACKEND_ID: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";
const STRUCTURED_OUTPUTS_BETA: &str = "structured-outputs-2025-11-13";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const ENV_API_KEY: &str = "TABULA_ANTHROPIC_API_KEY";
const ENV_API_KEY_FALLBACK: &str = "ANTHROPIC_API_KEY";
const ENV_BASE_URL: &str = "TABULA_ANTHROPIC_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "TABULA_ANTHROPIC_TIMEOUT_SECS";
const REQUEST_ID_HEADERS: &[&str] = &["request-id"];

/// Native-Parse adapter over the Anthropic Messages API with structured outputs.
pub struct AnthropicAdapter {
    api_key: SecretString,
    api_base_url: String,
    model: String,
    max_tokens: u32,
    client: Client,
}

impl AnthropicAdapter {
    pub fn new(config: NativeParseConfig) -> Result<Self, GenerationError> {
        Self::with_env(config, &read_env_var)
    }

    pub fn from_env() -> Result<Self, GenerationError> {
        Self::new(NativeParseConfig::anthropic())
    }

    pub fn with_env<E>(config: NativeParseConfig, env: &E) -> Result<Self, GenerationError>
    where
        E: Fn(&str) -> Result<Option<String>, GenerationError>,
    {
        if config.backend != NativeBackend::Anthropic {
            return Err(GenerationError::configuration(
                "Anthropic adapter requires backend = anthropic",
            ));
        }

        let api_key = resolve_credential(
            config.api_key,
            &[ENV_API_KEY, ENV_API_KEY_FALLBACK],
            "Anthropic API key",
            env,
        )?;
        let api_base_url = resolve_base_url(config.base_url, ENV_BASE_URL, DEFAULT_BASE_URL, env)?;
        let model = resolve_model(config.model, DEFAULT_MODEL)?;
        let timeout = resolve_timeout(config.timeout_secs, ENV_TIMEOUT_SECS, env)?;
        let client = build_client("Anthropic", timeout)?;

        Ok(Self {
            api_key,
            api_base_url,
            model,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn endpoint_url(&self) -> String {
        format!("{}/v1/messages", self.api_base_url)
    }

    fn build_request_payload(&self, request: &GenerationRequest) -> AnthropicMessagesRequest {
        AnthropicMessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.prompt.trim().to_string(),
            }],
            output_format: AnthropicOutputFormat {
                format_type: "json_schema".to_string(),
                schema: request.schema.to_json_schema(),
            },
        }
    }

    fn map_success_response(
        &self,
        validator: &SchemaValidator,
        reply: HttpReply,
    ) -> Result<GenerationOutput, GenerationError> {
        let response: AnthropicMessagesResponse =
            serde_json::from_str(&reply.body).map_err(|err| {
                GenerationError::malformed_output(
                    format!("Anthropic response decode failed: {err}"),
                    reply.body.as_str(),
                )
            })?;

        let joined_text = response
            .content
            .iter()
            .filter_map(AnthropicContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("");
        if joined_text.trim().is_empty() {
            let stop_reason = response.stop_reason.as_deref().unwrap_or("unknown");
            return Err(GenerationError::empty_response(
                format!(
                    "Anthropic response did not include a text content block (stop_reason: {stop_reason})"
                ),
                Some(reply.body),
            ));
        }

        let value = validator.validate_json(&strip_code_fence(&joined_text))?;

        let provider_request_id = reply
            .request_id
            .or_else(|| response.id.as_deref().and_then(non_empty_owned));
        let model = response
            .model
            .as_deref()
            .and_then(non_empty_owned)
            .unwrap_or_else(|| self.model.clone());

        Ok(GenerationOutput {
            value,
            metadata: GenerationMetadata {
                backend: BACKEND_ID.to_string(),
                model,
                latency_ms: Some(reply.latency_ms),
                provider_request_id,
                stop_reason: response.stop_reason.as_deref().and_then(non_empty_owned),
                usage: response.usage.and_then(map_usage),
            },
        })
    }
}

impl StructuredGenerator for AnthropicAdapter {
    fn backend_id(&self) -> &str {
        BACKEND_ID
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        request.validate()?;
        let validator = SchemaValidator::new(&request.schema)?;
        let payload = self.build_request_payload(request);
        let endpoint = self.endpoint_url();

        tracing::debug!(
            backend = BACKEND_ID,
            model = %self.model,
            endpoint = %endpoint,
            schema = validator.schema_name(),
            "sending structured generation request"
        );
        let http_request = self
            .client
            .post(endpoint)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("anthropic-beta", STRUCTURED_OUTPUTS_BETA);
        let reply = send_json("Anthropic", http_request, &payload, REQUEST_ID_HEADERS)?;

        if !reply.status.is_success() {
            return Err(map_http_error(reply.status, &reply.body));
        }
        self.map_success_response(&validator, reply)
    }
}

#[derive(Debug, Serialize)]
struct AnthropicMessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<AnthropicMessage>,
    output_format: AnthropicOutputFormat,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicOutputFormat {
    #[serde(rename = "type")]
    format_type: String,
    schema: Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicMessagesResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
    #[serde(default, deserialize_with = "null_as_default")]
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl AnthropicContentBlock {
    fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Other => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

fn map_usage(usage: AnthropicUsage) -> Option<GenerationUsage> {
    GenerationUsage::from_counts(usage.input_tokens, usage.output_tokens, None)
}

fn map_http_error(status: StatusCode, body: &str) -> GenerationError {
    let parsed_error = serde_json::from_str::<AnthropicErrorEnvelope>(body).ok();
    let detail = parsed_error
        .as_ref()
        .and_then(|envelope| envelope.error.as_ref());

    // Anthropic error types line up with their HTTP status.
    if let Some(error) = classify_status(status) {
        return error;
    }

    let message = detail
        .map(|detail| detail.message.clone())
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| truncate_message(body));
    GenerationError::Transport {
        message: format!("Anthropic API returned HTTP {status}: {message}"),
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorEnvelope {
    #[serde(default)]
    error: Option<AnthropicErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    #[serde(default)]
    message: String,
}
