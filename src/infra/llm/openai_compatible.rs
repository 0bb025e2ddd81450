use reqwest::StatusCode;
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    GenerationError, GenerationMetadata, GenerationOutput, GenerationRequest, GenerationUsage,
};

use super::config::{OLLAMA_BASE_URL, PromptInjectionConfig, SchemaDelivery};
use super::env::{
    read_env_var, resolve_base_url, resolve_credential, resolve_model, resolve_timeout,
};
use super::generator::StructuredGenerator;
use super::http::{HttpReply, build_client, classify_status, send_json};
use super::prompt_builder::PromptBuilder;
use super::response_parsing::{
    non_empty_owned, null_as_default, strip_code_fence, truncate_message,
};
use super::schema_validator::SchemaValidator;

const BACKEND_ID: &str = "openai_compatible";
const DEFAULT_MODEL: &str = "gpt-oss:20b";
const ENV_API_KEY: &str = "TABULA_OPENAI_COMPAT_API_KEY";
const ENV_API_KEY_FALLBACK: &str = "OPENAI_API_KEY";
const ENV_BASE_URL: &str = "TABULA_OPENAI_COMPAT_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "TABULA_OPENAI_COMPAT_TIMEOUT_SECS";
const REQUEST_ID_HEADERS: &[&str] = &["x-request-id", "request-id"];

/// Prompt-Injection adapter over OpenAI-style chat completions.
pub struct OpenAiCompatibleAdapter {
    api_key: SecretString,
    api_base_url: String,
    model: String,
    system_prompt: Option<String>,
    schema_delivery: SchemaDelivery,
    max_tokens: Option<u32>,
    client: Client,
}

impl OpenAiCompatibleAdapter {
    pub fn new(config: PromptInjectionConfig) -> Result<Self, GenerationError> {
        Self::with_env(config, &read_env_var)
    }

    pub fn from_env() -> Result<Self, GenerationError> {
        Self::new(PromptInjectionConfig::new())
    }

    pub fn with_env<E>(config: PromptInjectionConfig, env: &E) -> Result<Self, GenerationError>
    where
        E: Fn(&str) -> Result<Option<String>, GenerationError>,
    {
        let api_key = resolve_credential(
            config.api_key,
            &[ENV_API_KEY, ENV_API_KEY_FALLBACK],
            "OpenAI-compatible API key",
            env,
        )?;
        let api_base_url = resolve_base_url(config.base_url, ENV_BASE_URL, OLLAMA_BASE_URL, env)?;
        let model = resolve_model(config.model, DEFAULT_MODEL)?;
        let timeout = resolve_timeout(config.timeout_secs, ENV_TIMEOUT_SECS, env)?;
        let client = build_client("OpenAI-compatible", timeout)?;

        Ok(Self {
            api_key,
            api_base_url,
            model,
            system_prompt: config.system_prompt,
            schema_delivery: config.schema_delivery,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn endpoint_url(&self) -> String {
        build_v1_url(&self.api_base_url, "chat/completions")
    }

    fn build_request_payload(
        &self,
        request: &GenerationRequest,
    ) -> Result<OpenAiChatCompletionsRequest, GenerationError> {
        let prompt = PromptBuilder::build(
            request,
            self.schema_delivery,
            self.system_prompt.as_deref(),
        )?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = prompt.system {
            messages.push(OpenAiChatMessageRequest {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.push(OpenAiChatMessageRequest {
            role: "user".to_string(),
            content: prompt.user,
        });

        let response_format = match self.schema_delivery {
            SchemaDelivery::Prompt => None,
            SchemaDelivery::ResponseFormat => Some(OpenAiResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: OpenAiJsonSchema {
                    name: request.schema.name().to_string(),
                    schema: request.schema.to_json_schema(),
                    strict: request.schema.requires_every_field(),
                },
            }),
        };

        Ok(OpenAiChatCompletionsRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.0,
            max_tokens: self.max_tokens,
            response_format,
        })
    }

    fn map_success_response(
        &self,
        validator: &SchemaValidator,
        reply: HttpReply,
    ) -> Result<GenerationOutput, GenerationError> {
        let response: OpenAiChatCompletionsResponse =
            serde_json::from_str(&reply.body).map_err(|err| {
                GenerationError::malformed_output(
                    format!("OpenAI-compatible response decode failed: {err}"),
                    reply.body.as_str(),
                )
            })?;

        let mut response_text = None;
        let mut stop_reason = None;
        for choice in &response.choices {
            if let Some(text) = choice.extract_text() {
                response_text = Some(text);
                stop_reason = choice.finish_reason.as_deref().and_then(non_empty_owned);
                break;
            }
        }

        let Some(response_text) = response_text else {
            return Err(GenerationError::empty_response(
                "OpenAI-compatible response did not include text content",
                Some(reply.body),
            ));
        };

        let value = validator.validate_json(&strip_code_fence(&response_text))?;

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
                stop_reason,
                usage: response.usage.and_then(map_usage),
            },
        })
    }
}

impl StructuredGenerator for OpenAiCompatibleAdapter {
    fn backend_id(&self) -> &str {
        BACKEND_ID
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        request.validate()?;
        let validator = SchemaValidator::new(&request.schema)?;
        let payload = self.build_request_payload(request)?;
        let endpoint = self.endpoint_url();

        tracing::debug!(
            backend = BACKEND_ID,
            model = %self.model,
            endpoint = %endpoint,
            schema = validator.schema_name(),
            delivery = ?self.schema_delivery,
            "sending structured generation request"
        );
        let http_request = self
            .client
            .post(endpoint)
            .bearer_auth(self.api_key.expose_secret());
        let reply = send_json("OpenAI-compatible", http_request, &payload, REQUEST_ID_HEADERS)?;

        if !reply.status.is_success() {
            return Err(map_http_error(reply.status, &reply.body));
        }
        self.map_success_response(&validator, reply)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatCompletionsRequest {
    model: String,
    messages: Vec<OpenAiChatMessageRequest>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAiResponseFormat>,
}

#[derive(Debug, Serialize)]
struct OpenAiChatMessageRequest {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
    json_schema: OpenAiJsonSchema,
}

#[derive(Debug, Serialize)]
struct OpenAiJsonSchema {
    name: String,
    schema: Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatCompletionsResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    message: Option<OpenAiChoiceMessage>,
    #[serde(default)]
    text: Option<String>,
}

impl OpenAiChoice {
    fn extract_text(&self) -> Option<String> {
        if let Some(text) = self.text.as_deref().and_then(non_empty_owned) {
            return Some(text);
        }

        let content = self.message.as_ref()?.content.as_ref()?;
        extract_message_content(content)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    #[serde(default)]
    error: Option<OpenAiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

fn map_usage(usage: OpenAiUsage) -> Option<GenerationUsage> {
    GenerationUsage::from_counts(
        usage.prompt_tokens,
        usage.completion_tokens,
        usage.total_tokens,
    )
}

fn extract_message_content(content: &Value) -> Option<String> {
    match content {
        Value::String(text) => non_empty_owned(text),
        Value::Array(parts) => {
            let joined = parts
                .iter()
                .filter_map(extract_content_part_text)
                .collect::<String>();
            non_empty_owned(&joined)
        }
        _ => None,
    }
}

fn extract_content_part_text(part: &Value) -> Option<String> {
    match part {
        Value::String(text) => Some(text.to_string()),
        Value::Object(map) => map
            .get("text")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        _ => None,
    }
}

fn map_http_error(status: StatusCode, body: &str) -> GenerationError {
    let parsed_error = serde_json::from_str::<OpenAiErrorEnvelope>(body).ok();
    let detail = parsed_error
        .as_ref()
        .and_then(|envelope| envelope.error.as_ref());
    let error_type = detail.and_then(|detail| detail.error_type.as_deref());
    let error_code = detail.and_then(|detail| detail.code.as_deref());

    match (error_type, error_code) {
        (Some("authentication_error"), _) | (_, Some("invalid_api_key")) => {
            return GenerationError::Auth;
        }
        (Some("insufficient_quota"), _) | (_, Some("insufficient_quota")) => {
            return GenerationError::RateLimited;
        }
        _ => {}
    }
    if let Some(error) = classify_status(status) {
        return error;
    }

    let message = detail
        .map(|detail| detail.message.clone())
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| truncate_message(body));

    GenerationError::Transport {
        message: format!("OpenAI-compatible API returned HTTP {status}: {message}"),
    }
}

fn build_v1_url(api_base_url: &str, endpoint_path: &str) -> String {
    let base = api_base_url.trim_end_matches('/');
    let endpoint_path = endpoint_path.trim_start_matches('/');

    if base.ends_with("/v1") {
        format!("{base}/{endpoint_path}")
    } else {
        format!("{base}/v1/{endpoint_path}")
    }
}
