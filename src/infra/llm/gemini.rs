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

const BACKEND_ID: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const ENV_API_KEY: &str = "TABULA_GEMINI_API_KEY";
const ENV_API_KEY_FALLBACK: &str = "GEMINI_API_KEY";
const ENV_BASE_URL: &str = "TABULA_GEMINI_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "TABULA_GEMINI_TIMEOUT_SECS";
const REQUEST_ID_HEADERS: &[&str] = &["x-request-id"];

/// Native-Parse adapter over Gemini `generateContent` with `responseJsonSchema`.
pub struct GeminiAdapter {
    api_key: SecretString,
    api_base_url: String,
    model: String,
    max_output_tokens: u32,
    client: Client,
}

impl GeminiAdapter {
    pub fn new(config: NativeParseConfig) -> Result<Self, GenerationError> {
        Self::with_env(config, &read_env_var)
    }

    pub fn from_env() -> Result<Self, GenerationError> {
        Self::new(NativeParseConfig::gemini())
    }

    pub fn with_env<E>(config: NativeParseConfig, env: &E) -> Result<Self, GenerationError>
    where
        E: Fn(&str) -> Result<Option<String>, GenerationError>,
    {
        if config.backend != NativeBackend::Gemini {
            return Err(GenerationError::configuration(
                "Gemini adapter requires backend = gemini",
            ));
        }

        let api_key = resolve_credential(
            config.api_key,
            &[ENV_API_KEY, ENV_API_KEY_FALLBACK],
            "Gemini API key",
            env,
        )?;
        let api_base_url = resolve_base_url(config.base_url, ENV_BASE_URL, DEFAULT_BASE_URL, env)?;
        let model = resolve_model(config.model, DEFAULT_MODEL)?;
        let timeout = resolve_timeout(config.timeout_secs, ENV_TIMEOUT_SECS, env)?;
        let client = build_client("Gemini", timeout)?;

        Ok(Self {
            api_key,
            api_base_url,
            model,
            max_output_tokens: config.max_tokens,
            client,
        })
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base_url,
            urlencoding::encode(&self.model)
        )
    }

    fn build_request_payload(&self, request: &GenerationRequest) -> GeminiGenerateRequest {
        GeminiGenerateRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: request.prompt.trim().to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_json_schema: request.schema.to_json_schema(),
                temperature: 0.0,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }

    fn map_success_response(
        &self,
        validator: &SchemaValidator,
        reply: HttpReply,
    ) -> Result<GenerationOutput, GenerationError> {
        let response: GeminiGenerateResponse =
            serde_json::from_str(&reply.body).map_err(|err| {
                GenerationError::malformed_output(
                    format!("Gemini response decode failed: {err}"),
                    reply.body.as_str(),
                )
            })?;

        let Some(candidate) = response.candidates.first() else {
            let block_reason = response
                .prompt_feedback
                .as_ref()
                .and_then(|feedback| feedback.block_reason.as_deref());
            let message = match block_reason {
                Some(reason) => format!("Gemini returned no candidates (prompt blocked: {reason})"),
                None => "Gemini returned no candidates".to_string(),
            };
            return Err(GenerationError::empty_response(message, Some(reply.body)));
        };

        let text = candidate.text();
        if text.trim().is_empty() {
            let finish_reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
            return Err(GenerationError::empty_response(
                format!("Gemini candidate did not include text (finishReason: {finish_reason})"),
                Some(reply.body),
            ));
        }

        let value = validator.validate_json(&strip_code_fence(&text))?;

        let provider_request_id = reply
            .request_id
            .or_else(|| response.response_id.as_deref().and_then(non_empty_owned));
        let model = response
            .model_version
            .as_deref()
            .and_then(non_empty_owned)
            .unwrap_or_else(|| self.model.clone());
        let stop_reason = candidate.finish_reason.as_deref().and_then(non_empty_owned);

        Ok(GenerationOutput {
            value,
            metadata: GenerationMetadata {
                backend: BACKEND_ID.to_string(),
                model,
                latency_ms: Some(reply.latency_ms),
                provider_request_id,
                stop_reason,
                usage: response.usage_metadata.and_then(map_usage),
            },
        })
    }
}

impl StructuredGenerator for GeminiAdapter {
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
            .header("x-goog-api-key", self.api_key.expose_secret());
        let reply = send_json("Gemini", http_request, &payload, REQUEST_ID_HEADERS)?;

        if !reply.status.is_success() {
            return Err(map_http_error(reply.status, &reply.body));
        }
        self.map_success_response(&validator, reply)
    }
}

#[derive(Debug, Serialize)]
struct GeminiGenerateRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: String,
    response_json_schema: Value,
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl GeminiCandidate {
    /// Concatenated answer text; thought summaries are left out.
    fn text(&self) -> String {
        self.content
            .as_ref()
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|part| !part.thought)
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default, deserialize_with = "null_as_default")]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: Option<u32>,
}

fn map_usage(usage: GeminiUsageMetadata) -> Option<GenerationUsage> {
    GenerationUsage::from_counts(
        usage.prompt_token_count,
        usage.candidates_token_count,
        usage.total_token_count,
    )
}

fn map_http_error(status: StatusCode, body: &str) -> GenerationError {
    let parsed_error = serde_json::from_str::<GeminiErrorEnvelope>(body).ok();
    let detail = parsed_error
        .as_ref()
        .and_then(|envelope| envelope.error.as_ref());

    match detail.and_then(|detail| detail.status.as_deref()) {
        Some("UNAUTHENTICATED" | "PERMISSION_DENIED") => return GenerationError::Auth,
        Some("RESOURCE_EXHAUSTED") => return GenerationError::RateLimited,
        Some("DEADLINE_EXCEEDED") => return GenerationError::Timeout,
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
        message: format!("Gemini API returned HTTP {status}: {message}"),
    }
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    #[serde(default)]
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}
