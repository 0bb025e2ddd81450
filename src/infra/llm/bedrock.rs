use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    GenerationError, GenerationMetadata, GenerationOutput, GenerationRequest, GenerationUsage,
};

use super::config::EnvelopeParseConfig;
use super::env::{
    read_env_var, resolve_base_url, resolve_credential, resolve_model, resolve_timeout,
};
use super::envelope::extract_envelope_text;
use super::generator::StructuredGenerator;
use super::http::{HttpReply, build_client, classify_status, send_json};
use super::prompt_builder::PromptBuilder;
use super::response_parsing::{
    non_empty_owned, null_as_default, strip_code_fence, truncate_message,
};
use super::schema_validator::SchemaValidator;

const BACKEND_ID: &str = "bedrock";
const DEFAULT_REGION: &str = "us-west-2";
const DEFAULT_MODEL_ID: &str = "global.anthropic.claude-sonnet-4-5-20250929-v1:0";
const ENV_BEARER_TOKEN: &str = "TABULA_BEDROCK_BEARER_TOKEN";
const ENV_BEARER_TOKEN_FALLBACK: &str = "AWS_BEARER_TOKEN_BEDROCK";
const ENV_BASE_URL: &str = "TABULA_BEDROCK_BASE_URL";
const ENV_REGION: &str = "TABULA_BEDROCK_REGION";
const ENV_TIMEOUT_SECS: &str = "TABULA_BEDROCK_TIMEOUT_SECS";
const REQUEST_ID_HEADERS: &[&str] = &["x-amzn-requestid"];

/// Bedrock API key, attached as `Authorization: Bearer` to each request.
#[derive(Debug)]
pub struct BearerToken(SecretString);

impl BearerToken {
    pub fn new(token: SecretString) -> Self {
        Self(token)
    }

    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.0.expose_secret())
    }
}

/// Envelope-Parse adapter over the Bedrock Converse API.
pub struct BedrockConverseAdapter {
    token: BearerToken,
    api_base_url: String,
    model_id: String,
    max_tokens: u32,
    client: Client,
}

impl BedrockConverseAdapter {
    pub fn new(config: EnvelopeParseConfig) -> Result<Self, GenerationError> {
        Self::with_env(config, &read_env_var)
    }

    pub fn from_env() -> Result<Self, GenerationError> {
        Self::new(EnvelopeParseConfig::new())
    }

    pub fn with_env<E>(config: EnvelopeParseConfig, env: &E) -> Result<Self, GenerationError>
    where
        E: Fn(&str) -> Result<Option<String>, GenerationError>,
    {
        let token = resolve_credential(
            config.bearer_token,
            &[ENV_BEARER_TOKEN, ENV_BEARER_TOKEN_FALLBACK],
            "Bedrock bearer token",
            env,
        )?;

        let region = match config.region {
            Some(region) => region,
            None => env(ENV_REGION)?.unwrap_or_else(|| DEFAULT_REGION.to_string()),
        };
        let region = region.trim();
        if region.is_empty() {
            return Err(GenerationError::configuration(
                "Bedrock region must not be empty",
            ));
        }
        let default_base_url = format!("https://bedrock-runtime.{region}.amazonaws.com");
        let api_base_url = resolve_base_url(config.base_url, ENV_BASE_URL, &default_base_url, env)?;

        let model_id = resolve_model(config.model_id, DEFAULT_MODEL_ID)?;
        let timeout = resolve_timeout(config.timeout_secs, ENV_TIMEOUT_SECS, env)?;
        let client = build_client("Bedrock", timeout)?;

        Ok(Self {
            token: BearerToken::new(token),
            api_base_url,
            model_id,
            max_tokens: config.max_tokens,
            client,
        })
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/model/{}/converse",
            self.api_base_url,
            urlencoding::encode(&self.model_id)
        )
    }

    fn build_request_payload(
        &self,
        request: &GenerationRequest,
    ) -> Result<ConverseRequest, GenerationError> {
        let prompt = PromptBuilder::augment(request)?;

        Ok(ConverseRequest {
            messages: vec![ConverseMessage {
                role: "user".to_string(),
                content: vec![ConverseTextBlock { text: prompt }],
            }],
            inference_config: ConverseInferenceConfig {
                temperature: 0.0,
                max_tokens: self.max_tokens,
            },
        })
    }

    fn map_success_response(
        &self,
        validator: &SchemaValidator,
        reply: HttpReply,
    ) -> Result<GenerationOutput, GenerationError> {
        let response: ConverseResponse = serde_json::from_str(&reply.body).map_err(|err| {
            GenerationError::malformed_output(
                format!("Bedrock response decode failed: {err}"),
                reply.body.as_str(),
            )
        })?;

        let Some(message) = response.output.and_then(|output| output.message) else {
            return Err(GenerationError::empty_response(
                "Bedrock response did not include an output message",
                Some(reply.body),
            ));
        };

        let text = extract_envelope_text(&message.content)?;
        let value = validator.validate_json(&strip_code_fence(&text))?;

        Ok(GenerationOutput {
            value,
            metadata: GenerationMetadata {
                backend: BACKEND_ID.to_string(),
                model: self.model_id.clone(),
                latency_ms: Some(reply.latency_ms),
                provider_request_id: reply.request_id,
                stop_reason: response.stop_reason.as_deref().and_then(non_empty_owned),
                usage: response.usage.and_then(map_usage),
            },
        })
    }
}

impl StructuredGenerator for BedrockConverseAdapter {
    fn backend_id(&self) -> &str {
        BACKEND_ID
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        request.validate()?;
        let validator = SchemaValidator::new(&request.schema)?;
        let payload = self.build_request_payload(request)?;
        let endpoint = self.endpoint_url();

        tracing::debug!(
            backend = BACKEND_ID,
            model = %self.model_id,
            endpoint = %endpoint,
            schema = validator.schema_name(),
            "sending structured generation request"
        );
        let http_request = self.token.apply(self.client.post(endpoint));
        let reply = send_json("Bedrock", http_request, &payload, REQUEST_ID_HEADERS)?;

        if !reply.status.is_success() {
            return Err(map_http_error(
                reply.status,
                reply.error_type.as_deref(),
                &reply.body,
            ));
        }
        self.map_success_response(&validator, reply)
    }
}

#[derive(Debug, Serialize)]
struct ConverseRequest {
    messages: Vec<ConverseMessage>,
    #[serde(rename = "inferenceConfig")]
    inference_config: ConverseInferenceConfig,
}

#[derive(Debug, Serialize)]
struct ConverseMessage {
    role: String,
    content: Vec<ConverseTextBlock>,
}

#[derive(Debug, Serialize)]
struct ConverseTextBlock {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseInferenceConfig {
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    #[serde(default)]
    output: Option<ConverseOutput>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ConverseUsage>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    #[serde(default)]
    message: Option<ConverseOutputMessage>,
}

/// Blocks stay as raw JSON; classification happens in `envelope`.
#[derive(Debug, Deserialize)]
struct ConverseOutputMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}

fn map_usage(usage: ConverseUsage) -> Option<GenerationUsage> {
    GenerationUsage::from_counts(usage.input_tokens, usage.output_tokens, usage.total_tokens)
}

fn map_http_error(status: StatusCode, error_type: Option<&str>, body: &str) -> GenerationError {
    let parsed_error = serde_json::from_str::<BedrockErrorBody>(body).ok();
    // The header looks like `ThrottlingException:http://internal.amazon.com/...`.
    let error_type = error_type
        .or_else(|| {
            parsed_error
                .as_ref()
                .and_then(|error| error.error_type.as_deref())
        })
        .map(|value| value.split(':').next().unwrap_or(value).trim());

    match error_type {
        Some(
            "AccessDeniedException"
            | "UnrecognizedClientException"
            | "ExpiredTokenException"
            | "InvalidSignatureException",
        ) => return GenerationError::Auth,
        Some("ThrottlingException" | "ServiceQuotaExceededException") => {
            return GenerationError::RateLimited;
        }
        Some("ModelTimeoutException") => return GenerationError::Timeout,
        _ => {}
    }
    if let Some(error) = classify_status(status) {
        return error;
    }

    let message = parsed_error
        .as_ref()
        .and_then(|error| error.message.clone())
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| truncate_message(body));
    let prefix = error_type.map(|kind| format!("{kind}: ")).unwrap_or_default();
    GenerationError::Transport {
        message: format!("Bedrock API returned HTTP {status}: {prefix}{message}"),
    }
}

#[derive(Debug, Deserialize)]
struct BedrockErrorBody {
    #[serde(default, alias = "Message")]
    message: Option<String>,
    #[serde(default, rename = "__type")]
    error_type: Option<String>,
}
