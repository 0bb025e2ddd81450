use crate::domain::{GenerationError, GenerationOutput, GenerationRequest};

use super::anthropic::AnthropicAdapter;
use super::bedrock::BedrockConverseAdapter;
use super::config::{AdapterConfig, NativeBackend, NativeParseConfig};
use super::env::read_env_var;
use super::gemini::GeminiAdapter;
use super::generator::StructuredGenerator;
use super::openai_compatible::OpenAiCompatibleAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    NativeParse,
    PromptInjection,
    EnvelopeParse,
}

pub enum NativeParseAdapter {
    Anthropic(AnthropicAdapter),
    Gemini(GeminiAdapter),
}

impl NativeParseAdapter {
    pub fn new(config: NativeParseConfig) -> Result<Self, GenerationError> {
        Self::with_env(config, &read_env_var)
    }

    pub fn with_env<E>(config: NativeParseConfig, env: &E) -> Result<Self, GenerationError>
    where
        E: Fn(&str) -> Result<Option<String>, GenerationError>,
    {
        match config.backend {
            NativeBackend::Anthropic => {
                Ok(Self::Anthropic(AnthropicAdapter::with_env(config, env)?))
            }
            NativeBackend::Gemini => Ok(Self::Gemini(GeminiAdapter::with_env(config, env)?)),
        }
    }

    fn inner(&self) -> &dyn StructuredGenerator {
        match self {
            Self::Anthropic(adapter) => adapter,
            Self::Gemini(adapter) => adapter,
        }
    }
}

/// One of the three adapter variants, chosen by [`AdapterConfig`].
///
/// The credential is resolved when the client is built, so a missing key
/// fails here rather than on the first `generate` call.
pub enum StructuredClient {
    NativeParse(NativeParseAdapter),
    PromptInjection(OpenAiCompatibleAdapter),
    EnvelopeParse(BedrockConverseAdapter),
}

impl StructuredClient {
    pub fn from_config(config: AdapterConfig) -> Result<Self, GenerationError> {
        Self::with_env(config, &read_env_var)
    }

    pub fn with_env<E>(config: AdapterConfig, env: &E) -> Result<Self, GenerationError>
    where
        E: Fn(&str) -> Result<Option<String>, GenerationError>,
    {
        let client = match config {
            AdapterConfig::NativeParse(config) => {
                Self::NativeParse(NativeParseAdapter::with_env(config, env)?)
            }
            AdapterConfig::PromptInjection(config) => {
                Self::PromptInjection(OpenAiCompatibleAdapter::with_env(config, env)?)
            }
            AdapterConfig::EnvelopeParse(config) => {
                Self::EnvelopeParse(BedrockConverseAdapter::with_env(config, env)?)
            }
        };

        tracing::debug!(
            kind = ?client.kind(),
            backend = client.backend_id(),
            model = client.model_id(),
            "structured client ready"
        );
        Ok(client)
    }

    pub fn kind(&self) -> AdapterKind {
        match self {
            Self::NativeParse(_) => AdapterKind::NativeParse,
            Self::PromptInjection(_) => AdapterKind::PromptInjection,
            Self::EnvelopeParse(_) => AdapterKind::EnvelopeParse,
        }
    }

    fn inner(&self) -> &dyn StructuredGenerator {
        match self {
            Self::NativeParse(adapter) => adapter.inner(),
            Self::PromptInjection(adapter) => adapter,
            Self::EnvelopeParse(adapter) => adapter,
        }
    }
}

impl StructuredGenerator for StructuredClient {
    fn backend_id(&self) -> &str {
        self.inner().backend_id()
    }

    fn model_id(&self) -> &str {
        self.inner().model_id()
    }

    fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        self.inner().generate(request)
    }
}
