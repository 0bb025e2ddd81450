use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

pub(crate) const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Picks one adapter variant. Deserializes from an `adapter` tag, e.g.
/// `{"adapter": "prompt_injection", "model": "gpt-oss:20b"}`.
#[derive(Debug, Deserialize)]
#[serde(tag = "adapter", rename_all = "snake_case")]
pub enum AdapterConfig {
    NativeParse(NativeParseConfig),
    PromptInjection(PromptInjectionConfig),
    EnvelopeParse(EnvelopeParseConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeBackend {
    Anthropic,
    Gemini,
}

#[derive(Debug, Deserialize)]
pub struct NativeParseConfig {
    pub backend: NativeBackend,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl NativeParseConfig {
    pub fn new(backend: NativeBackend) -> Self {
        Self {
            backend,
            model: None,
            api_key: None,
            base_url: None,
            timeout_secs: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn anthropic() -> Self {
        Self::new(NativeBackend::Anthropic)
    }

    pub fn gemini() -> Self {
        Self::new(NativeBackend::Gemini)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Where the JSON Schema travels on a prompt-injection request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaDelivery {
    /// Embedded in the user prompt with a JSON-only instruction.
    #[default]
    Prompt,
    /// Sent as an OpenAI-style `response_format` JSON schema.
    ResponseFormat,
}

#[derive(Debug, Deserialize)]
pub struct PromptInjectionConfig {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub schema_delivery: SchemaDelivery,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

pub(crate) const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OLLAMA_API_KEY: &str = "ollama";
const DEEPSEEK_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that responds only with valid JSON according to the provided schema.";

impl PromptInjectionConfig {
    pub fn new() -> Self {
        Self {
            model: None,
            api_key: None,
            base_url: None,
            timeout_secs: None,
            system_prompt: None,
            schema_delivery: SchemaDelivery::Prompt,
            max_tokens: None,
        }
    }

    /// Local Ollama server through its OpenAI-compatible API. Ollama ignores
    /// the key, so a placeholder is supplied.
    pub fn ollama(model: impl Into<String>) -> Self {
        Self::new()
            .with_model(model)
            .with_base_url(OLLAMA_BASE_URL)
            .with_api_key(OLLAMA_API_KEY)
    }

    /// Hosted OpenAI endpoint. The key comes from the environment unless set.
    pub fn hosted(model: impl Into<String>) -> Self {
        Self::new().with_model(model).with_base_url(OPENAI_BASE_URL)
    }

    pub fn deepseek() -> Self {
        Self::ollama("deepseek-r1:8b").with_system_prompt(DEEPSEEK_SYSTEM_PROMPT)
    }

    pub fn gemma() -> Self {
        Self::ollama("gemma3").with_schema_delivery(SchemaDelivery::ResponseFormat)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_schema_delivery(mut self, schema_delivery: SchemaDelivery) -> Self {
        self.schema_delivery = schema_delivery;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl Default for PromptInjectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
pub struct EnvelopeParseConfig {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub bearer_token: Option<SecretString>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl EnvelopeParseConfig {
    pub fn new() -> Self {
        Self {
            model_id: None,
            region: None,
            bearer_token: None,
            base_url: None,
            timeout_secs: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_bearer_token(mut self, bearer_token: impl Into<String>) -> Self {
        self.bearer_token = Some(SecretString::from(bearer_token.into()));
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

impl Default for EnvelopeParseConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}
