mod anthropic;
mod bedrock;
mod client;
mod config;
mod env;
mod envelope;
mod gemini;
mod generator;
mod http;
mod openai_compatible;
mod prompt_builder;
mod response_parsing;
pub mod schema_validator;

pub use anthropic::AnthropicAdapter;
pub use bedrock::{BearerToken, BedrockConverseAdapter};
pub use client::{AdapterKind, NativeParseAdapter, StructuredClient};
pub use config::{
    AdapterConfig, EnvelopeParseConfig, NativeBackend, NativeParseConfig, PromptInjectionConfig,
    SchemaDelivery,
};
pub use envelope::{ContentSegment, select_text_segment};
pub use gemini::GeminiAdapter;
pub use generator::StructuredGenerator;
pub use openai_compatible::OpenAiCompatibleAdapter;
pub use prompt_builder::{BuiltPrompt, PromptBuilder};
pub use response_parsing::strip_code_fence;
pub use schema_validator::SchemaValidator;
