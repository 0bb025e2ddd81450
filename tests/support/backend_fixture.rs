#![allow(dead_code)]

use serde_json::{Value, json};
use tabula::domain::GenerationError;
use tabula::infra::llm::{EnvelopeParseConfig, NativeParseConfig, PromptInjectionConfig};

pub(crate) const TEST_TIMEOUT_SECS: u64 = 2;

/// Environment lookup that sees nothing, so tests never depend on the
/// developer's shell.
pub(crate) fn no_env(_name: &str) -> Result<Option<String>, GenerationError> {
    Ok(None)
}

pub(crate) fn ledger_account(normal_balance: &str) -> Value {
    json!({
        "name": "Cash",
        "description": "Operating cash held at the bank",
        "currency": "USD",
        "normal_balance": normal_balance
    })
}

pub(crate) fn anthropic_config(base_url: &str) -> NativeParseConfig {
    NativeParseConfig::anthropic()
        .with_api_key("test-key")
        .with_base_url(base_url)
        .with_timeout_secs(TEST_TIMEOUT_SECS)
}

pub(crate) fn gemini_config(base_url: &str) -> NativeParseConfig {
    NativeParseConfig::gemini()
        .with_api_key("test-key")
        .with_base_url(base_url)
        .with_timeout_secs(TEST_TIMEOUT_SECS)
}

pub(crate) fn ollama_config(base_url: &str) -> PromptInjectionConfig {
    PromptInjectionConfig::ollama("gpt-oss:20b")
        .with_base_url(base_url)
        .with_timeout_secs(TEST_TIMEOUT_SECS)
}

pub(crate) fn bedrock_config(base_url: &str) -> EnvelopeParseConfig {
    EnvelopeParseConfig::new()
        .with_model_id("openai.gpt-oss-120b-1:0")
        .with_bearer_token("bedrock-token")
        .with_base_url(base_url)
        .with_timeout_secs(TEST_TIMEOUT_SECS)
}

pub(crate) fn converse_body(content: Value) -> String {
    json!({
        "output": {
            "message": {
                "role": "assistant",
                "content": content
            }
        },
        "stopReason": "end_turn",
        "usage": {
            "inputTokens": 30,
            "outputTokens": 12,
            "totalTokens": 42
        }
    })
    .to_string()
}

pub(crate) fn chat_completion_body(content: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-oss:20b",
        "choices": [
            {
                "index": 0,
                "finish_reason": "stop",
                "message": { "role": "assistant", "content": content }
            }
        ],
        "usage": { "prompt_tokens": 90, "completion_tokens": 40 }
    })
    .to_string()
}
