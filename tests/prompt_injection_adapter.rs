use mockito::{Matcher, Server};
use serde_json::json;
use tabula::app::GenerationService;
use tabula::domain::{
    ChartOfAccounts, GenerationError, GenerationErrorCategory, GenerationRequest, LedgerAccount,
    LedgerSide,
};
use tabula::infra::llm::{
    AdapterConfig, OpenAiCompatibleAdapter, PromptInjectionConfig, StructuredClient,
    StructuredGenerator,
};

#[path = "support/backend_fixture.rs"]
mod backend_fixture;

use backend_fixture::{chat_completion_body, ledger_account, no_env, ollama_config};

fn account_request() -> GenerationRequest {
    GenerationRequest::for_output::<LedgerAccount>(
        "Generate a single debit-normal USD bank account",
    )
}

#[test]
fn fenced_ledger_account_validates_to_debit() {
    let mut server = Server::new();
    let fenced = format!(
        "```json\n{}\n```",
        serde_json::to_string_pretty(&ledger_account("debit")).expect("fixture serializes")
    );

    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer ollama")
        .match_header(
            "content-type",
            Matcher::Regex("application/json.*".to_string()),
        )
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({ "model": "gpt-oss:20b", "temperature": 0.0 })),
            Matcher::Regex("matches this exact schema".to_string()),
            Matcher::Regex("Respond ONLY with valid JSON".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("x-request-id", "ollama-req-1")
        .with_body(chat_completion_body(&fenced))
        .create();

    let adapter = OpenAiCompatibleAdapter::with_env(ollama_config(&server.url()), &no_env)
        .expect("adapter should build");

    let output = adapter
        .generate(&account_request())
        .expect("fenced JSON should validate");

    mock.assert();
    assert_eq!(output.metadata.backend, "openai_compatible");
    assert_eq!(output.metadata.model, "gpt-oss:20b");
    assert_eq!(
        output.metadata.provider_request_id.as_deref(),
        Some("ollama-req-1")
    );
    assert_eq!(
        output.metadata.usage.as_ref().and_then(|usage| usage.total_tokens),
        Some(130)
    );
    let account: LedgerAccount = output.into_typed().expect("value should decode");
    assert_eq!(account.normal_balance, LedgerSide::Debit);
    assert_eq!(account.currency, "USD");
}

#[test]
fn blank_message_content_is_empty_response() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_completion_body("   "))
        .create();

    let adapter = OpenAiCompatibleAdapter::with_env(ollama_config(&server.url()), &no_env)
        .expect("adapter should build");

    let error = adapter
        .generate(&account_request())
        .expect_err("blank content must fail");

    mock.assert();
    assert!(matches!(error, GenerationError::EmptyResponse { .. }));
    assert_eq!(error.category(), GenerationErrorCategory::Output);
}

#[test]
fn invalid_enum_value_names_the_field() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_completion_body(r#"{"normal_balance": "invalid"}"#))
        .create();

    let adapter = OpenAiCompatibleAdapter::with_env(ollama_config(&server.url()), &no_env)
        .expect("adapter should build");

    let error = adapter
        .generate(&account_request())
        .expect_err("invalid output must fail");

    mock.assert();
    assert!(matches!(
        &error,
        GenerationError::MalformedOutput { message, raw }
        if message.contains("normal_balance") && raw.contains("invalid")
    ));
}

#[test]
fn prose_wrapped_json_is_malformed_output() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_completion_body(
            "Here is the account:\n```json\n{\"accounts\": []}\n```",
        ))
        .create();

    let adapter = OpenAiCompatibleAdapter::with_env(ollama_config(&server.url()), &no_env)
        .expect("adapter should build");

    let error = adapter
        .generate(&GenerationRequest::for_output::<ChartOfAccounts>(
            "an empty chart of accounts",
        ))
        .expect_err("leading prose must not be stripped");

    mock.assert();
    assert!(matches!(error, GenerationError::MalformedOutput { .. }));
}

#[test]
fn response_format_delivery_sends_schema_out_of_band() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "model": "gemma3",
            "messages": [{ "role": "user", "content": "an empty chart of accounts" }],
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": "ChartOfAccounts", "strict": true }
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_completion_body(r#"{"accounts": []}"#))
        .create();

    let config = PromptInjectionConfig::gemma().with_base_url(server.url());
    let adapter = OpenAiCompatibleAdapter::with_env(config, &no_env).expect("adapter should build");

    let output = adapter
        .generate(&GenerationRequest::for_output::<ChartOfAccounts>(
            "an empty chart of accounts",
        ))
        .expect("response_format reply should validate");

    mock.assert();
    let chart: ChartOfAccounts = output.into_typed().expect("value should decode");
    assert!(chart.accounts.is_empty());
}

#[test]
fn unauthorized_maps_to_auth() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#,
        )
        .create();

    let config = PromptInjectionConfig::hosted("gpt-5.2")
        .with_api_key("sk-wrong")
        .with_base_url(server.url());
    let adapter = OpenAiCompatibleAdapter::with_env(config, &no_env).expect("adapter should build");

    let error = adapter
        .generate(&account_request())
        .expect_err("401 must fail");

    mock.assert();
    assert_eq!(error, GenerationError::Auth);
    assert_eq!(error.category(), GenerationErrorCategory::Backend);
}

#[test]
fn missing_credential_fails_without_network_call() {
    let mut server = Server::new();
    let mock = server.mock("POST", "/v1/chat/completions").expect(0).create();

    let config = PromptInjectionConfig::hosted("gpt-5.2").with_base_url(server.url());
    let error = match StructuredClient::with_env(AdapterConfig::PromptInjection(config), &no_env) {
        Ok(_) => panic!("client without key must not build"),
        Err(error) => error,
    };

    mock.assert();
    assert!(matches!(
        error,
        GenerationError::Configuration { message }
        if message == "OpenAI-compatible API key is missing (set TABULA_OPENAI_COMPAT_API_KEY or OPENAI_API_KEY)"
    ));
}

#[test]
fn generation_service_drives_structured_client() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_completion_body(&ledger_account("credit").to_string()))
        .create();

    let client = StructuredClient::with_env(
        AdapterConfig::PromptInjection(ollama_config(&server.url())),
        &no_env,
    )
    .expect("client should build");
    let service = GenerationService::new(client);

    let account: LedgerAccount = service
        .generate_typed("a credit-normal revenue account")
        .expect("generation should succeed");

    mock.assert();
    assert_eq!(account.normal_balance, LedgerSide::Credit);
    assert_eq!(service.backend_id(), "openai_compatible");
}
