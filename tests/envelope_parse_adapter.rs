use mockito::{Matcher, Server};
use serde_json::json;
use tabula::domain::{ChartOfAccounts, FundFlow, GenerationError, GenerationRequest, LedgerAccount};
use tabula::infra::llm::{
    AdapterConfig, BedrockConverseAdapter, EnvelopeParseConfig, StructuredClient,
    StructuredGenerator,
};

#[path = "support/backend_fixture.rs"]
mod backend_fixture;

use backend_fixture::{bedrock_config, converse_body, no_env};

const CONVERSE_PATH: &str = r"^/model/openai\.gpt-oss-120b-1(%3A|:)0/converse$";

fn converse_path() -> Matcher {
    Matcher::Regex(CONVERSE_PATH.to_string())
}

fn chart_request() -> GenerationRequest {
    GenerationRequest::for_output::<ChartOfAccounts>("A chart of accounts for a new startup")
}

fn reasoning_block(text: &str) -> serde_json::Value {
    json!({ "reasoningContent": { "reasoningText": { "text": text, "signature": "sig" } } })
}

#[test]
fn text_after_reasoning_block_is_selected() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", converse_path())
        .match_header("authorization", "Bearer bedrock-token")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({
                "inferenceConfig": { "temperature": 0.0, "maxTokens": 4096 }
            })),
            Matcher::Regex("matches this exact schema".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("x-amzn-requestid", "bedrock-req-1")
        .with_body(converse_body(json!([
            reasoning_block("The user wants an empty chart."),
            { "text": "{\"accounts\":[]}" }
        ])))
        .create();

    let adapter = BedrockConverseAdapter::with_env(bedrock_config(&server.url()), &no_env)
        .expect("adapter should build");

    let output = adapter
        .generate(&chart_request())
        .expect("text block should validate");

    mock.assert();
    assert_eq!(output.metadata.backend, "bedrock");
    assert_eq!(output.metadata.model, "openai.gpt-oss-120b-1:0");
    assert_eq!(
        output.metadata.provider_request_id.as_deref(),
        Some("bedrock-req-1")
    );
    assert_eq!(
        output.metadata.usage.as_ref().and_then(|usage| usage.total_tokens),
        Some(42)
    );
    let chart: ChartOfAccounts = output.into_typed().expect("value should decode");
    assert_eq!(chart.accounts.len(), 0);
}

#[test]
fn first_text_block_wins_over_later_text() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", converse_path())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(converse_body(json!([
            { "text": "```json\n{\"transactions\": []}\n```" },
            reasoning_block("second thoughts"),
            { "text": "not json at all" }
        ])))
        .create();

    let adapter = BedrockConverseAdapter::with_env(bedrock_config(&server.url()), &no_env)
        .expect("adapter should build");

    let output = adapter
        .generate(&GenerationRequest::for_output::<FundFlow>("no transactions yet"))
        .expect("first text block should validate");

    mock.assert();
    let flow: FundFlow = output.into_typed().expect("value should decode");
    assert!(flow.transactions.is_empty());
}

#[test]
fn reasoning_only_content_is_extraction_error() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", converse_path())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(converse_body(json!([reasoning_block("still thinking")])))
        .create();

    let adapter = BedrockConverseAdapter::with_env(bedrock_config(&server.url()), &no_env)
        .expect("adapter should build");

    let error = adapter
        .generate(&chart_request())
        .expect_err("no text block must fail");

    mock.assert();
    assert!(matches!(
        &error,
        GenerationError::Extraction { segments, .. }
        if segments.contains("still thinking")
    ));
}

#[test]
fn empty_content_is_empty_response() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", converse_path())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(converse_body(json!([])))
        .create();

    let adapter = BedrockConverseAdapter::with_env(bedrock_config(&server.url()), &no_env)
        .expect("adapter should build");

    let error = adapter
        .generate(&chart_request())
        .expect_err("empty content must fail");

    mock.assert();
    assert!(matches!(error, GenerationError::EmptyResponse { .. }));
}

#[test]
fn null_content_is_empty_response() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", converse_path())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(converse_body(serde_json::Value::Null))
        .create();

    let adapter = BedrockConverseAdapter::with_env(bedrock_config(&server.url()), &no_env)
        .expect("adapter should build");

    let error = adapter
        .generate(&chart_request())
        .expect_err("null content must fail");

    mock.assert();
    assert!(matches!(error, GenerationError::EmptyResponse { .. }));
}

#[test]
fn missing_output_message_is_empty_response() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", converse_path())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"stopReason":"end_turn"}"#)
        .create();

    let adapter = BedrockConverseAdapter::with_env(bedrock_config(&server.url()), &no_env)
        .expect("adapter should build");

    let error = adapter
        .generate(&chart_request())
        .expect_err("missing message must fail");

    mock.assert();
    assert!(matches!(error, GenerationError::EmptyResponse { .. }));
}

#[test]
fn bearer_token_is_sent_on_every_request() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", converse_path())
        .match_header("authorization", "Bearer bedrock-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(converse_body(json!([{ "text": "{\"accounts\":[]}" }])))
        .expect(2)
        .create();

    let client = StructuredClient::with_env(
        AdapterConfig::EnvelopeParse(bedrock_config(&server.url())),
        &no_env,
    )
    .expect("client should build");

    for _ in 0..2 {
        client
            .generate(&chart_request())
            .expect("authorized request should succeed");
    }

    mock.assert();
}

#[test]
fn enum_violation_in_text_block_is_malformed_output() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", converse_path())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(converse_body(json!([
            { "text": "{\"normal_balance\": \"invalid\"}" }
        ])))
        .create();

    let adapter = BedrockConverseAdapter::with_env(bedrock_config(&server.url()), &no_env)
        .expect("adapter should build");

    let error = adapter
        .generate(&GenerationRequest::for_output::<LedgerAccount>(
            "a debit-normal cash account",
        ))
        .expect_err("invalid output must fail");

    mock.assert();
    assert!(matches!(
        &error,
        GenerationError::MalformedOutput { message, .. } if message.contains("normal_balance")
    ));
}

#[test]
fn throttling_maps_to_rate_limited() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", converse_path())
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_header(
            "x-amzn-errortype",
            "ThrottlingException:http://internal.amazon.com/coral/com.amazon.bedrock/",
        )
        .with_body(r#"{"message":"Too many requests, please wait before trying again."}"#)
        .create();

    let adapter = BedrockConverseAdapter::with_env(bedrock_config(&server.url()), &no_env)
        .expect("adapter should build");

    let error = adapter
        .generate(&chart_request())
        .expect_err("throttled request must fail");

    mock.assert();
    assert_eq!(error, GenerationError::RateLimited);
}

#[test]
fn missing_bearer_token_fails_without_network_call() {
    let mut server = Server::new();
    let mock = server.mock("POST", converse_path()).expect(0).create();

    let config = EnvelopeParseConfig::new()
        .with_model_id("openai.gpt-oss-120b-1:0")
        .with_base_url(server.url());
    let error = match BedrockConverseAdapter::with_env(config, &no_env) {
        Ok(_) => panic!("adapter without token must not build"),
        Err(error) => error,
    };

    mock.assert();
    assert!(matches!(error, GenerationError::Configuration { .. }));
}
