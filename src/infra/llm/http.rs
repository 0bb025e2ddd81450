use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Serialize;

use crate::domain::GenerationError;

pub(crate) struct HttpReply {
    pub status: StatusCode,
    pub body: String,
    pub request_id: Option<String>,
    pub error_type: Option<String>,
    pub latency_ms: u64,
}

pub(crate) fn build_client(backend: &str, timeout: Duration) -> Result<Client, GenerationError> {
    Client::builder().timeout(timeout).build().map_err(|err| {
        GenerationError::configuration(format!("failed to create {backend} HTTP client: {err}"))
    })
}

/// Sends one JSON request and reads the whole body, whatever the status.
pub(crate) fn send_json<T: Serialize>(
    backend: &str,
    request: RequestBuilder,
    payload: &T,
    request_id_headers: &[&str],
) -> Result<HttpReply, GenerationError> {
    let started = Instant::now();
    let response = request
        .header("content-type", "application/json")
        .json(payload)
        .send()
        .map_err(|err| map_transport_error(backend, err))?;

    let status = response.status();
    let request_id = request_id_headers
        .iter()
        .find_map(|name| response.headers().get(*name))
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let error_type = response
        .headers()
        .get("x-amzn-errortype")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let body = response
        .text()
        .map_err(|err| map_transport_error(backend, err))?;

    let elapsed_ms = started.elapsed().as_millis();
    let latency_ms = u64::try_from(elapsed_ms).unwrap_or(u64::MAX);
    tracing::debug!(
        backend,
        status = status.as_u16(),
        latency_ms,
        "backend responded"
    );

    Ok(HttpReply {
        status,
        body,
        request_id,
        error_type,
        latency_ms,
    })
}

pub(crate) fn map_transport_error(backend: &str, error: reqwest::Error) -> GenerationError {
    if error.is_timeout() {
        return GenerationError::Timeout;
    }
    GenerationError::Transport {
        message: format!("{backend} transport error: {error}"),
    }
}

/// Status-only classification shared by every backend's error mapper.
pub(crate) fn classify_status(status: StatusCode) -> Option<GenerationError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(GenerationError::Auth),
        StatusCode::TOO_MANY_REQUESTS => Some(GenerationError::RateLimited),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            Some(GenerationError::Timeout)
        }
        _ => None,
    }
}
