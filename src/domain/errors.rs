use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorCategory {
    /// Fix the adapter configuration or the request before calling again.
    Configuration,
    /// The backend could not be reached or refused the call.
    Backend,
    /// The backend answered, but the answer is unusable for the schema.
    Output,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error("invalid generation request: {message}")]
    InvalidRequest { message: String },
    #[error("backend returned an empty response: {message}")]
    EmptyResponse {
        message: String,
        raw: Option<String>,
    },
    #[error("could not extract output text: {message}")]
    Extraction { message: String, segments: String },
    #[error("backend output is malformed: {message}")]
    MalformedOutput { message: String, raw: String },
    #[error("backend authentication failed")]
    Auth,
    #[error("backend rate limit reached")]
    RateLimited,
    #[error("backend request timed out")]
    Timeout,
    #[error("backend transport failed: {message}")]
    Transport { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl GenerationError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn empty_response(message: impl Into<String>, raw: Option<String>) -> Self {
        Self::EmptyResponse {
            message: message.into(),
            raw,
        }
    }

    pub fn malformed_output(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedOutput {
            message: message.into(),
            raw: raw.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn category(&self) -> GenerationErrorCategory {
        match self {
            Self::Configuration { .. } | Self::InvalidRequest { .. } => {
                GenerationErrorCategory::Configuration
            }
            Self::Auth | Self::RateLimited | Self::Timeout | Self::Transport { .. } => {
                GenerationErrorCategory::Backend
            }
            Self::EmptyResponse { .. } | Self::Extraction { .. } | Self::MalformedOutput { .. } => {
                GenerationErrorCategory::Output
            }
            Self::Internal { .. } => GenerationErrorCategory::Internal,
        }
    }

    /// Raw backend payload attached to output errors, if any.
    pub fn raw_payload(&self) -> Option<&str> {
        match self {
            Self::EmptyResponse { raw, .. } => raw.as_deref(),
            Self::Extraction { segments, .. } => Some(segments),
            Self::MalformedOutput { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
