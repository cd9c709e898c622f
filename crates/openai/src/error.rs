use std::time::Duration;

pub use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("unexpected http status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("completion response is not valid JSON: {0}")]
    InvalidResponse(String),
    #[error("failed to serialize request payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
    #[error("completion request timed out after {0:?}")]
    Timeout(Duration),
    #[error("configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Transport failures are the caller's problem; configuration errors are ours.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::HttpClient(_) | Self::HttpStatus { .. } | Self::InvalidResponse(_) | Self::Timeout(_)
        )
    }
}
