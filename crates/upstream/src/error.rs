use reqwest::StatusCode;
use shared::error::FailureKind;
use thiserror::Error;

/// Failure of a single upstream attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream responded with status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("malformed upstream body: {0}")]
    Malformed(String),
    #[error("request cancelled")]
    Cancelled,
}

impl UpstreamError {
    pub fn malformed(message: impl Into<String>) -> Self {
        UpstreamError::Malformed(message.into())
    }

    /// Transient failures worth another attempt.
    ///
    /// Definitive answers (4xx other than 408/429, bad bodies) and
    /// cancellation are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Status(code) => {
                let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY);
                status.is_server_error()
                    || status == StatusCode::TOO_MANY_REQUESTS
                    || status == StatusCode::REQUEST_TIMEOUT
            }
            UpstreamError::Network(_) | UpstreamError::Timeout(_) => true,
            UpstreamError::Malformed(_) | UpstreamError::Cancelled => false,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            UpstreamError::Status(code) => FailureKind::Status(*code),
            UpstreamError::Network(_) => FailureKind::Network,
            UpstreamError::Timeout(_) => FailureKind::Timeout,
            UpstreamError::Malformed(_) => FailureKind::Malformed,
            UpstreamError::Cancelled => FailureKind::Cancelled,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            UpstreamError::Timeout(error.to_string())
        } else if error.is_decode() {
            UpstreamError::Malformed(error.to_string())
        } else if let Some(status) = error.status() {
            UpstreamError::Status(status.as_u16())
        } else {
            UpstreamError::Network(error.to_string())
        }
    }
}
