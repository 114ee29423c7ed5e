use thiserror::Error;

/// Classified failure of a single HTTP request.
///
/// Variants carry owned strings rather than the underlying `reqwest::Error`
/// so a failure can be cloned into every cache snapshot that reports it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP error: {status} {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl ApiError {
    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Timeout => "timeout",
            ApiError::Http { .. } => "http",
            ApiError::Network(_) => "network",
            ApiError::Unknown(_) => "unknown",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_connect() || err.is_request() {
            ApiError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Http {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            ApiError::Unknown(err.to_string())
        }
    }
}
