//! Error types for the backend client.

use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Backend client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse backend response: {0}")]
    Parse(String),

    #[error("Backend returned no corrected code")]
    EmptyRepair,

    #[error("No persisted session found")]
    NoSession,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Tree error: {0}")]
    Tree(#[from] webly_tree::TreeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether a retry might succeed.
    ///
    /// Transport failures, timeouts, server errors, rate limits and
    /// malformed responses are retried. Client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::Parse(_) | Self::EmptyRepair | Self::Tree(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::NoSession | Self::InvalidRequest(_) | Self::Io(_) => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
