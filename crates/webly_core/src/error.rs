//! Error types for the pipeline.

use thiserror::Error;

use crate::phase::Phase;

/// Result type alias for pipeline operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while driving the pipeline.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Invalid pipeline state: {0}")]
    InvalidState(String),

    #[error("Sandbox boot failed: {0}")]
    BootFailed(String),

    #[error("No generated code found; run generation first")]
    NoSession,

    #[error("No active shell session")]
    NoShell,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runner error: {0}")]
    Runner(#[from] webly_runner::RunnerError),

    #[error("Backend error: {0}")]
    Client(#[from] webly_client::ClientError),

    #[error("Tree error: {0}")]
    Tree(#[from] webly_tree::TreeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}
