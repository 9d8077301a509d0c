//! Error types for the runner module.

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur during sandbox operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Sandbox boot failed: {0}")]
    BootFailed(String),

    #[error("Sandbox has not been booted")]
    NotBooted,

    #[error("Mount failed: {0}")]
    MountFailed(String),

    #[error("Failed to spawn {command}: {message}")]
    SpawnFailed { command: String, message: String },

    #[error("Shell session is closed")]
    ShellClosed,

    #[error("Tree error: {0}")]
    Tree(#[from] webly_tree::TreeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
