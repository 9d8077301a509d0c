//! Error types for the file tree module.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Errors that can occur while building, parsing or storing a file tree.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Invalid tree format: {0}")]
    InvalidFormat(String),

    #[error("Empty tree payload")]
    Empty,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path conflict at {path}: {message}")]
    PathConflict { path: String, message: String },

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Failed to write tree to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}
