//! # webly_client - Generation Backend Client for Webly
//!
//! This crate talks to the generation backend and keeps the session state
//! the pipeline works from:
//! - Generation of a project tree from page sketches and a prompt
//! - Error correction of a tree given the output of a failed check
//! - Setup commands for the project's dependency set
//! - Bounded retries with exponential backoff
//! - Persisted `code` and `dependencies` entries
//!
//! No call reads shared mutable state: the session is passed explicitly as a
//! [`SessionContext`] to every backend call.

pub mod backend;
pub mod error;
pub mod retry;
pub mod store;
pub mod types;

pub use backend::{Backend, HttpBackend, DEFAULT_BACKEND_URL, GENERATE_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS};
pub use error::{ClientError, ClientResult};
pub use retry::RetryPolicy;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use types::{
    GenerationRequest, GenerationResponse, PageImage, RepairRequest, RepairResponse,
    SessionContext, SetupCommands,
};
