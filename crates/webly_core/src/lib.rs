//! # webly_core
//!
//! Build orchestration and auto-repair pipeline for Webly.
//!
//! This crate takes a generated project, mounts it into a sandbox, runs the
//! backend's setup commands, starts the dev server and keeps the project
//! building: lint and build failures are sent back for correction and the
//! corrected code is mounted again.
//!
//! # Architecture
//!
//! - **Lifecycle**: boots the sandbox once and drives each activation
//! - **Sequencer**: issues setup commands to the shell in order
//! - **Checkers**: ESLint and `vite build`, judged on their output
//! - **Repair**: error-correction round trip with bounded retries
//! - **State**: run phase and terminal log, published to observers
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use webly_client::{FileSessionStore, HttpBackend};
//! use webly_core::{PipelineConfig, SandboxLifecycleManager};
//! use webly_runner::{LocalSandbox, LocalSandboxOptions, StdoutTerminal};
//!
//! let config = PipelineConfig::load(&workspace)?;
//! let manager = SandboxLifecycleManager::new(
//!     Arc::new(LocalSandbox::new(LocalSandboxOptions::new().workdir(&project))?),
//!     Arc::new(HttpBackend::new(&config.backend_url)),
//!     Arc::new(FileSessionStore::new(&workspace)),
//!     config,
//!     Arc::new(StdoutTerminal),
//! );
//!
//! let phase = manager.activate().await?;
//! println!("{} at {:?}", phase, manager.preview_url());
//! ```

pub mod checkers;
pub mod config;
pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod phase;
pub mod repair;
pub mod sequencer;
pub mod state;

// Re-export main types for convenience
pub use checkers::{parse_lint_output, BuildChecker, CheckOutcome, LintChecker, StaticChecker, BUILD_FAILURE_MARKERS};
pub use config::{PipelineConfig, SetupDelays, CONFIG_FILE};
pub use error::{CoreError, CoreResult};
pub use layout::{
    clamp_file_tree_width, clamp_percent, format_preview_url, Layout, SplitPane, MAX_FILE_TREE_PX,
    MAX_SPLIT_PERCENT, MIN_FILE_TREE_PX, MIN_SPLIT_PERCENT,
};
pub use lifecycle::SandboxLifecycleManager;
pub use phase::Phase;
pub use repair::{AutoRepairClient, RepairOutcome};
pub use sequencer::{CommandSequencer, PlannedCommand, DEV_SERVER_COMMAND};
pub use state::{
    PipelineState, RecordingSink, StateHandle, INIT_FAILED, REBUILD_FAILED, SERVER_BUSY, START_FAILED,
};
