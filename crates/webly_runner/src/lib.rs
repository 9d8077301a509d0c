//! # webly_runner
//!
//! Sandbox execution layer for Webly.
//!
//! This crate runs a generated web project: it mounts the project tree into a
//! sandbox, spawns one-shot processes (install, lint, build), and owns the
//! interactive shell the dev server runs in.
//!
//! # Features
//!
//! - **Sandbox Runtime Trait**: boot, mount, spawn, shell and server-ready events
//! - **Local Sandbox**: host processes in a project directory
//! - **Process Runner**: streams output to a terminal and awaits the exit
//! - **Shell Session**: single-writer input shared by automation and keystrokes
//! - **Stale Output Filtering**: terminal writers stamped per shell session
//! - **Mock Sandbox**: for testing without real processes
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webly_runner::{
//!     LocalSandbox, LocalSandboxOptions, ProcessConfig, ProcessRunner, SandboxRuntime,
//!     StdoutTerminal,
//! };
//! use webly_tree::{Baseline, FileTree};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sandbox = Arc::new(LocalSandbox::new(LocalSandboxOptions::default())?);
//!     sandbox.boot().await?;
//!     sandbox.mount(&Baseline::vite_react().merge(&FileTree::new())).await?;
//!
//!     let runner = ProcessRunner::new(sandbox, ProcessConfig::default());
//!     let output = runner.run("npm", &["install".to_string()], &StdoutTerminal).await?;
//!     println!("exit code: {:?}", output.exit_code);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod local;
pub mod mock;
pub mod process;
pub mod runner;
pub mod shell;
pub mod terminal;

pub use config::{LocalSandboxOptions, ProcessConfig, TerminalSize};
pub use error::{RunnerError, RunnerResult};
pub use local::{detect_server_ready, LocalSandbox};
pub use mock::{CapturedCall, MockResponse, MockSandbox};
pub use process::{ProcessOutput, ProcessRunner};
pub use runner::{command_line, ProcessId, SandboxEvent, SandboxRuntime, SpawnedProcess, EVENT_CAPACITY};
pub use shell::{AutomationChannel, ShellSession, INTERRUPT};
pub use terminal::{BufferedTerminal, SessionTerminal, StdoutTerminal, Terminal, TerminalSink};
