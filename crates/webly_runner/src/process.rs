//! One-shot process execution with live terminal streaming.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::ProcessConfig;
use crate::error::RunnerResult;
use crate::runner::{command_line, SandboxRuntime};
use crate::terminal::TerminalSink;

/// Result of a process run.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Command line that was run
    pub command: String,
    /// Combined stdout/stderr in arrival order
    pub output: String,
    /// Exit code, if the runtime reported one
    pub exit_code: Option<i64>,
    /// The run was cut off by the configured timeout; `output` is partial
    pub timed_out: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ProcessOutput {
    /// Exit code 0. Advisory: some runtimes report unreliable codes.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Whether the output contains any of the given substrings, case as emitted.
    pub fn contains_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|needle| self.output.contains(needle))
    }
}

/// Runs processes inside a sandbox and mirrors their output to a terminal.
#[derive(Clone)]
pub struct ProcessRunner {
    sandbox: Arc<dyn SandboxRuntime>,
    config: ProcessConfig,
}

impl ProcessRunner {
    pub fn new(sandbox: Arc<dyn SandboxRuntime>, config: ProcessConfig) -> Self {
        Self { sandbox, config }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Run a command to completion.
    ///
    /// Every chunk is written to `terminal` as it arrives. A non-zero exit is
    /// not an error; callers judge the output. A run that outlives the
    /// timeout is abandoned and returned with `timed_out` set and whatever
    /// output arrived before the deadline.
    pub async fn run(
        &self,
        command: &str,
        args: &[String],
        terminal: &dyn TerminalSink,
    ) -> RunnerResult<ProcessOutput> {
        let line = command_line(command, args);
        debug!("Running: {}", line);

        let started_at = Utc::now();
        let mut process = self.sandbox.spawn(command, args).await?;

        let mut output = String::new();
        let collect = async {
            while let Some(chunk) = process.output.recv().await {
                terminal.write(&chunk);
                output.push_str(&chunk);
            }
            (&mut process.exit).await.ok()
        };

        let (exit_code, timed_out) = if self.config.timeout_seconds > 0 {
            match timeout(Duration::from_secs(self.config.timeout_seconds), collect).await {
                Ok(exit_code) => (exit_code, false),
                Err(_) => {
                    warn!("{} timed out after {}s", line, self.config.timeout_seconds);
                    (None, true)
                }
            }
        } else {
            (collect.await, false)
        };

        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        debug!("{} finished with {:?} in {}ms", line, exit_code, duration_ms);

        Ok(ProcessOutput {
            command: line,
            output,
            exit_code,
            timed_out,
            started_at,
            finished_at,
            duration_ms,
        })
    }
}
