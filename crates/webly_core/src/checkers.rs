//! Static checkers: lint and production build.
//!
//! Both run as one-shot processes and judge their combined output. A
//! non-empty error log means the check failed and the log goes to repair.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use webly_runner::{ProcessOutput, ProcessRunner, TerminalSink};

use crate::error::CoreResult;

/// Outcome of one checker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Clean,
    Failed { error_log: String },
}

impl CheckOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, CheckOutcome::Clean)
    }

    pub fn error_log(&self) -> Option<&str> {
        match self {
            CheckOutcome::Clean => None,
            CheckOutcome::Failed { error_log } => Some(error_log),
        }
    }
}

/// A static check run against the mounted project.
#[async_trait]
pub trait StaticChecker: Send + Sync {
    fn name(&self) -> &str;

    /// Narration written to the terminal before the check starts.
    fn banner(&self) -> &str;

    async fn check(&self, runner: &ProcessRunner, terminal: &dyn TerminalSink) -> CoreResult<CheckOutcome>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LintFileReport {
    file_path: String,
    #[serde(default)]
    messages: Vec<LintMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LintMessage {
    #[serde(default)]
    rule_id: Option<String>,
    #[serde(default)]
    message: String,
}

/// Offset of the JSON report in lint output.
///
/// The report is the first line opening an array of file results; npm
/// notices printed before it may contain brackets of their own.
fn report_start(raw: &str) -> Option<usize> {
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let content = trimmed.trim_end();
        if trimmed.starts_with("[{") || content == "[" || content == "[]" {
            return Some(offset + line.len() - trimmed.len());
        }
        offset += line.len();
    }
    raw.find("[{")
}

/// Build an error log from ESLint JSON output.
///
/// Every diagnostic counts except those with an empty rule id. Fatal parse
/// errors carry no rule id at all and are reported. Returns `Err` with the
/// parse error when the output holds no valid report.
pub fn parse_lint_output(raw: &str) -> Result<String, String> {
    let start = report_start(raw).ok_or_else(|| "no JSON report in lint output".to_string())?;
    let end = raw.rfind(']').filter(|end| *end >= start).ok_or_else(|| "unterminated lint report".to_string())?;
    let reports: Vec<LintFileReport> =
        serde_json::from_str(&raw[start..=end]).map_err(|e| e.to_string())?;

    let mut error_log = String::new();
    for report in &reports {
        for msg in &report.messages {
            if msg.rule_id.as_deref() != Some("") {
                error_log.push_str(&format!("File: {}\nError: {}\n\n", report.file_path, msg.message));
            }
        }
    }
    Ok(error_log)
}

/// Error log for a checker process cut off by the timeout.
fn timeout_outcome(runner: &ProcessRunner, output: ProcessOutput) -> CheckOutcome {
    warn!("{} timed out", output.command);
    let mut error_log = output.output;
    if !error_log.is_empty() && !error_log.ends_with('\n') {
        error_log.push('\n');
    }
    error_log.push_str(&format!(
        "{} did not finish within {}s",
        output.command,
        runner.config().timeout_seconds
    ));
    CheckOutcome::Failed { error_log }
}

/// ESLint over `src/` with JSON output.
#[derive(Debug, Default)]
pub struct LintChecker;

impl LintChecker {
    pub const COMMAND: &'static str = "npx";
    pub const ARGS: [&'static str; 4] = ["eslint", "--format", "json", "src/"];

    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StaticChecker for LintChecker {
    fn name(&self) -> &str {
        "lint"
    }

    fn banner(&self) -> &str {
        "Running ESLint..."
    }

    async fn check(&self, runner: &ProcessRunner, terminal: &dyn TerminalSink) -> CoreResult<CheckOutcome> {
        let args: Vec<String> = Self::ARGS.iter().map(|a| a.to_string()).collect();
        let output = runner.run(Self::COMMAND, &args, terminal).await?;
        if output.timed_out {
            return Ok(timeout_outcome(runner, output));
        }

        if output.output.trim().is_empty() {
            return Ok(CheckOutcome::Clean);
        }

        match parse_lint_output(&output.output) {
            Ok(error_log) if error_log.is_empty() => {
                debug!("Lint clean");
                Ok(CheckOutcome::Clean)
            }
            Ok(error_log) => Ok(CheckOutcome::Failed { error_log }),
            Err(e) => {
                warn!("Could not parse ESLint output: {}", e);
                Ok(CheckOutcome::Clean)
            }
        }
    }
}

/// Markers that flag a failed build anywhere in its output.
pub const BUILD_FAILURE_MARKERS: [&str; 2] = ["error", "failed"];

/// `vite build` into a fresh output directory.
#[derive(Debug, Default)]
pub struct BuildChecker {
    trust_exit_codes: bool,
}

impl BuildChecker {
    pub const COMMAND: &'static str = "npx";
    pub const ARGS: [&'static str; 3] = ["vite", "build", "--emptyOutDir"];

    pub fn new(trust_exit_codes: bool) -> Self {
        Self { trust_exit_codes }
    }
}

#[async_trait]
impl StaticChecker for BuildChecker {
    fn name(&self) -> &str {
        "build"
    }

    fn banner(&self) -> &str {
        "Running ViteBuilder..."
    }

    async fn check(&self, runner: &ProcessRunner, terminal: &dyn TerminalSink) -> CoreResult<CheckOutcome> {
        let args: Vec<String> = Self::ARGS.iter().map(|a| a.to_string()).collect();
        let output = runner.run(Self::COMMAND, &args, terminal).await?;
        if output.timed_out {
            return Ok(timeout_outcome(runner, output));
        }

        let text_failure = output.contains_any(&BUILD_FAILURE_MARKERS);
        let exit_failure = self.trust_exit_codes && output.exit_code.is_some_and(|code| code != 0);

        if text_failure || exit_failure {
            debug!(
                "Build failed (text match: {}, exit code: {:?})",
                text_failure, output.exit_code
            );
            Ok(CheckOutcome::Failed {
                error_log: output.output,
            })
        } else {
            Ok(CheckOutcome::Clean)
        }
    }
}
