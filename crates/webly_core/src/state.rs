//! Pipeline run state.
//!
//! One [`PipelineState`] exists per activation. It is owned by a
//! [`StateHandle`] and published on a watch channel; observers only read.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use webly_runner::TerminalSink;

use crate::error::{CoreError, CoreResult};
use crate::layout::format_preview_url;
use crate::phase::Phase;

/// Banner shown when the backend stays unreachable.
pub const SERVER_BUSY: &str = "Server is Busy, please try again";

/// Banner shown when the sandbox cannot boot.
pub const INIT_FAILED: &str = "Failed to initialize environment. Please refresh the page.";

/// Banner shown when mounting or spawning the shell fails.
pub const START_FAILED: &str = "Failed to start environment. Please refresh the page.";

/// Banner shown when repair cycles run out.
pub const REBUILD_FAILED: &str = "Failed to rebuild project. Please check the terminal for errors.";

/// Snapshot of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: String,
    pub phase: Phase,
    /// Everything written to the terminal during this run
    pub terminal_log: String,
    /// User-facing error banner
    pub errors: Option<String>,
    /// Output of the last failed check
    pub last_error: Option<String>,
    pub preview_url: Option<String>,
    /// Server-ready seen since the current shell started
    pub server_ready: bool,
    pub repair_attempts: u32,
    pub checks_passed: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            phase: Phase::Idle,
            terminal_log: String::new(),
            errors: None,
            last_error: None,
            preview_url: None,
            server_ready: false,
            repair_attempts: 0,
            checks_passed: false,
            started_at: now,
            updated_at: now,
        }
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared owner of the run state.
#[derive(Clone)]
pub struct StateHandle {
    tx: Arc<watch::Sender<PipelineState>>,
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StateHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(PipelineState::new());
        Self { tx: Arc::new(tx) }
    }

    /// Current state.
    pub fn snapshot(&self) -> PipelineState {
        self.tx.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.tx.borrow().phase
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.tx.subscribe()
    }

    /// Start a fresh run.
    pub fn begin_run(&self) -> String {
        let state = PipelineState::new();
        let run_id = state.run_id.clone();
        self.tx.send_replace(state);
        debug!("Started pipeline run {}", run_id);
        run_id
    }

    /// Move to `to`. Staying in the current phase is a no-op.
    pub fn transition(&self, to: Phase) -> CoreResult<()> {
        let mut result = Ok(());
        self.tx.send_if_modified(|state| {
            let from = state.phase;
            if from == to {
                return false;
            }
            if !from.can_transition_to(&to) {
                result = Err(CoreError::InvalidTransition { from, to });
                return false;
            }
            info!("Pipeline phase: {} -> {}", from, to);
            state.phase = to;
            state.updated_at = Utc::now();
            true
        });
        result
    }

    /// Enter `Failed` with a banner.
    pub fn fail(&self, banner: &str) {
        let banner = banner.to_string();
        self.tx.send_modify(|state| {
            if state.phase != Phase::Failed {
                info!("Pipeline phase: {} -> {}", state.phase, Phase::Failed);
            }
            state.phase = Phase::Failed;
            state.errors = Some(banner);
            state.checks_passed = false;
            state.updated_at = Utc::now();
        });
    }

    pub fn set_banner(&self, banner: &str) {
        let banner = banner.to_string();
        self.tx.send_modify(|state| state.errors = Some(banner));
    }

    pub fn clear_banner(&self) {
        self.tx.send_if_modified(|state| state.errors.take().is_some());
    }

    /// Record the output of a failed check.
    pub fn record_failure(&self, error_log: &str) {
        let log = error_log.to_string();
        self.tx.send_modify(|state| {
            state.last_error = Some(log);
            state.checks_passed = false;
        });
    }

    /// Count a repair attempt. Returns the attempt number.
    pub fn begin_repair(&self) -> u32 {
        let mut attempts = 0;
        self.tx.send_modify(|state| {
            state.repair_attempts += 1;
            attempts = state.repair_attempts;
        });
        attempts
    }

    /// Give a new pass the full repair budget.
    pub fn reset_repairs(&self) {
        self.tx.send_if_modified(|state| std::mem::take(&mut state.repair_attempts) != 0);
    }

    pub fn repair_attempts(&self) -> u32 {
        self.tx.borrow().repair_attempts
    }

    pub fn set_checks_passed(&self) {
        self.tx.send_modify(|state| {
            state.checks_passed = true;
            state.last_error = None;
        });
    }

    /// A new shell is starting; its server has not announced itself yet.
    pub fn reset_server_ready(&self) {
        self.tx.send_if_modified(|state| std::mem::replace(&mut state.server_ready, false));
    }

    pub fn server_ready(&self) -> bool {
        self.tx.borrow().server_ready
    }

    /// Record a server-ready event. The latest event wins.
    ///
    /// Returns the preview URL.
    pub fn record_server_ready(&self, port: u16, host: &str) -> String {
        let url = format_preview_url(&format!("{}:{}", host, port));
        let preview = url.clone();
        self.tx.send_modify(|state| {
            state.preview_url = Some(preview);
            state.server_ready = true;
            if state.phase.accepts_server_ready() && state.phase != Phase::Ready {
                info!("Pipeline phase: {} -> {}", state.phase, Phase::Ready);
                state.phase = Phase::Ready;
                state.updated_at = Utc::now();
            }
        });
        url
    }

    pub fn preview_url(&self) -> Option<String> {
        self.tx.borrow().preview_url.clone()
    }

    fn append_output(&self, data: &str) {
        self.tx.send_modify(|state| state.terminal_log.push_str(data));
    }
}

/// Terminal sink that records output into the run state and forwards it.
pub struct RecordingSink {
    state: StateHandle,
    inner: Arc<dyn TerminalSink>,
}

impl RecordingSink {
    pub fn new(state: StateHandle, inner: Arc<dyn TerminalSink>) -> Self {
        Self { state, inner }
    }
}

impl TerminalSink for RecordingSink {
    fn write(&self, data: &str) {
        self.state.append_output(data);
        self.inner.write(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webly_runner::BufferedTerminal;

    #[test]
    fn test_invalid_transition_rejected() {
        let state = StateHandle::new();
        assert!(matches!(
            state.transition(Phase::Checking),
            Err(CoreError::InvalidTransition { from: Phase::Idle, to: Phase::Checking })
        ));
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn test_server_ready_last_write_wins() {
        let state = StateHandle::new();
        state.transition(Phase::Booting).unwrap();
        state.transition(Phase::Mounted).unwrap();
        state.transition(Phase::ShellStarting).unwrap();
        state.transition(Phase::RunningSetup).unwrap();

        state.record_server_ready(5173, "localhost");
        state.record_server_ready(5174, "localhost");

        assert_eq!(state.phase(), Phase::Ready);
        assert_eq!(state.preview_url().as_deref(), Some("http://localhost:5174"));
    }

    #[test]
    fn test_server_ready_before_setup_only_records_url() {
        let state = StateHandle::new();
        state.transition(Phase::Booting).unwrap();
        state.record_server_ready(5173, "localhost");
        assert_eq!(state.phase(), Phase::Booting);
        assert!(state.server_ready());
    }

    #[test]
    fn test_fail_sets_banner() {
        let state = StateHandle::new();
        state.fail(INIT_FAILED);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.phase, Phase::Failed);
        assert_eq!(snapshot.errors.as_deref(), Some(INIT_FAILED));
    }

    #[test]
    fn test_reset_repairs() {
        let state = StateHandle::new();
        assert_eq!(state.begin_repair(), 1);
        assert_eq!(state.begin_repair(), 2);

        state.reset_repairs();
        assert_eq!(state.repair_attempts(), 0);
        assert_eq!(state.begin_repair(), 1);
    }

    #[test]
    fn test_recording_sink() {
        let state = StateHandle::new();
        let buffer = Arc::new(BufferedTerminal::new());
        let sink = RecordingSink::new(state.clone(), buffer.clone());

        sink.writeln("Running ESLint...");
        assert_eq!(state.snapshot().terminal_log, "Running ESLint...\n");
        assert_eq!(buffer.contents(), "Running ESLint...\n");
    }

    #[tokio::test]
    async fn test_observers_see_phase_changes() {
        let state = StateHandle::new();
        let mut rx = state.subscribe();
        state.transition(Phase::Booting).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().phase, Phase::Booting);
    }
}
