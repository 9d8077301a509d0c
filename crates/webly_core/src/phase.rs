//! Pipeline phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of a pipeline run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing has happened yet
    #[default]
    Idle,
    /// Sandbox runtime is starting
    Booting,
    /// Project tree written into the sandbox
    Mounted,
    /// Interactive shell being spawned
    ShellStarting,
    /// Setup commands, install and dev server start
    RunningSetup,
    /// Lint and build checks running
    Checking,
    /// Dev server reachable
    Ready,
    /// Waiting for corrected code from the backend
    Repairing,
    /// Boot failed or repair gave up
    Failed,
}

impl Phase {
    /// Check if a transition to the given phase is valid.
    pub fn can_transition_to(&self, next: &Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Booting)
                | (Booting, Mounted)
                | (Booting, Repairing)
                | (Mounted, ShellStarting)
                | (ShellStarting, RunningSetup)
                | (RunningSetup, Checking)
                | (RunningSetup, Ready)
                | (Checking, Ready)
                | (Checking, Repairing)
                | (Ready, Checking)
                | (Ready, Repairing)
                | (Repairing, Mounted)
        ) || (*next == Failed && *self != Failed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Ready | Phase::Failed)
    }

    /// Whether the dev server may already be starting.
    ///
    /// A server-ready event in any of these phases makes the run ready.
    pub fn accepts_server_ready(&self) -> bool {
        matches!(self, Phase::RunningSetup | Phase::Checking | Phase::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Booting => "booting",
            Phase::Mounted => "mounted",
            Phase::ShellStarting => "shell_starting",
            Phase::RunningSetup => "running_setup",
            Phase::Checking => "checking",
            Phase::Ready => "ready",
            Phase::Repairing => "repairing",
            Phase::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        let path = [
            Phase::Idle,
            Phase::Booting,
            Phase::Mounted,
            Phase::ShellStarting,
            Phase::RunningSetup,
            Phase::Checking,
            Phase::Ready,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_repair_loop() {
        assert!(Phase::Checking.can_transition_to(&Phase::Repairing));
        assert!(Phase::Repairing.can_transition_to(&Phase::Mounted));
        assert!(Phase::Ready.can_transition_to(&Phase::Checking));
        assert!(!Phase::Repairing.can_transition_to(&Phase::Checking));
    }

    #[test]
    fn test_no_backwards_jumps() {
        assert!(!Phase::Checking.can_transition_to(&Phase::Booting));
        assert!(!Phase::Ready.can_transition_to(&Phase::Mounted));
        assert!(!Phase::Idle.can_transition_to(&Phase::Ready));
    }

    #[test]
    fn test_failed_is_terminal() {
        assert!(Phase::Booting.can_transition_to(&Phase::Failed));
        assert!(Phase::Repairing.can_transition_to(&Phase::Failed));
        assert!(!Phase::Failed.can_transition_to(&Phase::Failed));
        assert!(!Phase::Failed.can_transition_to(&Phase::Booting));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Phase::ShellStarting).unwrap(), "\"shell_starting\"");
    }
}
