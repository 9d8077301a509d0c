//! Pipeline configuration.
//!
//! Loaded from `.webly/config.yaml` in the workspace. Every field has a
//! default, and `WEBLY_BACKEND_URL` / `WEBLY_MAX_REPAIRS` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use webly_client::{RetryPolicy, DEFAULT_BACKEND_URL};
use webly_runner::{ProcessConfig, TerminalSize};

use crate::error::{CoreError, CoreResult};

pub const CONFIG_FILE: &str = "config.yaml";

/// Delays observed before each setup command is written to the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupDelays {
    /// One entry per backend command slot
    pub commands_ms: [u64; 5],
    /// Before `npm i <dependencies>`
    pub dependencies_ms: u64,
}

impl Default for SetupDelays {
    fn default() -> Self {
        Self {
            commands_ms: [2000, 3000, 3000, 4000, 4000],
            dependencies_ms: 5000,
        }
    }
}

impl SetupDelays {
    /// No waiting at all.
    pub fn none() -> Self {
        Self {
            commands_ms: [0; 5],
            dependencies_ms: 0,
        }
    }

    pub fn command(&self, slot: usize) -> Duration {
        Duration::from_millis(self.commands_ms.get(slot).copied().unwrap_or_default())
    }

    pub fn dependencies(&self) -> Duration {
        Duration::from_millis(self.dependencies_ms)
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub backend_url: String,
    /// Repairs attempted before giving up
    pub max_repair_cycles: u32,
    /// Retries for each backend call
    pub retry: RetryPolicy,
    /// Timeout for install, lint and build processes (0 = none)
    pub process_timeout_seconds: u64,
    pub setup_delays: SetupDelays,
    /// Also treat a non-zero build exit code as failure
    pub trust_exit_codes: bool,
    pub terminal: TerminalSize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            max_repair_cycles: 5,
            retry: RetryPolicy::default(),
            process_timeout_seconds: 300,
            setup_delays: SetupDelays::default(),
            trust_exit_codes: false,
            terminal: TerminalSize::default(),
        }
    }
}

impl PipelineConfig {
    /// Path of the config file inside a workspace.
    pub fn path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(".webly").join(CONFIG_FILE)
    }

    /// Parse from YAML.
    pub fn from_yaml(yaml: &str) -> CoreResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> CoreResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load the workspace config, falling back to defaults, then apply the
    /// environment.
    pub fn load(workspace_root: &Path) -> CoreResult<Self> {
        let path = Self::path(workspace_root);
        let config = if path.exists() {
            debug!("Loading pipeline config from {:?}", path);
            let content = std::fs::read_to_string(&path)?;
            Self::from_yaml(&content)?
        } else {
            Self::default()
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    /// Apply `WEBLY_BACKEND_URL` and `WEBLY_MAX_REPAIRS` from `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("WEBLY_BACKEND_URL").filter(|u| !u.is_empty()) {
            self.backend_url = url;
        }
        if let Some(raw) = lookup("WEBLY_MAX_REPAIRS") {
            self.max_repair_cycles = raw.trim().parse().map_err(|_| {
                CoreError::Config(format!("WEBLY_MAX_REPAIRS must be a number, got '{}'", raw))
            })?;
        }
        if self.max_repair_cycles == 0 {
            warn!("max_repair_cycles is 0; failed checks will not be repaired");
        }
        Ok(self)
    }

    pub fn process_config(&self) -> ProcessConfig {
        ProcessConfig::default().timeout(self.process_timeout_seconds)
    }

    /// Configuration without delays or backoff, for tests and CI.
    pub fn immediate() -> Self {
        Self {
            retry: RetryPolicy::immediate(3),
            setup_delays: SetupDelays::none(),
            process_timeout_seconds: 30,
            ..Self::default()
        }
    }
}
