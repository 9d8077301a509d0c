//! Process and sandbox configuration types.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Terminal dimensions handed to the interactive shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Limits for a single process run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Timeout in seconds (0 = no timeout)
    pub timeout_seconds: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 300, // 5 minutes
        }
    }
}

impl ProcessConfig {
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Options for the local process sandbox.
#[derive(Debug, Clone)]
pub struct LocalSandboxOptions {
    /// Project directory. A temporary directory is used when unset.
    pub workdir: Option<PathBuf>,
    /// Shell program used for the interactive session
    pub shell: String,
    /// Extra environment for every spawned process
    pub env: HashMap<String, String>,
}

impl Default for LocalSandboxOptions {
    fn default() -> Self {
        Self {
            workdir: None,
            shell: "sh".to_string(),
            env: HashMap::new(),
        }
    }
}

impl LocalSandboxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_options_builder() {
        let options = LocalSandboxOptions::new()
            .workdir("/tmp/site")
            .shell("bash")
            .env("CI", "1");

        assert_eq!(options.workdir, Some(PathBuf::from("/tmp/site")));
        assert_eq!(options.shell, "bash");
        assert_eq!(options.env.get("CI"), Some(&"1".to_string()));
    }

    #[test]
    fn test_process_config_defaults() {
        assert_eq!(ProcessConfig::default().timeout_seconds, 300);
        assert_eq!(ProcessConfig::default().timeout(0).timeout_seconds, 0);
    }
}
