//! Sandbox runtime trait and types.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};

use webly_tree::FileTree;

use crate::config::TerminalSize;
use crate::error::RunnerResult;

/// Identifier of a process inside a sandbox.
pub type ProcessId = u64;

/// Capacity of the sandbox event channel.
pub const EVENT_CAPACITY: usize = 64;

/// Asynchronous notifications emitted by a sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxEvent {
    /// The dev server is reachable.
    ServerReady { port: u16, host: String },
    /// A process exited. The code is advisory only.
    ProcessExit { pid: ProcessId, code: i64 },
}

/// Handles to a running process.
///
/// `output` yields combined stdout/stderr chunks and closes when the
/// process stops producing output. `exit` resolves with the exit code.
pub struct SpawnedProcess {
    pub pid: ProcessId,
    pub output: mpsc::UnboundedReceiver<String>,
    pub input: Option<mpsc::UnboundedSender<String>>,
    pub exit: oneshot::Receiver<i64>,
}

/// Sandbox runtime trait.
///
/// A runtime is booted once, then receives any number of mounts and
/// process spawns over its lifetime.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Human-readable runtime name.
    fn name(&self) -> &str;

    /// Initialize the runtime.
    async fn boot(&self) -> RunnerResult<()>;

    /// Write a project tree into the sandbox file system.
    async fn mount(&self, tree: &FileTree) -> RunnerResult<()>;

    /// Spawn a non-interactive process.
    async fn spawn(&self, command: &str, args: &[String]) -> RunnerResult<SpawnedProcess>;

    /// Spawn the interactive shell. The returned process carries an input writer.
    async fn spawn_shell(&self, size: TerminalSize) -> RunnerResult<SpawnedProcess>;

    /// Subscribe to runtime events.
    fn subscribe(&self) -> broadcast::Receiver<SandboxEvent>;
}

/// Format a command line for logs and terminal echo.
pub fn command_line(command: &str, args: &[String]) -> String {
    let mut line = command.to_string();
    for arg in args {
        if arg.contains(' ') {
            line.push_str(&format!(" '{}'", arg));
        } else {
            line.push(' ');
            line.push_str(arg);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quotes_spaces() {
        let args = vec!["eslint".to_string(), "--format".to_string(), "my file".to_string()];
        assert_eq!(command_line("npx", &args), "npx eslint --format 'my file'");
        assert_eq!(command_line("ls", &[]), "ls");
    }
}
