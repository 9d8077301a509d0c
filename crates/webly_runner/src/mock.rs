//! Mock sandbox runtime for testing.
//!
//! Provides a scriptable implementation of the SandboxRuntime trait for use
//! in unit tests without a real runtime.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};

use webly_tree::FileTree;

use crate::config::TerminalSize;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{command_line, ProcessId, SandboxEvent, SandboxRuntime, SpawnedProcess, EVENT_CAPACITY};

/// Predefined output for a spawned command.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub chunks: Vec<String>,
    pub exit_code: i64,
    /// Output stays open and the process never exits
    pub hangs: bool,
}

impl MockResponse {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            chunks: vec![output.into()],
            exit_code: 0,
            hangs: false,
        }
    }

    pub fn failure(exit_code: i64, output: impl Into<String>) -> Self {
        Self {
            chunks: vec![output.into()],
            exit_code,
            hangs: false,
        }
    }

    /// Output delivered as several chunks.
    pub fn chunked(chunks: Vec<&str>, exit_code: i64) -> Self {
        Self {
            chunks: chunks.into_iter().map(String::from).collect(),
            exit_code,
            hangs: false,
        }
    }

    /// Prints `output` and then never finishes.
    pub fn hanging(output: impl Into<String>) -> Self {
        Self {
            chunks: vec![output.into()],
            exit_code: 0,
            hangs: true,
        }
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    pub command: Option<String>,
    pub tree: Option<FileTree>,
}

/// Server announcement triggered by shell input.
#[derive(Debug, Clone)]
struct ReadyTrigger {
    needle: String,
    port: u16,
    host: String,
}

/// Output and exit handles of processes that never finish.
type HeldProcess = (mpsc::UnboundedSender<String>, oneshot::Sender<i64>);

/// Mock sandbox runtime.
///
/// Responses are scripted per command line. When several responses are
/// queued for the same command they are returned in order and the last one
/// repeats.
#[derive(Clone)]
pub struct MockSandbox {
    responses: Arc<RwLock<HashMap<String, VecDeque<MockResponse>>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    shell_input: Arc<RwLock<Vec<String>>>,
    ready_triggers: Arc<RwLock<Vec<ReadyTrigger>>>,
    boot_failure: Arc<RwLock<Option<String>>>,
    boot_count: Arc<AtomicUsize>,
    next_pid: Arc<AtomicU64>,
    held: Arc<RwLock<Vec<HeldProcess>>>,
    events: broadcast::Sender<SandboxEvent>,
}

impl Default for MockSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSandbox {
    /// Create a new mock sandbox.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            responses: Arc::new(RwLock::new(HashMap::new())),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            shell_input: Arc::new(RwLock::new(Vec::new())),
            ready_triggers: Arc::new(RwLock::new(Vec::new())),
            boot_failure: Arc::new(RwLock::new(None)),
            boot_count: Arc::new(AtomicUsize::new(0)),
            next_pid: Arc::new(AtomicU64::new(1)),
            held: Arc::new(RwLock::new(Vec::new())),
            events,
        }
    }

    /// Queue a response for a command line such as `npx vite build --emptyOutDir`.
    pub fn respond(self, command_line: impl Into<String>, response: MockResponse) -> Self {
        self.responses
            .write()
            .entry(command_line.into())
            .or_default()
            .push_back(response);
        self
    }

    /// Make `boot` fail with the given message.
    pub fn fail_boot(self, message: impl Into<String>) -> Self {
        *self.boot_failure.write() = Some(message.into());
        self
    }

    /// Emit a server-ready event whenever shell input contains `needle`.
    pub fn ready_on(self, needle: impl Into<String>, port: u16, host: impl Into<String>) -> Self {
        self.ready_triggers.write().push(ReadyTrigger {
            needle: needle.into(),
            port,
            host: host.into(),
        });
        self
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: SandboxEvent) {
        let _ = self.events.send(event);
    }

    /// Clear the boot failure.
    pub fn heal_boot(&self) {
        *self.boot_failure.write() = None;
    }

    pub fn boot_count(&self) -> usize {
        self.boot_count.load(Ordering::SeqCst)
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get calls to a specific method.
    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Command lines passed to `spawn`, in order.
    pub fn spawned_commands(&self) -> Vec<String> {
        self.get_method_calls("spawn")
            .into_iter()
            .filter_map(|c| c.command)
            .collect()
    }

    /// Trees passed to `mount`, in order.
    pub fn mounted_trees(&self) -> Vec<FileTree> {
        self.get_method_calls("mount")
            .into_iter()
            .filter_map(|c| c.tree)
            .collect()
    }

    /// Everything written to any shell input, in order.
    pub fn shell_input(&self) -> Vec<String> {
        self.shell_input.read().clone()
    }

    /// Complete command lines written to the shell, newline stripped.
    pub fn shell_commands(&self) -> Vec<String> {
        self.shell_input
            .read()
            .iter()
            .filter(|data| data.ends_with('\n'))
            .map(|data| data.trim_end_matches('\n').to_string())
            .collect()
    }

    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    fn next_response(&self, line: &str) -> MockResponse {
        let mut responses = self.responses.write();
        match responses.get_mut(line) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| MockResponse::success("")),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| MockResponse::success("")),
            None => MockResponse::success(""),
        }
    }

    fn next_pid(&self) -> ProcessId {
        self.next_pid.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl SandboxRuntime for MockSandbox {
    fn name(&self) -> &str {
        "mock"
    }

    async fn boot(&self) -> RunnerResult<()> {
        self.record_call(CapturedCall {
            method: "boot".to_string(),
            command: None,
            tree: None,
        });
        self.boot_count.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.boot_failure.read().clone() {
            return Err(RunnerError::BootFailed(msg));
        }
        Ok(())
    }

    async fn mount(&self, tree: &FileTree) -> RunnerResult<()> {
        self.record_call(CapturedCall {
            method: "mount".to_string(),
            command: None,
            tree: Some(tree.clone()),
        });
        Ok(())
    }

    async fn spawn(&self, command: &str, args: &[String]) -> RunnerResult<SpawnedProcess> {
        let line = command_line(command, args);
        self.record_call(CapturedCall {
            method: "spawn".to_string(),
            command: Some(line.clone()),
            tree: None,
        });

        let response = self.next_response(&line);
        let pid = self.next_pid();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        for chunk in response.chunks {
            let _ = out_tx.send(chunk);
        }

        let (exit_tx, exit_rx) = oneshot::channel();
        if response.hangs {
            self.held.write().push((out_tx, exit_tx));
        } else {
            drop(out_tx);
            let _ = exit_tx.send(response.exit_code);
            self.emit(SandboxEvent::ProcessExit {
                pid,
                code: response.exit_code,
            });
        }

        Ok(SpawnedProcess {
            pid,
            output: out_rx,
            input: None,
            exit: exit_rx,
        })
    }

    async fn spawn_shell(&self, size: TerminalSize) -> RunnerResult<SpawnedProcess> {
        self.record_call(CapturedCall {
            method: "spawn_shell".to_string(),
            command: Some(format!("jsh {}x{}", size.cols, size.rows)),
            tree: None,
        });

        let pid = self.next_pid();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, mut in_rx) = mpsc::unbounded_channel::<String>();
        let (exit_tx, exit_rx) = oneshot::channel();

        let shell_input = self.shell_input.clone();
        let triggers = self.ready_triggers.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(data) = in_rx.recv().await {
                shell_input.write().push(data.clone());
                let _ = out_tx.send(data.clone());
                let fired: Vec<ReadyTrigger> = triggers
                    .read()
                    .iter()
                    .filter(|t| data.contains(&t.needle))
                    .cloned()
                    .collect();
                for trigger in fired {
                    let _ = events.send(SandboxEvent::ServerReady {
                        port: trigger.port,
                        host: trigger.host,
                    });
                }
            }
            let _ = events.send(SandboxEvent::ProcessExit { pid, code: 0 });
            let _ = exit_tx.send(0);
        });

        Ok(SpawnedProcess {
            pid,
            output: out_rx,
            input: Some(in_tx),
            exit: exit_rx,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<SandboxEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_sandbox_scripted_output() {
        let sandbox = MockSandbox::new().respond(
            "npx vite build --emptyOutDir",
            MockResponse::chunked(vec!["building...\n", "done\n"], 0),
        );
        let args = vec!["vite".to_string(), "build".to_string(), "--emptyOutDir".to_string()];

        let mut process = sandbox.spawn("npx", &args).await.unwrap();
        assert_eq!(process.output.recv().await.unwrap(), "building...\n");
        assert_eq!(process.output.recv().await.unwrap(), "done\n");
        assert!(process.output.recv().await.is_none());
        assert_eq!(process.exit.await.unwrap(), 0);

        assert_eq!(sandbox.spawned_commands(), vec!["npx vite build --emptyOutDir"]);
    }

    #[tokio::test]
    async fn test_mock_sandbox_response_queue_repeats_last() {
        let sandbox = MockSandbox::new()
            .respond("npm test", MockResponse::failure(1, "failed"))
            .respond("npm test", MockResponse::success("ok"));
        let args = vec!["test".to_string()];

        for expected in ["failed", "ok", "ok"] {
            let mut process = sandbox.spawn("npm", &args).await.unwrap();
            assert_eq!(process.output.recv().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_mock_sandbox_hanging_process() {
        let sandbox = MockSandbox::new().respond("npx vite build", MockResponse::hanging("transforming...\n"));
        let args = vec!["vite".to_string(), "build".to_string()];

        let mut process = sandbox.spawn("npx", &args).await.unwrap();
        assert_eq!(process.output.recv().await.unwrap(), "transforming...\n");

        let next = tokio::time::timeout(std::time::Duration::from_millis(50), process.output.recv()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn test_mock_sandbox_boot_failure() {
        let sandbox = MockSandbox::new().fail_boot("unsupported browser");
        assert!(matches!(sandbox.boot().await, Err(RunnerError::BootFailed(_))));
        sandbox.heal_boot();
        assert!(sandbox.boot().await.is_ok());
        assert_eq!(sandbox.boot_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_shell_ready_trigger() {
        let sandbox = MockSandbox::new().ready_on("npx vite", 5173, "localhost");
        let mut events = sandbox.subscribe();

        let shell = sandbox.spawn_shell(TerminalSize::default()).await.unwrap();
        shell.input.as_ref().unwrap().send("npx vite\n".to_string()).unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            SandboxEvent::ServerReady {
                port: 5173,
                host: "localhost".to_string()
            }
        );
        assert_eq!(sandbox.shell_commands(), vec!["npx vite"]);
    }
}
