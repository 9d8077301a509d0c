//! Local process sandbox.
//!
//! Runs the project in a directory on the host using `tokio::process`. The
//! tree is written to disk on mount, every process runs with the project
//! directory as its working directory, and the dev server's startup banner
//! (`http://localhost:5173/`) is turned into a server-ready event.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use webly_tree::{FileTree, TreeWriter};

use crate::config::{LocalSandboxOptions, TerminalSize};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{command_line, SandboxEvent, SandboxRuntime, SpawnedProcess, EVENT_CAPACITY};
use crate::shell::INTERRUPT;

fn ansi_pattern() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ansi pattern is valid"))
}

fn server_pattern() -> &'static Regex {
    static SERVER: OnceLock<Regex> = OnceLock::new();
    SERVER.get_or_init(|| {
        Regex::new(r"https?://(localhost|127\.0\.0\.1|0\.0\.0\.0|\[::1?\]|[A-Za-z0-9.-]+):(\d{2,5})")
            .expect("server pattern is valid")
    })
}

/// Extract `(port, host)` announcements from dev server output.
pub fn detect_server_ready(chunk: &str) -> Vec<(u16, String)> {
    let plain = ansi_pattern().replace_all(chunk, "");
    server_pattern()
        .captures_iter(&plain)
        .filter_map(|caps| {
            let port = caps.get(2)?.as_str().parse::<u16>().ok()?;
            Some((port, caps.get(1)?.as_str().to_string()))
        })
        .collect()
}

/// Sandbox backed by host processes in a project directory.
pub struct LocalSandbox {
    root: PathBuf,
    _temp: Option<TempDir>,
    options: LocalSandboxOptions,
    booted: AtomicBool,
    next_pid: AtomicU64,
    events: broadcast::Sender<SandboxEvent>,
}

impl LocalSandbox {
    /// Create a sandbox. Uses a temporary directory when no workdir is set.
    pub fn new(options: LocalSandboxOptions) -> RunnerResult<Self> {
        let (root, temp) = match &options.workdir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                (dir.clone(), None)
            }
            None => {
                let temp = tempfile::Builder::new().prefix("webly-").tempdir()?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        info!("Local sandbox rooted at {:?}", root);

        Ok(Self {
            root,
            _temp: temp,
            options,
            booted: AtomicBool::new(false),
            next_pid: AtomicU64::new(1),
            events,
        })
    }

    /// Project directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_booted(&self) -> RunnerResult<()> {
        if self.booted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RunnerError::NotBooted)
        }
    }

    fn command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        cmd.current_dir(&self.root)
            .envs(&self.options.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Spawn a child and wire its output, exit and events.
    fn launch(&self, mut cmd: Command, line: String, interactive: bool) -> RunnerResult<SpawnedProcess> {
        cmd.stdin(if interactive {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn().map_err(|e| RunnerError::SpawnFailed {
            command: line.clone(),
            message: e.to_string(),
        })?;
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        debug!("Spawned [{}] {}", pid, line);

        // Only the shell hosts the dev server.
        let events = interactive.then(|| self.events.clone());
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump_output(stdout, out_tx.clone(), events.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_output(stderr, out_tx.clone(), events));
        }
        drop(out_tx);

        let input = if interactive {
            let (in_tx, mut in_rx) = mpsc::unbounded_channel::<String>();
            let shell_pid = child.id();
            if let Some(mut stdin) = child.stdin.take() {
                tokio::spawn(async move {
                    while let Some(data) = in_rx.recv().await {
                        if data == INTERRUPT {
                            interrupt_children(shell_pid).await;
                            continue;
                        }
                        if stdin.write_all(data.as_bytes()).await.is_err() {
                            break;
                        }
                        let _ = stdin.flush().await;
                    }
                    // session closed: stop whatever the shell is running so it sees EOF
                    interrupt_children(shell_pid).await;
                });
            }
            Some(in_tx)
        } else {
            None
        };

        let (exit_tx, exit_rx) = oneshot::channel();
        let events = self.events.clone();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code().map(i64::from).unwrap_or(-1),
                Err(e) => {
                    error!("Failed to wait for process {}: {}", pid, e);
                    -1
                }
            };
            let _ = events.send(SandboxEvent::ProcessExit { pid, code });
            let _ = exit_tx.send(code);
        });

        Ok(SpawnedProcess {
            pid,
            output: out_rx,
            input,
            exit: exit_rx,
        })
    }
}

/// Send SIGINT to the direct children of the shell.
///
/// A piped shell has no terminal, so Ctrl-C cannot travel through its input.
async fn interrupt_children(shell_pid: Option<u32>) {
    let Some(pid) = shell_pid else {
        return;
    };
    let result = Command::new("pkill")
        .args(["-INT", "-P", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) => debug!("Interrupted children of shell {} ({})", pid, status),
        Err(e) => warn!("Could not interrupt children of shell {}: {}", pid, e),
    }
}

/// Longest partial line kept while waiting for its newline.
const MAX_PENDING_LINE: usize = 4096;

/// Decodes a byte stream as UTF-8 across read boundaries.
///
/// An incomplete multi-byte sequence at the end of a read is held back and
/// completed by the next one.
#[derive(Debug, Default)]
struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let ready = self.pending.len() - incomplete_tail(&self.pending);
        let text = String::from_utf8_lossy(&self.pending[..ready]).into_owned();
        self.pending.drain(..ready);
        text
    }

    /// Whatever is still held back, decoded lossily.
    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Length of a truncated UTF-8 sequence at the end of `bytes`.
fn incomplete_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xF0..=0xF7 => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}

/// Scans output line by line for dev server announcements.
#[derive(Debug, Default)]
struct ServerWatch {
    line: String,
}

impl ServerWatch {
    fn push(&mut self, text: &str) -> Vec<(u16, String)> {
        self.line.push_str(text);
        let mut found = Vec::new();
        if let Some(end) = self.line.rfind('\n') {
            found.extend(detect_server_ready(&self.line[..end]));
            self.line.drain(..=end);
        }
        if self.line.len() > MAX_PENDING_LINE {
            found.extend(self.finish());
        }
        found
    }

    fn finish(&mut self) -> Vec<(u16, String)> {
        let found = detect_server_ready(&self.line);
        self.line.clear();
        found
    }
}

async fn pump_output<R>(
    mut reader: R,
    tx: mpsc::UnboundedSender<String>,
    events: Option<broadcast::Sender<SandboxEvent>>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 4096];
    let mut chunker = Utf8Chunker::default();
    let mut watch = ServerWatch::default();
    let announce = |found: Vec<(u16, String)>| {
        if let Some(events) = &events {
            for (port, host) in found {
                let _ = events.send(SandboxEvent::ServerReady { port, host });
            }
        }
    };

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = chunker.decode(&buf[..n]);
                if chunk.is_empty() {
                    continue;
                }
                if events.is_some() {
                    announce(watch.push(&chunk));
                }
                if tx.send(chunk).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("Output stream error: {}", e);
                break;
            }
        }
    }

    let rest = chunker.finish();
    if events.is_some() {
        let mut found = watch.push(&rest);
        found.extend(watch.finish());
        announce(found);
    }
    if !rest.is_empty() {
        let _ = tx.send(rest);
    }
}

#[async_trait]
impl SandboxRuntime for LocalSandbox {
    fn name(&self) -> &str {
        "local"
    }

    async fn boot(&self) -> RunnerResult<()> {
        if self.booted.load(Ordering::SeqCst) {
            return Ok(());
        }
        let status = Command::new(&self.options.shell)
            .args(["-c", "exit 0"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| RunnerError::BootFailed(format!("{}: {}", self.options.shell, e)))?;
        if !status.success() {
            return Err(RunnerError::BootFailed(format!(
                "{} exited with {}",
                self.options.shell, status
            )));
        }
        self.booted.store(true, Ordering::SeqCst);
        info!("Local sandbox booted with shell {}", self.options.shell);
        Ok(())
    }

    async fn mount(&self, tree: &FileTree) -> RunnerResult<()> {
        self.ensure_booted()?;
        let tree = tree.clone();
        let root = self.root.clone();
        let written = tokio::task::spawn_blocking(move || TreeWriter::write_dir(&tree, &root))
            .await
            .map_err(|e| RunnerError::MountFailed(e.to_string()))??;
        debug!("Mounted {} files into {:?}", written, self.root);
        Ok(())
    }

    async fn spawn(&self, command: &str, args: &[String]) -> RunnerResult<SpawnedProcess> {
        self.ensure_booted()?;
        let mut cmd = self.command(command);
        cmd.args(args);
        self.launch(cmd, command_line(command, args), false)
    }

    async fn spawn_shell(&self, size: TerminalSize) -> RunnerResult<SpawnedProcess> {
        self.ensure_booted()?;
        let mut cmd = self.command(&self.options.shell);
        cmd.env("COLUMNS", size.cols.to_string())
            .env("LINES", size.rows.to_string());
        self.launch(cmd, self.options.shell.clone(), true)
    }

    fn subscribe(&self) -> broadcast::Receiver<SandboxEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_vite_banner() {
        let banner = "  \x1b[32m➜\x1b[39m  \x1b[1mLocal\x1b[22m:   \x1b[36mhttp://localhost:\x1b[1m5173\x1b[22m/\x1b[39m\n";
        assert_eq!(detect_server_ready(banner), vec![(5173, "localhost".to_string())]);
    }

    #[test]
    fn test_detect_ignores_plain_output() {
        assert!(detect_server_ready("added 212 packages in 9s").is_empty());
    }

    #[test]
    fn test_chunker_joins_split_characters() {
        let bytes = "  ➜  Local:".as_bytes();
        // split inside the three-byte arrow
        let (head, tail) = bytes.split_at(3);

        let mut chunker = Utf8Chunker::default();
        let first = chunker.decode(head);
        let second = chunker.decode(tail);

        assert_eq!(first, "  ");
        assert_eq!(format!("{}{}", first, second), "  ➜  Local:");
        assert!(!second.contains('\u{FFFD}'));
        assert!(chunker.finish().is_empty());
    }

    #[test]
    fn test_chunker_flushes_truncated_tail() {
        let mut chunker = Utf8Chunker::default();
        assert_eq!(chunker.decode(&[b'o', b'k', 0xE2, 0x9E]), "ok");
        assert_eq!(chunker.finish(), "\u{FFFD}");
    }

    #[test]
    fn test_incomplete_tail_lengths() {
        assert_eq!(incomplete_tail(b"plain"), 0);
        assert_eq!(incomplete_tail("➜".as_bytes()), 0);
        assert_eq!(incomplete_tail(&[b'a', 0xE2]), 1);
        assert_eq!(incomplete_tail(&[b'a', 0xE2, 0x9E]), 2);
        assert_eq!(incomplete_tail(&[0xF0, 0x9F, 0x98]), 3);
    }

    #[test]
    fn test_watch_detects_url_split_across_reads() {
        let mut watch = ServerWatch::default();
        assert!(watch.push("  ➜  Local:   http://local").is_empty());
        assert!(watch.push("host:51").is_empty());
        assert_eq!(watch.push("73/\n"), vec![(5173, "localhost".to_string())]);
        assert!(watch.push("  ➜  press h + enter to show help\n").is_empty());
    }

    #[test]
    fn test_watch_finish_scans_unterminated_line() {
        let mut watch = ServerWatch::default();
        assert!(watch.push("Local: http://127.0.0.1:4173/").is_empty());
        assert_eq!(watch.finish(), vec![(4173, "127.0.0.1".to_string())]);
    }

    #[tokio::test]
    async fn test_spawn_requires_boot() {
        let sandbox = LocalSandbox::new(LocalSandboxOptions::default()).unwrap();
        assert!(matches!(
            sandbox.spawn("echo", &[]).await,
            Err(RunnerError::NotBooted)
        ));
    }

    #[tokio::test]
    async fn test_boot_fails_for_missing_shell() {
        let options = LocalSandboxOptions::default().shell("definitely-not-a-shell-xyz");
        let sandbox = LocalSandbox::new(options).unwrap();
        assert!(matches!(sandbox.boot().await, Err(RunnerError::BootFailed(_))));
    }
}
