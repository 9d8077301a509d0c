//! Interactive shell session.
//!
//! A session owns the single input writer of the sandbox shell. Two kinds of
//! writers exist: the automation channel (sequenced setup commands, dev server
//! restarts) and the interactive channel (keystrokes forwarded from the
//! terminal). Both go through one lock, so while an automation sequence holds
//! the channel, keystrokes wait for it to finish instead of interleaving.

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{RunnerError, RunnerResult};
use crate::runner::{ProcessId, SpawnedProcess};
use crate::terminal::{SessionTerminal, TerminalSink};

/// Control sequence sent to interrupt the foreground process.
pub const INTERRUPT: &str = "\u{3}";

type InputWriter = tokio::sync::mpsc::UnboundedSender<String>;

/// A running interactive shell.
pub struct ShellSession {
    pid: ProcessId,
    terminal: SessionTerminal,
    input: Mutex<Option<InputWriter>>,
    writer: AsyncMutex<()>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ShellSession {
    /// Wrap a spawned shell and start pumping its output to `terminal`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(process: SpawnedProcess, terminal: SessionTerminal) -> RunnerResult<Self> {
        let SpawnedProcess {
            pid,
            mut output,
            input,
            exit,
        } = process;
        let input = input.ok_or(RunnerError::ShellClosed)?;

        let pump_terminal = terminal.clone();
        let pump = tokio::spawn(async move {
            while let Some(chunk) = output.recv().await {
                pump_terminal.write(&chunk);
            }
            if let Ok(code) = exit.await {
                debug!("Shell {} exited with {}", pid, code);
            }
        });

        debug!("Shell session {} started (generation {})", pid, terminal.generation());
        Ok(Self {
            pid,
            terminal,
            input: Mutex::new(Some(input)),
            writer: AsyncMutex::new(()),
            pump: Mutex::new(Some(pump)),
        })
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn terminal(&self) -> &SessionTerminal {
        &self.terminal
    }

    pub fn is_closed(&self) -> bool {
        self.input.lock().is_none()
    }

    /// Take exclusive ownership of the input for a sequence of commands.
    pub async fn automation(&self) -> AutomationChannel<'_> {
        let guard = self.writer.lock().await;
        AutomationChannel {
            session: self,
            _guard: guard,
        }
    }

    /// Forward terminal keystrokes verbatim.
    ///
    /// Waits while an automation sequence owns the input.
    pub async fn forward_input(&self, data: &str) -> RunnerResult<()> {
        let _guard = self.writer.lock().await;
        self.write_raw(data)
    }

    /// Issue a single command line through the automation channel.
    pub async fn run_command(&self, command: &str) -> RunnerResult<()> {
        self.automation().await.send_line(command)
    }

    /// Interrupt the foreground process.
    pub async fn interrupt(&self) -> RunnerResult<()> {
        self.automation().await.interrupt()
    }

    /// Tear the session down. Pending output from it is discarded.
    pub fn close(&self) {
        if self.input.lock().take().is_some() {
            debug!("Closing shell session {}", self.pid);
        }
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }

    fn write_raw(&self, data: &str) -> RunnerResult<()> {
        let input = self.input.lock();
        match input.as_ref() {
            Some(writer) => writer.send(data.to_string()).map_err(|_| {
                warn!("Shell {} input closed", self.pid);
                RunnerError::ShellClosed
            }),
            None => Err(RunnerError::ShellClosed),
        }
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Exclusive writer for sequenced commands.
pub struct AutomationChannel<'a> {
    session: &'a ShellSession,
    _guard: MutexGuard<'a, ()>,
}

impl AutomationChannel<'_> {
    /// Write `command` followed by a newline.
    pub fn send_line(&self, command: &str) -> RunnerResult<()> {
        debug!("Shell {} <- {}", self.session.pid, command);
        self.session.write_raw(&format!("{}\n", command))
    }

    /// Send Ctrl-C to the foreground process.
    pub fn interrupt(&self) -> RunnerResult<()> {
        self.session.write_raw(INTERRUPT)
    }

    pub fn terminal(&self) -> &SessionTerminal {
        &self.session.terminal
    }
}
