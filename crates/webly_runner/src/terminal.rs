//! Terminal sinks.
//!
//! Process output is forwarded chunk by chunk to a [`TerminalSink`]. Each
//! shell session writes through a [`SessionTerminal`] stamped with the
//! session generation; once a newer session begins, output still arriving
//! from an older one is dropped instead of reaching the live terminal.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

/// Destination for terminal output.
pub trait TerminalSink: Send + Sync {
    /// Write raw data as emitted by a process.
    fn write(&self, data: &str);

    /// Write a line of pipeline narration.
    fn writeln(&self, line: &str) {
        self.write(line);
        self.write("\n");
    }
}

/// In-memory terminal, append only.
#[derive(Default)]
pub struct BufferedTerminal {
    contents: Mutex<String>,
}

impl BufferedTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        self.contents.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents.lock().contains(needle)
    }
}

impl TerminalSink for BufferedTerminal {
    fn write(&self, data: &str) {
        self.contents.lock().push_str(data);
    }
}

/// Terminal backed by the process stdout.
#[derive(Default)]
pub struct StdoutTerminal;

impl TerminalSink for StdoutTerminal {
    fn write(&self, data: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(data.as_bytes());
        let _ = stdout.flush();
    }
}

/// Shared terminal that hands out per-session writers.
#[derive(Clone)]
pub struct Terminal {
    sink: Arc<dyn TerminalSink>,
    live: Arc<AtomicU64>,
}

impl Terminal {
    pub fn new(sink: Arc<dyn TerminalSink>) -> Self {
        Self {
            sink,
            live: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start a new session generation. Writers from older sessions go stale.
    pub fn begin_session(&self) -> SessionTerminal {
        let generation = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        SessionTerminal {
            sink: self.sink.clone(),
            generation,
            live: self.live.clone(),
        }
    }

    /// Generation of the current session.
    pub fn current_generation(&self) -> u64 {
        self.live.load(Ordering::SeqCst)
    }

    pub fn sink(&self) -> Arc<dyn TerminalSink> {
        self.sink.clone()
    }
}

impl TerminalSink for Terminal {
    fn write(&self, data: &str) {
        self.sink.write(data);
    }
}

/// Writer bound to one shell session.
#[derive(Clone)]
pub struct SessionTerminal {
    sink: Arc<dyn TerminalSink>,
    generation: u64,
    live: Arc<AtomicU64>,
}

impl SessionTerminal {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether this session is still the current one.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst) == self.generation
    }
}

impl TerminalSink for SessionTerminal {
    fn write(&self, data: &str) {
        if self.is_live() {
            self.sink.write(data);
        } else {
            trace!(
                "Dropping {} bytes from stale session {}",
                data.len(),
                self.generation
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_session_output_is_dropped() {
        let buffer = Arc::new(BufferedTerminal::new());
        let terminal = Terminal::new(buffer.clone());

        let first = terminal.begin_session();
        first.write("first ");
        let second = terminal.begin_session();
        first.write("late output");
        second.write("second");

        assert!(!first.is_live());
        assert!(second.is_live());
        assert_eq!(buffer.contents(), "first second");
    }

    #[test]
    fn test_writeln_appends_newline() {
        let buffer = BufferedTerminal::new();
        buffer.writeln("Running ESLint...");
        assert_eq!(buffer.contents(), "Running ESLint...\n");
    }
}
