//! Integration tests for the sandbox execution layer.
//!
//! Most tests drive the mock sandbox. The local sandbox tests only need a
//! POSIX shell on the host.

use std::sync::Arc;
use std::time::Duration;

use webly_runner::{
    BufferedTerminal, LocalSandbox, LocalSandboxOptions, MockResponse, MockSandbox, ProcessConfig,
    ProcessRunner, SandboxEvent, SandboxRuntime, ShellSession, Terminal, TerminalSize,
    TerminalSink,
};
use webly_tree::FileTree;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Output reaches the terminal and is returned after the process exits.
#[tokio::test]
async fn test_process_runner_streams_and_collects() {
    let sandbox = Arc::new(MockSandbox::new().respond(
        "npm install",
        MockResponse::chunked(vec!["added 212 packages\n", "found 0 vulnerabilities\n"], 0),
    ));
    let runner = ProcessRunner::new(sandbox.clone(), ProcessConfig::default());
    let terminal = BufferedTerminal::new();

    let output = runner.run("npm", &args(&["install"]), &terminal).await.unwrap();

    assert!(output.success());
    assert_eq!(output.command, "npm install");
    assert!(output.output.contains("found 0 vulnerabilities"));
    assert_eq!(terminal.contents(), output.output);
}

/// A non-zero exit is reported, not raised.
#[tokio::test]
async fn test_process_runner_reports_failure_exit() {
    let sandbox = Arc::new(MockSandbox::new().respond(
        "npx vite build --emptyOutDir",
        MockResponse::failure(1, "error during build:\nCould not resolve ./App\n"),
    ));
    let runner = ProcessRunner::new(sandbox, ProcessConfig::default());

    let output = runner
        .run("npx", &args(&["vite", "build", "--emptyOutDir"]), &BufferedTerminal::new())
        .await
        .unwrap();

    assert!(!output.success());
    assert_eq!(output.exit_code, Some(1));
    assert!(output.contains_any(&["error", "failed"]));
}

/// Shell output from a replaced session never reaches the terminal.
#[tokio::test]
async fn test_replaced_shell_output_is_dropped() {
    let sandbox = MockSandbox::new();
    let buffer = Arc::new(BufferedTerminal::new());
    let terminal = Terminal::new(buffer.clone());

    let first = ShellSession::start(
        sandbox.spawn_shell(TerminalSize::default()).await.unwrap(),
        terminal.begin_session(),
    )
    .unwrap();
    let stale = first.terminal().clone();
    first.close();

    let second = ShellSession::start(
        sandbox.spawn_shell(TerminalSize::default()).await.unwrap(),
        terminal.begin_session(),
    )
    .unwrap();

    stale.write("old server output\n");
    second.run_command("npx vite").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!buffer.contains("old server output"));
    assert!(buffer.contains("npx vite"));
    assert_eq!(sandbox.shell_commands(), vec!["npx vite"]);
}

/// Server-ready events are delivered to every subscriber.
#[tokio::test]
async fn test_server_ready_event_from_shell() {
    let sandbox = MockSandbox::new().ready_on("npx vite", 5173, "localhost");
    let mut events = sandbox.subscribe();
    let terminal = Terminal::new(Arc::new(BufferedTerminal::new()));

    let shell = ShellSession::start(
        sandbox.spawn_shell(TerminalSize::default()).await.unwrap(),
        terminal.begin_session(),
    )
    .unwrap();
    shell.run_command("npx vite").await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, SandboxEvent::ServerReady { port: 5173, .. }));
}

/// The local sandbox writes the mounted tree and runs commands in it.
#[tokio::test]
async fn test_local_sandbox_mount_and_run() {
    let dir = tempfile::tempdir().unwrap();
    let sandbox = Arc::new(
        LocalSandbox::new(LocalSandboxOptions::new().workdir(dir.path())).unwrap(),
    );
    sandbox.boot().await.unwrap();

    let tree = FileTree::new().with_file("src/App.jsx", "export default function App() {}");
    sandbox.mount(&tree).await.unwrap();
    assert!(dir.path().join("src/App.jsx").exists());

    let runner = ProcessRunner::new(sandbox, ProcessConfig::default());
    let output = runner
        .run("sh", &args(&["-c", "ls src"]), &BufferedTerminal::new())
        .await
        .unwrap();

    assert!(output.success());
    assert!(output.output.contains("App.jsx"));
}

/// Runs that outlive the configured timeout return what they printed so far.
#[tokio::test]
async fn test_local_sandbox_timeout() {
    let sandbox = Arc::new(LocalSandbox::new(LocalSandboxOptions::default()).unwrap());
    sandbox.boot().await.unwrap();

    let runner = ProcessRunner::new(sandbox, ProcessConfig::default().timeout(1));
    let output = runner
        .run("sh", &args(&["-c", "echo transforming; sleep 5"]), &BufferedTerminal::new())
        .await
        .unwrap();

    assert!(output.timed_out);
    assert!(!output.success());
    assert!(output.output.contains("transforming"));
}

/// The local shell runs commands written to its input.
#[tokio::test]
async fn test_local_shell_session() {
    let sandbox = LocalSandbox::new(LocalSandboxOptions::default()).unwrap();
    sandbox.boot().await.unwrap();
    let buffer = Arc::new(BufferedTerminal::new());
    let terminal = Terminal::new(buffer.clone());

    let shell = ShellSession::start(
        sandbox.spawn_shell(TerminalSize::default()).await.unwrap(),
        terminal.begin_session(),
    )
    .unwrap();
    shell.run_command("echo webly-shell-ok").await.unwrap();

    for _ in 0..50 {
        if buffer.contains("webly-shell-ok") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(buffer.contains("webly-shell-ok"));
}

/// A server banner printed by the shell becomes a server-ready event.
#[tokio::test]
async fn test_local_shell_announces_server() {
    let sandbox = LocalSandbox::new(LocalSandboxOptions::default()).unwrap();
    sandbox.boot().await.unwrap();
    let mut events = sandbox.subscribe();
    let terminal = Terminal::new(Arc::new(BufferedTerminal::new()));

    let shell = ShellSession::start(
        sandbox.spawn_shell(TerminalSize::default()).await.unwrap(),
        terminal.begin_session(),
    )
    .unwrap();
    shell.run_command("echo '  Local:   http://localhost:4321/'").await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(SandboxEvent::ServerReady { port, host }) = events.recv().await {
                return (port, host);
            }
        }
    })
    .await
    .expect("no server-ready event");
    assert_eq!(event, (4321, "localhost".to_string()));
}
