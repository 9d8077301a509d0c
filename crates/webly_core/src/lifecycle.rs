//! Sandbox lifecycle manager.
//!
//! Drives one activation through boot, mount, shell start, setup, checks and
//! repair. The sandbox is booted once per manager; every later activation
//! reuses it. Server-ready events are consumed by a background listener and
//! may move the run to `Ready` at any point after setup begins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use webly_client::{Backend, SessionContext, SessionStore, SetupCommands};
use webly_runner::{
    ProcessRunner, SandboxEvent, SandboxRuntime, ShellSession, Terminal, TerminalSink,
};
use webly_tree::{Baseline, FileTree, TreeWriter};

use crate::checkers::{BuildChecker, CheckOutcome, LintChecker, StaticChecker};
use crate::config::PipelineConfig;
use crate::error::{CoreError, CoreResult};
use crate::phase::Phase;
use crate::repair::AutoRepairClient;
use crate::sequencer::CommandSequencer;
use crate::state::{
    PipelineState, RecordingSink, StateHandle, INIT_FAILED, REBUILD_FAILED, SERVER_BUSY,
    START_FAILED,
};

/// Next step of the drive loop.
enum Step {
    /// Mount a tree and start a shell. `None` parses the session code first.
    Mount(Option<FileTree>),
    Check,
    Repair(String),
}

/// Owns the sandbox, the shell and the run state.
pub struct SandboxLifecycleManager {
    sandbox: Arc<dyn SandboxRuntime>,
    backend: Arc<dyn Backend>,
    store: Arc<dyn SessionStore>,
    config: PipelineConfig,
    baseline: Baseline,
    state: StateHandle,
    terminal: Terminal,
    runner: ProcessRunner,
    sequencer: CommandSequencer,
    repair: AutoRepairClient,
    checkers: Vec<Box<dyn StaticChecker>>,
    booted: AtomicBool,
    boot_lock: AsyncMutex<()>,
    activation: AsyncMutex<()>,
    shell: RwLock<Option<Arc<ShellSession>>>,
    tree: RwLock<Option<FileTree>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SandboxLifecycleManager {
    /// Create a manager. Terminal output goes to `sink` and into the run
    /// state's terminal log.
    pub fn new(
        sandbox: Arc<dyn SandboxRuntime>,
        backend: Arc<dyn Backend>,
        store: Arc<dyn SessionStore>,
        config: PipelineConfig,
        sink: Arc<dyn TerminalSink>,
    ) -> Self {
        let state = StateHandle::new();
        let terminal = Terminal::new(Arc::new(RecordingSink::new(state.clone(), sink)));
        let baseline = Baseline::vite_react();
        let runner = ProcessRunner::new(sandbox.clone(), config.process_config());
        let sequencer = CommandSequencer::new(config.setup_delays.clone());
        let repair = AutoRepairClient::new(
            backend.clone(),
            store.clone(),
            baseline.clone(),
            config.retry.clone(),
        );
        let checkers: Vec<Box<dyn StaticChecker>> = vec![
            Box::new(LintChecker::new()),
            Box::new(BuildChecker::new(config.trust_exit_codes)),
        ];

        Self {
            sandbox,
            backend,
            store,
            config,
            baseline,
            state,
            terminal,
            runner,
            sequencer,
            repair,
            checkers,
            booted: AtomicBool::new(false),
            boot_lock: AsyncMutex::new(()),
            activation: AsyncMutex::new(()),
            shell: RwLock::new(None),
            tree: RwLock::new(None),
            listener: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Snapshot of the current run.
    pub fn state(&self) -> PipelineState {
        self.state.snapshot()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Watch the run state.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn preview_url(&self) -> Option<String> {
        self.state.preview_url()
    }

    /// Tree most recently mounted.
    pub fn current_tree(&self) -> Option<FileTree> {
        self.tree.read().clone()
    }

    pub fn is_booted(&self) -> bool {
        self.booted.load(Ordering::SeqCst)
    }

    /// Boot the sandbox once.
    ///
    /// Later calls return immediately. A failed boot leaves the manager
    /// unbooted so the next call tries again.
    pub async fn boot(&self) -> CoreResult<()> {
        let _guard = self.boot_lock.lock().await;
        if self.is_booted() {
            return Ok(());
        }

        let events = self.sandbox.subscribe();
        info!("Booting {} sandbox", self.sandbox.name());
        match self.sandbox.boot().await {
            Ok(()) => {
                self.booted.store(true, Ordering::SeqCst);
                self.spawn_listener(events);
                Ok(())
            }
            Err(e) => {
                error!("Sandbox boot failed: {}", e);
                self.state.fail(INIT_FAILED);
                Err(CoreError::BootFailed(e.to_string()))
            }
        }
    }

    /// Run the pipeline from the persisted session.
    ///
    /// Returns the phase the run settled in: `Ready`, `Checking` when checks
    /// passed but the dev server has not announced itself yet, or `Failed`.
    pub async fn activate(&self) -> CoreResult<Phase> {
        let _run = self.activation.lock().await;
        let run_id = self.state.begin_run();
        info!("Activating pipeline run {}", run_id);

        self.state.transition(Phase::Booting)?;
        self.boot().await?;

        let context = match self.store.load()? {
            Some(context) => context,
            None => {
                warn!("No persisted session to activate");
                self.state.fail(START_FAILED);
                return Err(CoreError::NoSession);
            }
        };

        self.drive(context, Step::Mount(None), false)
            .await
            .map_err(|e| self.abort(e, START_FAILED))
    }

    /// Rebuild a ready project without remounting.
    ///
    /// Restarts the dev server on the current shell and re-runs both
    /// checkers. The repair budget starts over.
    pub async fn rebuild(&self) -> CoreResult<Phase> {
        let _run = self.activation.lock().await;
        let phase = self.state.phase();
        if phase != Phase::Ready {
            return Err(CoreError::InvalidState(format!(
                "rebuild needs a ready project, current phase is {}",
                phase
            )));
        }
        let shell = self.current_shell().ok_or(CoreError::NoShell)?;
        let context = self.store.load()?.ok_or(CoreError::NoSession)?;

        info!("Rebuilding project");
        self.state.clear_banner();
        self.state.reset_repairs();
        self.terminal.writeln("Rebuilding project...");
        self.state.transition(Phase::Checking)?;
        self.state.reset_server_ready();
        self.sequencer.restart_dev_server(&shell).await?;

        self.drive(context, Step::Check, true)
            .await
            .map_err(|e| self.abort(e, REBUILD_FAILED))
    }

    /// Forward user keystrokes to the shell.
    ///
    /// Waits while an automation sequence holds the shell input.
    pub async fn forward_input(&self, data: &str) -> CoreResult<()> {
        let shell = self.current_shell().ok_or(CoreError::NoShell)?;
        shell.forward_input(data).await?;
        Ok(())
    }

    /// Zip archive of the project: the mounted tree, or the persisted one
    /// merged with the baseline when nothing is mounted yet.
    pub fn download_archive(&self) -> CoreResult<Vec<u8>> {
        let tree = match self.current_tree() {
            Some(tree) => tree,
            None => {
                let context = self.store.load()?.ok_or(CoreError::NoSession)?;
                self.baseline.merge(&context.tree()?)
            }
        };
        Ok(TreeWriter::to_zip(&tree)?)
    }

    /// Close the shell and stop listening for sandbox events.
    pub fn shutdown(&self) {
        if let Some(shell) = self.shell.write().take() {
            shell.close();
        }
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
    }

    async fn drive(&self, mut context: SessionContext, mut step: Step, mut setup_done: bool) -> CoreResult<Phase> {
        loop {
            step = match step {
                Step::Mount(None) => match context.tree() {
                    Ok(tree) => Step::Mount(Some(self.baseline.merge(&tree))),
                    Err(e) => {
                        warn!("Persisted code does not parse: {}", e);
                        self.terminal.writeln("Error detected on parsed data, retrying...");
                        Step::Repair(e.to_string())
                    }
                },
                Step::Mount(Some(tree)) => {
                    self.start(&context, tree, !setup_done).await?;
                    setup_done = true;
                    Step::Check
                }
                Step::Check => {
                    self.state.transition(Phase::Checking)?;
                    match self.run_checks().await? {
                        Some(error_log) => Step::Repair(error_log),
                        None => return self.finish_clean(),
                    }
                }
                Step::Repair(error_log) => {
                    self.state.transition(Phase::Repairing)?;
                    self.state.record_failure(&error_log);

                    let max = self.config.max_repair_cycles;
                    if self.state.repair_attempts() >= max {
                        error!("Giving up after {} repair attempt(s)", max);
                        self.terminal.writeln("Auto-repair gave up. See the errors above.");
                        self.state.fail(REBUILD_FAILED);
                        return Ok(Phase::Failed);
                    }

                    let attempt = self.state.begin_repair();
                    self.terminal
                        .writeln(&format!("Auto-repair in progress (attempt {}/{})...", attempt, max));
                    match self.repair.repair(&context, &error_log).await {
                        Ok(outcome) => {
                            context = outcome.context;
                            Step::Mount(Some(outcome.tree))
                        }
                        Err(e) => {
                            error!("Repair request failed: {}", e);
                            self.state.fail(SERVER_BUSY);
                            return Ok(Phase::Failed);
                        }
                    }
                }
            };
        }
    }

    /// Mount `tree`, start a fresh shell and bring up the dev server.
    async fn start(&self, context: &SessionContext, tree: FileTree, full_setup: bool) -> CoreResult<()> {
        debug!("Mounting {} file(s)", tree.file_count());
        self.sandbox.mount(&tree).await?;
        *self.tree.write() = Some(tree);
        self.state.transition(Phase::Mounted)?;

        self.state.transition(Phase::ShellStarting)?;
        let shell = self.start_shell().await?;
        self.state.transition(Phase::RunningSetup)?;

        if full_setup {
            let commands = self.fetch_setup_commands(context).await;
            self.sequencer.run(&shell, &commands, context).await?;
            self.install().await?;
        }

        self.terminal.writeln("Starting development server...");
        self.sequencer.start_dev_server(&shell).await
    }

    async fn start_shell(&self) -> CoreResult<Arc<ShellSession>> {
        if let Some(old) = self.shell.write().take() {
            old.close();
        }
        self.state.reset_server_ready();

        let process = self.sandbox.spawn_shell(self.config.terminal).await?;
        let session = Arc::new(ShellSession::start(process, self.terminal.begin_session())?);
        info!("Shell {} started", session.pid());
        *self.shell.write() = Some(session.clone());
        Ok(session)
    }

    async fn fetch_setup_commands(&self, context: &SessionContext) -> SetupCommands {
        let backend = self.backend.as_ref();
        let result = self
            .config
            .retry
            .retry("setup commands", || async move { backend.setup_commands(context).await })
            .await;
        match result {
            Ok(commands) => commands,
            Err(e) => {
                warn!("Could not fetch setup commands: {}", e);
                self.terminal.writeln(&format!("Error fetching command: {}", e));
                SetupCommands::default()
            }
        }
    }

    async fn install(&self) -> CoreResult<()> {
        self.terminal.writeln("Checking for dependency installation...");
        let output = self
            .runner
            .run("npm", &["install".to_string()], &self.terminal)
            .await?;
        if output.timed_out {
            warn!("npm install did not finish within {}s", self.runner.config().timeout_seconds);
            self.terminal.writeln("Dependency installation timed out, continuing.");
        } else if output.success() {
            self.terminal.writeln("Dependencies installed.");
        } else {
            warn!("npm install exited with {:?}", output.exit_code);
            self.terminal.writeln("Dependency installation reported problems, continuing.");
        }
        Ok(())
    }

    /// Run checkers in order. Returns the error log of the first failure.
    async fn run_checks(&self) -> CoreResult<Option<String>> {
        for checker in &self.checkers {
            self.terminal.writeln(checker.banner());
            if let CheckOutcome::Failed { error_log } = checker.check(&self.runner, &self.terminal).await? {
                info!("{} check failed", checker.name());
                self.terminal.writeln("Build failed, starting auto-repair...");
                return Ok(Some(error_log));
            }
            debug!("{} check passed", checker.name());
        }
        Ok(None)
    }

    fn finish_clean(&self) -> CoreResult<Phase> {
        self.state.set_checks_passed();
        if self.state.server_ready() {
            self.state.transition(Phase::Ready)?;
        } else {
            debug!("Checks passed, waiting for the dev server");
        }
        Ok(self.state.phase())
    }

    fn abort(&self, err: CoreError, banner: &str) -> CoreError {
        error!("Pipeline run failed: {}", err);
        if self.state.phase() != Phase::Failed {
            self.state.fail(banner);
        }
        err
    }

    fn current_shell(&self) -> Option<Arc<ShellSession>> {
        self.shell.read().clone()
    }

    fn spawn_listener(&self, mut events: broadcast::Receiver<SandboxEvent>) {
        let state = self.state.clone();
        let terminal = self.terminal.clone();
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SandboxEvent::ServerReady { port, host }) => {
                        let url = state.record_server_ready(port, &host);
                        info!("Dev server ready at {}", url);
                        terminal.writeln(&format!("Server running at {}", url));
                    }
                    Ok(SandboxEvent::ProcessExit { pid, code }) => {
                        debug!("Process {} exited with {}", pid, code);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} sandbox event(s)", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        *self.listener.lock() = Some(handle);
    }
}

impl Drop for SandboxLifecycleManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
