//! Run command - Run the pipeline and stay attached to the shell.
//!
//! Stdin lines are forwarded to the sandbox shell. `:rebuild` triggers a
//! rebuild, Ctrl-C exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use webly_core::{Phase, PipelineConfig, SandboxLifecycleManager};
use webly_runner::{LocalSandbox, LocalSandboxOptions, StdoutTerminal};

use super::GlobalArgs;

/// Input line that triggers a rebuild instead of being sent to the shell.
const REBUILD_COMMAND: &str = ":rebuild";

#[derive(Args)]
pub struct RunArgs {
    /// Project directory inside the sandbox (defaults to <workspace>/.webly/sandbox)
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Shell used for the interactive session
    #[arg(long, default_value = "sh")]
    shell: String,
}

pub async fn execute(global: &GlobalArgs, args: RunArgs) -> Result<()> {
    let config = global.config()?;
    let workdir = args
        .workdir
        .clone()
        .unwrap_or_else(|| sandbox_dir(&global.workspace));

    let manager = Arc::new(local_manager(global, config, workdir, &args.shell)?);
    let phase = manager.activate().await.context("Failed to activate pipeline")?;
    report_phase(&manager, phase);

    let watcher = spawn_url_watcher(manager.clone());
    let result = attach(&manager).await;
    watcher.abort();
    manager.shutdown();
    result
}

/// Sandbox directory used when none is given.
pub(crate) fn sandbox_dir(workspace: &std::path::Path) -> PathBuf {
    workspace.join(".webly").join("sandbox")
}

/// Manager over a local sandbox rooted at `workdir`.
pub(crate) fn local_manager(
    global: &GlobalArgs,
    config: PipelineConfig,
    workdir: PathBuf,
    shell: &str,
) -> Result<SandboxLifecycleManager> {
    let sandbox = LocalSandbox::new(LocalSandboxOptions::new().workdir(workdir).shell(shell))
        .context("Failed to create sandbox")?;
    let backend = global.backend(&config);
    Ok(SandboxLifecycleManager::new(
        Arc::new(sandbox),
        backend,
        Arc::new(global.store()),
        config,
        Arc::new(StdoutTerminal),
    ))
}

fn report_phase(manager: &SandboxLifecycleManager, phase: Phase) {
    match phase {
        Phase::Ready => {
            if let Some(url) = manager.preview_url() {
                println!("✅ Preview ready at {}", url);
            }
        }
        Phase::Failed => {
            let state = manager.state();
            println!("❌ {}", state.errors.unwrap_or_else(|| "Pipeline failed".to_string()));
        }
        other => println!("⏳ Checks finished ({}), waiting for the dev server...", other),
    }
}

/// Print the preview URL whenever it changes.
fn spawn_url_watcher(manager: Arc<SandboxLifecycleManager>) -> tokio::task::JoinHandle<()> {
    let mut rx = manager.subscribe();
    let mut last = manager.preview_url();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let url = rx.borrow_and_update().preview_url.clone();
            if url.is_some() && url != last {
                if let Some(url) = &url {
                    println!("🌐 Preview: {}", url);
                }
                last = url;
            }
        }
    })
}

async fn attach(manager: &SandboxLifecycleManager) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                return Ok(());
            }
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) if line.trim() == REBUILD_COMMAND => {
                        match manager.rebuild().await {
                            Ok(phase) => report_phase(manager, phase),
                            Err(e) => warn!("Rebuild not possible: {}", e),
                        }
                    }
                    Some(line) => {
                        manager
                            .forward_input(&format!("{}\n", line))
                            .await
                            .context("Failed to write to shell")?;
                    }
                    None => {
                        info!("Stdin closed, waiting for Ctrl-C");
                        tokio::signal::ctrl_c().await?;
                        return Ok(());
                    }
                }
            }
        }
    }
}
