//! Check command - Run one pipeline pass and report the result.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::info;

use webly_core::{Phase, PipelineState};

use super::run::{local_manager, sandbox_dir};
use super::GlobalArgs;

#[derive(Args)]
pub struct CheckArgs {
    /// Project directory inside the sandbox (defaults to <workspace>/.webly/sandbox)
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Seconds to wait for the dev server after checks pass (0 = don't wait)
    #[arg(long, default_value = "0")]
    ready_timeout: u64,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: String,
}

/// Summary printed for `--format json`.
#[derive(Serialize)]
struct CheckReport<'a> {
    run_id: &'a str,
    phase: Phase,
    checks_passed: bool,
    repair_attempts: u32,
    preview_url: Option<&'a str>,
    errors: Option<&'a str>,
    last_error: Option<&'a str>,
}

impl<'a> From<&'a PipelineState> for CheckReport<'a> {
    fn from(state: &'a PipelineState) -> Self {
        Self {
            run_id: &state.run_id,
            phase: state.phase,
            checks_passed: state.checks_passed,
            repair_attempts: state.repair_attempts,
            preview_url: state.preview_url.as_deref(),
            errors: state.errors.as_deref(),
            last_error: state.last_error.as_deref(),
        }
    }
}

pub async fn execute(global: &GlobalArgs, args: CheckArgs) -> Result<()> {
    let config = global.config()?;
    let max_repairs = config.max_repair_cycles;
    let workdir = args
        .workdir
        .clone()
        .unwrap_or_else(|| sandbox_dir(&global.workspace));

    let manager = local_manager(global, config, workdir, "sh")?;
    let phase = manager.activate().await.context("Failed to activate pipeline")?;
    info!("Pipeline pass finished in phase {}", phase);

    if phase == Phase::Checking && args.ready_timeout > 0 {
        let mut rx = manager.subscribe();
        let wait = rx.wait_for(|state| state.phase != Phase::Checking);
        if tokio::time::timeout(Duration::from_secs(args.ready_timeout), wait).await.is_err() {
            info!("Dev server did not announce itself within {}s", args.ready_timeout);
        }
    }

    let state = manager.state();
    manager.shutdown();

    if args.format == "json" {
        let json = serde_json::to_string_pretty(&CheckReport::from(&state))
            .context("Failed to serialize result")?;
        println!("{}", json);
    } else {
        println!("Phase:           {}", state.phase);
        println!("Repair attempts: {}", state.repair_attempts);
        if let Some(url) = &state.preview_url {
            println!("Preview:         {}", url);
        }
    }

    if state.checks_passed {
        if !global.quiet {
            println!();
            println!("✅ Checks PASSED");
        }
        Ok(())
    } else {
        if let Some(last_error) = &state.last_error {
            eprintln!("{}", last_error);
        }
        anyhow::bail!(
            "Check failed: {} (auto-repair stopped after {} of {} attempt(s))",
            state.errors.as_deref().unwrap_or("project did not build"),
            state.repair_attempts,
            max_repairs
        )
    }
}
