//! Webly CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Check or repair failure
//! - 4: Sandbox boot failure

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};
use webly_core::CoreError;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CHECK_FAILURE: u8 = 3;
    pub const BOOT_FAILURE: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "webly=debug"
    } else if cli.quiet {
        "webly=warn"
    } else {
        "webly=info"
    };
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap())
                .add_directive("warn".parse().unwrap()),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let global = cli.global();
    let result = match cli.command {
        Commands::Generate(args) => commands::generate::execute(&global, args).await,
        Commands::Run(args) => commands::run::execute(&global, args).await,
        Commands::Check(args) => commands::check::execute(&global, args).await,
        Commands::Download(args) => commands::download::execute(&global, args).await,
        Commands::Tree(args) => commands::tree::execute(&global, args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(core) = e.chain().find_map(|cause| cause.downcast_ref::<CoreError>()) {
        match core {
            CoreError::BootFailed(_) => return ExitCodes::BOOT_FAILURE,
            CoreError::NoSession | CoreError::Config(_) => return ExitCodes::INVALID_ARGS,
            _ => {}
        }
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("check failed") || msg.contains("repair") {
        ExitCodes::CHECK_FAILURE
    } else if msg.contains("boot") {
        ExitCodes::BOOT_FAILURE
    } else if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
