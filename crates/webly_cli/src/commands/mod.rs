//! CLI command definitions.
//!
//! Each subcommand maps to one stage of the Webly flow: generate code from
//! sketches, run it in a sandbox, check it, and export it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use webly_client::{FileSessionStore, HttpBackend, SessionContext, SessionStore};
use webly_core::{CoreError, PipelineConfig};

pub mod check;
pub mod download;
pub mod generate;
pub mod run;
pub mod tree;

/// Webly - sketch-to-website generator with sandboxed auto-repair
#[derive(Parser)]
#[command(name = "webly")]
#[command(version, about = "Webly - sketch-to-website generator with sandboxed auto-repair")]
#[command(long_about = r#"
Webly turns page sketches into a Vite + React project, runs it in a local
sandbox and keeps it building: lint and build errors are sent back to the
backend for correction until the project is clean.

COMMANDS:
  generate  → Generate a project from sketches and a prompt
  run       → Run the pipeline and keep the dev server up
  check     → Run one pipeline pass and report the result
  download  → Export the project as a zip archive
  tree      → List the files of the generated project

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Check or repair failure
  4 - Sandbox boot failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Workspace holding the session and config (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Backend base URL
    #[arg(long, global = true, env = "WEBLY_BACKEND_URL")]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a project from sketches and a prompt
    Generate(generate::GenerateArgs),

    /// Run the pipeline and forward keystrokes to the shell
    Run(run::RunArgs),

    /// Run one pipeline pass and report the final phase
    Check(check::CheckArgs),

    /// Export the project as a zip archive
    Download(download::DownloadArgs),

    /// List the project's files
    Tree(tree::TreeArgs),
}

impl Cli {
    pub fn global(&self) -> GlobalArgs {
        GlobalArgs {
            workspace: self.workspace.clone(),
            backend_url: self.backend_url.clone(),
            quiet: self.quiet,
        }
    }
}

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub workspace: PathBuf,
    pub backend_url: Option<String>,
    pub quiet: bool,
}

impl GlobalArgs {
    /// Pipeline config from the workspace, with the CLI flag applied last.
    pub fn config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::load(&self.workspace).context("Failed to load pipeline config")?;
        if let Some(url) = &self.backend_url {
            config.backend_url = url.clone();
        }
        Ok(config)
    }

    pub fn store(&self) -> FileSessionStore {
        FileSessionStore::new(&self.workspace)
    }

    pub fn backend(&self, config: &PipelineConfig) -> Arc<HttpBackend> {
        Arc::new(HttpBackend::new(&config.backend_url))
    }

    /// The persisted session, or an error pointing at `webly generate`.
    pub fn session(&self) -> Result<SessionContext> {
        self.store()
            .load()
            .context("Failed to read session")?
            .ok_or(CoreError::NoSession)
            .with_context(|| format!("No session in {}", display(&self.workspace)))
    }
}

pub(crate) fn display(path: &Path) -> String {
    path.display().to_string()
}
