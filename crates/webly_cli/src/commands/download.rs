//! Download command - Export the project as a zip archive.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use webly_tree::{Baseline, TreeWriter, ARCHIVE_NAME};

use super::{display, GlobalArgs};

#[derive(Args)]
pub struct DownloadArgs {
    /// Archive path
    #[arg(short, long, default_value = ARCHIVE_NAME)]
    output: PathBuf,
}

pub async fn execute(global: &GlobalArgs, args: DownloadArgs) -> Result<()> {
    let context = global.session()?;
    let generated = context.tree().context("Persisted code is not a valid file tree")?;
    let tree = Baseline::vite_react().merge(&generated);

    info!("Writing {} file(s) to {:?}", tree.file_count(), args.output);
    TreeWriter::write_zip(&tree, &args.output)
        .with_context(|| format!("Failed to write {}", display(&args.output)))?;

    println!("✅ Wrote {} ({} files)", display(&args.output), tree.file_count());
    Ok(())
}
