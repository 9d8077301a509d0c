//! Generate command - Turn sketches and a prompt into a persisted project.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use webly_client::{Backend, GenerationRequest, PageImage, SessionStore};

use super::{display, GlobalArgs};

#[derive(Args)]
pub struct GenerateArgs {
    /// Page sketch (PNG). Repeat for multi-page sites; order is page order.
    #[arg(short, long = "image", required = true, num_args = 1..)]
    images: Vec<PathBuf>,

    /// What the website should be about
    #[arg(short, long)]
    prompt: String,

    /// Extra npm packages to install alongside the generated ones
    #[arg(long)]
    deps: Option<String>,

    /// User identifier sent with the request
    #[arg(long, default_value = "webly-cli")]
    user_id: String,
}

pub async fn execute(global: &GlobalArgs, args: GenerateArgs) -> Result<()> {
    let config = global.config()?;
    let request = build_request(&args)?;
    info!(
        "Generating project from {} sketch(es): {}",
        request.pages.len(),
        request.page_names()
    );

    let backend = global.backend(&config);
    let response = backend
        .generate(&request)
        .await
        .context("Failed to generate project")?;

    let mut context = response.into_session();
    if let Some(extra) = &args.deps {
        context.dependencies = merge_dependencies(&context.dependencies, extra);
    }
    let tree = context.tree().context("Generated code is not a valid file tree")?;

    let store = global.store();
    store.save(&context).context("Failed to persist session")?;

    println!("✅ Generated {} file(s)", tree.file_count());
    if context.has_dependencies() {
        println!("   Dependencies: {}", context.dependency_list().join(" "));
    }
    println!("   Session saved to {}", display(&store.session_dir()));
    println!();
    println!("Next steps:");
    println!("  webly run");

    Ok(())
}

fn build_request(args: &GenerateArgs) -> Result<GenerationRequest> {
    let mut request = GenerationRequest::new(&args.prompt, &args.user_id);
    for (index, path) in args.images.iter().enumerate() {
        let bytes = std::fs::read(path).with_context(|| format!("Sketch not found: {}", display(path)))?;
        request = request.page(PageImage::new(page_name(path), index as u32 + 1, bytes));
    }
    request.validate().context("Invalid argument")?;
    Ok(request)
}

/// Page name from a sketch file name: `about.png` -> `about`.
fn page_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "page".to_string())
}

/// Space-separated union, generated packages first.
fn merge_dependencies(generated: &str, extra: &str) -> String {
    let mut merged: Vec<&str> = generated.split_whitespace().collect();
    for dep in extra.split(|c: char| c == ',' || c.is_whitespace()).filter(|d| !d.is_empty()) {
        if !merged.contains(&dep) {
            merged.push(dep);
        }
    }
    merged.join(" ")
}
