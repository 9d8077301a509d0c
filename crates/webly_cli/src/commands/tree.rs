//! Tree command - List the files of the generated project.

use anyhow::{Context, Result};
use clap::Args;

use webly_tree::{Baseline, FileTree};

use super::GlobalArgs;

#[derive(Args)]
pub struct TreeArgs {
    /// Include the injected Vite/Tailwind/ESLint configuration
    #[arg(long)]
    merged: bool,

    /// Print the tree in mount format instead of a path list
    #[arg(long)]
    json: bool,
}

pub async fn execute(global: &GlobalArgs, args: TreeArgs) -> Result<()> {
    let context = global.session()?;
    let generated = context.tree().context("Persisted code is not a valid file tree")?;
    let tree = if args.merged {
        Baseline::vite_react().merge(&generated)
    } else {
        generated
    };

    if args.json {
        println!("{}", tree.to_json_pretty()?);
    } else {
        for line in listing(&tree) {
            println!("{}", line);
        }
    }
    Ok(())
}

/// One line per file: byte size and path.
fn listing(tree: &FileTree) -> Vec<String> {
    tree.flatten()
        .into_iter()
        .map(|(path, contents)| format!("{:>8}  {}", contents.len(), path))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_is_sorted_by_path() {
        let tree = FileTree::new()
            .with_file("src/main.jsx", "import App from './App'")
            .with_file("index.html", "<div id=\"root\"></div>");

        let lines = listing(&tree);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("  index.html"));
        assert!(lines[1].ends_with("  src/main.jsx"));
        assert!(lines[1].trim_start().starts_with("23"));
    }
}
