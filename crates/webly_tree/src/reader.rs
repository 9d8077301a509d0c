//! Parsing trees out of backend payloads and snapshotting them from disk.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{TreeError, TreeResult};
use crate::models::FileTree;

/// Directories never read back from a materialized project.
pub const SKIP_DIRS: &[&str] = &["node_modules", "dist", ".git", ".cache"];

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?m)^\s*```[a-zA-Z]*\s*$").expect("fence pattern is valid")
    })
}

/// Reader for file trees.
pub struct TreeReader;

impl TreeReader {
    /// Remove the markdown code fences LLM responses wrap JSON in.
    pub fn strip_fences(text: &str) -> String {
        fence_pattern().replace_all(text, "").trim().to_string()
    }

    /// Parse a tree from backend text.
    ///
    /// Accepts a bare JSON object, a fenced JSON object, or a JSON string
    /// whose value is itself a serialized tree.
    pub fn parse(text: &str) -> TreeResult<FileTree> {
        let cleaned = Self::strip_fences(text);
        if cleaned.is_empty() {
            return Err(TreeError::Empty);
        }
        let value: Value = serde_json::from_str(&cleaned)?;
        Self::from_value(value)
    }

    /// Convert an already-decoded JSON value into a tree.
    pub fn from_value(value: Value) -> TreeResult<FileTree> {
        match value {
            Value::Object(_) => Ok(serde_json::from_value(value)?),
            Value::String(inner) => {
                debug!("Tree payload is double-encoded, decoding inner string");
                let cleaned = Self::strip_fences(&inner);
                if cleaned.is_empty() {
                    return Err(TreeError::Empty);
                }
                match serde_json::from_str::<Value>(&cleaned)? {
                    obj @ Value::Object(_) => Ok(serde_json::from_value(obj)?),
                    other => Err(TreeError::InvalidFormat(format!(
                        "root must be a directory object, found {}",
                        kind(&other)
                    ))),
                }
            }
            Value::Null => Err(TreeError::Empty),
            other => Err(TreeError::InvalidFormat(format!(
                "root must be a directory object, found {}",
                kind(&other)
            ))),
        }
    }

    /// Snapshot a project directory into a tree, skipping build artifacts.
    pub fn read_dir(root: impl AsRef<Path>) -> TreeResult<FileTree> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(TreeError::NotFound(root.display().to_string()));
        }

        let mut tree = FileTree::new();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !is_skipped(e));

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match entry.path().strip_prefix(root) {
                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };
            match fs::read_to_string(entry.path()) {
                Ok(contents) => tree.insert_file(&relative, contents)?,
                Err(e) => debug!("Skipping unreadable file {:?}: {}", entry.path(), e),
            }
        }

        Ok(tree)
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| SKIP_DIRS.contains(&name))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_payload() {
        let text = "```json\n{\"src\": {\"directory\": {\"App.jsx\": {\"file\": {\"contents\": \"x\"}}}}}\n```";
        let tree = TreeReader::parse(text).unwrap();
        assert_eq!(tree.file_contents("src/App.jsx"), Some("x"));
    }

    #[test]
    fn test_parse_double_encoded_payload() {
        let inner = r#"{"index.html": {"file": {"contents": "<html/>"}}}"#;
        let outer = serde_json::to_string(inner).unwrap();
        let tree = TreeReader::parse(&outer).unwrap();
        assert_eq!(tree.file_contents("index.html"), Some("<html/>"));
    }

    #[test]
    fn test_parse_rejects_non_object_root() {
        assert!(matches!(
            TreeReader::parse("[1, 2]"),
            Err(TreeError::InvalidFormat(_))
        ));
        assert!(matches!(TreeReader::parse("  "), Err(TreeError::Empty)));
        assert!(matches!(
            TreeReader::parse("{not json"),
            Err(TreeError::Json(_))
        ));
    }
}
