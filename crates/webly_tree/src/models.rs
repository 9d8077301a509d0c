//! Virtual file tree data model.
//!
//! The serialized form matches the mount format of the sandbox runtime:
//!
//! ```json
//! {
//!   "index.html": { "file": { "contents": "<!DOCTYPE html>..." } },
//!   "src": { "directory": { "main.jsx": { "file": { "contents": "..." } } } }
//! }
//! ```
//!
//! Every entry is externally tagged, so an entry carrying both `file` and
//! `directory` (or neither) fails to deserialize.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};

/// Contents of a single file entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileNode {
    pub contents: String,
}

/// A named entry inside a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeNode {
    File(FileNode),
    Directory(FileTree),
}

impl TreeNode {
    pub fn file(contents: impl Into<String>) -> Self {
        Self::File(FileNode {
            contents: contents.into(),
        })
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    pub fn as_directory(&self) -> Option<&FileTree> {
        match self {
            Self::Directory(tree) => Some(tree),
            Self::File(_) => None,
        }
    }

    pub fn contents(&self) -> Option<&str> {
        match self {
            Self::File(file) => Some(&file.contents),
            Self::Directory(_) => None,
        }
    }
}

/// A directory of named entries. The root of a project is always a `FileTree`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTree {
    entries: BTreeMap<String, TreeNode>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style file insertion, panics on conflicting paths.
    ///
    /// Intended for literals and tests; use [`FileTree::insert_file`] for
    /// untrusted paths.
    pub fn with_file(mut self, path: &str, contents: impl Into<String>) -> Self {
        if let Err(e) = self.insert_file(path, contents) {
            panic!("invalid file path {:?}: {}", path, e);
        }
        self
    }

    /// Number of direct entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Direct entries, ordered by name.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &TreeNode)> {
        self.entries.iter()
    }

    /// Look up a direct entry.
    pub fn entry(&self, name: &str) -> Option<&TreeNode> {
        self.entries.get(name)
    }

    /// Insert or replace a direct entry.
    pub fn set_entry(&mut self, name: impl Into<String>, node: TreeNode) -> Option<TreeNode> {
        self.entries.insert(name.into(), node)
    }

    /// Insert a file at a `/`-separated path, creating parent directories.
    pub fn insert_file(&mut self, path: &str, contents: impl Into<String>) -> TreeResult<()> {
        let segments = split_path(path)?;
        let (file_name, parents) = match segments.split_last() {
            Some(split) => split,
            None => return Err(TreeError::InvalidPath(path.to_string())),
        };

        let mut current = self;
        for (depth, segment) in parents.iter().enumerate() {
            let node = current
                .entries
                .entry((*segment).to_string())
                .or_insert_with(|| TreeNode::Directory(FileTree::new()));
            current = match node {
                TreeNode::Directory(dir) => dir,
                TreeNode::File(_) => {
                    return Err(TreeError::PathConflict {
                        path: parents[..=depth].join("/"),
                        message: "a file exists where a directory is required".to_string(),
                    })
                }
            };
        }

        if let Some(TreeNode::Directory(_)) = current.entries.get(*file_name) {
            return Err(TreeError::PathConflict {
                path: path.to_string(),
                message: "a directory exists where a file is required".to_string(),
            });
        }
        current
            .entries
            .insert((*file_name).to_string(), TreeNode::file(contents));
        Ok(())
    }

    /// Look up any entry by path.
    pub fn get(&self, path: &str) -> Option<&TreeNode> {
        let segments = split_path(path).ok()?;
        let (last, parents) = segments.split_last()?;
        let mut current = self;
        for segment in parents {
            current = current.entries.get(*segment)?.as_directory()?;
        }
        current.entries.get(*last)
    }

    /// Contents of the file at `path`, if it exists and is a file.
    pub fn file_contents(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(TreeNode::contents)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Remove the entry at `path` and return it.
    pub fn remove(&mut self, path: &str) -> TreeResult<TreeNode> {
        let segments = split_path(path)?;
        let (last, parents) = match segments.split_last() {
            Some(split) => split,
            None => return Err(TreeError::InvalidPath(path.to_string())),
        };
        let mut current = self;
        for segment in parents {
            current = match current.entries.get_mut(*segment) {
                Some(TreeNode::Directory(dir)) => dir,
                _ => return Err(TreeError::NotFound(path.to_string())),
            };
        }
        current
            .entries
            .remove(*last)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))
    }

    /// Total number of files at any depth.
    pub fn file_count(&self) -> usize {
        self.entries
            .values()
            .map(|node| match node {
                TreeNode::File(_) => 1,
                TreeNode::Directory(dir) => dir.file_count(),
            })
            .sum()
    }

    /// Flatten into `path -> contents`, e.g. `src/App.jsx`.
    pub fn flatten(&self) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        self.collect_files("", &mut files);
        files
    }

    fn collect_files(&self, prefix: &str, files: &mut BTreeMap<String, String>) {
        for (name, node) in &self.entries {
            let path = format!("{}{}", prefix, name);
            match node {
                TreeNode::File(file) => {
                    files.insert(path, file.contents.clone());
                }
                TreeNode::Directory(dir) => dir.collect_files(&format!("{}/", path), files),
            }
        }
    }

    /// Rebuild a tree from flattened `path -> contents` pairs.
    pub fn from_flat<I, P, C>(files: I) -> TreeResult<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let mut tree = Self::new();
        for (path, contents) in files {
            tree.insert_file(path.as_ref(), contents)?;
        }
        Ok(tree)
    }

    /// Serialize to the mount format.
    pub fn to_json(&self) -> TreeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to the mount format, pretty-printed.
    pub fn to_json_pretty(&self) -> TreeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn split_path(path: &str) -> TreeResult<Vec<&str>> {
    let segments: Vec<&str> = path
        .trim_start_matches("./")
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() || segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(TreeError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup_nested_file() {
        let mut tree = FileTree::new();
        tree.insert_file("src/components/Button.jsx", "export default 1;")
            .unwrap();

        assert!(tree.get("src").unwrap().is_directory());
        assert_eq!(
            tree.file_contents("src/components/Button.jsx"),
            Some("export default 1;")
        );
        assert_eq!(tree.file_count(), 1);
    }

    #[test]
    fn test_insert_conflicts_with_existing_file() {
        let mut tree = FileTree::new().with_file("src", "not a dir");
        let err = tree.insert_file("src/main.jsx", "x").unwrap_err();
        assert!(matches!(err, TreeError::PathConflict { .. }));
    }

    #[test]
    fn test_rejects_parent_segments() {
        let mut tree = FileTree::new();
        assert!(tree.insert_file("../escape.js", "x").is_err());
        assert!(tree.insert_file("", "x").is_err());
    }

    #[test]
    fn test_serde_mount_format() {
        let tree = FileTree::new()
            .with_file("index.html", "<html></html>")
            .with_file("src/main.jsx", "render()");

        let value: serde_json::Value = serde_json::from_str(&tree.to_json().unwrap()).unwrap();
        assert_eq!(value["index.html"]["file"]["contents"], "<html></html>");
        assert_eq!(
            value["src"]["directory"]["main.jsx"]["file"]["contents"],
            "render()"
        );
    }

    #[test]
    fn test_entry_with_both_kinds_is_rejected() {
        let json = r#"{"a": {"file": {"contents": "x"}, "directory": {}}}"#;
        assert!(serde_json::from_str::<FileTree>(json).is_err());

        let json = r#"{"a": {}}"#;
        assert!(serde_json::from_str::<FileTree>(json).is_err());
    }

    #[test]
    fn test_flatten_and_rebuild() {
        let tree = FileTree::new()
            .with_file("package.json", "{}")
            .with_file("src/App.jsx", "app")
            .with_file("src/pages/Home.jsx", "home");

        let flat = tree.flatten();
        assert_eq!(
            flat.keys().cloned().collect::<Vec<_>>(),
            vec!["package.json", "src/App.jsx", "src/pages/Home.jsx"]
        );
        assert_eq!(FileTree::from_flat(flat).unwrap(), tree);
    }

    #[test]
    fn test_remove() {
        let mut tree = FileTree::new().with_file("src/App.jsx", "app");
        let removed = tree.remove("src/App.jsx").unwrap();
        assert_eq!(removed.contents(), Some("app"));
        assert!(matches!(
            tree.remove("src/App.jsx"),
            Err(TreeError::NotFound(_))
        ));
    }
}
