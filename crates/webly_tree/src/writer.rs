//! Materializing trees on disk and packing them into archives.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{TreeError, TreeResult};
use crate::models::{FileTree, TreeNode};

/// Default file name for downloaded projects.
pub const ARCHIVE_NAME: &str = "project.zip";

/// Writer for file trees.
pub struct TreeWriter;

impl TreeWriter {
    /// Write every file of `tree` below `root`, creating directories.
    ///
    /// Existing files not present in the tree are left alone so installed
    /// dependencies survive a remount.
    pub fn write_dir(tree: &FileTree, root: impl AsRef<Path>) -> TreeResult<usize> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|source| TreeError::Write {
            path: root.to_path_buf(),
            source,
        })?;

        let mut written = 0;
        for (name, node) in tree.entries() {
            let path = root.join(name);
            match node {
                TreeNode::File(file) => {
                    if path.is_dir() {
                        fs::remove_dir_all(&path)?;
                    }
                    fs::write(&path, &file.contents)
                        .map_err(|source| TreeError::Write { path, source })?;
                    written += 1;
                }
                TreeNode::Directory(dir) => {
                    if path.is_file() {
                        fs::remove_file(&path)?;
                    }
                    written += Self::write_dir(dir, &path)?;
                }
            }
        }
        Ok(written)
    }

    /// Pack all files into a deflated zip archive.
    pub fn to_zip(tree: &FileTree) -> TreeResult<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (path, contents) in tree.flatten() {
            writer.start_file(path.as_str(), options)?;
            writer.write_all(contents.as_bytes())?;
        }

        let cursor = writer.finish()?;
        let bytes = cursor.into_inner();
        debug!("Packed {} files into {} bytes", tree.file_count(), bytes.len());
        Ok(bytes)
    }

    /// Write the zip archive of `tree` to `path`.
    pub fn write_zip(tree: &FileTree, path: impl AsRef<Path>) -> TreeResult<()> {
        let path = path.as_ref();
        let bytes = Self::to_zip(tree)?;
        fs::write(path, bytes).map_err(|source| TreeError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_zip_contains_every_file() {
        let tree = FileTree::new()
            .with_file("index.html", "<html/>")
            .with_file("src/App.jsx", "export default function App() {}");

        let bytes = TreeWriter::to_zip(&tree).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut contents = String::new();
        archive
            .by_name("src/App.jsx")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "export default function App() {}");
    }
}
