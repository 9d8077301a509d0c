//! # webly_tree
//!
//! Virtual file tree for Webly generated projects.
//!
//! A tree is the unit of data exchanged with the generation backend and
//! mounted into the build sandbox. This crate provides:
//!
//! - **Model**: `FileTree` / `TreeNode` in the sandbox mount format
//! - **Parsing**: tolerant decoding of backend payloads (fenced or double-encoded JSON)
//! - **Baseline**: the injected configuration files merged in before every mount
//! - **Disk & archives**: materialize a tree, snapshot it back, pack it as a zip
//!
//! # Example
//!
//! ```rust
//! use webly_tree::{Baseline, TreeReader};
//!
//! let generated = TreeReader::parse(
//!     r#"{"src": {"directory": {"main.jsx": {"file": {"contents": "render()"}}}}}"#,
//! ).unwrap();
//!
//! let mounted = Baseline::default().merge(&generated);
//! assert!(mounted.contains("index.html"));
//! assert!(mounted.contains("src/main.jsx"));
//! ```

pub mod baseline;
pub mod error;
pub mod models;
pub mod reader;
pub mod writer;

pub use baseline::{Baseline, INJECTED_FILES};
pub use error::{TreeError, TreeResult};
pub use models::{FileNode, FileTree, TreeNode};
pub use reader::{TreeReader, SKIP_DIRS};
pub use writer::{TreeWriter, ARCHIVE_NAME};
