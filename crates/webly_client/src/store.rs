//! Persisted session state.
//!
//! The generated code and its dependency list survive between runs. On disk
//! they live under the project workspace:
//!
//! ```text
//! .webly/session/
//! ├── code           # Serialized file tree as returned by the backend
//! └── dependencies   # Space-separated npm packages
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::ClientResult;
use crate::types::SessionContext;

/// Storage for the `code` and `dependencies` entries.
pub trait SessionStore: Send + Sync {
    /// Load the stored session, if any.
    fn load(&self) -> ClientResult<Option<SessionContext>>;

    /// Store both entries.
    fn save(&self, context: &SessionContext) -> ClientResult<()>;

    /// Remove the stored session.
    fn clear(&self) -> ClientResult<()>;
}

/// File-backed store
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    workspace_root: PathBuf,
}

impl FileSessionStore {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Directory holding the session entries
    pub fn session_dir(&self) -> PathBuf {
        self.workspace_root.join(".webly").join("session")
    }

    fn code_path(&self) -> PathBuf {
        self.session_dir().join("code")
    }

    fn dependencies_path(&self) -> PathBuf {
        self.session_dir().join("dependencies")
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> ClientResult<Option<SessionContext>> {
        let code_path = self.code_path();
        if !code_path.exists() {
            return Ok(None);
        }
        let code = fs::read_to_string(&code_path)?;

        let deps_path = self.dependencies_path();
        let dependencies = if deps_path.exists() {
            fs::read_to_string(&deps_path)?.trim().to_string()
        } else {
            String::new()
        };

        Ok(Some(SessionContext::new(code, dependencies)))
    }

    fn save(&self, context: &SessionContext) -> ClientResult<()> {
        fs::create_dir_all(self.session_dir())?;
        fs::write(self.code_path(), &context.code)?;
        fs::write(self.dependencies_path(), &context.dependencies)?;
        debug!("Saved session to {:?}", self.session_dir());
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        let dir = self.session_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: RwLock<Option<SessionContext>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a session
    pub fn with_session(context: SessionContext) -> Self {
        Self {
            session: RwLock::new(Some(context)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> ClientResult<Option<SessionContext>> {
        Ok(self.session.read().clone())
    }

    fn save(&self, context: &SessionContext) -> ClientResult<()> {
        *self.session.write() = Some(context.clone());
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        *self.session.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path());
        assert!(store.load().unwrap().is_none());

        let context = SessionContext::new(r#"{"a.txt":{"file":{"contents":"1"}}}"#, "react-icons");
        store.save(&context).unwrap();

        assert!(temp.path().join(".webly/session/code").exists());
        assert_eq!(store.load().unwrap(), Some(context));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_missing_dependencies() {
        let temp = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp.path());
        fs::create_dir_all(store.session_dir()).unwrap();
        fs::write(store.session_dir().join("code"), "{}").unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.dependencies, "");
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert!(store.load().unwrap().is_none());
        store.save(&SessionContext::new("{}", "")).unwrap();
        assert!(store.load().unwrap().is_some());
    }
}
