//! Request and response types for the generation backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use webly_tree::{FileTree, TreeReader};

use crate::error::{ClientError, ClientResult};

/// One sketched page sent for generation.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Page name, e.g. "home"
    pub name: String,
    /// Position of the page in the site
    pub order: u32,
    /// PNG bytes
    pub bytes: Vec<u8>,
}

impl PageImage {
    pub fn new(name: impl Into<String>, order: u32, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            order,
            bytes,
        }
    }

    /// Upload file name, `<page>-page-<order>.png`.
    pub fn file_name(&self) -> String {
        format!("{}-page-{}.png", self.name, self.order)
    }
}

/// Generation request: sketches plus the user's prompt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub user_id: String,
    pub pages: Vec<PageImage>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            user_id: user_id.into(),
            pages: Vec::new(),
        }
    }

    pub fn page(mut self, page: PageImage) -> Self {
        self.pages.push(page);
        self
    }

    /// Comma-joined page names.
    pub fn page_names(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.pages.is_empty() {
            return Err(ClientError::InvalidRequest(
                "at least one sketch is required".to_string(),
            ));
        }
        if let Some(page) = self.pages.iter().find(|p| p.bytes.is_empty()) {
            return Err(ClientError::InvalidRequest(format!(
                "sketch for page '{}' is empty",
                page.name
            )));
        }
        Ok(())
    }
}

/// Generation endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    /// Serialized file tree, as an object or a JSON string
    pub code: Value,
    /// Space-separated npm packages
    #[serde(default)]
    pub dependencies: String,
    #[serde(default)]
    pub processed_images: Option<u32>,
}

impl GenerationResponse {
    /// Session state to persist.
    pub fn into_session(self) -> SessionContext {
        SessionContext::new(value_to_code(self.code), self.dependencies)
    }
}

/// Repair endpoint request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairRequest {
    pub code: String,
    pub error: String,
    pub dependencies: String,
}

/// Repair endpoint response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairResponse {
    #[serde(default)]
    pub cleancode: Option<Value>,
}

impl RepairResponse {
    /// Parse the corrected tree. A missing, null or empty payload is an error.
    pub fn tree(&self) -> ClientResult<FileTree> {
        match &self.cleancode {
            None | Some(Value::Null) => Err(ClientError::EmptyRepair),
            Some(Value::String(s)) if s.trim().is_empty() => Err(ClientError::EmptyRepair),
            Some(value) => Ok(TreeReader::from_value(value.clone())?),
        }
    }
}

/// Setup commands returned by the command-list endpoint.
///
/// Any subset may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupCommands {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub second_command: Option<String>,
    #[serde(default)]
    pub third_command: Option<String>,
    #[serde(default)]
    pub fourth_command: Option<String>,
    #[serde(default)]
    pub fifth_command: Option<String>,
}

impl SetupCommands {
    /// Build from a list of up to five commands.
    pub fn from_list<S: AsRef<str>>(commands: &[S]) -> Self {
        let mut slots = commands.iter().map(|c| Some(c.as_ref().to_string()));
        Self {
            command: slots.next().flatten(),
            second_command: slots.next().flatten(),
            third_command: slots.next().flatten(),
            fourth_command: slots.next().flatten(),
            fifth_command: slots.next().flatten(),
        }
    }

    /// All five slots in declared order.
    pub fn ordered(&self) -> [Option<&str>; 5] {
        [
            self.command.as_deref(),
            self.second_command.as_deref(),
            self.third_command.as_deref(),
            self.fourth_command.as_deref(),
            self.fifth_command.as_deref(),
        ]
    }

    /// Non-empty commands in declared order.
    pub fn present(&self) -> Vec<&str> {
        self.ordered()
            .into_iter()
            .flatten()
            .filter(|c| !c.trim().is_empty())
            .collect()
    }
}

/// Per-session state passed explicitly to every backend call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Serialized file tree as last returned by the backend
    pub code: String,
    /// Space-separated npm packages
    pub dependencies: String,
}

impl SessionContext {
    pub fn new(code: impl Into<String>, dependencies: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            dependencies: dependencies.into(),
        }
    }

    /// Context holding a serialized tree.
    pub fn from_tree(tree: &FileTree, dependencies: impl Into<String>) -> ClientResult<Self> {
        Ok(Self::new(tree.to_json()?, dependencies))
    }

    /// Parse the stored code.
    pub fn tree(&self) -> ClientResult<FileTree> {
        Ok(TreeReader::parse(&self.code)?)
    }

    /// Replace the code, keeping dependencies.
    pub fn with_tree(&self, tree: &FileTree) -> ClientResult<Self> {
        Self::from_tree(tree, self.dependencies.clone())
    }

    pub fn dependency_list(&self) -> Vec<&str> {
        self.dependencies.split_whitespace().collect()
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.trim().is_empty()
    }
}

fn value_to_code(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
