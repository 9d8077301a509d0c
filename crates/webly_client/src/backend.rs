//! Generation backend adapter.
//!
//! The backend exposes three endpoints: generation from sketches, error
//! correction of a generated tree, and the list of setup commands for a
//! dependency set. The base URL is taken from `WEBLY_BACKEND_URL`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};
use crate::types::{
    GenerationRequest, GenerationResponse, RepairRequest, RepairResponse, SessionContext,
    SetupCommands,
};

/// Backend used when `WEBLY_BACKEND_URL` is not set.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3001";

/// Generation can take minutes for multi-page sites.
pub const GENERATE_TIMEOUT_SECS: u64 = 120;

pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Generation backend.
///
/// Every call takes the session state explicitly.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Generate a project from sketches.
    async fn generate(&self, request: &GenerationRequest) -> ClientResult<GenerationResponse>;

    /// Ask for a corrected tree given the error output of a failed check.
    async fn repair(&self, context: &SessionContext, error_log: &str) -> ClientResult<RepairResponse>;

    /// Fetch the setup commands for the session's dependencies.
    async fn setup_commands(&self, context: &SessionContext) -> ClientResult<SetupCommands>;
}

/// HTTP backend adapter
pub struct HttpBackend {
    base_url: String,
    generate_timeout: Duration,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create an adapter for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            generate_timeout: Duration::from_secs(GENERATE_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            client: reqwest::Client::new(),
        }
    }

    /// Create an adapter from `WEBLY_BACKEND_URL`, falling back to the local default
    pub fn from_env() -> Self {
        let base_url = std::env::var("WEBLY_BACKEND_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        Self::new(base_url)
    }

    /// Override both timeouts
    pub fn with_timeouts(mut self, generate: Duration, request: Duration) -> Self {
        self.generate_timeout = generate;
        self.request_timeout = request;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn generate(&self, request: &GenerationRequest) -> ClientResult<GenerationResponse> {
        request.validate()?;
        info!(
            "Requesting generation for {} page(s): {}",
            request.pages.len(),
            request.page_names()
        );

        let mut form = Form::new()
            .text("userPrompt", request.prompt.clone())
            .text("userId", request.user_id.clone())
            .text("pageNames", request.page_names());
        for page in &request.pages {
            let part = Part::bytes(page.bytes.clone())
                .file_name(page.file_name())
                .mime_str("image/png")?;
            form = form.part("images", part);
        }

        let response = self
            .client
            .post(self.url("/api/get-user-prompt"))
            .timeout(self.generate_timeout)
            .multipart(form)
            .send()
            .await?;
        let generated: GenerationResponse = Self::decode(response).await?;
        debug!(
            "Generation returned {} processed image(s)",
            generated.processed_images.unwrap_or_default()
        );
        Ok(generated)
    }

    async fn repair(&self, context: &SessionContext, error_log: &str) -> ClientResult<RepairResponse> {
        debug!("Requesting error correction ({} bytes of error output)", error_log.len());
        let body = RepairRequest {
            code: context.code.clone(),
            error: error_log.to_string(),
            dependencies: context.dependencies.clone(),
        };

        let response = self
            .client
            .post(self.url("/api/errorcorrection"))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn setup_commands(&self, context: &SessionContext) -> ClientResult<SetupCommands> {
        let response = self
            .client
            .get(self.url("/api/get-command"))
            .timeout(self.request_timeout)
            .query(&[("dependencies", context.dependencies.as_str())])
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = HttpBackend::new("http://localhost:3001/");
        assert_eq!(backend.base_url(), "http://localhost:3001");
        assert_eq!(
            backend.url("/api/get-command"),
            "http://localhost:3001/api/get-command"
        );
    }
}
