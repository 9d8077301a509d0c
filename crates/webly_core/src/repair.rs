//! Auto-repair client.
//!
//! Sends the current code, the raw error log and the dependency list to the
//! backend, and turns the corrected code into the next session state and the
//! tree to mount.

use std::sync::Arc;

use tracing::{info, warn};

use webly_client::{Backend, RetryPolicy, SessionContext, SessionStore};
use webly_tree::{Baseline, FileTree};

use crate::error::CoreResult;

/// Result of a successful repair.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    /// Session state holding the corrected code, already persisted
    pub context: SessionContext,
    /// Corrected tree merged with the baseline, ready to mount
    pub tree: FileTree,
}

/// Client for the error-correction round trip.
pub struct AutoRepairClient {
    backend: Arc<dyn Backend>,
    store: Arc<dyn SessionStore>,
    baseline: Baseline,
    retry: RetryPolicy,
}

impl AutoRepairClient {
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn SessionStore>,
        baseline: Baseline,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            store,
            baseline,
            retry,
        }
    }

    /// Request corrected code for `error_log`.
    ///
    /// Transport failures and unparseable responses are retried under the
    /// retry policy. The corrected code is persisted before returning.
    pub async fn repair(&self, context: &SessionContext, error_log: &str) -> CoreResult<RepairOutcome> {
        info!("Requesting repair ({} bytes of error output)", error_log.len());

        let backend = self.backend.as_ref();
        let corrected = self
            .retry
            .retry("error correction", || async move {
                let response = backend.repair(context, error_log).await?;
                response.tree()
            })
            .await
            .map_err(|e| {
                warn!("Repair failed: {}", e);
                e
            })?;

        let next = context.with_tree(&corrected)?;
        self.store.save(&next)?;
        let tree = self.baseline.merge(&corrected);
        info!("Repair produced {} file(s)", corrected.file_count());

        Ok(RepairOutcome { context: next, tree })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use webly_client::{
        ClientError, ClientResult, GenerationRequest, GenerationResponse, MemorySessionStore,
        RepairResponse, SetupCommands,
    };

    /// Backend that replays queued repair responses.
    struct ScriptedBackend {
        responses: Mutex<Vec<ClientResult<RepairResponse>>>,
        requests: Mutex<Vec<(String, String, String)>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<ClientResult<RepairResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        async fn generate(&self, _request: &GenerationRequest) -> ClientResult<GenerationResponse> {
            Err(ClientError::InvalidRequest("not scripted".into()))
        }

        async fn repair(&self, context: &SessionContext, error_log: &str) -> ClientResult<RepairResponse> {
            self.requests.lock().push((
                context.code.clone(),
                error_log.to_string(),
                context.dependencies.clone(),
            ));
            self.responses.lock().remove(0)
        }

        async fn setup_commands(&self, _context: &SessionContext) -> ClientResult<SetupCommands> {
            Ok(SetupCommands::default())
        }
    }

    fn fixed() -> RepairResponse {
        RepairResponse {
            cleancode: Some(json!({
                "src": {"directory": {"App.jsx": {"file": {"contents": "export default () => null"}}}}
            })),
        }
    }

    #[tokio::test]
    async fn test_repair_persists_and_merges() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(fixed())]));
        let store = Arc::new(MemorySessionStore::new());
        let client = AutoRepairClient::new(
            backend.clone(),
            store.clone(),
            Baseline::vite_react(),
            RetryPolicy::immediate(3),
        );
        let context = SessionContext::new("{\"broken\":", "react-icons");

        let outcome = client.repair(&context, "Unexpected end of JSON").await.unwrap();

        assert!(outcome.tree.contains("src/App.jsx"));
        assert!(outcome.tree.contains("index.html"));
        assert_eq!(outcome.context.dependencies, "react-icons");
        assert_eq!(store.load().unwrap(), Some(outcome.context.clone()));

        let requests = backend.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "{\"broken\":");
        assert_eq!(requests[0].1, "Unexpected end of JSON");
    }

    #[tokio::test]
    async fn test_repair_retries_empty_response() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(RepairResponse::default()),
            Err(ClientError::Transport("reset".into())),
            Ok(fixed()),
        ]));
        let client = AutoRepairClient::new(
            backend.clone(),
            Arc::new(MemorySessionStore::new()),
            Baseline::vite_react(),
            RetryPolicy::immediate(3),
        );

        let outcome = client.repair(&SessionContext::new("{}", ""), "error").await;
        assert!(outcome.is_ok());
        assert_eq!(backend.requests.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_repair_gives_up() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(ClientError::Status { status: 503, body: String::new() }),
            Err(ClientError::Status { status: 503, body: String::new() }),
        ]));
        let store = Arc::new(MemorySessionStore::new());
        let client = AutoRepairClient::new(backend, store.clone(), Baseline::vite_react(), RetryPolicy::immediate(2));

        assert!(client.repair(&SessionContext::new("{}", ""), "error").await.is_err());
        assert!(store.load().unwrap().is_none());
    }
}
