//! HTTP backend tests against a local mock server.

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use webly_client::{
    Backend, ClientError, GenerationRequest, HttpBackend, PageImage, RetryPolicy, SessionContext,
};

fn session() -> SessionContext {
    SessionContext::new(
        r#"{"src":{"directory":{"main.jsx":{"file":{"contents":"import App from './App'"}}}}}"#,
        "react-icons",
    )
}

#[tokio::test]
async fn test_repair_sends_session_and_error() {
    let server = MockServer::start().await;
    let context = session();

    Mock::given(method("POST"))
        .and(path("/api/errorcorrection"))
        .and(body_json(json!({
            "code": context.code,
            "error": "Could not resolve ./App",
            "dependencies": "react-icons"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cleancode": {
                "src": {"directory": {
                    "main.jsx": {"file": {"contents": "import App from './App'"}},
                    "App.jsx": {"file": {"contents": "export default function App() {}"}}
                }}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri());
    let response = backend.repair(&context, "Could not resolve ./App").await.unwrap();
    let tree = response.tree().unwrap();

    assert!(tree.contains("src/App.jsx"));
    assert!(tree.contains("src/main.jsx"));
}

#[tokio::test]
async fn test_setup_commands_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/get-command"))
        .and(query_param("dependencies", "react-icons"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "command": "npm i -D tailwindcss postcss autoprefixer",
            "secondCommand": "npx tailwindcss init -p"
        })))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri());
    let commands = backend.setup_commands(&session()).await.unwrap();

    assert_eq!(
        commands.present(),
        vec![
            "npm i -D tailwindcss postcss autoprefixer",
            "npx tailwindcss init -p"
        ]
    );
}

#[tokio::test]
async fn test_generate_multipart() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/get-user-prompt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "{\"index.css\":{\"file\":{\"contents\":\"body{}\"}}}",
            "dependencies": "framer-motion",
            "processedImages": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri());
    let request = GenerationRequest::new("a bakery landing page", "user-1")
        .page(PageImage::new("home", 1, vec![0x89, 0x50, 0x4e, 0x47]));
    let response = backend.generate(&request).await.unwrap();

    assert_eq!(response.processed_images, Some(1));
    let context = response.into_session();
    assert_eq!(context.dependencies, "framer-motion");
    assert!(context.tree().unwrap().contains("index.css"));
}

#[tokio::test]
async fn test_server_error_is_status_and_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/errorcorrection"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Server is Busy"))
        .expect(3)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri());
    let context = session();
    let (backend, context) = (&backend, &context);
    let result = RetryPolicy::immediate(3)
        .retry("repair", || backend.repair(context, "error"))
        .await;

    match result {
        Err(ClientError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "Server is Busy");
        }
        other => panic!("expected status error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/get-command"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(server.uri());
    let result = backend.setup_commands(&session()).await;
    assert!(matches!(result, Err(ClientError::Parse(_))));
}

#[tokio::test]
async fn test_generate_rejects_empty_request() {
    let backend = HttpBackend::new("http://127.0.0.1:9");
    let result = backend.generate(&GenerationRequest::new("x", "u")).await;
    assert!(matches!(result, Err(ClientError::InvalidRequest(_))));
}
