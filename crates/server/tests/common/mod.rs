//! Common test utilities for API testing with a scripted engine.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock engine provider injected, so the full request path runs
//! without an ffmpeg binary.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use heics_core::testing::{MockEngine, MockEngineProvider};
use heics_core::{Config, Converter, EncoderCapabilities, HeicsConverter, StreamHypothesis};

/// Re-export fixtures for test convenience
pub use heics_core::testing::fixtures;

/// Test fixture for API testing with a mock engine.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_convert() {
///     let fixture = TestFixture::new();
///     let response = fixture.post_bytes("/api/v1/convert", fixtures::heics_bytes()).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Provider handing out engines - inspect acquisitions and calls
    pub provider: Arc<MockEngineProvider>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Bytes,
    pub body: Value,
}

impl TestResponse {
    /// Header value as a string, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestFixture {
    /// Create a fixture whose engine succeeds on the first hypothesis.
    pub fn new() -> Self {
        Self::with_engine(
            MockEngine::new().succeed_on(StreamHypothesis::AlphaPair { color: 2, alpha: 3 }),
        )
    }

    /// Create a fixture with a scripted engine and default config.
    pub fn with_engine(engine: MockEngine) -> Self {
        Self::with_config(TestConfig {
            engine,
            ..Default::default()
        })
    }

    /// Create a fixture with custom configuration.
    pub fn with_config(test_config: TestConfig) -> Self {
        let provider = Arc::new(match test_config.fail_acquire {
            true => MockEngineProvider::failing(),
            false => MockEngineProvider::new(test_config.engine),
        });
        Self::build(test_config.config, provider, test_config.capabilities)
    }

    fn build(
        config: Config,
        provider: Arc<MockEngineProvider>,
        capabilities: EncoderCapabilities,
    ) -> Self {
        let converter: Arc<dyn Converter> = Arc::new(HeicsConverter::new(Arc::clone(&provider)));

        let state = Arc::new(heics_server::state::AppState::new(
            config,
            converter,
            capabilities,
        ));
        let router = heics_server::api::create_router(state);

        Self { router, provider }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a POST request with a raw body.
    pub async fn post_bytes(&self, path: &str, body: impl Into<Bytes>) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/octet-stream")
            .body(Body::from(body.into()))
            .unwrap();
        self.send(request).await
    }

    /// Send a multipart upload with one file field and text fields.
    pub async fn post_multipart(
        &self,
        path: &str,
        file: Option<(&str, &[u8])>,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        const BOUNDARY: &str = "heics-test-boundary";

        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((filename, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Send a request to the test server.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Default)]
pub struct TestConfig {
    pub config: Config,
    pub engine: MockEngine,
    pub capabilities: EncoderCapabilities,
    /// Make every engine acquisition fail
    pub fail_acquire: bool,
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
