//! Mock implementations for testing.
//!
//! Offline stand-ins for the HTTP transport and the client factory, so cache
//! and gateway behavior can be exercised without a live server.

use crate::cache::ClientConfig;
use crate::client::MealieClient;
use crate::config::MealieConfig;
use crate::errors::{GatewayError, GatewayResult};
use crate::transport::HttpTransport;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, Response, StatusCode};
use secrecy::SecretString;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

/// Scripted HTTP transport.
///
/// Pops one scripted `(status, body)` pair per call; once the script is
/// exhausted every call answers `200 {}`. Non-success statuses are classified
/// exactly like the real transport.
pub struct MockTransport {
    script: Mutex<VecDeque<(u16, String)>>,
    requests: Mutex<Vec<(Method, String)>>,
    calls: AtomicU32,
}

impl MockTransport {
    /// Transport that always answers `200 {}`
    pub fn ok() -> Self {
        Self::scripted(Vec::new())
    }

    /// Transport that answers from a script before falling back to `200 {}`
    pub fn scripted(script: Vec<(u16, &str)>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|(status, body)| (status, body.to_string()))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of requests seen so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Method and path-with-query of the most recent request
    pub fn last_request(&self) -> Option<(Method, String)> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(
        &self,
        method: Method,
        url: Url,
        _headers: HeaderMap,
        _body: Option<Bytes>,
    ) -> GatewayResult<Response<Bytes>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        self.requests.lock().unwrap().push((method, path));
        let (status, body) = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((200, "{}".to_string()));

        if !(200..300).contains(&status) {
            return Err(GatewayError::from_status(status, &body, None));
        }

        Response::builder()
            .status(StatusCode::from_u16(status).unwrap_or(StatusCode::OK))
            .body(Bytes::from(body))
            .map_err(|e| GatewayError::Unknown {
                message: format!("Failed to build mock response: {}", e),
                status_code: None,
            })
    }
}

/// Build a valid offline configuration whose identity derives from `id`
pub fn test_config(id: &str) -> MealieConfig {
    MealieConfig::builder()
        .api_token(SecretString::new(format!("test-token-{}-0123456789", id)))
        .base_url("http://localhost:9000")
        .build()
        .expect("test config must build")
}

/// Client factory that counts invocations.
///
/// Each created client talks to its own always-ok [`MockTransport`] unless a
/// shared transport is supplied.
pub struct CountingConfig {
    config: MealieConfig,
    transport: Option<Arc<MockTransport>>,
    creates: AtomicU32,
    fail: bool,
}

impl CountingConfig {
    /// Factory producing working clients
    pub fn new(id: &str) -> Self {
        Self {
            config: test_config(id),
            transport: None,
            creates: AtomicU32::new(0),
            fail: false,
        }
    }

    /// Factory whose every invocation fails with a network error
    pub fn failing(id: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(id)
        }
    }

    /// Factory producing clients bound to a shared scripted transport
    pub fn with_transport(id: &str, transport: Arc<MockTransport>) -> Self {
        Self {
            transport: Some(transport),
            ..Self::new(id)
        }
    }

    /// Number of factory invocations so far
    pub fn creates(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    /// The configuration identity this factory caches under
    pub fn id(&self) -> String {
        self.config.config_id()
    }
}

#[async_trait]
impl ClientConfig for CountingConfig {
    fn config_id(&self) -> String {
        self.config.config_id()
    }

    async fn create_client(&self) -> GatewayResult<MealieClient> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(GatewayError::Network {
                message: "connection refused".to_string(),
                status_code: None,
            });
        }
        let transport = match &self.transport {
            Some(shared) => Arc::clone(shared) as Arc<dyn HttpTransport>,
            None => Arc::new(MockTransport::ok()) as Arc<dyn HttpTransport>,
        };
        MealieClient::with_transport(&self.config, transport)
    }
}
