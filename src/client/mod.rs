//! Authenticated client handle for the Mealie API.

use crate::auth::{AuthManager, TokenAuthManager};
use crate::cache::ClientConfig;
use crate::config::MealieConfig;
use crate::errors::{GatewayError, GatewayResult};
use crate::transport::{HttpTransport, ReqwestTransport};
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// An authenticated handle to a Mealie instance.
///
/// Handles are created by a [`ClientConfig`] factory, cached by the
/// [`ClientCache`](crate::cache::ClientCache), and handed to operation
/// handlers one attempt at a time. The handle itself is stateless beyond its
/// connection settings, so discarding a redundant handle is always safe.
pub struct MealieClient {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthManager>,
}

impl std::fmt::Debug for MealieClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MealieClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MealieClient {
    /// Create a new client from configuration without probing the server
    pub fn new(config: &MealieConfig) -> GatewayResult<Self> {
        let transport =
            Arc::new(ReqwestTransport::new(config.timeout)?) as Arc<dyn HttpTransport>;
        Self::with_transport(config, transport)
    }

    /// Create a new client with a custom transport (used by tests)
    pub fn with_transport(
        config: &MealieConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> GatewayResult<Self> {
        let auth = Arc::new(TokenAuthManager::new(config.api_token.clone()));
        auth.validate_token()
            .map_err(|e| GatewayError::Configuration {
                message: format!("Invalid API token: {}", e),
            })?;

        Ok(Self {
            base_url: Url::parse(&config.base_url)?,
            transport,
            auth,
        })
    }

    /// Create a client and verify its credentials against the server.
    ///
    /// This is the factory invoked on a cache miss; a rejected token surfaces
    /// as an `Authentication` error, an unreachable server as `Network`.
    pub async fn connect(config: &MealieConfig) -> GatewayResult<Self> {
        let client = Self::new(config)?;
        client.ping().await?;
        Ok(client)
    }

    /// Verify connectivity and credentials via the instance info endpoint
    pub async fn ping(&self) -> GatewayResult<()> {
        self.request_json(Method::GET, "/api/app/about", None)
            .await?;
        Ok(())
    }

    /// Send a request and deserialize the JSON response body.
    ///
    /// An empty response body (204 or bodyless 200) yields `Value::Null`.
    pub async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> GatewayResult<Value> {
        let url = self.endpoint(path)?;
        let body_bytes = match body {
            Some(value) => Some(Bytes::from(serde_json::to_vec(&value)?)),
            None => None,
        };

        let response = self
            .transport
            .send(method, url, self.auth.headers(), body_bytes)
            .await?;

        let body = response.into_body();
        if body.is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_slice(&body)?)
    }

    fn endpoint(&self, path: &str) -> GatewayResult<Url> {
        self.base_url
            .join(path)
            .map_err(GatewayError::from)
    }
}

#[async_trait]
impl ClientConfig for MealieConfig {
    fn config_id(&self) -> String {
        MealieConfig::config_id(self)
    }

    async fn create_client(&self) -> GatewayResult<MealieClient> {
        MealieClient::connect(self).await
    }
}
