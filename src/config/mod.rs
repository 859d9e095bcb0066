//! Configuration types for the Mealie gateway.

use crate::errors::{GatewayError, GatewayResult};
use crate::resilience::RetryConfig;
use crate::{
    DEFAULT_BASE_URL, DEFAULT_CLIENT_SWEEP_SECS, DEFAULT_CLIENT_TTL_SECS,
    DEFAULT_MAX_CACHED_CLIENTS, DEFAULT_TIMEOUT_SECS, DEFAULT_UNIT_INACTIVITY_SECS,
    DEFAULT_UNIT_SWEEP_SECS,
};
use secrecy::{ExposeSecret, SecretString};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Configuration for the Mealie gateway.
///
/// All knobs are deployment-level: one configuration is built once and shared
/// by every processing unit, it is never varied per call.
#[derive(Clone)]
pub struct MealieConfig {
    /// Base URL of the Mealie instance
    pub base_url: String,
    /// API token for authentication
    pub api_token: SecretString,
    /// Request timeout for individual HTTP calls
    pub timeout: Duration,
    /// Retry behavior for transient failures
    pub retry: RetryConfig,
    /// Time-to-live for cached authenticated clients (sliding)
    pub client_ttl: Duration,
    /// Interval between cache eviction sweeps
    pub client_sweep_interval: Duration,
    /// Maximum number of cached clients before least-recently-used eviction
    pub max_cached_clients: usize,
    /// Inactivity threshold after which an idle unit is swept
    pub unit_inactivity_threshold: Duration,
    /// Interval between stale-unit sweeps
    pub unit_sweep_interval: Duration,
}

impl MealieConfig {
    /// Creates a new configuration builder
    pub fn builder() -> MealieConfigBuilder {
        MealieConfigBuilder::default()
    }

    /// Creates a configuration from environment variables
    pub fn from_env() -> GatewayResult<Self> {
        let api_token =
            std::env::var("MEALIE_API_TOKEN").map_err(|_| GatewayError::Configuration {
                message: "MEALIE_API_TOKEN environment variable not set".to_string(),
            })?;

        let base_url =
            std::env::var("MEALIE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = env_parsed("MEALIE_TIMEOUT", DEFAULT_TIMEOUT_SECS);
        let ttl_secs = env_parsed("MEALIE_CLIENT_TTL_SECS", DEFAULT_CLIENT_TTL_SECS);
        let max_attempts = env_parsed("MEALIE_MAX_ATTEMPTS", RetryConfig::default().max_attempts);

        Self::builder()
            .base_url(base_url)
            .api_token(SecretString::new(api_token))
            .timeout(Duration::from_secs(timeout_secs))
            .client_ttl(Duration::from_secs(ttl_secs))
            .retry(RetryConfig {
                max_attempts,
                ..RetryConfig::default()
            })
            .build()
    }

    /// Stable identity used as the client cache key.
    ///
    /// Combines the base URL with a fingerprint of the token so two
    /// configurations against the same instance with different credentials
    /// never share a cached client. The token itself is never exposed.
    pub fn config_id(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.api_token.expose_secret().hash(&mut hasher);
        format!("{}#{:016x}", self.base_url.trim_end_matches('/'), hasher.finish())
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Builder for MealieConfig
#[derive(Default)]
pub struct MealieConfigBuilder {
    base_url: Option<String>,
    api_token: Option<SecretString>,
    timeout: Option<Duration>,
    retry: Option<RetryConfig>,
    client_ttl: Option<Duration>,
    client_sweep_interval: Option<Duration>,
    max_cached_clients: Option<usize>,
    unit_inactivity_threshold: Option<Duration>,
    unit_sweep_interval: Option<Duration>,
}

impl MealieConfigBuilder {
    /// Sets the base URL of the Mealie instance
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the API token
    pub fn api_token(mut self, api_token: SecretString) -> Self {
        self.api_token = Some(api_token);
        self
    }

    /// Sets the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the retry configuration
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sets the cached client time-to-live
    pub fn client_ttl(mut self, ttl: Duration) -> Self {
        self.client_ttl = Some(ttl);
        self
    }

    /// Sets the cache sweep interval
    pub fn client_sweep_interval(mut self, interval: Duration) -> Self {
        self.client_sweep_interval = Some(interval);
        self
    }

    /// Sets the maximum number of cached clients
    pub fn max_cached_clients(mut self, max: usize) -> Self {
        self.max_cached_clients = Some(max);
        self
    }

    /// Sets the stale-unit inactivity threshold
    pub fn unit_inactivity_threshold(mut self, threshold: Duration) -> Self {
        self.unit_inactivity_threshold = Some(threshold);
        self
    }

    /// Sets the stale-unit sweep interval
    pub fn unit_sweep_interval(mut self, interval: Duration) -> Self {
        self.unit_sweep_interval = Some(interval);
        self
    }

    /// Builds the configuration
    pub fn build(self) -> GatewayResult<MealieConfig> {
        let api_token = self.api_token.ok_or_else(|| GatewayError::Configuration {
            message: "API token is required".to_string(),
        })?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url)?;

        let retry = self.retry.unwrap_or_default();
        if retry.max_attempts < 1 {
            return Err(GatewayError::Configuration {
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }

        Ok(MealieConfig {
            base_url,
            api_token,
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            retry,
            client_ttl: self
                .client_ttl
                .unwrap_or(Duration::from_secs(DEFAULT_CLIENT_TTL_SECS)),
            client_sweep_interval: self
                .client_sweep_interval
                .unwrap_or(Duration::from_secs(DEFAULT_CLIENT_SWEEP_SECS)),
            max_cached_clients: self.max_cached_clients.unwrap_or(DEFAULT_MAX_CACHED_CLIENTS),
            unit_inactivity_threshold: self
                .unit_inactivity_threshold
                .unwrap_or(Duration::from_secs(DEFAULT_UNIT_INACTIVITY_SECS)),
            unit_sweep_interval: self
                .unit_sweep_interval
                .unwrap_or(Duration::from_secs(DEFAULT_UNIT_SWEEP_SECS)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder_defaults() {
        let config = MealieConfig::builder()
            .api_token(SecretString::new("mealie-token-123456".to_string()))
            .build()
            .unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.client_ttl, Duration::from_secs(DEFAULT_CLIENT_TTL_SECS));
        assert_eq!(config.max_cached_clients, DEFAULT_MAX_CACHED_CLIENTS);
    }

    #[test]
    fn test_config_builder_custom() {
        let config = MealieConfig::builder()
            .api_token(SecretString::new("mealie-token-123456".to_string()))
            .base_url("https://mealie.example.com")
            .timeout(Duration::from_secs(10))
            .client_ttl(Duration::from_secs(600))
            .max_cached_clients(8)
            .unit_inactivity_threshold(Duration::from_secs(7200))
            .build()
            .unwrap();

        assert_eq!(config.base_url, "https://mealie.example.com");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.client_ttl, Duration::from_secs(600));
        assert_eq!(config.max_cached_clients, 8);
        assert_eq!(config.unit_inactivity_threshold, Duration::from_secs(7200));
    }

    #[test]
    fn test_config_requires_token() {
        let result = MealieConfig::builder().build();
        assert!(matches!(result, Err(GatewayError::Configuration { .. })));
    }

    #[test]
    fn test_config_rejects_invalid_base_url() {
        let result = MealieConfig::builder()
            .api_token(SecretString::new("mealie-token-123456".to_string()))
            .base_url("not a url")
            .build();
        assert!(matches!(result, Err(GatewayError::Configuration { .. })));
    }

    #[test]
    fn test_config_rejects_zero_attempts() {
        let result = MealieConfig::builder()
            .api_token(SecretString::new("mealie-token-123456".to_string()))
            .retry(RetryConfig {
                max_attempts: 0,
                ..RetryConfig::default()
            })
            .build();
        assert!(matches!(result, Err(GatewayError::Configuration { .. })));
    }

    #[test]
    fn test_config_id_stable_and_token_sensitive() {
        let a = MealieConfig::builder()
            .api_token(SecretString::new("mealie-token-123456".to_string()))
            .build()
            .unwrap();
        let b = MealieConfig::builder()
            .api_token(SecretString::new("mealie-token-123456".to_string()))
            .build()
            .unwrap();
        let c = MealieConfig::builder()
            .api_token(SecretString::new("different-token-654321".to_string()))
            .build()
            .unwrap();

        assert_eq!(a.config_id(), b.config_id());
        assert_ne!(a.config_id(), c.config_id());
        assert!(!a.config_id().contains("mealie-token-123456"));
    }
}
