//! # Mealie Gateway
//!
//! Resilient mediation layer between inbound operation requests and a remote
//! Mealie instance.
//!
//! ## Features
//!
//! - Cached authenticated client handles with sliding TTL and LRU eviction
//! - Closed error taxonomy with per-kind retry classification
//! - Exponential backoff retry with jitter and server-directed delays
//! - Coordinated shutdown with bounded, concurrent cleanup handlers
//! - Processing-unit lifecycle tracking with graceful request draining
//! - Secure credential handling with `SecretString`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_mealie::{Gateway, MealieConfig};
//! use http::Method;
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MealieConfig::builder()
//!         .base_url("https://mealie.example.com")
//!         .api_token(SecretString::new("mealie-api-token".to_string()))
//!         .build()?;
//!
//!     let gateway = Gateway::new(config)?;
//!     let unit = gateway.unit("recipes.list", "tool");
//!
//!     let envelope = unit
//!         .run("recipes.list", |_, client| async move {
//!             client.request_json(Method::GET, "/api/recipes", None).await
//!         })
//!         .await;
//!
//!     println!("{}", serde_json::to_string_pretty(&envelope)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - `gateway` - Gateway assembly, operation units and response envelopes
//! - `cache` - Client handle cache keyed by configuration identity
//! - `resilience` - Retry executor and backoff policy
//! - `shutdown` - Shutdown coordinator with signal hooks
//! - `lifecycle` - Unit trackers, draining and stale-unit sweeps
//! - `client` - Authenticated Mealie client handle
//! - `services` - Thin passthroughs for recipes, meal plans and shopping lists
//! - `config` - Configuration types and builder
//! - `auth` - Authentication and header management
//! - `transport` - HTTP transport layer
//! - `errors` - Error types and taxonomy
//! - `observability` - Structured logging setup
//! - `mocks` - Mock implementations for testing

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod services;
pub mod shutdown;
pub mod transport;

// Development/testing modules
#[cfg(test)]
pub mod mocks;

// Re-exports for convenience
pub use auth::{AuthManager, TokenAuthManager};
pub use cache::{ClientCache, ClientConfig};
pub use client::MealieClient;
pub use config::{MealieConfig, MealieConfigBuilder};
pub use errors::{GatewayError, GatewayResult};
pub use gateway::{EnvelopeError, Gateway, OperationUnit, ResponseEnvelope};
pub use lifecycle::{
    DrainOutcome, RequestGuard, UnitPhase, UnitRegistry, UnitSnapshot, UnitTracker, DRAIN_TIMEOUT,
};
pub use observability::{LogFormat, LogLevel, LoggingConfig};
pub use resilience::{RetryConfig, RetryExecutor};
pub use services::{MealPlansService, RecipesService, ShoppingListsService};
pub use shutdown::{
    HandlerId, ShutdownCoordinator, ShutdownReason, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use transport::{HttpTransport, ReqwestTransport};

/// The default Mealie base URL (a local instance)
pub const DEFAULT_BASE_URL: &str = "http://localhost:9000";

/// The default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The default sliding time-to-live for cached client handles (30 minutes)
pub const DEFAULT_CLIENT_TTL_SECS: u64 = 1800;

/// The default interval between cache eviction sweeps (5 minutes)
pub const DEFAULT_CLIENT_SWEEP_SECS: u64 = 300;

/// The default maximum number of cached client handles
pub const DEFAULT_MAX_CACHED_CLIENTS: usize = 64;

/// The default inactivity threshold before an idle unit is swept (1 hour)
pub const DEFAULT_UNIT_INACTIVITY_SECS: u64 = 3600;

/// The default interval between stale-unit sweeps (30 minutes)
pub const DEFAULT_UNIT_SWEEP_SECS: u64 = 1800;
