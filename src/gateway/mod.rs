//! Gateway assembly: wires the cache, retry, lifecycle and shutdown layers.
//!
//! A [`Gateway`] is the explicitly constructed application context. It owns
//! the client cache, the retry executor, the unit registry and the shutdown
//! coordinator; nothing in this crate lives in process-global state, so tests
//! build as many independent gateways as they need.

mod envelope;

pub use envelope::{EnvelopeError, ResponseEnvelope};

use crate::cache::{ClientCache, ClientConfig};
use crate::client::MealieClient;
use crate::config::MealieConfig;
use crate::errors::{GatewayError, GatewayResult};
use crate::lifecycle::{DrainOutcome, UnitRegistry, UnitTracker};
use crate::resilience::RetryExecutor;
use crate::shutdown::{HandlerId, ShutdownCoordinator, ShutdownReason};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Application context for mediated Mealie operations.
pub struct Gateway {
    client_config: Arc<dyn ClientConfig>,
    cache: Arc<ClientCache>,
    retry: Arc<RetryExecutor>,
    registry: Arc<UnitRegistry>,
    coordinator: Arc<ShutdownCoordinator>,
}

impl Gateway {
    /// Create a gateway from configuration.
    ///
    /// Registers the cache and the unit registry with a freshly constructed
    /// shutdown coordinator and, when running inside a tokio runtime, starts
    /// the background cache and stale-unit sweeps.
    pub fn new(config: MealieConfig) -> GatewayResult<Self> {
        let config = Arc::new(config);
        Self::assemble(Arc::clone(&config) as Arc<dyn ClientConfig>, &config)
    }

    /// Create a gateway with a custom client factory (used by tests)
    #[cfg(test)]
    pub fn with_client_config(
        config: MealieConfig,
        client_config: Arc<dyn ClientConfig>,
    ) -> GatewayResult<Self> {
        Self::assemble(client_config, &config)
    }

    fn assemble(
        client_config: Arc<dyn ClientConfig>,
        config: &MealieConfig,
    ) -> GatewayResult<Self> {
        let cache = Arc::new(ClientCache::new(
            config.client_ttl,
            config.max_cached_clients,
        ));
        let registry = UnitRegistry::new(config.unit_inactivity_threshold);
        let coordinator = Arc::new(ShutdownCoordinator::new());

        if tokio::runtime::Handle::try_current().is_ok() {
            cache.start_sweeper(config.client_sweep_interval);
            registry.start_sweeper(config.unit_sweep_interval);
        }

        {
            let cache = Arc::clone(&cache);
            coordinator.register("client-cache", move || {
                let cache = Arc::clone(&cache);
                async move {
                    cache.cleanup();
                }
            });
        }
        {
            let registry = Arc::clone(&registry);
            coordinator.register("unit-registry", move || {
                let registry = Arc::clone(&registry);
                async move {
                    registry.close_all().await;
                    registry.cleanup();
                }
            });
        }

        Ok(Self {
            client_config,
            cache,
            retry: Arc::new(RetryExecutor::new(config.retry.clone())),
            registry,
            coordinator,
        })
    }

    /// Create a processing unit for an operation endpoint.
    ///
    /// The unit registers its own drain as a shutdown handler; closing the
    /// unit unregisters it again.
    pub fn unit(&self, id: impl Into<String>, kind: impl Into<String>) -> OperationUnit {
        let tracker = self.registry.register(id, kind);

        let handler_id = {
            let tracker = Arc::clone(&tracker);
            let registry = Arc::clone(&self.registry);
            self.coordinator
                .register(format!("unit:{}", tracker.id()), move || {
                    let tracker = Arc::clone(&tracker);
                    let registry = Arc::clone(&registry);
                    async move {
                        tracker.drain().await;
                        registry.remove(tracker.id());
                    }
                })
        };

        OperationUnit {
            tracker,
            handler_id,
            client_config: Arc::clone(&self.client_config),
            cache: Arc::clone(&self.cache),
            retry: Arc::clone(&self.retry),
            registry: Arc::clone(&self.registry),
            coordinator: Arc::clone(&self.coordinator),
        }
    }

    /// Trigger an orderly shutdown of everything this gateway owns
    pub async fn shutdown(&self, reason: ShutdownReason) {
        self.coordinator.trigger_shutdown(reason).await;
    }

    /// The shutdown coordinator (for signal hook installation and exit code)
    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    /// The client cache
    pub fn cache(&self) -> &Arc<ClientCache> {
        &self.cache
    }

    /// The unit registry
    pub fn registry(&self) -> &Arc<UnitRegistry> {
        &self.registry
    }
}

/// A configured operation endpoint.
///
/// Each inbound request flows through the unit's lifecycle tracker, the retry
/// executor and the client cache, and comes back out as a
/// [`ResponseEnvelope`] regardless of outcome.
pub struct OperationUnit {
    tracker: Arc<UnitTracker>,
    handler_id: HandlerId,
    client_config: Arc<dyn ClientConfig>,
    cache: Arc<ClientCache>,
    retry: Arc<RetryExecutor>,
    registry: Arc<UnitRegistry>,
    coordinator: Arc<ShutdownCoordinator>,
}

impl OperationUnit {
    /// Unit identifier
    pub fn id(&self) -> &str {
        self.tracker.id()
    }

    /// The unit's lifecycle tracker
    pub fn tracker(&self) -> &Arc<UnitTracker> {
        &self.tracker
    }

    /// Execute one request through the full mediation pipeline.
    ///
    /// The handler receives the attempt number and a cached client handle; a
    /// fresh handle is fetched from the cache on every attempt so an
    /// invalidation between attempts takes effect immediately. After an
    /// authentication failure the unit invalidates its cached handle so the
    /// next request re-authenticates.
    pub async fn run<F, Fut>(&self, operation: &str, handler: F) -> ResponseEnvelope
    where
        F: Fn(u32, Arc<MealieClient>) -> Fut + Send + Sync,
        Fut: Future<Output = GatewayResult<Value>> + Send,
    {
        let _guard = match self.tracker.begin_request() {
            Ok(guard) => guard,
            Err(e) => return ResponseEnvelope::failure(operation, &e),
        };

        let cache = &self.cache;
        let client_config = &self.client_config;
        let handler = &handler;

        let result = self
            .retry
            .execute(operation, |attempt| async move {
                let client = cache.get(client_config.as_ref()).await?;
                handler(attempt, client).await
            })
            .await;

        match result {
            Ok(data) => ResponseEnvelope::success(operation, data),
            Err(e) => {
                if matches!(e, GatewayError::Authentication { .. }) {
                    self.cache.invalidate(&self.client_config.config_id());
                }
                ResponseEnvelope::failure(operation, &e)
            }
        }
    }

    /// Drain in-flight requests and tear the unit down.
    ///
    /// Unregisters the unit's shutdown handler and removes it from the
    /// registry; safe to call at most once, later calls drain a closed unit
    /// immediately.
    pub async fn close(&self) -> DrainOutcome {
        let outcome = self.tracker.drain().await;
        self.coordinator.unregister(self.handler_id);
        self.registry.remove(self.tracker.id());
        info!(unit = %self.tracker.id(), clean = outcome.is_clean(), "unit closed");
        outcome
    }
}
