//! Cached authenticated clients with sliding TTL expiration.
//!
//! Building a [`MealieClient`] involves an authentication probe against the
//! remote instance, so handles are cached per configuration identity and
//! reused until they go stale. Expiration is sliding: every successful
//! retrieval refreshes the entry's age.

use crate::client::MealieClient;
use crate::errors::GatewayResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Contract for anything that can identify and build an authenticated client.
///
/// Factories are async and may fail; failures propagate through the cache
/// unchanged (already classified as `Network`/`Authentication` by the client
/// layer).
#[async_trait]
pub trait ClientConfig: Send + Sync {
    /// Stable unique identity for this configuration; the cache key
    fn config_id(&self) -> String;

    /// Build a fresh authenticated client
    async fn create_client(&self) -> GatewayResult<MealieClient>;
}

struct CachedHandle {
    handle: Arc<MealieClient>,
    last_used_at: Instant,
}

/// Cache of authenticated clients keyed by configuration identity.
///
/// At most one entry exists per key. There is no per-key mutual exclusion
/// across a miss: two tasks missing the same key concurrently may both invoke
/// the factory, and the first stored entry wins while the redundant handle is
/// discarded. Handles are stateless from the cache's perspective, so the race
/// wastes one authentication probe and nothing else.
pub struct ClientCache {
    entries: Arc<Mutex<HashMap<String, CachedHandle>>>,
    ttl: Duration,
    max_entries: usize,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ClientCache {
    /// Create a new cache with the given sliding TTL and capacity
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            max_entries: max_entries.max(1),
            sweeper: Mutex::new(None),
        }
    }

    /// Get the cached client for a configuration, building one on a miss.
    ///
    /// A hit within the TTL refreshes the entry's age and returns the shared
    /// handle; a miss (or stale hit) runs the configuration's factory and
    /// stores the result.
    pub async fn get(&self, config: &dyn ClientConfig) -> GatewayResult<Arc<MealieClient>> {
        let key = config.config_id();

        if let Some(handle) = self.lookup(&key) {
            return Ok(handle);
        }

        debug!(config_id = %key, "client cache miss, creating client");
        let handle = Arc::new(config.create_client().await?);

        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get_mut(&key) {
            // Another task stored a fresh handle while our factory ran; use
            // theirs and drop ours.
            Some(entry) if now.duration_since(entry.last_used_at) <= self.ttl => {
                entry.last_used_at = now;
                Ok(entry.handle.clone())
            }
            _ => {
                entries.insert(
                    key,
                    CachedHandle {
                        handle: handle.clone(),
                        last_used_at: now,
                    },
                );
                Self::evict_over_capacity(&mut entries, self.max_entries);
                Ok(handle)
            }
        }
    }

    fn lookup(&self, key: &str) -> Option<Arc<MealieClient>> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key)?;
        if entry.last_used_at.elapsed() > self.ttl {
            // Lazy eviction on access, independent of the sweeper.
            entries.remove(key);
            return None;
        }
        entry.last_used_at = Instant::now();
        Some(entry.handle.clone())
    }

    fn evict_over_capacity(entries: &mut HashMap<String, CachedHandle>, max_entries: usize) {
        while entries.len() > max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    debug!(config_id = %key, "evicting least recently used client");
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Remove the cached client for a configuration identity.
    ///
    /// Returns true if an entry was removed. Callers should invalidate after
    /// an `Authentication` error so the next attempt re-authenticates instead
    /// of reusing a stale handle.
    pub fn invalidate(&self, config_id: &str) -> bool {
        let removed = self.entries.lock().remove(config_id).is_some();
        if removed {
            info!(config_id = %config_id, "invalidated cached client");
        }
        removed
    }

    /// Start the background eviction sweep.
    ///
    /// The sweep evicts entries whose age exceeds the TTL even if `get` is
    /// never called again for their key. Starting an already-running sweeper
    /// is a no-op.
    pub fn start_sweeper(&self, interval: Duration) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return;
        }

        let entries = Arc::clone(&self.entries);
        let ttl = self.ttl;
        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let mut entries = entries.lock();
                let before = entries.len();
                entries.retain(|_, entry| entry.last_used_at.elapsed() <= ttl);
                let evicted = before - entries.len();
                if evicted > 0 {
                    debug!(evicted, "client cache sweep evicted stale entries");
                }
            }
        }));
    }

    /// Stop the sweeper and drop all cached clients; idempotent
    pub fn cleanup(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        let mut entries = self.entries.lock();
        if !entries.is_empty() {
            info!(entries = entries.len(), "clearing client cache");
            entries.clear();
        }
    }

    /// Number of currently cached clients
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when no clients are cached
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Drop for ClientCache {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}
