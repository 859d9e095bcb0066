//! Per-unit request tracking and graceful draining.
//!
//! A processing unit is a configured operation endpoint. Each unit owns a
//! [`UnitTracker`] counting in-flight work; on teardown the tracker drains
//! (waits for active requests to finish) with a bounded backoff schedule
//! before closing. The [`UnitRegistry`] owns all trackers for a gateway and
//! sweeps units that went idle without ever being closed.

use crate::errors::{GatewayError, GatewayResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Maximum accumulated wait while draining before a forced close
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Capped exponential poll schedule while draining (the last step repeats)
const DRAIN_BACKOFF_MS: [u64; 5] = [50, 100, 200, 400, 800];

/// Lifecycle phase of a processing unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPhase {
    /// Accepting and processing requests
    Active,
    /// Close requested, waiting for in-flight requests to finish
    Draining,
    /// Terminal
    Closed,
}

struct UnitInner {
    active_requests: u32,
    total_requests: u64,
    last_activity_at: DateTime<Utc>,
    phase: UnitPhase,
}

/// Point-in-time view of a unit's state
#[derive(Debug, Clone)]
pub struct UnitSnapshot {
    /// Unit identifier
    pub id: String,
    /// Unit kind (e.g. "tool")
    pub kind: String,
    /// Requests currently in flight
    pub active_requests: u32,
    /// Requests admitted since the unit started
    pub total_requests: u64,
    /// When the unit was created
    pub created_at: DateTime<Utc>,
    /// When the unit last admitted a request
    pub last_activity_at: DateTime<Utc>,
    /// Current lifecycle phase
    pub phase: UnitPhase,
}

/// Outcome of a drain pass
#[derive(Debug, Clone, Copy)]
pub struct DrainOutcome {
    /// Requests still active when the unit closed (0 for a clean drain)
    pub residual_active: u32,
    /// Accumulated wait spent draining
    pub elapsed: Duration,
}

impl DrainOutcome {
    /// True when the unit drained with no requests left behind
    pub fn is_clean(&self) -> bool {
        self.residual_active == 0
    }
}

/// Tracks active/total request counts for one processing unit.
///
/// Counters are only mutated through [`begin_request`](Self::begin_request)
/// and the returned guard, so the decrement runs on every exit path,
/// including panics and early returns.
pub struct UnitTracker {
    id: String,
    kind: String,
    created_at: DateTime<Utc>,
    inner: Mutex<UnitInner>,
}

impl UnitTracker {
    /// Create a tracker in the Active phase
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind: kind.into(),
            created_at: now,
            inner: Mutex::new(UnitInner {
                active_requests: 0,
                total_requests: 0,
                last_activity_at: now,
                phase: UnitPhase::Active,
            }),
        }
    }

    /// Unit identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Admit a request, returning a guard that releases it on drop.
    ///
    /// Rejected once the unit has started draining or closed.
    pub fn begin_request(self: &Arc<Self>) -> GatewayResult<RequestGuard> {
        let mut inner = self.inner.lock();
        if inner.phase != UnitPhase::Active {
            return Err(GatewayError::Unknown {
                message: format!("unit {} is no longer accepting requests", self.id),
                status_code: None,
            });
        }
        inner.active_requests += 1;
        inner.total_requests += 1;
        inner.last_activity_at = Utc::now();
        Ok(RequestGuard {
            tracker: Arc::clone(self),
        })
    }

    /// Requests currently in flight
    pub fn active_requests(&self) -> u32 {
        self.inner.lock().active_requests
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> UnitPhase {
        self.inner.lock().phase
    }

    /// Point-in-time snapshot of the unit's state
    pub fn snapshot(&self) -> UnitSnapshot {
        let inner = self.inner.lock();
        UnitSnapshot {
            id: self.id.clone(),
            kind: self.kind.clone(),
            active_requests: inner.active_requests,
            total_requests: inner.total_requests,
            created_at: self.created_at,
            last_activity_at: inner.last_activity_at,
            phase: inner.phase,
        }
    }

    /// Drain the unit: wait for in-flight requests, then close.
    ///
    /// Polls the active count on a capped backoff schedule (50, 100, 200,
    /// 400, 800, 800, ... ms) until it reaches zero or the accumulated wait
    /// hits [`DRAIN_TIMEOUT`]. A forced close with residual requests is a
    /// recorded anomaly, not an error.
    pub async fn drain(&self) -> DrainOutcome {
        {
            let mut inner = self.inner.lock();
            if inner.phase == UnitPhase::Closed {
                return DrainOutcome {
                    residual_active: inner.active_requests,
                    elapsed: Duration::ZERO,
                };
            }
            inner.phase = UnitPhase::Draining;
        }

        let mut elapsed = Duration::ZERO;
        let mut step = 0usize;
        let residual = loop {
            let active = self.active_requests();
            if active == 0 {
                break 0;
            }
            if elapsed >= DRAIN_TIMEOUT {
                warn!(
                    unit = %self.id,
                    residual_active = active,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "unit close forced with requests still active"
                );
                break active;
            }

            let backoff =
                Duration::from_millis(DRAIN_BACKOFF_MS[step.min(DRAIN_BACKOFF_MS.len() - 1)]);
            let wait = backoff.min(DRAIN_TIMEOUT - elapsed);
            sleep(wait).await;
            elapsed += wait;
            step += 1;
        };

        self.inner.lock().phase = UnitPhase::Closed;
        debug!(
            unit = %self.id,
            elapsed_ms = elapsed.as_millis() as u64,
            residual_active = residual,
            "unit closed"
        );

        DrainOutcome {
            residual_active: residual,
            elapsed,
        }
    }

    #[cfg(test)]
    fn set_last_activity(&self, at: DateTime<Utc>) {
        self.inner.lock().last_activity_at = at;
    }
}

/// Releases one active request when dropped
pub struct RequestGuard {
    tracker: Arc<UnitTracker>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let mut inner = self.tracker.inner.lock();
        inner.active_requests = inner.active_requests.saturating_sub(1);
    }
}

/// Registry of all processing units owned by a gateway.
///
/// Explicit state, not a global: each gateway (and each test) constructs its
/// own registry.
pub struct UnitRegistry {
    units: Mutex<HashMap<String, Arc<UnitTracker>>>,
    inactivity_threshold: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl UnitRegistry {
    /// Create a registry with the given stale-unit inactivity threshold
    pub fn new(inactivity_threshold: Duration) -> Arc<Self> {
        Arc::new(Self {
            units: Mutex::new(HashMap::new()),
            inactivity_threshold,
            sweeper: Mutex::new(None),
        })
    }

    /// Create and register a tracker for a unit id.
    ///
    /// Registering an id that is already present replaces the old tracker;
    /// this only happens when a unit was torn down without a clean close.
    pub fn register(&self, id: impl Into<String>, kind: impl Into<String>) -> Arc<UnitTracker> {
        let tracker = Arc::new(UnitTracker::new(id, kind));
        let mut units = self.units.lock();
        if units
            .insert(tracker.id().to_string(), Arc::clone(&tracker))
            .is_some()
        {
            warn!(unit = %tracker.id(), "replacing existing unit registration");
        }
        tracker
    }

    /// Remove a unit from the registry; true if it was present
    pub fn remove(&self, id: &str) -> bool {
        self.units.lock().remove(id).is_some()
    }

    /// Look up a registered unit
    pub fn get(&self, id: &str) -> Option<Arc<UnitTracker>> {
        self.units.lock().get(id).cloned()
    }

    /// Number of registered units
    pub fn len(&self) -> usize {
        self.units.lock().len()
    }

    /// True when no units are registered
    pub fn is_empty(&self) -> bool {
        self.units.lock().is_empty()
    }

    /// Remove units that have been idle past the inactivity threshold.
    ///
    /// A unit is stale when its last activity predates the threshold AND it
    /// has no active requests; busy units are never swept no matter how old
    /// their last admission is. Returns the number of units removed.
    pub fn sweep_stale(&self) -> usize {
        let threshold = match chrono::Duration::from_std(self.inactivity_threshold) {
            Ok(d) => d,
            Err(_) => return 0,
        };
        let cutoff = Utc::now() - threshold;

        let mut units = self.units.lock();
        let before = units.len();
        units.retain(|id, tracker| {
            let snapshot = tracker.snapshot();
            let stale = snapshot.last_activity_at < cutoff && snapshot.active_requests == 0;
            if stale {
                info!(unit = %id, last_activity = %snapshot.last_activity_at, "sweeping stale unit");
            }
            !stale
        });
        before - units.len()
    }

    /// Start the periodic stale-unit sweep
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return;
        }

        let registry = Arc::clone(self);
        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.sweep_stale();
            }
        }));
    }

    /// Drain every registered unit and clear the registry.
    ///
    /// Units drain concurrently; used as the registry's shutdown handler.
    pub async fn close_all(&self) {
        let trackers: Vec<Arc<UnitTracker>> = self.units.lock().values().cloned().collect();
        if trackers.is_empty() {
            return;
        }
        info!(units = trackers.len(), "draining all units");
        futures::future::join_all(trackers.iter().map(|t| t.drain())).await;
        self.units.lock().clear();
    }

    /// Stop the sweeper; idempotent
    pub fn cleanup(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for UnitRegistry {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_releases_on_every_exit_path() {
        let tracker = Arc::new(UnitTracker::new("recipes.get", "tool"));

        {
            let _guard = tracker.begin_request().unwrap();
            assert_eq!(tracker.active_requests(), 1);
        }
        assert_eq!(tracker.active_requests(), 0);

        // Error path: the guard is dropped when the handler bails early.
        let result: GatewayResult<()> = (|| {
            let _guard = tracker.begin_request()?;
            Err(GatewayError::Network {
                message: "boom".to_string(),
                status_code: None,
            })
        })();
        assert!(result.is_err());
        assert_eq!(tracker.active_requests(), 0);
        assert_eq!(tracker.snapshot().total_requests, 2);
    }

    #[tokio::test]
    async fn test_drain_completes_immediately_when_idle() {
        let tracker = Arc::new(UnitTracker::new("recipes.get", "tool"));

        let outcome = tracker.drain().await;

        assert!(outcome.is_clean());
        assert_eq!(outcome.elapsed, Duration::ZERO);
        assert_eq!(tracker.phase(), UnitPhase::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_active_requests() {
        // Scenario: close requested with 2 active requests that finish
        // within 150 ms; the drain should complete around 150 ms elapsed
        // with no forced close.
        let tracker = Arc::new(UnitTracker::new("recipes.list", "tool"));
        let g1 = tracker.begin_request().unwrap();
        let g2 = tracker.begin_request().unwrap();

        let finisher = tokio::spawn(async move {
            sleep(Duration::from_millis(120)).await;
            drop(g1);
            drop(g2);
        });

        let outcome = tracker.drain().await;
        finisher.await.unwrap();

        assert!(outcome.is_clean());
        assert_eq!(outcome.elapsed, Duration::from_millis(150));
        assert_eq!(tracker.phase(), UnitPhase::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_forces_close_after_timeout() {
        // Scenario: one request never completes; the unit closes forcibly
        // at the 5000 ms cap with one residual active request.
        let tracker = Arc::new(UnitTracker::new("recipes.stuck", "tool"));
        let _guard = tracker.begin_request().unwrap();

        let outcome = tracker.drain().await;

        assert_eq!(outcome.residual_active, 1);
        assert_eq!(outcome.elapsed, DRAIN_TIMEOUT);
        assert_eq!(tracker.phase(), UnitPhase::Closed);
    }

    #[tokio::test]
    async fn test_draining_unit_rejects_new_requests() {
        let tracker = Arc::new(UnitTracker::new("recipes.get", "tool"));
        tracker.drain().await;

        let result = tracker.begin_request();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_sweep_removes_idle_stale_unit_only() {
        // Scenario: threshold one hour; a unit idle for two hours with zero
        // active requests is swept, a unit idle for two hours with one
        // active request is kept.
        let registry = UnitRegistry::new(Duration::from_secs(3600));
        let idle = registry.register("idle-unit", "tool");
        let busy = registry.register("busy-unit", "tool");

        let two_hours_ago = Utc::now() - chrono::Duration::hours(2);
        idle.set_last_activity(two_hours_ago);
        let _guard = busy.begin_request().unwrap();
        busy.set_last_activity(two_hours_ago);

        let removed = registry.sweep_stale();

        assert_eq!(removed, 1);
        assert!(registry.get("idle-unit").is_none());
        assert!(registry.get("busy-unit").is_some());
    }

    #[tokio::test]
    async fn test_sweep_keeps_recently_active_units() {
        let registry = UnitRegistry::new(Duration::from_secs(3600));
        let unit = registry.register("fresh-unit", "tool");
        let _ = unit.begin_request().unwrap();

        assert_eq!(registry.sweep_stale(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_all_drains_and_clears() {
        let registry = UnitRegistry::new(Duration::from_secs(3600));
        let a = registry.register("unit-a", "tool");
        registry.register("unit-b", "tool");

        let guard = a.begin_request().unwrap();
        let finisher = tokio::spawn(async move {
            sleep(Duration::from_millis(40)).await;
            drop(guard);
        });

        registry.close_all().await;
        finisher.await.unwrap();

        assert!(registry.is_empty());
        assert_eq!(a.phase(), UnitPhase::Closed);
    }

    #[tokio::test]
    async fn test_registry_replace_and_remove() {
        let registry = UnitRegistry::new(Duration::from_secs(3600));
        let first = registry.register("unit", "tool");
        let second = registry.register("unit", "tool");

        assert_eq!(registry.len(), 1);
        assert!(!Arc::ptr_eq(&first, &second));

        assert!(registry.remove("unit"));
        assert!(!registry.remove("unit"));
    }
}
