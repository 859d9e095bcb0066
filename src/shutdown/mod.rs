//! Once-only shutdown coordination.
//!
//! A [`ShutdownCoordinator`] is an explicitly constructed registry of named
//! cleanup callbacks. It runs them exactly once per coordinator lifetime,
//! concurrently, under a global timeout. Components register their cleanup at
//! construction time (the client cache, every processing unit) and the
//! embedding process triggers the pass on termination signals or fatal
//! errors.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default global timeout for a shutdown pass
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(5000);

type ShutdownCallback = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Opaque identifier returned by [`ShutdownCoordinator::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

/// Why shutdown was triggered
#[derive(Debug, Clone)]
pub enum ShutdownReason {
    /// A termination signal was received
    Signal(&'static str),
    /// A fatal error occurred; the process should exit non-zero
    Fatal(String),
    /// An orderly shutdown was requested programmatically
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "signal {}", name),
            ShutdownReason::Fatal(message) => write!(f, "fatal error: {}", message),
            ShutdownReason::Requested => write!(f, "requested"),
        }
    }
}

struct RegisteredHandler {
    id: u64,
    name: String,
    callback: ShutdownCallback,
}

/// Registry of cleanup callbacks with once-only execution.
///
/// Instances are independent: tests construct as many coordinators as they
/// need without any process-global state. The embedding application is
/// expected to hold one in an `Arc` and share it with every component that
/// owns resources.
pub struct ShutdownCoordinator {
    handlers: Mutex<Vec<RegisteredHandler>>,
    next_id: AtomicU64,
    fired: AtomicBool,
    hooks_installed: AtomicBool,
    exit_code: AtomicI32,
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a coordinator with the default 5000 ms handler timeout
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Create a coordinator with a custom handler timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            fired: AtomicBool::new(false),
            hooks_installed: AtomicBool::new(false),
            exit_code: AtomicI32::new(0),
            timeout,
        }
    }

    /// Register a named cleanup callback.
    ///
    /// Signal hooks are installed on the first registration (when a tokio
    /// runtime is available), regardless of how many handlers follow.
    pub fn register<F, Fut>(self: &Arc<Self>, name: impl Into<String>, callback: F) -> HandlerId
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handler = RegisteredHandler {
            id,
            name: name.into(),
            callback: Box::new(move || Box::pin(callback())),
        };
        self.handlers.lock().push(handler);

        if tokio::runtime::Handle::try_current().is_ok() {
            self.install_signal_hooks();
        }

        HandlerId(id)
    }

    /// Remove a previously registered callback; a no-op for unknown ids
    pub fn unregister(&self, id: HandlerId) {
        self.handlers.lock().retain(|h| h.id != id.0);
    }

    /// Number of currently registered handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Whether a shutdown pass has already run (or is running)
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Exit status for the process: 0 for graceful, non-zero for fatal
    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::SeqCst)
    }

    /// Run all registered handlers exactly once.
    ///
    /// Handlers run concurrently; the pass waits for them to settle or for
    /// the global timeout, whichever comes first. Handlers that exceed the
    /// timeout are abandoned and reported. A second or concurrent trigger is
    /// a no-op.
    pub async fn trigger_shutdown(&self, reason: ShutdownReason) {
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!(reason = %reason, "shutdown already triggered, ignoring");
            return;
        }

        if let ShutdownReason::Fatal(_) = reason {
            self.exit_code.store(1, Ordering::SeqCst);
        }

        let handlers = std::mem::take(&mut *self.handlers.lock());
        info!(
            reason = %reason,
            handlers = handlers.len(),
            "shutdown triggered, running cleanup handlers"
        );

        let deadline = tokio::time::Instant::now() + self.timeout;
        let tasks: Vec<(String, tokio::task::JoinHandle<()>)> = handlers
            .into_iter()
            .map(|h| {
                let fut = (h.callback)();
                (h.name, tokio::spawn(fut))
            })
            .collect();

        for (name, task) in tasks {
            match tokio::time::timeout_at(deadline, task).await {
                Ok(Ok(())) => debug!(handler = %name, "shutdown handler completed"),
                Ok(Err(e)) => warn!(handler = %name, error = %e, "shutdown handler failed"),
                Err(_) => warn!(
                    handler = %name,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "shutdown handler exceeded timeout, abandoned"
                ),
            }
        }

        info!("shutdown pass complete");
    }

    /// Convenience for fatal conditions: trigger shutdown with exit code 1
    pub async fn fatal(&self, message: impl Into<String>) {
        self.trigger_shutdown(ShutdownReason::Fatal(message.into()))
            .await;
    }

    /// Install SIGINT/SIGTERM listeners that trigger shutdown.
    ///
    /// Installed at most once per coordinator; later calls are no-ops. Must
    /// run inside a tokio runtime.
    pub fn install_signal_hooks(self: &Arc<Self>) {
        if self.hooks_installed.swap(true, Ordering::SeqCst) {
            return;
        }

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = match signal(SignalKind::terminate()) {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(error = %e, "failed to install SIGTERM hook");
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        coordinator
                            .trigger_shutdown(ShutdownReason::Signal("SIGINT"))
                            .await;
                    }
                    _ = sigterm.recv() => {
                        coordinator
                            .trigger_shutdown(ShutdownReason::Signal("SIGTERM"))
                            .await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                if tokio::signal::ctrl_c().await.is_ok() {
                    coordinator
                        .trigger_shutdown(ShutdownReason::Signal("SIGINT"))
                        .await;
                }
            }
        });
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio::time::sleep;

    fn coordinator(timeout: Duration) -> Arc<ShutdownCoordinator> {
        Arc::new(ShutdownCoordinator::with_timeout(timeout))
    }

    #[tokio::test]
    async fn test_handlers_run_once_on_sequential_triggers() {
        let coord = coordinator(Duration::from_secs(5));
        let runs = Arc::new(AtomicU32::new(0));

        let runs_in = runs.clone();
        coord.register("cache", move || {
            let runs = runs_in.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        coord.trigger_shutdown(ShutdownReason::Requested).await;
        coord.trigger_shutdown(ShutdownReason::Requested).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(coord.has_fired());
    }

    #[tokio::test]
    async fn test_handlers_run_once_on_concurrent_triggers() {
        let coord = coordinator(Duration::from_secs(5));
        let runs = Arc::new(AtomicU32::new(0));

        let runs_in = runs.clone();
        coord.register("registry", move || {
            let runs = runs_in.clone();
            async move {
                sleep(Duration::from_millis(10)).await;
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        let a = coord.trigger_shutdown(ShutdownReason::Requested);
        let b = coord.trigger_shutdown(ShutdownReason::Signal("SIGTERM"));
        futures::join!(a, b);

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_abandoned_after_timeout() {
        let coord = coordinator(Duration::from_millis(5000));
        let fast_done = Arc::new(AtomicBool::new(false));
        let slow_done = Arc::new(AtomicBool::new(false));

        let fast = fast_done.clone();
        coord.register("fast", move || {
            let fast = fast.clone();
            async move {
                sleep(Duration::from_millis(50)).await;
                fast.store(true, Ordering::SeqCst);
            }
        });

        let slow = slow_done.clone();
        coord.register("slow", move || {
            let slow = slow.clone();
            async move {
                sleep(Duration::from_secs(60)).await;
                slow.store(true, Ordering::SeqCst);
            }
        });

        let started = tokio::time::Instant::now();
        coord.trigger_shutdown(ShutdownReason::Requested).await;

        assert!(fast_done.load(Ordering::SeqCst));
        assert!(!slow_done.load(Ordering::SeqCst));
        assert!(started.elapsed() <= Duration::from_millis(5100));
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_block_others() {
        let coord = coordinator(Duration::from_secs(5));
        let survivor_ran = Arc::new(AtomicBool::new(false));

        coord.register("panicky", || async {
            panic!("handler blew up");
        });

        let survivor = survivor_ran.clone();
        coord.register("survivor", move || {
            let survivor = survivor.clone();
            async move {
                survivor.store(true, Ordering::SeqCst);
            }
        });

        coord.trigger_shutdown(ShutdownReason::Requested).await;
        assert!(survivor_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unregister_removes_handler() {
        let coord = coordinator(Duration::from_secs(5));
        let runs = Arc::new(AtomicU32::new(0));

        let runs_in = runs.clone();
        let id = coord.register("unit:recipes", move || {
            let runs = runs_in.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(coord.handler_count(), 1);

        coord.unregister(id);
        assert_eq!(coord.handler_count(), 0);

        coord.trigger_shutdown(ShutdownReason::Requested).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exit_code_reflects_reason() {
        let graceful = coordinator(Duration::from_secs(5));
        graceful.trigger_shutdown(ShutdownReason::Requested).await;
        assert_eq!(graceful.exit_code(), 0);

        let fatal = coordinator(Duration::from_secs(5));
        fatal.fatal("unrecoverable state").await;
        assert_eq!(fatal.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_instances_are_independent() {
        let a = coordinator(Duration::from_secs(5));
        let b = coordinator(Duration::from_secs(5));
        let b_runs = Arc::new(AtomicU32::new(0));

        let runs = b_runs.clone();
        b.register("b-handler", move || {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        a.trigger_shutdown(ShutdownReason::Requested).await;
        assert!(!b.has_fired());
        assert_eq!(b_runs.load(Ordering::SeqCst), 0);

        b.trigger_shutdown(ShutdownReason::Requested).await;
        assert_eq!(b_runs.load(Ordering::SeqCst), 1);
    }
}
