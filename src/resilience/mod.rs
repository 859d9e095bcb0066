//! Resilience patterns for remote calls.
//!
//! Transient failures (network faults, rate limits, 5xx) are retried with
//! exponential backoff; non-transient failures fail fast. The retry verdict
//! comes from the error taxonomy in [`crate::errors`].

mod retry;

pub use retry::{RetryConfig, RetryExecutor};
