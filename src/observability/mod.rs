//! Structured logging for the gateway.
//!
//! Every component logs through the `tracing` crate; this module owns the
//! subscriber setup. Retries, cache evictions, forced unit closes and
//! shutdown progress all surface here rather than through a separate metrics
//! layer.

mod logging;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
