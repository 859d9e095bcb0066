//! Error types for the Mealie gateway.
//!
//! Every failure that crosses a component boundary is expressed as a
//! [`GatewayError`]. Raw transport and protocol failures are classified into
//! the taxonomy before they are visible past the retry layer.

mod error;

pub use error::{GatewayError, GatewayResult};
