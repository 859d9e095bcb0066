//! HTTP transport layer.
//!
//! The [`HttpTransport`] trait is the seam between the gateway and the wire;
//! the reqwest implementation classifies HTTP failures into the
//! [`GatewayError`](crate::errors::GatewayError) taxonomy before they leave
//! this module.

mod http_transport;

pub use http_transport::{HttpTransport, ReqwestTransport};
