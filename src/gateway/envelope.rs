//! Response envelope returned at every unit boundary.

use crate::errors::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boundary output of a processing unit.
///
/// A unit never raises past its own boundary: every outcome, success or
/// failure, becomes an envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEnvelope {
    /// Whether the operation succeeded
    pub success: bool,
    /// Name of the operation that produced this envelope
    pub operation: String,
    /// Operation result on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Typed error on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

/// Typed error carried by a failure envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvelopeError {
    /// Human-readable error message
    pub message: String,
    /// Stable machine-readable code
    pub code: String,
    /// Structured details, when the error carries any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ResponseEnvelope {
    /// Build a success envelope
    pub fn success(operation: impl Into<String>, data: Value) -> Self {
        Self {
            success: true,
            operation: operation.into(),
            data: Some(data),
            error: None,
        }
    }

    /// Build a failure envelope from a classified error
    pub fn failure(operation: impl Into<String>, error: &GatewayError) -> Self {
        Self {
            success: false,
            operation: operation.into(),
            data: None,
            error: Some(EnvelopeError::from(error)),
        }
    }
}

impl From<&GatewayError> for EnvelopeError {
    fn from(error: &GatewayError) -> Self {
        Self {
            message: error.to_string(),
            code: error.code().to_string(),
            details: error.details(),
        }
    }
}
