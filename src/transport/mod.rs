//! 传输层：与推理端点交互的唯一 HTTP 通道。
//!
//! Transport layer: the single point of HTTP interaction with the inference endpoint.
//!
//! [`HttpTransport`] is the production implementation. Services depend on the
//! [`CompletionTransport`] trait so tests (and embedders) can substitute their own.

pub mod http;

pub use http::HttpTransport;

use crate::error::ApiError;
use crate::types::request::CompletionRequest;
use serde_json::{Map, Value};

/// Outcome of one completion call: exactly one of payload or error, plus latency.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResult {
    outcome: Result<Map<String, Value>, ApiError>,
    latency_ms: Option<f64>,
}

impl TransportResult {
    pub fn success(payload: Map<String, Value>, latency_ms: f64) -> Self {
        Self {
            outcome: Ok(payload),
            latency_ms: Some(latency_ms),
        }
    }

    pub fn failure(error: ApiError, latency_ms: Option<f64>) -> Self {
        Self {
            outcome: Err(error),
            latency_ms,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn payload(&self) -> Option<&Map<String, Value>> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ApiError> {
        self.outcome.as_ref().err()
    }

    /// Wall time from dispatch to response receipt, when a response (or timeout) was observed.
    pub fn latency_ms(&self) -> Option<f64> {
        self.latency_ms
    }

    pub fn into_outcome(self) -> Result<Map<String, Value>, ApiError> {
        self.outcome
    }
}

/// Result of a health probe. Probes never fail; every failure mode becomes `available: false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub available: bool,
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn up() -> Self {
        Self {
            available: true,
            message: None,
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: Some(message.into()),
        }
    }
}

impl From<HealthStatus> for (bool, Option<String>) {
    fn from(status: HealthStatus) -> Self {
        (status.available, status.message)
    }
}

/// Completion endpoint seam used by the request services.
///
/// Implementations perform exactly one network attempt per call and report
/// every failure inside the returned value.
pub trait CompletionTransport: Send + Sync {
    /// Endpoint URL this transport talks to.
    fn endpoint(&self) -> &str;

    fn post_completion(&self, payload: &CompletionRequest) -> TransportResult;

    fn check_health(&self) -> HealthStatus;

    /// Releases pooled connections. Safe to call more than once.
    fn close(&self);
}

/// Setup-time transport failures (bad endpoint or timeout, building the HTTP client).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP client build failed: {0}")]
    Build(#[from] reqwest::Error),

    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Invalid timeout {secs}s: must be a positive, finite number of seconds")]
    InvalidTimeout { secs: f64 },
}
