//! 错误分类：定义推理管线的七种封闭错误类型。
//!
//! Machine-readable error kinds for the inference pipeline.
//!
//! The set is closed: every failure that crosses a service boundary carries
//! exactly one of these kinds inside an [`ApiError`](crate::ApiError).
//!
//! | Code               | Category    | Retryable |
//! |--------------------|-------------|-----------|
//! | `network_error`    | transport   | yes       |
//! | `timeout`          | transport   | yes       |
//! | `server_error`     | server      | yes       |
//! | `invalid_response` | server      | no        |
//! | `validation_error` | client      | no        |
//! | `cancelled`        | operational | no        |
//! | `unknown`          | unknown     | no        |
//!
//! ## Example
//!
//! ```rust
//! use bitnet_scribe::error_code::ErrorKind;
//!
//! let kind = ErrorKind::from_code("server_error").unwrap();
//! assert_eq!(kind, ErrorKind::ServerError);
//! assert!(kind.retryable());
//! assert_eq!(kind.category(), "server");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed classification of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The endpoint could not be reached (refused, DNS, unreachable)
    NetworkError,
    /// The request exceeded the configured transport timeout
    Timeout,
    /// The server answered but the body was not usable
    InvalidResponse,
    /// The request was rejected before any network I/O
    ValidationError,
    /// The caller cancelled the request
    Cancelled,
    /// The server answered with a non-200 status
    ServerError,
    /// Anything that could not be classified
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        Self::NetworkError,
        Self::Timeout,
        Self::InvalidResponse,
        Self::ValidationError,
        Self::Cancelled,
        Self::ServerError,
        Self::Unknown,
    ];

    /// Returns the wire code (e.g., `"network_error"`).
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::InvalidResponse => "invalid_response",
            Self::ValidationError => "validation_error",
            Self::Cancelled => "cancelled",
            Self::ServerError => "server_error",
            Self::Unknown => "unknown",
        }
    }

    /// Whether a caller-side retry policy may reasonably try again.
    ///
    /// The pipeline itself never retries; this is a hint for the layer above.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Timeout | Self::ServerError)
    }

    /// Returns the category: `"client"`, `"transport"`, `"server"`, `"operational"`, or `"unknown"`.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::ValidationError => "client",
            Self::NetworkError | Self::Timeout => "transport",
            Self::ServerError | Self::InvalidResponse => "server",
            Self::Cancelled => "operational",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a wire code back into a kind. Unrecognized codes return `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.code() == code)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
