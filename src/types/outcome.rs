use crate::error::ApiError;

/// Terminal result of one `process` / `send_message` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    Success { text: String, elapsed_ms: f64 },
    Failure { error: ApiError, elapsed_ms: f64 },
    Cancelled,
}

impl ProcessingOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Failure { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Time from call entry to outcome construction. `None` for `Cancelled`.
    pub fn elapsed_ms(&self) -> Option<f64> {
        match self {
            Self::Success { elapsed_ms, .. } | Self::Failure { elapsed_ms, .. } => {
                Some(*elapsed_ms)
            }
            Self::Cancelled => None,
        }
    }

    /// Flattens the outcome for `?`-style callers; `Cancelled` becomes a `cancelled` error.
    pub fn into_result(self) -> Result<String, ApiError> {
        match self {
            Self::Success { text, .. } => Ok(text),
            Self::Failure { error, .. } => Err(error),
            Self::Cancelled => Err(ApiError::cancelled()),
        }
    }
}
