use crate::error_code::ErrorKind;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Structured error context for setup-time failures (configuration, client construction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.endpoint_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_validator", "http_transport")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Crate-level error for operations that are allowed to fail with `?`:
/// loading configuration, building a transport, and similar setup work.
///
/// Request processing never returns this type; it returns
/// [`ProcessingOutcome`](crate::ProcessingOutcome) carrying an [`ApiError`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Request failed: {0}")]
    Api(#[from] ApiError),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }
}

/// Structured, immutable failure value crossing every service boundary.
///
/// Renders as `[code] message`, with ` | {details}` appended only when the
/// details map is non-empty.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{kind}] {message}{}", render_details(.details))]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    details: Map<String, Value>,
}

fn render_details(details: &Map<String, Value>) -> String {
    if details.is_empty() {
        String::new()
    } else {
        format!(" | {}", Value::Object(details.clone()))
    }
}

impl ApiError {
    /// Creates an error. A blank message is replaced by the kind's code
    /// in words so the message is never empty.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            kind.code().replace('_', " ")
        } else {
            message
        };
        Self {
            kind,
            message,
            details: Map::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Cancelled by user")
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details.extend(details);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    /// JSON-safe `{code, message, details}`; `details` is `{}` when empty.
    pub fn to_mapping(&self) -> Value {
        json!({
            "code": self.kind.code(),
            "message": self.message,
            "details": Value::Object(self.details.clone()),
        })
    }

    /// Rebuilds an error from the output of [`ApiError::to_mapping`].
    pub fn from_mapping(value: &Value) -> crate::Result<Self> {
        #[derive(Deserialize)]
        struct Raw {
            code: String,
            message: String,
            #[serde(default)]
            details: Option<Map<String, Value>>,
        }

        let raw = Raw::deserialize(value)?;
        let kind = ErrorKind::from_code(&raw.code).ok_or_else(|| {
            Error::validation_with_context(
                format!("unknown error code: {}", raw.code),
                ErrorContext::new()
                    .with_field_path("code")
                    .with_source("api_error_mapping"),
            )
        })?;
        Ok(Self::new(kind, raw.message).with_details(raw.details.unwrap_or_default()))
    }
}
