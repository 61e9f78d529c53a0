//! Request services: single-shot transcript processing and multi-turn chat.
//!
//! Both follow the same per-call state machine:
//!
//! ```text
//! Idle -> Validating -> Sending -> AwaitingResponse -> Completed | Failed | Cancelled
//! ```
//!
//! Calls are blocking; run them on a worker thread. Each service supports one
//! in-flight call plus `cancel()` from any other thread. Expected failures are
//! returned as [`ProcessingOutcome::Failure`]; a panic inside a call is caught
//! and reported as an `unknown` failure.

pub mod cancel;
pub mod chat;
pub mod inference;
pub mod prompt;

pub use cancel::CancelHandle;
pub use chat::ChatService;
pub use inference::InferenceService;

use crate::config::InferenceConfig;
use crate::error::ApiError;
use crate::error_code::ErrorKind;
use crate::extract::extract_text;
use crate::status::{notify_safely, ProcessingStage, StatusSink};
use crate::transport::{CompletionTransport, HealthStatus, HttpTransport};
use crate::types::{CompletionRequest, ProcessingOutcome};
use cancel::CancelFlag;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::debug;

/// Probes `endpoint_url` with a throwaway transport and releases it.
///
/// Touches no service state; an unparsable endpoint is reported as unavailable.
pub fn check_availability(endpoint_url: &str) -> HealthStatus {
    let transport = match HttpTransport::new(&InferenceConfig::for_endpoint(endpoint_url)) {
        Ok(t) => t,
        Err(e) => return HealthStatus::down(format!("Invalid endpoint: {}", e)),
    };
    let status = transport.check_health();
    transport.close();
    status
}

/// Checkpoint (a), dispatch, checkpoint (b), then outcome mapping.
///
/// Emits `Awaiting` right before the network call. `Complete` is left to the
/// caller so it can commit side effects first.
pub(crate) fn dispatch(
    transport: &dyn CompletionTransport,
    payload: &CompletionRequest,
    cancel: &CancelFlag,
    status: Option<&dyn StatusSink>,
    start: Instant,
) -> ProcessingOutcome {
    if cancel.take() {
        debug!("cancelled before dispatch");
        return ProcessingOutcome::Cancelled;
    }

    notify_safely(status, ProcessingStage::Awaiting);
    let result = transport.post_completion(payload);

    if cancel.take() {
        debug!(
            discarded_success = result.succeeded(),
            "cancelled while awaiting response"
        );
        return ProcessingOutcome::Cancelled;
    }

    let outcome = result.into_outcome().and_then(|body| extract_text(&body));
    match outcome {
        Ok(text) => ProcessingOutcome::Success {
            text,
            elapsed_ms: elapsed_ms(start),
        },
        Err(error) => ProcessingOutcome::Failure {
            error,
            elapsed_ms: elapsed_ms(start),
        },
    }
}

/// Runs `f`, turning a panic into an `unknown` failure.
pub(crate) fn guard_panics(start: Instant, f: impl FnOnce() -> ProcessingOutcome) -> ProcessingOutcome {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(panic = message.as_str(), "request panicked");
            ProcessingOutcome::Failure {
                error: ApiError::new(ErrorKind::Unknown, format!("Unexpected error: {}", message))
                    .with_detail("exception_type", "panic"),
                elapsed_ms: elapsed_ms(start),
            }
        }
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_panics_reports_unknown() {
        let outcome = guard_panics(Instant::now(), || panic!("boom"));
        let err = outcome.error().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.message().contains("boom"));
        assert_eq!(err.detail("exception_type").unwrap(), "panic");
    }

    #[test]
    fn test_availability_rejects_bad_endpoint() {
        let status = check_availability("not a url");
        assert!(!status.available);
        assert!(status.message.unwrap().starts_with("Invalid endpoint"));
    }
}
