use super::cancel::{CancelFlag, CancelHandle};
use super::prompt::{processing_prompt, PROCESSING_STOP};
use super::{dispatch, elapsed_ms, guard_panics};
use crate::config::InferenceConfig;
use crate::error::ApiError;
use crate::status::{notify_safely, ProcessingStage, StatusSink};
use crate::transport::{CompletionTransport, HealthStatus, HttpTransport};
use crate::types::{CompletionRequest, ProcessingOutcome, ProcessingRequest};
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Single-shot transcript processing (e.g., "turn this transcript into notes").
pub struct InferenceService {
    config: InferenceConfig,
    transport: Arc<dyn CompletionTransport>,
    cancel: Arc<CancelFlag>,
}

impl InferenceService {
    /// Builds a service with its own HTTP transport for `config.endpoint_url`.
    pub fn new(config: InferenceConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: InferenceConfig, transport: Arc<dyn CompletionTransport>) -> Self {
        Self {
            config,
            transport,
            cancel: Arc::new(CancelFlag::default()),
        }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Processes one request. Blocking; never panics and never returns an
    /// error for expected failure modes.
    pub fn process(
        &self,
        request: &ProcessingRequest,
        status: Option<&dyn StatusSink>,
    ) -> ProcessingOutcome {
        let start = Instant::now();
        let outcome = guard_panics(start, || self.process_inner(request, status, start));
        log_outcome("process", &outcome);
        outcome
    }

    fn process_inner(
        &self,
        request: &ProcessingRequest,
        status: Option<&dyn StatusSink>,
        start: Instant,
    ) -> ProcessingOutcome {
        if let Err(reason) = request.validate() {
            return ProcessingOutcome::Failure {
                error: ApiError::validation(format!("Invalid request: {}", reason)),
                elapsed_ms: elapsed_ms(start),
            };
        }

        notify_safely(status, ProcessingStage::Sending);

        let prompt = processing_prompt(
            &self.config.system_prompt,
            request.custom_prompt.as_deref(),
            &request.transcript,
        );
        let payload = CompletionRequest::from_config(&self.config, prompt)
            .n_predict(request.max_tokens.unwrap_or(self.config.max_tokens))
            .temperature(request.temperature.unwrap_or(self.config.temperature))
            .stop(PROCESSING_STOP);

        let outcome = dispatch(
            self.transport.as_ref(),
            &payload,
            &self.cancel,
            status,
            start,
        );
        if outcome.is_success() {
            notify_safely(status, ProcessingStage::Complete);
        }
        outcome
    }

    /// Requests cancellation of the current (or next) call.
    pub fn cancel(&self) {
        self.cancel.request();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(self.cancel.clone())
    }

    /// Stateless probe of an arbitrary endpoint; see [`super::check_availability`].
    pub fn check_availability(endpoint_url: &str) -> HealthStatus {
        super::check_availability(endpoint_url)
    }

    /// Releases the transport's connections. Idempotent.
    pub fn close(&self) {
        self.transport.close();
    }
}

pub(crate) fn log_outcome(operation: &'static str, outcome: &ProcessingOutcome) {
    match outcome {
        ProcessingOutcome::Success { text, elapsed_ms } => info!(
            operation,
            elapsed_ms,
            chars = text.chars().count(),
            "request completed"
        ),
        ProcessingOutcome::Failure { error, elapsed_ms } => info!(
            operation,
            elapsed_ms,
            error_code = error.code(),
            message = error.message(),
            "request failed"
        ),
        ProcessingOutcome::Cancelled => info!(operation, "request cancelled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_code::ErrorKind;
    use crate::status::RecordingStatusSink;
    use crate::transport::TransportResult;
    use serde_json::{json, Map, Value};
    use std::sync::Mutex;

    /// Returns a fixed result and records every payload it receives.
    struct StubTransport {
        reply: TransportResult,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl StubTransport {
        fn replying(body: Value) -> Arc<Self> {
            let map: Map<String, Value> = body.as_object().cloned().unwrap();
            Arc::new(Self {
                reply: TransportResult::success(map, 3.0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl CompletionTransport for StubTransport {
        fn endpoint(&self) -> &str {
            "stub://"
        }
        fn post_completion(&self, payload: &CompletionRequest) -> TransportResult {
            self.seen.lock().unwrap().push(payload.clone());
            self.reply.clone()
        }
        fn check_health(&self) -> HealthStatus {
            HealthStatus::up()
        }
        fn close(&self) {}
    }

    #[test]
    fn test_payload_uses_request_overrides() {
        let stub = StubTransport::replying(json!({"content": "notes"}));
        let service = InferenceService::with_transport(InferenceConfig::default(), stub.clone());

        let req = ProcessingRequest::new("the transcript")
            .custom_prompt("Summarize:")
            .max_tokens(99)
            .temperature(0.1);
        let outcome = service.process(&req, None);
        assert_eq!(outcome.text(), Some("notes"));

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].n_predict, 99);
        assert_eq!(seen[0].temperature, 0.1);
        assert!(seen[0].prompt.ends_with("Summarize:\n\nTranscript:\nthe transcript"));
        assert_eq!(seen[0].stop, PROCESSING_STOP.map(String::from).to_vec());
        assert!(!seen[0].stream);
    }

    #[test]
    fn test_invalid_request_never_dispatches() {
        let stub = StubTransport::replying(json!({"content": "x"}));
        let service = InferenceService::with_transport(InferenceConfig::default(), stub.clone());
        let sink = RecordingStatusSink::new();

        let outcome = service.process(&ProcessingRequest::new("   "), Some(&sink));
        assert_eq!(outcome.error().unwrap().kind(), ErrorKind::ValidationError);
        assert!(outcome.error().unwrap().message().starts_with("Invalid request:"));
        assert!(stub.seen.lock().unwrap().is_empty());
        assert!(sink.stages().is_empty());
    }

    #[test]
    fn test_status_milestones_on_success() {
        let stub = StubTransport::replying(json!({"text": "ok"}));
        let service = InferenceService::with_transport(InferenceConfig::default(), stub);
        let sink = RecordingStatusSink::new();

        service.process(&ProcessingRequest::new("t"), Some(&sink));
        assert_eq!(
            sink.stages(),
            vec![
                ProcessingStage::Sending,
                ProcessingStage::Awaiting,
                ProcessingStage::Complete
            ]
        );
    }

    #[test]
    fn test_cancel_before_dispatch_is_consumed() {
        let stub = StubTransport::replying(json!({"content": "x"}));
        let service = InferenceService::with_transport(InferenceConfig::default(), stub.clone());

        service.cancel();
        assert!(service.process(&ProcessingRequest::new("t"), None).is_cancelled());
        assert!(stub.seen.lock().unwrap().is_empty());

        assert!(service.process(&ProcessingRequest::new("t"), None).is_success());
    }

    #[test]
    fn test_extraction_failure_is_invalid_response() {
        let stub = StubTransport::replying(json!({"tokens_predicted": 10}));
        let service = InferenceService::with_transport(InferenceConfig::default(), stub);
        let outcome = service.process(&ProcessingRequest::new("t"), None);
        let err = outcome.error().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert_eq!(err.detail("actual_keys").unwrap(), &json!(["tokens_predicted"]));
    }
}
