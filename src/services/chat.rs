use super::cancel::{CancelFlag, CancelHandle};
use super::inference::log_outcome;
use super::prompt::{chat_context, chat_prompt, CHAT_STOP};
use super::{dispatch, elapsed_ms, guard_panics};
use crate::config::InferenceConfig;
use crate::error::ApiError;
use crate::status::{notify_safely, ProcessingStage, StatusSink};
use crate::transport::{CompletionTransport, HealthStatus, HttpTransport};
use crate::types::{ChatMessage, CompletionRequest, ProcessingOutcome};
use crate::Result;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Multi-turn chat over the completion endpoint.
///
/// The conversation history lives inside the service and is never shared.
/// The user's message is recorded before dispatch, so failed attempts stay
/// visible; the assistant's reply is recorded only on success, and never when
/// the call was cancelled.
pub struct ChatService {
    config: InferenceConfig,
    transport: Arc<dyn CompletionTransport>,
    history: Mutex<Vec<ChatMessage>>,
    cancel: Arc<CancelFlag>,
}

impl ChatService {
    pub fn new(config: InferenceConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: InferenceConfig, transport: Arc<dyn CompletionTransport>) -> Self {
        Self {
            config,
            transport,
            history: Mutex::new(Vec::new()),
            cancel: Arc::new(CancelFlag::default()),
        }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Sends one user message and waits for the reply. Blocking.
    pub fn send_message(&self, message: &str, status: Option<&dyn StatusSink>) -> ProcessingOutcome {
        let start = Instant::now();
        let outcome = guard_panics(start, || self.send_inner(message, status, start));
        log_outcome("chat", &outcome);
        outcome
    }

    fn send_inner(
        &self,
        message: &str,
        status: Option<&dyn StatusSink>,
        start: Instant,
    ) -> ProcessingOutcome {
        if message.trim().is_empty() {
            return ProcessingOutcome::Failure {
                error: ApiError::validation("Empty message"),
                elapsed_ms: elapsed_ms(start),
            };
        }

        notify_safely(status, ProcessingStage::Sending);

        let context = {
            let mut history = self.history();
            history.push(ChatMessage::user(message));
            chat_context(&history)
        };

        let payload = CompletionRequest::from_config(&self.config, chat_prompt(&context, message))
            .stop(CHAT_STOP);

        let outcome = dispatch(
            self.transport.as_ref(),
            &payload,
            &self.cancel,
            status,
            start,
        );
        if let ProcessingOutcome::Success { text, .. } = &outcome {
            self.history().push(ChatMessage::assistant(text.clone()));
            notify_safely(status, ProcessingStage::Complete);
        }
        outcome
    }

    /// Copy of the full history, oldest first.
    pub fn get_history(&self) -> Vec<ChatMessage> {
        self.history().clone()
    }

    pub fn history_len(&self) -> usize {
        self.history().len()
    }

    pub fn clear_history(&self) {
        self.history().clear();
    }

    /// Context rendered from the current history.
    pub fn render_context(&self) -> String {
        chat_context(&self.history())
    }

    pub fn cancel(&self) {
        self.cancel.request();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(self.cancel.clone())
    }

    pub fn check_availability(endpoint_url: &str) -> HealthStatus {
        super::check_availability(endpoint_url)
    }

    pub fn close(&self) {
        self.transport.close();
    }

    fn history(&self) -> MutexGuard<'_, Vec<ChatMessage>> {
        match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_code::ErrorKind;
    use crate::transport::TransportResult;
    use crate::types::MessageRole;
    use serde_json::{json, Map, Value};

    /// Replies with `{"content": "reply-N"}` and records prompts.
    struct EchoTransport {
        prompts: Mutex<Vec<String>>,
    }

    impl CompletionTransport for EchoTransport {
        fn endpoint(&self) -> &str {
            "echo://"
        }
        fn post_completion(&self, payload: &CompletionRequest) -> TransportResult {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(payload.prompt.clone());
            let mut body = Map::new();
            body.insert(
                "content".into(),
                Value::String(format!("reply-{}", prompts.len())),
            );
            TransportResult::success(body, 1.0)
        }
        fn check_health(&self) -> HealthStatus {
            HealthStatus::up()
        }
        fn close(&self) {}
    }

    fn service() -> (ChatService, Arc<EchoTransport>) {
        let transport = Arc::new(EchoTransport {
            prompts: Mutex::new(Vec::new()),
        });
        (
            ChatService::with_transport(InferenceConfig::default(), transport.clone()),
            transport,
        )
    }

    #[test]
    fn test_history_records_both_turns() {
        let (chat, _) = service();
        let outcome = chat.send_message("hello", None);
        assert_eq!(outcome.text(), Some("reply-1"));
        assert_eq!(
            chat.get_history(),
            vec![ChatMessage::user("hello"), ChatMessage::assistant("reply-1")]
        );
    }

    #[test]
    fn test_prompt_context_includes_current_turn() {
        let (chat, transport) = service();
        chat.send_message("first", None);
        chat.send_message("second", None);

        let prompts = transport.prompts.lock().unwrap();
        assert_eq!(
            prompts[0],
            "Conversation history:\nUser: first\n\nUser: first\nAssistant:"
        );
        assert_eq!(
            prompts[1],
            "Conversation history:\nUser: first\nAssistant: reply-1\nUser: second\n\nUser: second\nAssistant:"
        );
    }

    #[test]
    fn test_context_window_counts_current_turn() {
        let (chat, transport) = service();
        for i in 0..6 {
            chat.send_message(&format!("m{}", i), None);
        }

        let prompts = transport.prompts.lock().unwrap();
        let last = &prompts[5];
        assert!(!last.contains("User: m0\n"));
        assert!(last.starts_with("Conversation history:\nAssistant: reply-1\nUser: m1\n"));
        assert!(last.ends_with("Assistant: reply-5\nUser: m5\n\nUser: m5\nAssistant:"));
    }

    #[test]
    fn test_blank_message_leaves_history_alone() {
        let (chat, transport) = service();
        chat.send_message("hi", None);
        let before = chat.history_len();

        let outcome = chat.send_message(" \t\n", None);
        assert_eq!(outcome.error().unwrap().kind(), ErrorKind::ValidationError);
        assert_eq!(chat.history_len(), before);
        assert_eq!(transport.prompts.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_failure_keeps_user_turn_only() {
        struct Failing;
        impl CompletionTransport for Failing {
            fn endpoint(&self) -> &str {
                "fail://"
            }
            fn post_completion(&self, _: &CompletionRequest) -> TransportResult {
                TransportResult::failure(ApiError::new(ErrorKind::ServerError, "HTTP 500"), Some(2.0))
            }
            fn check_health(&self) -> HealthStatus {
                HealthStatus::down("no")
            }
            fn close(&self) {}
        }

        let chat = ChatService::with_transport(InferenceConfig::default(), Arc::new(Failing));
        let outcome = chat.send_message("anyone?", None);
        assert_eq!(outcome.error().unwrap().kind(), ErrorKind::ServerError);
        let history = chat.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::User);
    }

    #[test]
    fn test_clear_history() {
        let (chat, _) = service();
        chat.send_message("a", None);
        chat.clear_history();
        assert_eq!(chat.history_len(), 0);
        assert_eq!(chat.render_context(), super::super::prompt::DEFAULT_CHAT_PREAMBLE);
    }

    #[test]
    fn test_extraction_miss_reports_keys() {
        struct Odd;
        impl CompletionTransport for Odd {
            fn endpoint(&self) -> &str {
                "odd://"
            }
            fn post_completion(&self, _: &CompletionRequest) -> TransportResult {
                let body = json!({"result": "x", "id": 1});
                TransportResult::success(body.as_object().cloned().unwrap(), 1.0)
            }
            fn check_health(&self) -> HealthStatus {
                HealthStatus::up()
            }
            fn close(&self) {}
        }

        let chat = ChatService::with_transport(InferenceConfig::default(), Arc::new(Odd));
        let err = chat.send_message("q", None).into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        let mut keys: Vec<&str> = err.detail("actual_keys").unwrap().as_array().unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["id", "result"]);
        assert_eq!(chat.history_len(), 1);
    }
}
