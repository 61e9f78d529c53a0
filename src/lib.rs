//! # bitnet-scribe
//!
//! 本地 BitNet 推理服务的请求管线：把转录文本或聊天消息变成单一、强类型的结果。
//!
//! Inference and chat request pipeline for a locally hosted BitNet (llama.cpp
//! style) completion server. A speech-to-notes application hands a transcript
//! or a chat message to this crate and gets back exactly one
//! [`ProcessingOutcome`]: success with text, a structured [`ApiError`], or
//! cancellation.
//!
//! ## Core Philosophy
//!
//! - **Values, not panics**: every expected failure is an [`ApiError`] with a
//!   closed [`ErrorKind`]; no service call can take down the caller's thread
//! - **Thin transport**: one network attempt per call, no hidden retries
//! - **Strict extraction**: an ordered field-priority policy, never an empty
//!   string reported as success
//! - **Cooperative cancellation**: checked right before dispatch and right
//!   after the response arrives
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bitnet_scribe::{InferenceConfig, InferenceService, ProcessingOutcome, ProcessingRequest};
//!
//! fn main() -> bitnet_scribe::Result<()> {
//!     let config = InferenceConfig::from_env();
//!     config.validate()?;
//!
//!     let service = InferenceService::new(config)?;
//!     let request = ProcessingRequest::new("so the plan is to ship on friday");
//!
//!     match service.process(&request, None) {
//!         ProcessingOutcome::Success { text, .. } => println!("{text}"),
//!         ProcessingOutcome::Failure { error, .. } => eprintln!("{error}"),
//!         ProcessingOutcome::Cancelled => eprintln!("cancelled"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error_code`] | Closed error taxonomy |
//! | [`error`] | [`ApiError`] and the crate-level [`Error`] |
//! | [`config`] | Endpoint, timeout and sampling configuration |
//! | [`transport`] | Blocking HTTP client for the completion endpoint |
//! | [`extract`] | Field-priority response text extraction |
//! | [`services`] | Single-shot processing and chat services |
//! | [`status`] | Progress notifications for the caller |
//! | [`types`] | Messages, requests and outcomes |

pub mod config;
pub mod error_code;
pub mod extract;
pub mod services;
pub mod status;
pub mod transport;
pub mod types;

pub use config::InferenceConfig;
pub use error_code::ErrorKind;
pub use services::{check_availability, CancelHandle, ChatService, InferenceService};
pub use status::{NoopStatusSink, ProcessingStage, RecordingStatusSink, StatusSink};
pub use transport::{CompletionTransport, HealthStatus, HttpTransport, TransportResult};
pub use types::{ChatMessage, CompletionRequest, MessageRole, ProcessingOutcome, ProcessingRequest};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{ApiError, Error, ErrorContext};
