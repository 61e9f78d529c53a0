//! # Types Module
//!
//! Value types shared by the transport and the request services.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChatMessage`] | One entry of a chat conversation |
//! | [`MessageRole`] | `user` or `assistant` |
//! | [`ProcessingRequest`] | Caller input for single-shot transcript processing |
//! | [`CompletionRequest`] | Wire body sent to the completion endpoint |
//! | [`ProcessingOutcome`] | Terminal result of one service call |
//!
//! ## Example
//!
//! ```rust
//! use bitnet_scribe::types::{ChatMessage, ProcessingRequest};
//!
//! let request = ProcessingRequest::new("we agreed to ship on friday")
//!     .custom_prompt("List the decisions:")
//!     .max_tokens(128);
//! assert!(request.validate().is_ok());
//!
//! let msg = ChatMessage::user("hello");
//! assert_eq!(msg.render(), "User: hello");
//! ```

pub mod message;
pub mod outcome;
pub mod request;

pub use message::{ChatMessage, MessageRole};
pub use outcome::ProcessingOutcome;
pub use request::{CompletionRequest, ProcessingRequest};
