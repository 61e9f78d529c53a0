//! Response text extraction with an ordered field-priority policy.
//!
//! Inference servers disagree on where the generated text lives. The policy,
//! first match wins:
//!
//! 1. top-level [`RESPONSE_FIELD_PRIORITY`] fields, in order
//! 2. OpenAI-style `choices[0].text`, then `choices[0].message.content`
//! 3. otherwise [`Extraction::NotFound`] carrying the keys that were present
//!
//! Only JSON strings count. Fields that are present but blank after trimming
//! are skipped, and non-string values are never stringified.

use crate::error::ApiError;
use crate::error_code::ErrorKind;
use serde_json::{Map, Value};

/// Top-level fields tried in order.
pub const RESPONSE_FIELD_PRIORITY: [&str; 4] = ["content", "text", "completion", "generated_text"];

/// Tagged result of applying the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Text(String),
    NotFound { actual_keys: Vec<String> },
}

/// Applies the field-priority policy to a decoded response body.
pub fn extract(payload: &Map<String, Value>) -> Extraction {
    for field in RESPONSE_FIELD_PRIORITY {
        if let Some(text) = payload.get(field).and_then(non_blank) {
            return Extraction::Text(text);
        }
    }

    if let Some(text) = first_choice_text(payload) {
        return Extraction::Text(text);
    }

    Extraction::NotFound {
        actual_keys: payload.keys().cloned().collect(),
    }
}

/// Like [`extract`], but a miss becomes an `invalid_response` error whose
/// message lists the attempted fields and whose details hold `actual_keys`.
pub fn extract_text(payload: &Map<String, Value>) -> Result<String, ApiError> {
    match extract(payload) {
        Extraction::Text(text) => Ok(text),
        Extraction::NotFound { actual_keys } => Err(ApiError::new(
            ErrorKind::InvalidResponse,
            format!(
                "API response missing expected fields: {}, choices[0].text, choices[0].message.content",
                RESPONSE_FIELD_PRIORITY.join(", ")
            ),
        )
        .with_detail("actual_keys", actual_keys)),
    }
}

fn first_choice_text(payload: &Map<String, Value>) -> Option<String> {
    let choice = payload.get("choices")?.as_array()?.first()?;
    choice.get("text").and_then(non_blank).or_else(|| {
        choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(non_blank)
    })
}

fn non_blank(value: &Value) -> Option<String> {
    let trimmed = value.as_str()?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
