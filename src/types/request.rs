use crate::config::{InferenceConfig, MAX_TOKENS_LIMIT};
use serde::{Deserialize, Serialize};

/// Longest transcript accepted for single-shot processing, in characters.
pub const MAX_TRANSCRIPT_CHARS: usize = 100_000;

/// Caller input for single-shot processing.
///
/// `None` fields fall back to the service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRequest {
    pub transcript: String,
    pub custom_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl ProcessingRequest {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            ..Self::default()
        }
    }

    pub fn custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_prompt = Some(prompt.into());
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Request-level constraints. The error is a human-readable reason.
    pub fn validate(&self) -> Result<(), String> {
        if self.transcript.trim().is_empty() {
            return Err("transcript is empty".to_string());
        }
        let chars = self.transcript.chars().count();
        if chars > MAX_TRANSCRIPT_CHARS {
            return Err(format!(
                "transcript is too long ({} characters, limit {})",
                chars, MAX_TRANSCRIPT_CHARS
            ));
        }
        if let Some(max) = self.max_tokens {
            if max == 0 || max > MAX_TOKENS_LIMIT {
                return Err(format!(
                    "max_tokens must be within 1..={} (got {})",
                    MAX_TOKENS_LIMIT, max
                ));
            }
        }
        if let Some(temp) = self.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(format!("temperature must be within 0..=2 (got {})", temp));
            }
        }
        Ok(())
    }
}

/// JSON body of `POST {endpoint}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub n_predict: u32,
    pub temperature: f64,
    pub repeat_penalty: f64,
    pub repeat_last_n: u32,
    pub top_p: f64,
    pub top_k: u32,
    pub stop: Vec<String>,
    pub stream: bool,
}

impl CompletionRequest {
    /// Sampling parameters from `config`, non-streaming, no stop sequences.
    pub fn from_config(config: &InferenceConfig, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            n_predict: config.max_tokens,
            temperature: config.temperature,
            repeat_penalty: config.repeat_penalty,
            repeat_last_n: config.repeat_last_n,
            top_p: config.top_p,
            top_k: config.top_k,
            stop: Vec::new(),
            stream: false,
        }
    }

    pub fn n_predict(mut self, n: u32) -> Self {
        self.n_predict = n;
        self
    }

    pub fn temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn stop<I, S>(mut self, stop: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_blank_transcript() {
        assert!(ProcessingRequest::new(" \n\t").validate().is_err());
    }

    #[test]
    fn test_validate_limits() {
        assert!(ProcessingRequest::new("ok").max_tokens(0).validate().is_err());
        assert!(ProcessingRequest::new("ok").max_tokens(9000).validate().is_err());
        assert!(ProcessingRequest::new("ok").temperature(2.5).validate().is_err());
        assert!(ProcessingRequest::new("x".repeat(MAX_TRANSCRIPT_CHARS + 1))
            .validate()
            .is_err());
        assert!(ProcessingRequest::new("ok")
            .max_tokens(256)
            .temperature(0.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_wire_body_shape() {
        let body = CompletionRequest::from_config(&InferenceConfig::default(), "p")
            .stop(["\nUser:"]);
        let v = serde_json::to_value(&body).unwrap();
        let mut keys: Vec<_> = v.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "n_predict",
                "prompt",
                "repeat_last_n",
                "repeat_penalty",
                "stop",
                "stream",
                "temperature",
                "top_k",
                "top_p"
            ]
        );
        assert_eq!(v["stream"], false);
        assert_eq!(v["stop"][0], "\nUser:");
    }
}
