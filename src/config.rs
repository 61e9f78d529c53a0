//! 推理配置：端点、超时、采样默认值与系统提示词。
//!
//! Inference configuration: endpoint, timeout, sampling defaults and system prompt.
//!
//! Sources, lowest to highest precedence:
//! 1. built-in defaults ([`InferenceConfig::default`])
//! 2. a YAML file ([`InferenceConfig::from_yaml_file`]); missing keys keep their defaults
//! 3. `BITNET_*` environment variables ([`InferenceConfig::with_env_overrides`])
//!
//! The pipeline only reads a configuration; it never mutates one.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ENDPOINT_URL: &str = "http://127.0.0.1:8081/completion";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a precise note-taking assistant. \
Rewrite spoken transcripts into clear, well-organized notes. \
Keep every fact from the transcript and do not invent new ones.";

/// Upper bound for `max_tokens` / `n_predict`.
pub const MAX_TOKENS_LIMIT: u32 = 8192;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub endpoint_url: String,
    pub timeout_secs: f64,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub repeat_penalty: f64,
    pub repeat_last_n: u32,
    pub system_prompt: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            timeout_secs: 120.0,
            max_tokens: 512,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.1,
            repeat_last_n: 64,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl InferenceConfig {
    /// Defaults pointed at `endpoint_url`.
    pub fn for_endpoint(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Self::default()
        }
    }

    /// Defaults with `BITNET_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `BITNET_*` environment variables on top of `self`.
    ///
    /// Unparsable values are ignored and the current value is kept.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("BITNET_ENDPOINT_URL").filter(|s| !s.trim().is_empty()) {
            self.endpoint_url = url.trim().to_string();
        }
        override_parsed(&lookup, "BITNET_TIMEOUT_SECS", &mut self.timeout_secs);
        override_parsed(&lookup, "BITNET_MAX_TOKENS", &mut self.max_tokens);
        override_parsed(&lookup, "BITNET_TEMPERATURE", &mut self.temperature);
        override_parsed(&lookup, "BITNET_TOP_P", &mut self.top_p);
        override_parsed(&lookup, "BITNET_TOP_K", &mut self.top_k);
        override_parsed(&lookup, "BITNET_REPEAT_PENALTY", &mut self.repeat_penalty);
        override_parsed(&lookup, "BITNET_REPEAT_LAST_N", &mut self.repeat_last_n);
        if let Some(prompt) = lookup("BITNET_SYSTEM_PROMPT").filter(|s| !s.trim().is_empty()) {
            self.system_prompt = prompt;
        }
        self
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Every problem with this configuration, in field order. Empty when valid.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        match url::Url::parse(&self.endpoint_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => issues.push(format!(
                "endpoint_url must use http or https (got '{}')",
                url.scheme()
            )),
            Err(e) => issues.push(format!(
                "endpoint_url '{}' is not a valid URL: {}",
                self.endpoint_url, e
            )),
        }
        if !(self.timeout_secs.is_finite() && self.timeout_secs > 0.0) {
            issues.push(format!("timeout_secs must be positive (got {})", self.timeout_secs));
        } else if Duration::try_from_secs_f64(self.timeout_secs).is_err() {
            issues.push(format!("timeout_secs is too large (got {})", self.timeout_secs));
        }
        if self.max_tokens == 0 || self.max_tokens > MAX_TOKENS_LIMIT {
            issues.push(format!(
                "max_tokens must be within 1..={} (got {})",
                MAX_TOKENS_LIMIT, self.max_tokens
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            issues.push(format!("temperature must be within 0..=2 (got {})", self.temperature));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            issues.push(format!("top_p must be within (0, 1] (got {})", self.top_p));
        }
        if self.top_k == 0 {
            issues.push("top_k must be at least 1".to_string());
        }
        if !(self.repeat_penalty.is_finite() && self.repeat_penalty > 0.0) {
            issues.push(format!(
                "repeat_penalty must be positive (got {})",
                self.repeat_penalty
            ));
        }
        if self.system_prompt.trim().is_empty() {
            issues.push("system_prompt must not be empty".to_string());
        }

        issues
    }

    pub fn validate(&self) -> Result<()> {
        let issues = self.issues();
        if issues.is_empty() {
            return Ok(());
        }
        Err(Error::configuration_with_context(
            format!("{} invalid setting(s)", issues.len()),
            ErrorContext::new()
                .with_details(issues.join("; "))
                .with_source("config_validator"),
        ))
    }
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(v) = lookup(key).and_then(|s| s.trim().parse::<T>().ok()) {
        *slot = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        assert!(InferenceConfig::default().issues().is_empty());
        assert!(InferenceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_overrides_apply_and_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            ("BITNET_ENDPOINT_URL", "http://10.0.0.2:9000/completion"),
            ("BITNET_TIMEOUT_SECS", "30"),
            ("BITNET_TOP_K", "not-a-number"),
            ("BITNET_TEMPERATURE", " 0.2 "),
        ]
        .into_iter()
        .collect();

        let cfg = InferenceConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.endpoint_url, "http://10.0.0.2:9000/completion");
        assert_eq!(cfg.timeout_secs, 30.0);
        assert_eq!(cfg.top_k, 40);
        assert_eq!(cfg.temperature, 0.2);
    }

    #[test]
    fn test_yaml_keeps_defaults_for_missing_keys() {
        let cfg = InferenceConfig::from_yaml_str("timeout_secs: 5\nmax_tokens: 64\n").unwrap();
        assert_eq!(cfg.timeout_secs, 5.0);
        assert_eq!(cfg.max_tokens, 64);
        assert_eq!(cfg.endpoint_url, DEFAULT_ENDPOINT_URL);
    }

    #[test]
    fn test_unrepresentable_timeouts_are_issues() {
        for secs in [f64::INFINITY, f64::NAN, 1e30] {
            let cfg = InferenceConfig {
                timeout_secs: secs,
                ..InferenceConfig::default()
            };
            assert_eq!(cfg.issues().len(), 1, "timeout_secs = {secs}");
        }
    }

    #[test]
    fn test_issues_lists_every_problem() {
        let cfg = InferenceConfig {
            endpoint_url: "ws://host/completion".into(),
            timeout_secs: 0.0,
            max_tokens: 0,
            temperature: 3.0,
            top_p: 0.0,
            top_k: 0,
            repeat_penalty: -1.0,
            repeat_last_n: 64,
            system_prompt: "  ".into(),
        };
        assert_eq!(cfg.issues().len(), 8);
        match cfg.validate() {
            Err(Error::Configuration { message, context }) => {
                assert!(message.starts_with("8 "));
                assert_eq!(context.source.as_deref(), Some("config_validator"));
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }
}
