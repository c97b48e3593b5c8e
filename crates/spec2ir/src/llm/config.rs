use crate::result::{Spec2IrError, Spec2IrResult};
use std::time::Duration;

/// Endpoint base URL variable
pub const ENV_BASE_URL: &str = "LLM_BASE_URL";
/// Bearer token variable
pub const ENV_API_KEY: &str = "LLM_API_KEY";
/// Model name variable
pub const ENV_MODEL: &str = "LLM_MODEL";
/// Request timeout (seconds) variable
pub const ENV_TIMEOUT_SEC: &str = "LLM_TIMEOUT_SEC";
/// Streaming toggle variable
pub const ENV_STREAM: &str = "LLM_STREAM";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_TIMEOUT_SECS: f64 = 60.0;

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Clone, PartialEq)]
pub struct LlmConfig {
    /// API root, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Whole-request timeout
    pub timeout: Duration,
    /// Use server-sent events
    pub stream: bool,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("stream", &self.stream)
            .finish()
    }
}

impl LlmConfig {
    /// Create a config with defaults for everything but the key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            stream: false,
        }
    }

    /// Read `LLM_*` variables from the process environment
    ///
    /// # Errors
    /// `Config` if `LLM_API_KEY` is missing or a value cannot be parsed.
    pub fn from_env() -> Spec2IrResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `LLM_*` variables through `lookup`
    ///
    /// # Errors
    /// `Config` if `LLM_API_KEY` is missing or a value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Spec2IrResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Spec2IrError::config(format!(
                    "{ENV_API_KEY} is required for the OpenAI-compatible provider"
                ))
            })?;
        let mut config = Self::new(api_key.trim());

        if let Some(base) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SEC) {
            let secs: f64 = raw.trim().parse().map_err(|_| {
                Spec2IrError::config(format!("{ENV_TIMEOUT_SEC} must be a number, got '{raw}'"))
            })?;
            config.timeout = Duration::try_from_secs_f64(secs).map_err(|_| {
                Spec2IrError::config(format!("{ENV_TIMEOUT_SEC} must be positive, got '{raw}'"))
            })?;
        }
        config.stream = lookup(ENV_STREAM).is_some_and(|v| truthy(&v));
        Ok(config)
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Enable or disable streaming
    #[must_use]
    pub const fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

fn truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LlmConfig::from_lookup(lookup(&[("LLM_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "gpt-4.1-mini");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(!config.stream);
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = LlmConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Spec2IrError::Config { .. }));
        assert!(err.to_string().contains("LLM_API_KEY"));
        assert!(LlmConfig::from_lookup(lookup(&[("LLM_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = LlmConfig::from_lookup(lookup(&[
            ("LLM_API_KEY", "k"),
            ("LLM_BASE_URL", "http://gateway:8000/v1/"),
            ("LLM_MODEL", "qwen2.5"),
            ("LLM_TIMEOUT_SEC", "2.5"),
            ("LLM_STREAM", "Yes"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://gateway:8000/v1");
        assert_eq!(config.model, "qwen2.5");
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert!(config.stream);
    }

    #[test]
    fn test_stream_flag_values() {
        for (raw, expected) in [("1", true), ("on", true), ("TRUE", true), ("0", false), ("no", false), ("", false)] {
            let config =
                LlmConfig::from_lookup(lookup(&[("LLM_API_KEY", "k"), ("LLM_STREAM", raw)])).unwrap();
            assert_eq!(config.stream, expected, "LLM_STREAM={raw}");
        }
    }

    #[test]
    fn test_bad_timeout() {
        let err = LlmConfig::from_lookup(lookup(&[("LLM_API_KEY", "k"), ("LLM_TIMEOUT_SEC", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("LLM_TIMEOUT_SEC"));
        assert!(
            LlmConfig::from_lookup(lookup(&[("LLM_API_KEY", "k"), ("LLM_TIMEOUT_SEC", "-1")])).is_err()
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = LlmConfig::new("sk-secret");
        assert!(!format!("{config:?}").contains("sk-secret"));
    }
}
