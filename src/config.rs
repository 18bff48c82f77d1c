//! Runtime configuration for the tutoring service.
//!
//! Values come from defaults, a YAML file, or environment variables.
//! Environment loading starts from the defaults and overrides only the
//! variables that are set; malformed values are errors, not silently
//! ignored.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::agents::OrchestratorConfig;
use crate::llm::ModelPricing;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable or field has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The YAML file could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration for the tutoring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    // Orchestration
    /// Maximum regeneration rounds per request.
    pub max_regeneration_attempts: u32,
    /// Quiz questions kept from a generated quiz.
    pub max_quiz_questions: usize,
    /// Grounding documents retrieved per request.
    pub retrieval_limit: usize,
    /// Whole-request deadline in seconds.
    pub request_timeout_secs: u64,

    // Gateway
    /// Retry a failed call once on the other backend.
    pub fallback_to_cloud: bool,
    pub local_llm_url: String,
    pub local_llm_model: String,
    pub cloud_api_base: String,
    #[serde(skip_serializing)]
    pub cloud_api_key: Option<String>,
    pub cloud_llm_model: String,
    /// Cloud price per million input tokens, in dollars.
    pub cloud_input_per_1m: f64,
    /// Cloud price per million output tokens, in dollars.
    pub cloud_output_per_1m: f64,

    // Cache
    pub cache_enabled: bool,
    /// Redis URL; without one the cache is kept in memory.
    pub redis_url: Option<String>,
    pub cache_ttl_secs: u64,

    // Retrieval
    /// JSON corpus for the in-memory index.
    pub corpus_path: Option<PathBuf>,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            max_regeneration_attempts: 3,
            max_quiz_questions: 12,
            retrieval_limit: 5,
            request_timeout_secs: 300,

            fallback_to_cloud: false,
            local_llm_url: "http://localhost:4000/v1".to_string(),
            local_llm_model: "lapa".to_string(),
            cloud_api_base: "https://api.openai.com/v1".to_string(),
            cloud_api_key: None,
            cloud_llm_model: "gpt-4".to_string(),
            cloud_input_per_1m: 30.0,
            cloud_output_per_1m: 60.0,

            cache_enabled: true,
            redis_url: None,
            cache_ttl_secs: 3600,

            corpus_path: None,
        }
    }
}

impl TutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MAX_REGENERATION_ATTEMPTS` (default: 3)
    /// - `MAX_QUIZ_QUESTIONS` (default: 12)
    /// - `RETRIEVAL_LIMIT` (default: 5)
    /// - `REQUEST_TIMEOUT_SECS` (default: 300)
    /// - `FALLBACK_TO_CLOUD` (default: false)
    /// - `LAPA_LLM_URL`, `LOCAL_LLM_MODEL`
    /// - `OPENAI_API_BASE`, `OPENAI_API_KEY`, `CLOUD_LLM_MODEL`
    /// - `CACHE_ENABLED` (default: true), `REDIS_URL`, `REDIS_CACHE_TTL` (default: 3600)
    /// - `CORPUS_PATH`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the result
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`TutorConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a YAML file. Missing fields take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment-style overrides on top of the current values.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("MAX_REGENERATION_ATTEMPTS") {
            self.max_regeneration_attempts = parse_env_value(&val, "MAX_REGENERATION_ATTEMPTS")?;
        }
        if let Some(val) = lookup("MAX_QUIZ_QUESTIONS") {
            self.max_quiz_questions = parse_env_value(&val, "MAX_QUIZ_QUESTIONS")?;
        }
        if let Some(val) = lookup("RETRIEVAL_LIMIT") {
            self.retrieval_limit = parse_env_value(&val, "RETRIEVAL_LIMIT")?;
        }
        if let Some(val) = lookup("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env_value(&val, "REQUEST_TIMEOUT_SECS")?;
        }

        if let Some(val) = lookup("FALLBACK_TO_CLOUD") {
            self.fallback_to_cloud = parse_env_bool(&val, "FALLBACK_TO_CLOUD")?;
        }
        if let Some(val) = lookup("LAPA_LLM_URL") {
            self.local_llm_url = val;
        }
        if let Some(val) = lookup("LOCAL_LLM_MODEL") {
            self.local_llm_model = val;
        }
        if let Some(val) = lookup("OPENAI_API_BASE") {
            self.cloud_api_base = val;
        }
        if let Some(val) = lookup("OPENAI_API_KEY") {
            self.cloud_api_key = Some(val).filter(|k| !k.trim().is_empty());
        }
        if let Some(val) = lookup("CLOUD_LLM_MODEL") {
            self.cloud_llm_model = val;
        }

        if let Some(val) = lookup("CACHE_ENABLED") {
            self.cache_enabled = parse_env_bool(&val, "CACHE_ENABLED")?;
        }
        if let Some(val) = lookup("REDIS_URL") {
            self.redis_url = Some(val).filter(|u| !u.trim().is_empty());
        }
        if let Some(val) = lookup("REDIS_CACHE_TTL") {
            self.cache_ttl_secs = parse_env_value(&val, "REDIS_CACHE_TTL")?;
        }

        if let Some(val) = lookup("CORPUS_PATH") {
            self.corpus_path = Some(PathBuf::from(val));
        }
        Ok(())
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_quiz_questions == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_quiz_questions must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.local_llm_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "local_llm_url cannot be empty".to_string(),
            ));
        }

        if self.local_llm_model.trim().is_empty() || self.cloud_llm_model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model names cannot be empty".to_string(),
            ));
        }

        if self.cloud_input_per_1m < 0.0 || self.cloud_output_per_1m < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "cloud prices cannot be negative".to_string(),
            ));
        }

        if self.cache_enabled && self.cache_ttl_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "cache_ttl_secs must be greater than 0 when caching is enabled".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cloud_pricing(&self) -> ModelPricing {
        ModelPricing::new(self.cloud_input_per_1m, self.cloud_output_per_1m)
    }

    /// Orchestrator settings derived from this configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_max_regeneration_attempts(self.max_regeneration_attempts)
            .with_retrieval_limit(self.retrieval_limit)
            .with_request_timeout(self.request_timeout())
            .with_max_quiz_questions(self.max_quiz_questions)
    }

    /// Builder method to set the regeneration cap.
    pub fn with_max_regeneration_attempts(mut self, attempts: u32) -> Self {
        self.max_regeneration_attempts = attempts;
        self
    }

    /// Builder method to set the request deadline.
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Builder method to set the corpus path.
    pub fn with_corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_path = Some(path.into());
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = TutorConfig::default();
        assert_eq!(config.max_regeneration_attempts, 3);
        assert_eq!(config.max_quiz_questions, 12);
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert!(!config.fallback_to_cloud);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = TutorConfig::from_lookup(lookup(&[
            ("MAX_REGENERATION_ATTEMPTS", "5"),
            ("FALLBACK_TO_CLOUD", "yes"),
            ("REDIS_URL", "redis://cache:6379/0"),
            ("REDIS_CACHE_TTL", "60"),
            ("OPENAI_API_KEY", ""),
            ("CORPUS_PATH", "/data/corpus.json"),
        ]))
        .expect("config");

        assert_eq!(config.max_regeneration_attempts, 5);
        assert!(config.fallback_to_cloud);
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379/0"));
        assert_eq!(config.cache_ttl_secs, 60);
        assert!(config.cloud_api_key.is_none());
        assert_eq!(config.corpus_path, Some(PathBuf::from("/data/corpus.json")));
        assert_eq!(config.max_quiz_questions, 12);
    }

    #[test]
    fn test_env_invalid_values() {
        let err = TutorConfig::from_lookup(lookup(&[("MAX_QUIZ_QUESTIONS", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MAX_QUIZ_QUESTIONS"));

        let err = TutorConfig::from_lookup(lookup(&[("CACHE_ENABLED", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("CACHE_ENABLED"));
    }

    #[test]
    fn test_validation_failures() {
        let err = TutorConfig::default().with_request_timeout_secs(0).validate().unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));

        let err = TutorConfig::from_lookup(lookup(&[("MAX_QUIZ_QUESTIONS", "0")])).unwrap_err();
        assert!(err.to_string().contains("max_quiz_questions"));
    }

    #[test]
    fn test_yaml_file_with_partial_fields() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "max_regeneration_attempts: 1\nlocal_llm_model: lapa-large\nretrieval_limit: 2")
            .expect("write");

        let config = TutorConfig::from_yaml_file(file.path()).expect("config");
        assert_eq!(config.max_regeneration_attempts, 1);
        assert_eq!(config.local_llm_model, "lapa-large");
        assert_eq!(config.retrieval_limit, 2);
        assert_eq!(config.cloud_llm_model, "gpt-4");

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.max_regeneration_attempts, 1);
        assert_eq!(orchestrator.retrieval_limit, 2);
    }

    #[test]
    fn test_yaml_file_missing() {
        let err = TutorConfig::from_yaml_file("/nonexistent/vyvchai.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
