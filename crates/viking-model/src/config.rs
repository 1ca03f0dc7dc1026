//! Configuration types for viking-model.
//!
//! These types are the single source of truth for provider configuration.
//! `viking-core` embeds [`EmbeddingConfig`] in its own config file section.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::{DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL_ID};

// ============================================================================
// EmbeddingProviderKind
// ============================================================================

/// Embedding provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Deterministic offline embeddings derived from a content hash.
    #[default]
    Hash,
    /// Remote OpenAI-compatible `/embeddings` endpoint.
    Http,
}

impl std::fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hash => write!(f, "hash"),
            Self::Http => write!(f, "http"),
        }
    }
}

impl std::str::FromStr for EmbeddingProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hash" | "local" | "offline" => Ok(Self::Hash),
            "http" | "openai" | "remote" => Ok(Self::Http),
            _ => Err(format!("Unknown provider: '{}'. Use 'hash' or 'http'.", s)),
        }
    }
}

// ============================================================================
// EmbeddingConfig
// ============================================================================

/// Configuration for an embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// Which provider implementation to use.
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    /// Model identifier sent to the provider.
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Output dimension of the embeddings.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Base URL of the remote API (HTTP provider only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// Name of the environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Request timeout in seconds (HTTP provider only).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_id() -> String {
    DEFAULT_EMBEDDING_MODEL_ID.to_string()
}

fn default_dimension() -> usize {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model_id: default_model_id(),
            dimension: default_dimension(),
            api_base: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Create a config for the given provider and model.
    pub fn new(provider: EmbeddingProviderKind, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    /// Set the output dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Set the API key environment variable name.
    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    /// Check the config for values no provider can work with.
    pub fn validate(&self) -> ModelResult<()> {
        if self.dimension == 0 {
            return Err(ModelError::invalid_config("embedding dimension must be > 0"));
        }
        if self.provider == EmbeddingProviderKind::Http && self.api_base.is_none() {
            return Err(ModelError::invalid_config(
                "the http provider requires `apiBase`",
            ));
        }
        Ok(())
    }

    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("hash".parse::<EmbeddingProviderKind>().unwrap(), EmbeddingProviderKind::Hash);
        assert_eq!("OpenAI".parse::<EmbeddingProviderKind>().unwrap(), EmbeddingProviderKind::Http);
        assert!("candle".parse::<EmbeddingProviderKind>().is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, EmbeddingProviderKind::Hash);
        assert_eq!(config.dimension, DEFAULT_EMBEDDING_DIMENSION);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_requires_api_base() {
        let config = EmbeddingConfig::new(EmbeddingProviderKind::Http, "text-embedding-3-small");
        assert!(config.validate().is_err());

        let config = config.with_api_base("http://localhost:8080/v1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let yaml = r#"{"provider":"http","modelId":"m","dimension":8,"apiBase":"http://x"}"#;
        let config: EmbeddingConfig = serde_json::from_str(yaml).unwrap();
        assert_eq!(config.model_id, "m");
        assert_eq!(config.dimension, 8);
        assert_eq!(config.timeout_secs, 30);
    }
}
