//! Error types for viking-model.
//!
//! Provider failures are reported with the provider/model that failed so the
//! embedding pipeline can log them and decide whether to retry.

use thiserror::Error;

/// Result type alias for viking-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur in viking-model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    // ========================================================================
    // Provider errors
    // ========================================================================
    /// Provider not available (feature disabled or not configured).
    #[error("Provider '{provider}' not available: {reason}")]
    ProviderNotAvailable { provider: String, reason: String },

    /// Provider configuration is invalid.
    #[error("Invalid provider configuration: {message}")]
    InvalidConfig { message: String },

    // ========================================================================
    // Inference errors
    // ========================================================================
    /// Embedding generation failed.
    #[error("Embedding failed for model '{model_id}': {message}")]
    EmbeddingFailed { model_id: String, message: String },

    /// Text or vision completion failed.
    #[error("Completion failed for model '{model_id}': {message}")]
    CompletionFailed { model_id: String, message: String },

    /// The provider returned a vector of the wrong size.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The media payload is in a format the provider cannot handle.
    #[error("Unsupported media format: {format}")]
    UnsupportedMedia { format: String },

    // ========================================================================
    // Transport errors
    // ========================================================================
    /// HTTP transport error.
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Create an embedding failed error.
    pub fn embedding_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create a completion failed error.
    pub fn completion_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CompletionFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Name of the provider or model involved, when known.
    pub fn provider_name(&self) -> &str {
        match self {
            Self::ProviderNotAvailable { provider, .. } => provider,
            Self::EmbeddingFailed { model_id, .. } | Self::CompletionFailed { model_id, .. } => {
                model_id
            }
            _ => "unknown",
        }
    }
}
