//! # viking-model
//!
//! Provider layer for Viking - embeddings and vision/language completions.
//!
//! This crate defines the interfaces `viking-core` consumes from external model
//! providers and ships the implementations that do not need a model server:
//!
//! - **Embedding providers**: [`EmbeddingProvider`] with a deterministic offline
//!   [`HashEmbeddingProvider`] and an OpenAI-compatible HTTP provider (`http` feature)
//! - **Vision providers**: [`VisionProvider`], used for media summaries. No
//!   implementation lives here; callers inject one.
//!
//! ## Features
//!
//! - `http`: Remote embeddings via an OpenAI-compatible `/embeddings` endpoint
//!
//! ## Usage
//!
//! ```ignore
//! use viking_model::{create_embedding_provider, EmbeddingConfig};
//!
//! let provider = create_embedding_provider(&EmbeddingConfig::default())?;
//! let vectors = provider.embed(&["hello".to_string()]).await?;
//! assert_eq!(vectors[0].len(), provider.dimension());
//! ```

pub mod config;
pub mod error;
mod hash;

#[cfg(feature = "http")]
mod http;

use std::sync::Arc;

use async_trait::async_trait;

pub use config::{EmbeddingConfig, EmbeddingProviderKind};
pub use error::{ModelError, ModelResult};
pub use hash::{l2_normalize, HashEmbeddingProvider};

#[cfg(feature = "http")]
pub use http::HttpEmbeddingProvider;

/// Default model id for the offline provider.
pub const DEFAULT_EMBEDDING_MODEL_ID: &str = "viking-hash-v1";

/// Default embedding dimension.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 256;

// ============================================================================
// Embedding Provider Trait
// ============================================================================

/// Trait for embedding providers.
///
/// Implementations must be `Send + Sync`; the embedding pipeline shares one
/// provider across all of its workers. Each worker holds at most one
/// outstanding call.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Generate embeddings for a batch of texts, one vector per input.
    async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>>;

    /// Generate a single embedding.
    async fn embed_one(&self, text: &str) -> ModelResult<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ModelError::embedding_failed(self.model_id(), "empty result"))
    }

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Model identifier.
    fn model_id(&self) -> &str;
}

// ============================================================================
// Vision Provider Trait
// ============================================================================

/// Trait for vision/language model providers used to summarize media.
#[async_trait]
pub trait VisionProvider: Send + Sync + std::fmt::Debug {
    /// Complete a prompt that refers to the attached images.
    async fn vision_completion(&self, prompt: &str, images: &[Vec<u8>]) -> ModelResult<String>;

    /// Model identifier.
    fn model_id(&self) -> &str;
}

// ============================================================================
// Factory Functions
// ============================================================================

/// Create an embedding provider from configuration.
///
/// # Errors
///
/// Returns `ModelError` if the configuration is invalid or the requested
/// provider was not compiled in.
pub fn create_embedding_provider(
    config: &EmbeddingConfig,
) -> ModelResult<Arc<dyn EmbeddingProvider>> {
    config.validate()?;

    match config.provider {
        EmbeddingProviderKind::Hash => Ok(Arc::new(HashEmbeddingProvider::new(
            &config.model_id,
            config.dimension,
        ))),

        #[cfg(feature = "http")]
        EmbeddingProviderKind::Http => Ok(Arc::new(HttpEmbeddingProvider::new(config)?)),

        #[cfg(not(feature = "http"))]
        EmbeddingProviderKind::Http => Err(ModelError::ProviderNotAvailable {
            provider: "http".to_string(),
            reason: "Built without the 'http' feature.".to_string(),
        }),
    }
}
