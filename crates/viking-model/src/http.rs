//! OpenAI-compatible HTTP embedding provider.
//!
//! Posts `{"model": ..., "input": [...]}` to `{api_base}/embeddings` and reads
//! `data[].embedding` back in `index` order.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{ModelError, ModelResult};
use crate::EmbeddingProvider;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding provider backed by a remote OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model_id: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    /// Build a provider from configuration.
    pub fn new(config: &EmbeddingConfig) -> ModelResult<Self> {
        let api_base = config
            .api_base
            .as_deref()
            .ok_or_else(|| ModelError::invalid_config("the http provider requires `apiBase`"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", api_base.trim_end_matches('/')),
            api_key: config.api_key(),
            model_id: config.model_id.clone(),
            dimension: config.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        debug!(endpoint = %self.endpoint, count = texts.len(), "requesting embeddings");

        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model_id,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::embedding_failed(
                &self.model_id,
                format!("HTTP {}: {}", status, body),
            ));
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(ModelError::embedding_failed(
                &self.model_id,
                format!("expected {} embeddings, got {}", texts.len(), parsed.data.len()),
            ));
        }
        parsed.data.sort_by_key(|d| d.index);

        let mut vectors = Vec::with_capacity(parsed.data.len());
        for datum in parsed.data {
            if datum.embedding.len() != self.dimension {
                return Err(ModelError::DimensionMismatch {
                    expected: self.dimension,
                    actual: datum.embedding.len(),
                });
            }
            vectors.push(datum.embedding);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
