//! Deterministic offline embedding provider.
//!
//! Uses feature hashing over lowercase word tokens: every token is hashed with
//! SHA-256 into a bucket and a sign, counts are accumulated and the result is
//! L2-normalized. Texts sharing vocabulary therefore land close together, which
//! is enough for local use and for exercising the pipeline without a model.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::ModelResult;
use crate::EmbeddingProvider;

/// Feature-hashing embedding provider.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    model_id: String,
    dimension: usize,
}

impl HashEmbeddingProvider {
    /// Create a provider producing vectors of `dimension` components.
    pub fn new(model_id: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimension: dimension.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dimension;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Split text into lowercase alphanumeric tokens.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Normalize a vector to unit length in place. Zero vectors are left as-is.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_embeddings_are_deterministic() {
        let provider = HashEmbeddingProvider::new("hash", 64);
        let a = provider.embed_one("Rust ownership rules").await.unwrap();
        let b = provider.embed_one("Rust ownership rules").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let provider = HashEmbeddingProvider::new("hash", 256);
        let query = provider.embed_one("borrow checker").await.unwrap();
        let close = provider
            .embed_one("the borrow checker enforces ownership")
            .await
            .unwrap();
        let far = provider.embed_one("chocolate cake recipe").await.unwrap();
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let provider = HashEmbeddingProvider::new("hash", 8);
        let v = provider.embed_text("  ...  ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_normalized_length() {
        let provider = HashEmbeddingProvider::new("hash", 32);
        let v = provider.embed_text("one two three four five");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
