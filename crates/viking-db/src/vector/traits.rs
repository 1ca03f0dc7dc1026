//! Vector index traits and core types.
//!
//! This module defines the core abstraction for vector storage backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::metadata::VectorSearchFilter;
use crate::error::DbResult;

// ============================================================================
// VectorId
// ============================================================================

/// Unique identifier for a vector in the index.
///
/// Vectors are keyed by the id of the context they embed, so re-indexing a
/// context replaces its previous vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorId(pub String);

impl VectorId {
    /// Create a new vector ID.
    pub fn new(id: impl Into<String>) -> Self {
        VectorId(id.into())
    }

    /// Get the underlying ID value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VectorId {
    fn from(id: &str) -> Self {
        VectorId(id.to_string())
    }
}

impl From<String> for VectorId {
    fn from(id: String) -> Self {
        VectorId(id)
    }
}

impl std::fmt::Display for VectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// VectorMetric
// ============================================================================

/// Distance metric for vector similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorMetric {
    /// Cosine similarity (default).
    #[default]
    Cosine,
    /// Dot product.
    Dot,
    /// Euclidean (L2) distance.
    L2,
}

impl VectorMetric {
    /// Get the metric name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorMetric::Cosine => "cosine",
            VectorMetric::Dot => "dot",
            VectorMetric::L2 => "l2",
        }
    }
}

impl std::fmt::Display for VectorMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// VectorInsert
// ============================================================================

/// A vector to insert or update in the index.
///
/// The tenant columns (`account_id`, `owner_space`) are mandatory: every
/// query filters on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorInsert {
    /// Unique identifier for this vector.
    pub id: VectorId,

    /// The embedding vector.
    pub vector: Vec<f32>,

    /// JSON payload (the serialized context record).
    pub payload: serde_json::Value,

    /// Owning account.
    pub account_id: String,

    /// Owner space inside the account (empty for shared nodes).
    #[serde(default)]
    pub owner_space: String,

    /// Context type: "resource", "memory" or "skill".
    #[serde(default = "default_context_type")]
    pub context_type: String,

    /// Namespace URI of the embedded node.
    pub uri: String,

    /// Digest tier: 0 abstract, 1 overview, 2 detail.
    #[serde(default = "default_level")]
    pub level: u8,
}

fn default_context_type() -> String {
    "resource".to_string()
}

fn default_level() -> u8 {
    2
}

impl VectorInsert {
    /// Create a new vector insert with required fields.
    pub fn new(
        id: impl Into<VectorId>,
        vector: Vec<f32>,
        account_id: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            vector,
            payload: serde_json::Value::Null,
            account_id: account_id.into(),
            owner_space: String::new(),
            context_type: default_context_type(),
            uri: uri.into(),
            level: default_level(),
        }
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Set the owner space.
    pub fn with_owner_space(mut self, owner_space: impl Into<String>) -> Self {
        self.owner_space = owner_space.into();
        self
    }

    /// Set the context type.
    pub fn with_context_type(mut self, context_type: impl Into<String>) -> Self {
        self.context_type = context_type.into();
        self
    }

    /// Set the digest level.
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }
}

// ============================================================================
// VectorSearchResult
// ============================================================================

/// A single result from a vector similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSearchResult {
    /// Unique identifier of the matched vector.
    pub id: VectorId,

    /// Similarity score (higher is better for every metric).
    pub score: f32,

    /// JSON payload associated with this vector.
    pub payload: serde_json::Value,
}

impl VectorSearchResult {
    /// Create a new search result.
    pub fn new(id: impl Into<VectorId>, score: f32, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            score,
            payload,
        }
    }
}

// ============================================================================
// VectorIndexBackend Trait
// ============================================================================

/// Core trait for vector index backends.
///
/// ## Implementation Notes
///
/// - Backends should be thread-safe (implement `Send + Sync`); one index is
///   shared by every tenant.
/// - The `query` method should return results sorted by relevance (best first).
/// - Upsert semantics: if a vector with the same ID exists, it is replaced.
#[async_trait]
pub trait VectorIndexBackend: Send + Sync {
    /// Query the index for similar vectors matching `filter`.
    async fn query(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &VectorSearchFilter,
    ) -> DbResult<Vec<VectorSearchResult>>;

    /// Insert or update vectors in the index.
    async fn upsert(&self, vectors: &[VectorInsert]) -> DbResult<()>;

    /// Fetch one stored vector with its payload.
    async fn get(&self, id: &VectorId) -> DbResult<Option<VectorInsert>>;

    /// Delete vectors by their IDs.
    async fn delete(&self, ids: &[VectorId]) -> DbResult<()>;

    /// Delete every vector matching `filter`. Returns the number removed.
    async fn delete_matching(&self, filter: &VectorSearchFilter) -> DbResult<usize>;

    /// Flush pending writes to persistent storage.
    async fn flush(&self) -> DbResult<()>;

    /// Get the number of vectors in the index.
    async fn len(&self) -> DbResult<usize>;

    /// Check if the index is empty.
    async fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Check that the index is usable.
    async fn health_check(&self) -> DbResult<bool>;

    /// Get the dimension of vectors in this index.
    fn dimension(&self) -> usize;

    /// Get the distance metric used by this index.
    fn metric(&self) -> VectorMetric;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_id() {
        let id = VectorId::new("ctx-1");
        assert_eq!(id.as_str(), "ctx-1");
        assert_eq!(id.to_string(), "ctx-1");

        let from_str: VectorId = "ctx-2".into();
        assert_eq!(from_str.as_str(), "ctx-2");
    }

    #[test]
    fn test_vector_metric() {
        assert_eq!(VectorMetric::Cosine.as_str(), "cosine");
        assert_eq!(VectorMetric::Dot.as_str(), "dot");
        assert_eq!(VectorMetric::L2.as_str(), "l2");
        assert_eq!(VectorMetric::default(), VectorMetric::Cosine);
    }

    #[test]
    fn test_vector_insert_builder() {
        let insert = VectorInsert::new("id", vec![1.0, 2.0], "acme", "viking://resources/a.md")
            .with_owner_space("alice")
            .with_context_type("memory")
            .with_level(0)
            .with_payload(serde_json::json!({"k": "v"}));

        assert_eq!(insert.account_id, "acme");
        assert_eq!(insert.owner_space, "alice");
        assert_eq!(insert.context_type, "memory");
        assert_eq!(insert.level, 0);
        assert_eq!(insert.payload["k"], "v");
    }
}
