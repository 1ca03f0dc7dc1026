//! Vector index configuration and metadata.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::VectorMetric;
use crate::error::{DbError, DbResult};

// ============================================================================
// Constants
// ============================================================================

/// In-memory backend, nothing persisted.
pub const BACKEND_MEMORY: &str = "memory";

/// Linear-scan backend persisted as JSONL.
pub const BACKEND_SIMPLE: &str = "simple";

/// Default backend name.
pub const DEFAULT_BACKEND: &str = BACKEND_MEMORY;

/// Filename for index metadata.
pub const INDEX_META_FILENAME: &str = "index.meta.json";

// ============================================================================
// VectorIndexConfig
// ============================================================================

/// Configuration for creating or opening a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexConfig {
    /// Dimension of vectors in the index.
    pub dimension: usize,

    /// Index directory. Required by the `simple` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Backend to use ("memory" or "simple").
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Distance metric for similarity search.
    #[serde(default)]
    pub metric: VectorMetric,
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

impl VectorIndexConfig {
    /// Create an in-memory config.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            path: None,
            backend: DEFAULT_BACKEND.to_string(),
            metric: VectorMetric::Cosine,
        }
    }

    /// Create a persistent config for the `simple` backend.
    pub fn simple(dimension: usize, path: impl Into<PathBuf>) -> Self {
        Self::new(dimension)
            .with_backend(BACKEND_SIMPLE)
            .with_path(path)
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    /// Set the index directory.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: VectorMetric) -> Self {
        self.metric = metric;
        self
    }
}

// ============================================================================
// VectorIndexMeta
// ============================================================================

/// Metadata for a persisted vector index.
///
/// Stored in `index.meta.json` alongside the index data so a reopen with a
/// different dimension or metric is caught instead of silently mixing vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexMeta {
    /// Backend used for this index.
    pub backend: String,

    /// Dimension of vectors.
    pub dimension: usize,

    /// Distance metric.
    pub metric: VectorMetric,

    /// Schema version for future migrations.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Creation timestamp (ISO 8601).
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_schema_version() -> u32 {
    1
}

impl VectorIndexMeta {
    /// Create new metadata.
    pub fn new(backend: impl Into<String>, dimension: usize, metric: VectorMetric) -> Self {
        Self {
            backend: backend.into(),
            dimension,
            metric,
            schema_version: 1,
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Check that an existing index can be opened with `config`.
    pub fn check_compatible(&self, config: &VectorIndexConfig) -> DbResult<()> {
        if self.dimension != config.dimension {
            return Err(DbError::DimensionMismatch {
                expected: config.dimension,
                actual: self.dimension,
            });
        }
        if self.metric != config.metric {
            return Err(DbError::config(format!(
                "Metric mismatch: expected '{}', found '{}'",
                config.metric, self.metric
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Load index metadata from a directory, `None` if absent.
pub async fn load_index_meta(path: &Path) -> DbResult<Option<VectorIndexMeta>> {
    let meta_path = path.join(INDEX_META_FILENAME);
    debug!("Loading index metadata from {:?}", meta_path);

    let content = match tokio::fs::read_to_string(&meta_path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(DbError::vector_io(
                meta_path.clone(),
                format!("Failed to read index metadata: {}", e),
            ))
        }
    };

    serde_json::from_str(&content).map(Some).map_err(|e| {
        DbError::vector_io(meta_path.clone(), format!("Failed to parse index metadata: {}", e))
    })
}

/// Write index metadata to a directory.
pub async fn write_index_meta(path: &Path, meta: &VectorIndexMeta) -> DbResult<()> {
    let meta_path = path.join(INDEX_META_FILENAME);
    debug!("Writing index metadata to {:?}", meta_path);

    tokio::fs::create_dir_all(path).await?;
    let content = serde_json::to_string_pretty(meta)?;
    tokio::fs::write(&meta_path, content).await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_builder() {
        let config = VectorIndexConfig::simple(64, "/tmp/idx").with_metric(VectorMetric::L2);

        assert_eq!(config.dimension, 64);
        assert_eq!(config.backend, BACKEND_SIMPLE);
        assert_eq!(config.metric, VectorMetric::L2);
        assert_eq!(config.path, Some(PathBuf::from("/tmp/idx")));
        assert_eq!(VectorIndexConfig::new(8).backend, BACKEND_MEMORY);
    }

    #[test]
    fn test_meta_compatibility() {
        let meta = VectorIndexMeta::new(BACKEND_SIMPLE, 64, VectorMetric::Cosine);
        assert!(meta.check_compatible(&VectorIndexConfig::new(64)).is_ok());
        assert!(matches!(
            meta.check_compatible(&VectorIndexConfig::new(32)),
            Err(DbError::DimensionMismatch {
                expected: 32,
                actual: 64
            })
        ));
        assert!(meta
            .check_compatible(&VectorIndexConfig::new(64).with_metric(VectorMetric::Dot))
            .is_err());
    }

    #[tokio::test]
    async fn test_meta_roundtrip_on_disk() {
        let temp = TempDir::new().unwrap();
        assert!(load_index_meta(temp.path()).await.unwrap().is_none());

        let meta = VectorIndexMeta::new(BACKEND_SIMPLE, 16, VectorMetric::Dot);
        write_index_meta(temp.path(), &meta).await.unwrap();

        let loaded = load_index_meta(temp.path()).await.unwrap().unwrap();
        assert_eq!(loaded.dimension, 16);
        assert_eq!(loaded.metric, VectorMetric::Dot);
    }
}
