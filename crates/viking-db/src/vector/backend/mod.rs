//! Vector index backend implementations.
//!
//! ## Available Backends
//!
//! - `memory` (default): linear scan, nothing persisted
//! - `simple`: linear scan persisted as JSONL under the configured path

mod simple;

pub use simple::{cosine_similarity, SimpleVectorIndex};

use std::sync::Arc;

use tracing::debug;

use super::config::{VectorIndexConfig, BACKEND_MEMORY, BACKEND_SIMPLE};
use super::traits::VectorIndexBackend;
use crate::error::{DbError, DbResult};

/// Open a vector index with the given configuration.
///
/// # Errors
///
/// Returns an error if:
/// - The backend is not supported
/// - The `simple` backend has no path
/// - An existing index has a different dimension or metric
pub async fn open_vector_index(
    config: &VectorIndexConfig,
) -> DbResult<Arc<dyn VectorIndexBackend>> {
    debug!("Opening '{}' vector index", config.backend);

    if config.dimension == 0 {
        return Err(DbError::config("Vector dimension must be greater than 0"));
    }

    match config.backend.as_str() {
        BACKEND_MEMORY => Ok(Arc::new(SimpleVectorIndex::in_memory(
            config.dimension,
            config.metric,
        ))),

        BACKEND_SIMPLE => {
            if config.path.is_none() {
                return Err(DbError::config("The 'simple' vector backend requires a path"));
            }
            Ok(Arc::new(SimpleVectorIndex::open(config).await?))
        }

        backend => Err(DbError::config(format!(
            "Unknown backend: '{}'. Available backends: {}",
            backend,
            available_backends().join(", ")
        ))),
    }
}

/// Get a list of available backend names.
pub fn available_backends() -> Vec<&'static str> {
    vec![BACKEND_MEMORY, BACKEND_SIMPLE]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_backend() {
        let index = open_vector_index(&VectorIndexConfig::new(4)).await.unwrap();
        assert_eq!(index.dimension(), 4);
        assert!(index.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_bad_config() {
        let missing_path = VectorIndexConfig::new(4).with_backend(BACKEND_SIMPLE);
        assert!(matches!(
            open_vector_index(&missing_path).await,
            Err(DbError::Config { .. })
        ));

        let unknown = VectorIndexConfig::new(4).with_backend("lancedb");
        assert!(open_vector_index(&unknown).await.is_err());
    }
}
