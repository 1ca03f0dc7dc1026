//! Linear-scan vector index backend.
//!
//! Vectors live in a `HashMap` and every query scans all of them. When opened
//! with a directory, the whole map is rewritten to a JSONL file after each
//! mutation. Good enough for tests and indexes of a few hundred thousand
//! entries.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::super::config::{
    load_index_meta, write_index_meta, VectorIndexConfig, VectorIndexMeta,
};
use super::super::metadata::VectorSearchFilter;
use super::super::traits::{
    VectorId, VectorIndexBackend, VectorInsert, VectorMetric, VectorSearchResult,
};
use crate::error::{DbError, DbResult};

/// Filename for the JSONL data file.
const DATA_FILENAME: &str = "vectors.jsonl";

/// Linear-scan vector index, optionally persisted to disk.
pub struct SimpleVectorIndex {
    /// Index directory, `None` for a purely in-memory index.
    path: Option<PathBuf>,

    /// Dimension of vectors.
    dimension: usize,

    /// Distance metric.
    metric: VectorMetric,

    /// In-memory vector store keyed by id.
    vectors: RwLock<HashMap<VectorId, VectorInsert>>,

    /// Serializes snapshot writes so the file always holds the newest one.
    save_lock: Mutex<()>,
}

impl std::fmt::Debug for SimpleVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleVectorIndex")
            .field("path", &self.path)
            .field("dimension", &self.dimension)
            .field("metric", &self.metric)
            .finish()
    }
}

impl SimpleVectorIndex {
    /// Create an empty in-memory index.
    pub fn in_memory(dimension: usize, metric: VectorMetric) -> Self {
        Self {
            path: None,
            dimension,
            metric,
            vectors: RwLock::new(HashMap::new()),
            save_lock: Mutex::new(()),
        }
    }

    /// Open or create an index described by `config`.
    ///
    /// With a `path`, existing data is loaded and index metadata is checked
    /// against the requested dimension and metric.
    pub async fn open(config: &VectorIndexConfig) -> DbResult<Self> {
        let mut index = Self::in_memory(config.dimension, config.metric);
        let Some(path) = config.path.clone() else {
            return Ok(index);
        };

        debug!("Opening SimpleVectorIndex at {:?}", path);
        match load_index_meta(&path).await? {
            Some(meta) => meta.check_compatible(config)?,
            None => {
                let meta = VectorIndexMeta::new(&config.backend, config.dimension, config.metric);
                write_index_meta(&path, &meta).await?;
            }
        }

        let loaded = Self::load_from_file(&path.join(DATA_FILENAME)).await?;
        index.vectors = RwLock::new(loaded);
        index.path = Some(path);
        Ok(index)
    }

    /// Load vectors from a JSONL file. Unparseable lines are skipped.
    async fn load_from_file(path: &Path) -> DbResult<HashMap<VectorId, VectorInsert>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(DbError::vector_io(path, e.to_string())),
        };

        let mut vectors = HashMap::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<VectorInsert>(line) {
                Ok(stored) => {
                    vectors.insert(stored.id.clone(), stored);
                }
                Err(e) => {
                    debug!("Skipping invalid line {}: {}", line_num + 1, e);
                }
            }
        }

        debug!("Loaded {} vectors", vectors.len());
        Ok(vectors)
    }

    /// Save all vectors to the JSONL file. No-op for in-memory indexes.
    async fn save_to_file(&self) -> DbResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data_path = path.join(DATA_FILENAME);

        let _guard = self.save_lock.lock().await;
        let snapshot = {
            let vectors = self.read_lock()?;
            let mut out = String::new();
            for stored in vectors.values() {
                out.push_str(&serde_json::to_string(stored)?);
                out.push('\n');
            }
            out
        };

        trace!("Saving vectors to {:?}", data_path);
        tokio::fs::write(&data_path, snapshot)
            .await
            .map_err(|e| DbError::vector_io(data_path, e.to_string()))
    }

    fn read_lock(
        &self,
    ) -> DbResult<std::sync::RwLockReadGuard<'_, HashMap<VectorId, VectorInsert>>> {
        self.vectors
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))
    }

    fn write_lock(
        &self,
    ) -> DbResult<std::sync::RwLockWriteGuard<'_, HashMap<VectorId, VectorInsert>>> {
        self.vectors
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))
    }

    /// Compute similarity between two vectors.
    fn compute_similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            VectorMetric::Cosine => cosine_similarity(a, b),
            VectorMetric::Dot => dot_product(a, b),
            VectorMetric::L2 => -euclidean_distance(a, b), // Negate so higher is better
        }
    }
}

#[async_trait]
impl VectorIndexBackend for SimpleVectorIndex {
    async fn query(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &VectorSearchFilter,
    ) -> DbResult<Vec<VectorSearchResult>> {
        trace!("Querying SimpleVectorIndex, limit={}", limit);
        if embedding.len() != self.dimension {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let vectors = self.read_lock()?;
        let mut scored: Vec<(f32, &VectorInsert)> = vectors
            .values()
            .filter(|v| filter.matches(v))
            .map(|v| (self.compute_similarity(embedding, &v.vector), v))
            .collect();

        // Ties broken by id so results are stable across runs.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });

        let results: Vec<VectorSearchResult> = scored
            .into_iter()
            .take(limit)
            .map(|(score, stored)| {
                VectorSearchResult::new(stored.id.clone(), score, stored.payload.clone())
            })
            .collect();

        trace!("Found {} results", results.len());
        Ok(results)
    }

    async fn upsert(&self, vectors: &[VectorInsert]) -> DbResult<()> {
        debug!("Upserting {} vectors", vectors.len());

        for insert in vectors {
            if insert.vector.len() != self.dimension {
                return Err(DbError::DimensionMismatch {
                    expected: self.dimension,
                    actual: insert.vector.len(),
                });
            }
        }

        {
            let mut stored = self.write_lock()?;
            for insert in vectors {
                stored.insert(insert.id.clone(), insert.clone());
            }
        }

        self.save_to_file().await
    }

    async fn get(&self, id: &VectorId) -> DbResult<Option<VectorInsert>> {
        Ok(self.read_lock()?.get(id).cloned())
    }

    async fn delete(&self, ids: &[VectorId]) -> DbResult<()> {
        debug!("Deleting {} vectors", ids.len());

        {
            let mut stored = self.write_lock()?;
            for id in ids {
                stored.remove(id);
            }
        }

        self.save_to_file().await
    }

    async fn delete_matching(&self, filter: &VectorSearchFilter) -> DbResult<usize> {
        let removed = {
            let mut stored = self.write_lock()?;
            let before = stored.len();
            stored.retain(|_, v| !filter.matches(v));
            before - stored.len()
        };

        debug!("Deleted {} vectors matching filter", removed);
        if removed > 0 {
            self.save_to_file().await?;
        }
        Ok(removed)
    }

    async fn flush(&self) -> DbResult<()> {
        self.save_to_file().await
    }

    async fn len(&self) -> DbResult<usize> {
        Ok(self.read_lock()?.len())
    }

    async fn health_check(&self) -> DbResult<bool> {
        // A poisoned lock means a writer panicked mid-update.
        drop(self.read_lock()?);
        match &self.path {
            Some(path) => Ok(tokio::fs::metadata(path).await.map(|m| m.is_dir())?),
            None => Ok(true),
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> VectorMetric {
        self.metric
    }
}

// ============================================================================
// Similarity Functions
// ============================================================================

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Compute dot product between two vectors.
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute Euclidean (L2) distance between two vectors.
fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn insert(id: &str, vector: Vec<f32>, space: &str, uri: &str) -> VectorInsert {
        VectorInsert::new(id, vector, "acme", uri)
            .with_owner_space(space)
            .with_payload(serde_json::json!({ "uri": uri }))
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![3.0, 4.0, 0.0];
        assert!((euclidean_distance(&a, &b) - 5.0).abs() < 1e-6);
        assert!((dot_product(&[1.0, 2.0], &[3.0, 4.0]) - 11.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_ranks_and_filters() {
        let index = SimpleVectorIndex::in_memory(2, VectorMetric::Cosine);
        index
            .upsert(&[
                insert("a", vec![1.0, 0.0], "", "viking://resources/a.md"),
                insert("b", vec![0.7, 0.7], "", "viking://resources/b.md"),
                insert("c", vec![1.0, 0.0], "bob", "viking://user/bob/memories/c.md"),
            ])
            .await
            .unwrap();

        let filter = VectorSearchFilter::new()
            .with_account("acme")
            .with_owner_space("");
        let results = index.query(&[1.0, 0.0], 10, &filter).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_checks_dimension() {
        let index = SimpleVectorIndex::in_memory(2, VectorMetric::Dot);
        index
            .upsert(&[insert("a", vec![1.0, 0.0], "", "viking://resources/a.md")])
            .await
            .unwrap();
        index
            .upsert(&[insert("a", vec![0.0, 1.0], "", "viking://resources/a.md")])
            .await
            .unwrap();
        assert_eq!(index.len().await.unwrap(), 1);
        let stored = index.get(&VectorId::new("a")).await.unwrap().unwrap();
        assert_eq!(stored.vector, vec![0.0, 1.0]);
        assert!(index.get(&VectorId::new("missing")).await.unwrap().is_none());

        let err = index
            .upsert(&[insert("x", vec![1.0], "", "viking://resources/x.md")])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_delete_matching_subtree() {
        let index = SimpleVectorIndex::in_memory(1, VectorMetric::Cosine);
        index
            .upsert(&[
                insert("1", vec![1.0], "", "viking://resources/docs"),
                insert("2", vec![1.0], "", "viking://resources/docs/a.md"),
                insert("3", vec![1.0], "", "viking://resources/docs2/b.md"),
            ])
            .await
            .unwrap();

        let filter = VectorSearchFilter::new()
            .with_account("acme")
            .with_uri_prefix("viking://resources/docs");
        assert_eq!(index.delete_matching(&filter).await.unwrap(), 2);
        assert_eq!(index.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_health_check_fails_on_poisoned_lock() {
        let index = std::sync::Arc::new(SimpleVectorIndex::in_memory(2, VectorMetric::Cosine));
        assert!(index.health_check().await.unwrap());

        let writer = std::sync::Arc::clone(&index);
        let _ = std::thread::spawn(move || {
            let _guard = writer.vectors.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        assert!(matches!(
            index.health_check().await,
            Err(DbError::Internal { .. })
        ));
    }

    #[tokio::test]
    async fn test_persistence_roundtrip() {
        let temp = TempDir::new().unwrap();
        let config = VectorIndexConfig::simple(2, temp.path());

        {
            let index = SimpleVectorIndex::open(&config).await.unwrap();
            index
                .upsert(&[insert("a", vec![1.0, 0.0], "", "viking://resources/a.md")])
                .await
                .unwrap();
        }

        let reopened = SimpleVectorIndex::open(&config).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 1);
        assert!(reopened.health_check().await.unwrap());

        let wrong_dim = VectorIndexConfig::simple(3, temp.path());
        assert!(matches!(
            SimpleVectorIndex::open(&wrong_dim).await,
            Err(DbError::DimensionMismatch { .. })
        ));
    }
}
