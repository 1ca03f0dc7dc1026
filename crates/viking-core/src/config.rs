//! Configuration types for Viking.
//!
//! [`VikingConfig`] is loaded from YAML (`~/.viking/config.yaml` by default) and
//! passed explicitly to [`VikingEngine`](crate::engine::VikingEngine); nothing
//! reads configuration from process-wide state after startup.
//!
//! # Example YAML
//!
//! ```yaml
//! storage:
//!   backend: local
//!   path: /var/lib/viking/data
//! vector:
//!   backend: simple
//!   path: /var/lib/viking/vectors
//!   metric: cosine
//! embedding:
//!   provider: hash
//!   modelId: viking-hash-v1
//!   dimension: 256
//! pipeline:
//!   concurrency: 4
//!   maxAttempts: 3
//! fs:
//!   absLimit: 256
//!   nodeLimit: 1000
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use viking_db::object::ObjectStoreConfig;
use viking_db::vector::{VectorIndexConfig, VectorMetric};
use viking_model::EmbeddingConfig;

use crate::errors::{VikingError, VikingResult};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "VIKING_CONFIG";

/// Directory under the home directory holding the default config.
pub const VIKING_HOME_DIR: &str = ".viking";

/// Default config file name.
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Default worker pool size.
pub const DEFAULT_PIPELINE_CONCURRENCY: usize = 4;

/// Default attempts per embedding message before dead-lettering.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 200;

/// Upper bound on retry delay.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5000;

/// Default abstract truncation for agent listings.
pub const DEFAULT_ABS_LIMIT: usize = 256;

/// Default abstract truncation for agent trees.
pub const DEFAULT_TREE_ABS_LIMIT: usize = 128;

/// Default cap on nodes returned by a recursive walk.
pub const DEFAULT_NODE_LIMIT: usize = 1000;

/// Default cap on recursion depth.
pub const DEFAULT_LEVEL_LIMIT: usize = 3;

/// Default cap on characters sent to the embedding provider per leaf.
pub const DEFAULT_VECTORIZE_MAX_CHARS: usize = 2000;

/// Default top-k for semantic search.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Default number of recent session messages blended into `search`.
pub const DEFAULT_SESSION_WINDOW: usize = 5;

/// Default weight of the session embedding in `search`.
pub const DEFAULT_SESSION_WEIGHT: f32 = 0.3;

/// Default cap on concurrent vision/language calls.
pub const DEFAULT_MAX_CONCURRENT_LLM: usize = 4;

// ============================================================================
// Sections
// ============================================================================

/// Object storage section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// `memory` or `local`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Root directory for the `local` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_storage_backend() -> String {
    viking_db::object::BACKEND_MEMORY.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

impl StorageConfig {
    /// Convert to the infrastructure config.
    pub fn to_object_store_config(&self) -> ObjectStoreConfig {
        ObjectStoreConfig {
            backend: self.backend.clone(),
            path: self.path.clone(),
        }
    }
}

/// Vector index section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorConfig {
    /// `memory` or `simple`.
    #[serde(default = "default_vector_backend")]
    pub backend: String,

    /// Index directory for the `simple` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Similarity metric.
    #[serde(default)]
    pub metric: VectorMetric,
}

fn default_vector_backend() -> String {
    viking_db::vector::DEFAULT_BACKEND.to_string()
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: default_vector_backend(),
            path: None,
            metric: VectorMetric::default(),
        }
    }
}

impl VectorConfig {
    /// Convert to the infrastructure config for an index of `dimension`.
    pub fn to_index_config(&self, dimension: usize) -> VectorIndexConfig {
        VectorIndexConfig {
            dimension,
            path: self.path.clone(),
            backend: self.backend.clone(),
            metric: self.metric,
        }
    }
}

/// Embedding pipeline section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Number of workers draining the queue.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per message before it is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on retry delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_concurrency() -> usize {
    DEFAULT_PIPELINE_CONCURRENCY
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_initial_backoff_ms() -> u64 {
    DEFAULT_INITIAL_BACKOFF_MS
}
fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_PIPELINE_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl PipelineConfig {
    /// Delay before retry number `attempt` (1-based):
    /// `min(initial * 2^(attempt-1), max)`.
    pub fn backoff_for(&self, attempt: u32) -> std::time::Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_backoff_ms);
        std::time::Duration::from_millis(delay)
    }
}

/// Filesystem defaults applied by the access facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsConfig {
    /// Abstract truncation for agent listings.
    #[serde(default = "default_abs_limit")]
    pub abs_limit: usize,

    /// Abstract truncation for agent trees.
    #[serde(default = "default_tree_abs_limit")]
    pub tree_abs_limit: usize,

    /// Max nodes in a recursive walk.
    #[serde(default = "default_node_limit")]
    pub node_limit: usize,

    /// Max depth of a recursive walk.
    #[serde(default = "default_level_limit")]
    pub level_limit: usize,

    /// Max characters of a leaf sent for embedding.
    #[serde(default = "default_vectorize_max_chars")]
    pub vectorize_max_chars: usize,
}

fn default_abs_limit() -> usize {
    DEFAULT_ABS_LIMIT
}
fn default_tree_abs_limit() -> usize {
    DEFAULT_TREE_ABS_LIMIT
}
fn default_node_limit() -> usize {
    DEFAULT_NODE_LIMIT
}
fn default_level_limit() -> usize {
    DEFAULT_LEVEL_LIMIT
}
fn default_vectorize_max_chars() -> usize {
    DEFAULT_VECTORIZE_MAX_CHARS
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            abs_limit: DEFAULT_ABS_LIMIT,
            tree_abs_limit: DEFAULT_TREE_ABS_LIMIT,
            node_limit: DEFAULT_NODE_LIMIT,
            level_limit: DEFAULT_LEVEL_LIMIT,
            vectorize_max_chars: DEFAULT_VECTORIZE_MAX_CHARS,
        }
    }
}

/// Semantic search section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// Top-k when the caller gives none.
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// Recent session messages blended into `search`.
    #[serde(default = "default_session_window")]
    pub session_window: usize,

    /// Weight of the session embedding, in `[0, 1]`.
    #[serde(default = "default_session_weight")]
    pub session_weight: f32,
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}
fn default_session_window() -> usize {
    DEFAULT_SESSION_WINDOW
}
fn default_session_weight() -> f32 {
    DEFAULT_SESSION_WEIGHT
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_SEARCH_LIMIT,
            session_window: DEFAULT_SESSION_WINDOW,
            session_weight: DEFAULT_SESSION_WEIGHT,
        }
    }
}

/// Media summarization section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConfig {
    /// Cap on concurrent vision/language calls.
    #[serde(default = "default_max_concurrent_llm")]
    pub max_concurrent_llm: usize,
}

fn default_max_concurrent_llm() -> usize {
    DEFAULT_MAX_CONCURRENT_LLM
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_concurrent_llm: DEFAULT_MAX_CONCURRENT_LLM,
        }
    }
}

// ============================================================================
// VikingConfig
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VikingConfig {
    /// Object storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Vector index.
    #[serde(default)]
    pub vector: VectorConfig,

    /// Embedding provider.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Embedding pipeline.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Filesystem defaults.
    #[serde(default)]
    pub fs: FsConfig,

    /// Semantic search.
    #[serde(default)]
    pub search: SearchConfig,

    /// Media summarization.
    #[serde(default)]
    pub media: MediaConfig,
}

impl VikingConfig {
    /// Load configuration with the usual precedence:
    /// explicit path, then `VIKING_CONFIG`, then `~/.viking/config.yaml`,
    /// then built-in defaults.
    ///
    /// # Errors
    ///
    /// An explicit or env-named file that is missing or invalid is an error.
    /// A missing default file is not.
    pub fn load(explicit: Option<&Path>) -> VikingResult<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
            return Self::from_path(Path::new(&path));
        }
        Self::load_default()
    }

    /// Load from `~/.viking/config.yaml`, or defaults when it does not exist.
    pub fn load_default() -> VikingResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_path(&path),
            Some(path) => {
                tracing::debug!("Config not found at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate a specific file.
    pub fn from_path(path: &Path) -> VikingResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VikingError::config(
                format!("Failed to read {}: {}", path.display(), e),
                "Check the --config flag or VIKING_CONFIG",
            )
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            VikingError::Yaml(err) => VikingError::config(
                format!("Failed to parse {}: {}", path.display(), err),
                "Fix the YAML syntax",
            ),
            other => other,
        })
    }

    /// Parse and validate YAML.
    pub fn from_yaml(content: &str) -> VikingResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Default config directory (`~/.viking`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(VIKING_HOME_DIR))
    }

    /// Default config file path (`~/.viking/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join(CONFIG_FILENAME))
    }

    /// In-memory backends and small pipeline delays, for tests.
    pub fn default_for_testing() -> Self {
        let mut config = Self::default();
        config.embedding = EmbeddingConfig::default().with_dimension(64);
        config.pipeline.initial_backoff_ms = 1;
        config.pipeline.max_backoff_ms = 5;
        config
    }

    /// Reject values that would make the system unusable.
    pub fn validate(&self) -> VikingResult<()> {
        if self.pipeline.concurrency == 0 {
            return Err(VikingError::config(
                "pipeline.concurrency cannot be 0",
                "Set concurrency to at least 1 (default: 4)",
            ));
        }
        if self.pipeline.max_attempts == 0 {
            return Err(VikingError::config(
                "pipeline.maxAttempts cannot be 0",
                "Set maxAttempts to at least 1 (default: 3)",
            ));
        }
        if self.fs.node_limit == 0 || self.fs.level_limit == 0 {
            return Err(VikingError::config(
                "fs.nodeLimit and fs.levelLimit must be positive",
                "Use the defaults (1000 and 3) unless you need tighter bounds",
            ));
        }
        if !(0.0..=1.0).contains(&self.search.session_weight) {
            return Err(VikingError::config(
                format!(
                    "search.sessionWeight={} is outside [0, 1]",
                    self.search.session_weight
                ),
                "Use a weight between 0.0 and 1.0 (default: 0.3)",
            ));
        }
        if self.media.max_concurrent_llm == 0 {
            return Err(VikingError::config(
                "media.maxConcurrentLlm cannot be 0",
                "Set maxConcurrentLlm to at least 1 (default: 4)",
            ));
        }
        self.embedding.validate().map_err(|e| {
            VikingError::config(e.to_string(), "Check the embedding section of config.yaml")
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = VikingConfig::default();
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.vector.backend, "memory");
        assert_eq!(config.pipeline.concurrency, 4);
        assert_eq!(config.fs.abs_limit, 256);
        assert_eq!(config.fs.tree_abs_limit, 128);
        assert_eq!(config.fs.node_limit, 1000);
        assert_eq!(config.fs.level_limit, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
storage:
  backend: local
  path: /tmp/viking
pipeline:
  concurrency: 2
fs:
  absLimit: 64
"#;
        let config = VikingConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.storage.backend, "local");
        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/viking")));
        assert_eq!(config.pipeline.concurrency, 2);
        assert_eq!(config.pipeline.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.fs.abs_limit, 64);
        assert_eq!(config.fs.node_limit, DEFAULT_NODE_LIMIT);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let result = VikingConfig::from_yaml("pipeline:\n  concurrency: 0\n");
        assert!(matches!(result, Err(VikingError::Config { .. })));
    }

    #[test]
    fn test_backoff_is_capped_exponential() {
        let pipeline = PipelineConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 500,
            ..PipelineConfig::default()
        };
        assert_eq!(pipeline.backoff_for(1).as_millis(), 100);
        assert_eq!(pipeline.backoff_for(2).as_millis(), 200);
        assert_eq!(pipeline.backoff_for(3).as_millis(), 400);
        assert_eq!(pipeline.backoff_for(4).as_millis(), 500);
        assert_eq!(pipeline.backoff_for(60).as_millis(), 500);
    }

    #[test]
    fn test_explicit_path_errors() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.yaml");
        assert!(matches!(
            VikingConfig::load(Some(&missing)),
            Err(VikingError::Config { .. })
        ));

        let invalid = temp.path().join("invalid.yaml");
        std::fs::write(&invalid, "storage: [not: valid").unwrap();
        assert!(matches!(
            VikingConfig::from_path(&invalid),
            Err(VikingError::Config { .. })
        ));

        let valid = temp.path().join("valid.yaml");
        std::fs::write(&valid, "search:\n  defaultLimit: 3\n").unwrap();
        assert_eq!(VikingConfig::from_path(&valid).unwrap().search.default_limit, 3);
    }

    #[test]
    fn test_index_config_conversion() {
        let vector = VectorConfig {
            backend: "simple".to_string(),
            path: Some(PathBuf::from("/tmp/idx")),
            metric: VectorMetric::Dot,
        };
        let index = vector.to_index_config(32);
        assert_eq!(index.dimension, 32);
        assert_eq!(index.backend, "simple");
        assert_eq!(index.metric, VectorMetric::Dot);
    }
}
