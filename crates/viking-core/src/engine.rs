//! Viking engine: assembles backends, pipeline and filesystem from config.
//!
//! The [`VikingEngine`] owns the long-lived pieces of a running process. The
//! [`FsService`] it exposes is attached only after the pipeline has started
//! and recovered its persisted queue, so early requests fail fast with
//! `NotInitialized` instead of racing startup.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use viking_db::object::{open_object_store, ObjectStore};
use viking_db::vector::{open_vector_index, VectorIndexBackend};
use viking_model::{create_embedding_provider, EmbeddingProvider, VisionProvider};

use crate::config::VikingConfig;
use crate::errors::{VikingError, VikingResult};
use crate::facade::FsService;
use crate::fs::ContextFs;
use crate::media::MediaSummarizer;
use crate::pipeline::{EmbeddingPipeline, QueueStatus};
use crate::readiness::{check_readiness, IdentityStore, ReadinessReport};

// ============================================================================
// VikingEngine
// ============================================================================

/// A running Viking instance.
///
/// # Example
///
/// ```ignore
/// use viking_core::{Identity, VikingConfig, VikingEngine};
///
/// let engine = VikingEngine::from_config(&VikingConfig::load(None)?).await?;
/// let me = Identity::new("acme", "alice", "helper")?;
/// engine.service().write("viking://resources/notes/a.md", "hello", &me).await?;
/// engine.wait_processed(Duration::from_secs(5)).await;
/// ```
pub struct VikingEngine {
    config: VikingConfig,
    store: Arc<dyn ObjectStore>,
    index: Arc<dyn VectorIndexBackend>,
    provider: Arc<dyn EmbeddingProvider>,
    pipeline: Arc<EmbeddingPipeline>,
    fs: Arc<ContextFs>,
    service: Arc<FsService>,
    identity_store: Option<Arc<dyn IdentityStore>>,
}

impl std::fmt::Debug for VikingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VikingEngine")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl VikingEngine {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Build an engine from configuration, with no vision provider.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend cannot be opened or the embedding
    /// dimension does not match an existing index.
    pub async fn from_config(config: &VikingConfig) -> VikingResult<Self> {
        config.validate()?;

        let store = open_object_store(&config.storage.to_object_store_config()).await?;
        let provider = create_embedding_provider(&config.embedding)?;
        let index = open_vector_index(&config.vector.to_index_config(provider.dimension())).await?;

        Self::from_parts(config.clone(), store, index, provider, None).await
    }

    /// Build an engine over existing backends.
    pub async fn from_parts(
        config: VikingConfig,
        store: Arc<dyn ObjectStore>,
        index: Arc<dyn VectorIndexBackend>,
        provider: Arc<dyn EmbeddingProvider>,
        vision: Option<Arc<dyn VisionProvider>>,
    ) -> VikingResult<Self> {
        if index.dimension() != provider.dimension() {
            return Err(VikingError::config(
                format!(
                    "vector index dimension {} does not match embedding dimension {} ({})",
                    index.dimension(),
                    provider.dimension(),
                    provider.model_id()
                ),
                "Use the embedding model the index was built with, or point vector.path at a new directory",
            ));
        }

        let pipeline = Arc::new(
            EmbeddingPipeline::start(
                store.clone(),
                index.clone(),
                provider.clone(),
                config.pipeline.clone(),
            )
            .await?,
        );

        let fs = Arc::new(
            ContextFs::new(store.clone(), index.clone(), provider.clone(), pipeline.clone())
                .with_fs_config(config.fs.clone())
                .with_search_config(config.search.clone())
                .with_summarizer(MediaSummarizer::new(vision, config.media.max_concurrent_llm)),
        );

        let service = Arc::new(FsService::new());
        service.attach(fs.clone());

        info!(
            storage = %config.storage.backend,
            vector = %config.vector.backend,
            model = provider.model_id(),
            "viking engine ready"
        );

        Ok(Self {
            config,
            store,
            index,
            provider,
            pipeline,
            fs,
            service,
            identity_store: None,
        })
    }

    /// Register the external identity store for readiness checks.
    pub fn with_identity_store(mut self, identity_store: Arc<dyn IdentityStore>) -> Self {
        self.identity_store = Some(identity_store);
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn config(&self) -> &VikingConfig {
        &self.config
    }

    /// The access facade handed to request handlers.
    pub fn service(&self) -> Arc<FsService> {
        self.service.clone()
    }

    /// The filesystem itself, bypassing the facade's defaults.
    pub fn fs(&self) -> &Arc<ContextFs> {
        &self.fs
    }

    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn vector_index(&self) -> &Arc<dyn VectorIndexBackend> {
        &self.index
    }

    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    /// Embedding queue counters.
    pub fn queue_status(&self) -> QueueStatus {
        self.pipeline.status()
    }

    /// Wait for the embedding queue to drain; returns the unprocessed count.
    pub async fn wait_processed(&self, timeout: Duration) -> usize {
        self.pipeline.wait_processed(timeout).await
    }

    /// Check every backend.
    pub async fn readiness(&self) -> ReadinessReport {
        check_readiness(
            Some(self.store.as_ref()),
            Some(self.index.as_ref()),
            self.identity_store.as_deref(),
        )
        .await
    }

    /// Drain the queue for up to `drain_timeout`, stop the workers, and flush
    /// the index. Messages still queued are replayed on the next start.
    pub async fn shutdown(&self, drain_timeout: Duration) -> VikingResult<()> {
        self.service.detach();
        let remaining = self.pipeline.wait_processed(drain_timeout).await;
        if remaining > 0 {
            warn!(remaining, "shutting down with unprocessed embedding messages");
        }
        self.pipeline.shutdown().await;
        self.index.flush().await?;
        info!("viking engine stopped");
        Ok(())
    }
}
