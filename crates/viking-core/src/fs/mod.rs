//! The context filesystem.
//!
//! [`ContextFs`] is the tenant-scoped namespace over a shared object store.
//! Every operation takes the calling [`Identity`]; uris are checked for
//! visibility before anything is read or mutated, and are mapped to
//! account-prefixed physical paths so accounts never share storage.
//!
//! Structural changes are synchronous (read-your-writes for `list`, `stat`,
//! `read` and `tree`). Semantic state follows through the
//! [`EmbeddingPipeline`]: writes enqueue contexts, removals delete vectors
//! directly.
//!
//! ## Submodules
//!
//! - [`listing`] - `list`, `tree`, and the listing view types
//! - [`search`] - `grep` and `glob` subtree scans
//! - [`semantic`] - `find`, `search`, and the session message log

pub mod listing;
pub mod search;
pub mod semantic;

pub use listing::{AgentEntry, FsEntry, ListOptions, ListView, Listing, TreeNode, WalkBounds};
pub use search::GrepMatch;
pub use semantic::{FindResult, MatchedContext, SessionMessage, SESSION_MESSAGES_FILE};

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use viking_db::object::{ObjectEntry, ObjectStore};
use viking_db::vector::{VectorIndexBackend, VectorSearchFilter};
use viking_db::DbError;
use viking_model::EmbeddingProvider;

use crate::config::{FsConfig, SearchConfig};
use crate::context::{context_id_for, Context, ContextLevel};
use crate::db_adapter::from_db_error;
use crate::errors::{VikingError, VikingResult};
use crate::identity::Identity;
use crate::media::{media_base_uri, media_type, MediaKind, MediaSummarizer};
use crate::pipeline::EmbeddingPipeline;
use crate::uri::{VikingUri, ABSTRACT_FILE, OVERVIEW_FILE};

/// Outcome of a media ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaIngest {
    /// Where the file was stored.
    pub uri: String,
    /// Detected media kind.
    pub kind: MediaKind,
    /// Summary used as the searchable text.
    pub summary: String,
}

// ============================================================================
// ContextFs
// ============================================================================

/// Tenant-scoped hierarchical namespace with asynchronous indexing.
pub struct ContextFs {
    store: Arc<dyn ObjectStore>,
    index: Arc<dyn VectorIndexBackend>,
    provider: Arc<dyn EmbeddingProvider>,
    pipeline: Arc<EmbeddingPipeline>,
    summarizer: MediaSummarizer,
    fs_config: FsConfig,
    search_config: SearchConfig,
}

impl std::fmt::Debug for ContextFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextFs")
            .field("provider", &self.provider.model_id())
            .field("fs_config", &self.fs_config)
            .field("search_config", &self.search_config)
            .finish()
    }
}

impl ContextFs {
    /// Create a filesystem over the given backends with default limits and
    /// no vision provider.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        index: Arc<dyn VectorIndexBackend>,
        provider: Arc<dyn EmbeddingProvider>,
        pipeline: Arc<EmbeddingPipeline>,
    ) -> Self {
        Self {
            store,
            index,
            provider,
            pipeline,
            summarizer: MediaSummarizer::new(None, 1),
            fs_config: FsConfig::default(),
            search_config: SearchConfig::default(),
        }
    }

    /// Replace the filesystem limits.
    pub fn with_fs_config(mut self, config: FsConfig) -> Self {
        self.fs_config = config;
        self
    }

    /// Replace the search settings.
    pub fn with_search_config(mut self, config: SearchConfig) -> Self {
        self.search_config = config;
        self
    }

    /// Replace the media summarizer.
    pub fn with_summarizer(mut self, summarizer: MediaSummarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Filesystem limits in effect.
    pub fn fs_config(&self) -> &FsConfig {
        &self.fs_config
    }

    /// Search settings in effect.
    pub fn search_config(&self) -> &SearchConfig {
        &self.search_config
    }

    /// The embedding pipeline fed by this filesystem.
    pub fn pipeline(&self) -> &Arc<EmbeddingPipeline> {
        &self.pipeline
    }

    // -------------------------------------------------------------------------
    // Metadata and reads
    // -------------------------------------------------------------------------

    /// Metadata for one node. Directories carry their abstract when one exists.
    pub async fn stat(&self, uri: &str, identity: &Identity) -> VikingResult<FsEntry> {
        let uri = self.resolve(uri, identity)?;
        let entry = self.stat_entry(&uri, identity).await?;
        let abstract_text = if entry.is_dir {
            self.dir_abstract(&uri, identity).await
        } else {
            String::new()
        };
        Ok(FsEntry::from_object(&uri, &entry, abstract_text))
    }

    /// Read a slice of a file's content.
    ///
    /// `offset` and `limit` count characters; a negative `limit` reads to the end.
    pub async fn read(
        &self,
        uri: &str,
        identity: &Identity,
        offset: usize,
        limit: i64,
    ) -> VikingResult<String> {
        let uri = self.resolve(uri, identity)?;
        let text = self.read_text(&uri, identity).await?;
        self.record_access(&uri, identity).await;
        let chars = text.chars().skip(offset);
        Ok(match usize::try_from(limit) {
            Ok(limit) => chars.take(limit).collect(),
            Err(_) => chars.collect(),
        })
    }

    /// Read the L0 digest of a node.
    pub async fn read_abstract(&self, uri: &str, identity: &Identity) -> VikingResult<String> {
        self.read_tier(uri, identity, ABSTRACT_FILE).await
    }

    /// Read the L1 digest of a node.
    pub async fn read_overview(&self, uri: &str, identity: &Identity) -> VikingResult<String> {
        self.read_tier(uri, identity, OVERVIEW_FILE).await
    }

    async fn read_tier(&self, uri: &str, identity: &Identity, file: &str) -> VikingResult<String> {
        let uri = self.resolve(uri, identity)?;
        let tier = uri.join(file)?;
        let text = self.read_text(&tier, identity).await?;
        self.record_access(&tier, identity).await;
        Ok(text)
    }

    /// Count a read as activity on the node's indexed record. Failures are
    /// logged and never fail the read.
    async fn record_access(&self, uri: &VikingUri, identity: &Identity) {
        let id = context_id_for(identity.account_id(), &uri.to_string());
        if let Err(e) = self.pipeline.record_activity(&id).await {
            warn!(uri = %uri, "failed to record access: {}", e);
        }
    }

    // -------------------------------------------------------------------------
    // Structural mutation
    // -------------------------------------------------------------------------

    /// Create a directory and any missing parents.
    pub async fn mkdir(&self, uri: &str, identity: &Identity) -> VikingResult<()> {
        let uri = self.resolve(uri, identity)?;
        if uri.is_namespace_root() {
            return Err(VikingError::invalid_uri(uri.to_string(), "cannot create the namespace root"));
        }
        self.store
            .mkdir(&self.physical(&uri, identity))
            .await
            .map_err(|e| map_db_error(&uri, e))?;
        debug!(uri = %uri, "mkdir");
        Ok(())
    }

    /// Write a file and enqueue it for embedding.
    ///
    /// Writes to `.abstract.md` / `.overview.md` produce digest-level contexts
    /// for the enclosing directory. Returns the context that was enqueued.
    pub async fn write(&self, uri: &str, content: &str, identity: &Identity) -> VikingResult<Context> {
        let uri = self.resolve(uri, identity)?;
        self.ensure_writable(&uri)?;
        self.store
            .write(&self.physical(&uri, identity), content.as_bytes())
            .await
            .map_err(|e| map_db_error(&uri, e))?;

        let context = self.node_context(&uri, content, identity);
        self.pipeline.enqueue_context(&context).await?;
        debug!(uri = %uri, level = context.level.as_u8(), "wrote node");
        Ok(context)
    }

    /// Write the L0 digest of a directory.
    pub async fn write_abstract(
        &self,
        dir_uri: &str,
        text: &str,
        identity: &Identity,
    ) -> VikingResult<Context> {
        let dir = self.resolve(dir_uri, identity)?;
        self.write(&dir.join(ABSTRACT_FILE)?.to_string(), text, identity)
            .await
    }

    /// Write the L1 digest of a directory.
    pub async fn write_overview(
        &self,
        dir_uri: &str,
        text: &str,
        identity: &Identity,
    ) -> VikingResult<Context> {
        let dir = self.resolve(dir_uri, identity)?;
        self.write(&dir.join(OVERVIEW_FILE)?.to_string(), text, identity)
            .await
    }

    /// Remove a node. Non-empty directories require `recursive`.
    ///
    /// Every vector entry under the removed uri is deleted as well; returns
    /// the number of vector entries removed.
    pub async fn remove(&self, uri: &str, recursive: bool, identity: &Identity) -> VikingResult<usize> {
        let uri = self.resolve(uri, identity)?;
        if uri.segments().is_empty() {
            return Err(VikingError::invalid_uri(uri.to_string(), "cannot remove a namespace root"));
        }
        self.store
            .remove(&self.physical(&uri, identity), recursive)
            .await
            .map_err(|e| map_db_error(&uri, e))?;

        let removed = self.delete_vectors(&uri, identity).await?;
        info!(uri = %uri, recursive, vectors = removed, "removed node");
        Ok(removed)
    }

    /// Move a node or subtree. Both ends must be visible to `identity`.
    ///
    /// Vector entries of the old location are deleted and every file under the
    /// new location is enqueued again.
    pub async fn mv(&self, from: &str, to: &str, identity: &Identity) -> VikingResult<()> {
        let from = self.resolve(from, identity)?;
        let to = self.resolve(to, identity)?;
        if from.segments().is_empty() {
            return Err(VikingError::invalid_uri(from.to_string(), "cannot move a namespace root"));
        }
        self.ensure_writable(&to)?;
        if to.starts_with(&from) {
            return Err(VikingError::invalid_uri(
                to.to_string(),
                "cannot move a node into itself",
            ));
        }

        self.store
            .rename(&self.physical(&from, identity), &self.physical(&to, identity))
            .await
            .map_err(|e| match e {
                DbError::AlreadyExists { .. } => VikingError::AlreadyExists(to.to_string()),
                other => map_db_error(&from, other),
            })?;

        self.delete_vectors(&from, identity).await?;
        let requeued = self.reindex_subtree(&to, identity).await?;
        info!(from = %from, to = %to, requeued, "moved node");
        Ok(())
    }

    /// Store a media file under today's media directory and index its summary.
    pub async fn add_media(
        &self,
        name: &str,
        data: &[u8],
        format: Option<&str>,
        identity: &Identity,
    ) -> VikingResult<MediaIngest> {
        if name.is_empty() || name.contains('/') || name.starts_with('.') {
            return Err(VikingError::validation("name", format!("`{}` is not a plain file name", name)));
        }
        let kind = media_type(Some(name), format).ok_or_else(|| {
            VikingError::validation("format", format!("`{}` is not an image, audio or video file", name))
        })?;

        let uri = VikingUri::parse(&media_base_uri(kind, Utc::now().date_naive()))?.join(name)?;
        self.store
            .write(&self.physical(&uri, identity), data)
            .await
            .map_err(|e| map_db_error(&uri, e))?;

        let summary = self.summarizer.summarize(kind, name, data).await;
        let context = self
            .base_context(&uri, identity)
            .with_leaf(true)
            .with_abstract(summary.summary.clone())
            .with_vectorize_text(summary.summary.clone())
            .with_meta("media_type", serde_json::Value::String(kind.as_str().to_string()));
        self.pipeline.enqueue_context(&context).await?;

        info!(uri = %uri, kind = %kind, bytes = data.len(), "ingested media");
        Ok(MediaIngest {
            uri: uri.to_string(),
            kind,
            summary: summary.summary,
        })
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Parse `uri` and check that `identity` may see it.
    fn resolve(&self, uri: &str, identity: &Identity) -> VikingResult<VikingUri> {
        let parsed = VikingUri::parse(uri)?;
        parsed.ensure_visible(identity)?;
        Ok(parsed)
    }

    fn physical(&self, uri: &VikingUri, identity: &Identity) -> String {
        uri.physical_path(identity.account_id())
    }

    /// Files can only live below a root, and below the space segment of a
    /// tenant-scoped root.
    fn ensure_writable(&self, uri: &VikingUri) -> VikingResult<()> {
        let min_segments = match uri.root() {
            None => usize::MAX,
            Some(root) if root.is_tenant_scoped() => 2,
            Some(_) => 1,
        };
        if uri.segments().len() < min_segments {
            return Err(VikingError::invalid_uri(
                uri.to_string(),
                "files must be placed below a root (and its space for user, agent and session)",
            ));
        }
        Ok(())
    }

    /// Object metadata for a uri. Namespace and root directories always exist.
    async fn stat_entry(&self, uri: &VikingUri, identity: &Identity) -> VikingResult<ObjectEntry> {
        let path = self.physical(uri, identity);
        match self.store.stat(&path).await {
            Ok(entry) => Ok(entry),
            Err(e) if e.is_not_found() && uri.segments().is_empty() => {
                Ok(ObjectEntry::dir(path, Utc::now()))
            }
            Err(e) => Err(map_db_error(uri, e)),
        }
    }

    async fn read_text(&self, uri: &VikingUri, identity: &Identity) -> VikingResult<String> {
        let bytes = self
            .store
            .read(&self.physical(uri, identity))
            .await
            .map_err(|e| map_db_error(uri, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Content of a directory's `.abstract.md`, empty when absent.
    async fn dir_abstract(&self, dir: &VikingUri, identity: &Identity) -> String {
        let Ok(tier) = dir.join(ABSTRACT_FILE) else {
            return String::new();
        };
        match self.store.read(&self.physical(&tier, identity)).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
            Err(_) => String::new(),
        }
    }

    fn base_context(&self, uri: &VikingUri, identity: &Identity) -> Context {
        let uri_str = uri.to_string();
        let mut context = Context::new(uri_str.clone(), Some(identity.clone()))
            .with_id(context_id_for(identity.account_id(), &uri_str));
        if let Some(parent) = uri.parent() {
            context = context.with_parent_uri(parent.to_string());
        }
        context
    }

    /// Context for a node's text content, as produced by `write` and `mv`.
    fn node_context(&self, uri: &VikingUri, content: &str, identity: &Identity) -> Context {
        let level = ContextLevel::from_uri(&uri.to_string());
        let vectorize: String = content
            .chars()
            .take(self.fs_config.vectorize_max_chars)
            .collect();

        let context = self
            .base_context(uri, identity)
            .with_vectorize_text(vectorize);
        match level {
            ContextLevel::Detail => {
                let excerpt = content
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .unwrap_or("");
                context
                    .with_leaf(true)
                    .with_abstract(truncate_chars(excerpt, self.fs_config.abs_limit))
            }
            ContextLevel::Abstract | ContextLevel::Overview => {
                context.with_leaf(false).with_abstract(content.trim())
            }
        }
    }

    async fn delete_vectors(&self, uri: &VikingUri, identity: &Identity) -> VikingResult<usize> {
        let filter = VectorSearchFilter::new()
            .with_account(identity.account_id())
            .with_uri_prefix(uri.to_string());
        Ok(self.index.delete_matching(&filter).await?)
    }

    /// Enqueue every file under `uri` (or `uri` itself when it is a file).
    async fn reindex_subtree(&self, uri: &VikingUri, identity: &Identity) -> VikingResult<usize> {
        let mut stack = vec![uri.clone()];
        let mut enqueued = 0;
        while let Some(current) = stack.pop() {
            let path = self.physical(&current, identity);
            let entry = self.store.stat(&path).await.map_err(|e| map_db_error(&current, e))?;
            if entry.is_dir {
                for child in self.store.list(&path).await.map_err(|e| map_db_error(&current, e))? {
                    stack.push(current.join(&child.name)?);
                }
                continue;
            }

            match self.read_text(&current, identity).await {
                Ok(content) => {
                    let context = self.node_context(&current, &content, identity);
                    if self.pipeline.enqueue_context(&context).await? {
                        enqueued += 1;
                    }
                }
                Err(e) => warn!(uri = %current, "skipping reindex: {}", e),
            }
        }
        Ok(enqueued)
    }
}

/// Map an object-store error onto the uri the caller used.
fn map_db_error(uri: &VikingUri, err: DbError) -> VikingError {
    let uri = uri.to_string();
    match err {
        DbError::NotFound { .. } => VikingError::NotFound(uri),
        DbError::AlreadyExists { .. } => VikingError::AlreadyExists(uri),
        DbError::NotADirectory { .. } => VikingError::NotADirectory(uri),
        DbError::IsADirectory { .. } => VikingError::IsADirectory(uri),
        DbError::DirectoryNotEmpty { .. } => VikingError::NotEmpty(uri),
        other => from_db_error(other),
    }
}

/// Truncate to `limit` characters, marking the cut with `...`.
pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push_str("...");
    out
}
