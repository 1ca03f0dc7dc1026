//! # viking-core
//!
//! Core library for Viking, a tenant-scoped context filesystem for AI agents.
//!
//! Resources, skills and memories live in one `viking://` namespace. Each
//! node can carry tiered digests (`.abstract.md` for L0, `.overview.md` for
//! L1) next to its detail content, and is kept searchable by an asynchronous
//! embedding pipeline.
//!
//! ## Architecture
//!
//! - **Identity**: `(account, user, agent)` triples and the space names
//!   derived from them ([`identity`])
//! - **Context**: the canonical record for one node and its derivation rules
//!   ([`context`])
//! - **Filesystem**: tenant-scoped namespace operations ([`fs`])
//! - **Embedding pipeline**: durable queue and worker pool feeding the
//!   vector index ([`pipeline`])
//! - **Access facade**: default limits and the startup guard ([`facade`])
//! - **Engine**: assembly from configuration ([`engine`])
//!
//! Storage and providers come from `viking-db` and `viking-model`.
//!
//! ## Usage
//!
//! ```ignore
//! use viking_core::{Identity, LsRequest, VikingConfig, VikingEngine};
//!
//! let engine = VikingEngine::from_config(&VikingConfig::load(None)?).await?;
//! let me = Identity::new("acme", "alice", "helper")?;
//! let fs = engine.service();
//!
//! fs.write("viking://resources/guides/setup.md", "# Setup\n...", &me).await?;
//! let listing = fs.ls("viking://resources/guides", &me, &LsRequest::default()).await?;
//! engine.wait_processed(std::time::Duration::from_secs(5)).await;
//! let hits = fs.find("how do I set up", &me, None, None).await?;
//! ```

pub mod config;
pub mod context;
pub mod db_adapter;
pub mod engine;
pub mod errors;
pub mod facade;
pub mod fs;
pub mod identity;
pub mod media;
pub mod pipeline;
pub mod readiness;
pub mod uri;

pub use config::{
    FsConfig, MediaConfig, PipelineConfig, SearchConfig, StorageConfig, VectorConfig, VikingConfig,
};
pub use context::{context_id_for, Context, ContextLevel, ContextType};
pub use engine::VikingEngine;
pub use errors::{VikingError, VikingResult};
pub use facade::{FsService, LsRequest};
pub use fs::{
    AgentEntry, ContextFs, FindResult, FsEntry, GrepMatch, ListOptions, ListView, Listing,
    MatchedContext, MediaIngest, SessionMessage, TreeNode, WalkBounds,
};
pub use identity::Identity;
pub use media::{MediaKind, MediaSummarizer, MediaSummary};
pub use pipeline::{EmbeddingMsg, EmbeddingMsgConverter, EmbeddingPipeline, QueueStatus};
pub use readiness::{CheckStatus, IdentityStore, ReadinessReport};
pub use uri::{UriRoot, VikingUri};

// Infrastructure types callers commonly need alongside the engine.
pub use viking_db::object::ObjectStore;
pub use viking_db::vector::VectorIndexBackend;
pub use viking_model::{EmbeddingConfig, EmbeddingProvider, VisionProvider};
