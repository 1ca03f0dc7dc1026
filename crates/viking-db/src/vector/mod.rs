//! Vector index module for viking-db.
//!
//! One index is shared by every tenant; each record carries its account and
//! owner space and every query is filtered on them.
//!
//! ## Usage
//!
//! ```ignore
//! use viking_db::vector::{open_vector_index, VectorIndexConfig, VectorSearchFilter};
//!
//! let index = open_vector_index(&VectorIndexConfig::new(256)).await?;
//! index.upsert(&inserts).await?;
//!
//! let filter = VectorSearchFilter::new().with_account("acme");
//! let results = index.query(&embedding, 10, &filter).await?;
//! ```

mod backend;
mod config;
mod metadata;
mod traits;

pub use backend::{available_backends, cosine_similarity, open_vector_index, SimpleVectorIndex};
pub use config::{
    load_index_meta, write_index_meta, VectorIndexConfig, VectorIndexMeta, BACKEND_MEMORY,
    BACKEND_SIMPLE, DEFAULT_BACKEND, INDEX_META_FILENAME,
};
pub use metadata::{
    uri_in_subtree, VectorSearchFilter, CONTEXT_TYPE_MEMORY, CONTEXT_TYPE_RESOURCE,
    CONTEXT_TYPE_SKILL,
};
pub use traits::{VectorId, VectorIndexBackend, VectorInsert, VectorMetric, VectorSearchResult};
