//! Object storage module for viking-db.
//!
//! ## Available Backends
//!
//! - `memory`: In-process `BTreeMap`, for tests and ephemeral use
//! - `local`: A directory on the local filesystem
//!
//! ## Usage
//!
//! ```ignore
//! use viking_db::object::{open_object_store, ObjectStoreConfig};
//!
//! let store = open_object_store(&ObjectStoreConfig::local("/var/lib/viking")).await?;
//! store.write("/acme/resources/doc.md", b"hello").await?;
//! ```

mod local;
mod memory;
mod traits;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DbError, DbResult};

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use traits::{file_name, join_path, normalize_path, parent_path, ObjectEntry, ObjectStore};

/// Backend name for the in-memory store.
pub const BACKEND_MEMORY: &str = "memory";

/// Backend name for the local-directory store.
pub const BACKEND_LOCAL: &str = "local";

/// Configuration for opening an object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStoreConfig {
    /// Backend to use (`memory` or `local`).
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Root directory for the `local` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_backend() -> String {
    BACKEND_MEMORY.to_string()
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}

impl ObjectStoreConfig {
    /// Config for a local-directory store.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BACKEND_LOCAL.to_string(),
            path: Some(path.into()),
        }
    }
}

/// Open an object store with the given configuration.
pub async fn open_object_store(config: &ObjectStoreConfig) -> DbResult<Arc<dyn ObjectStore>> {
    match config.backend.as_str() {
        BACKEND_MEMORY => Ok(Arc::new(MemoryObjectStore::new())),
        BACKEND_LOCAL => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| DbError::config("the local object store requires `path`"))?;
            info!("Opening local object store at {:?}", path);
            Ok(Arc::new(LocalObjectStore::open(path).await?))
        }
        other => Err(DbError::config(format!(
            "Unknown object store backend: '{}'. Available backends: {}, {}",
            other, BACKEND_MEMORY, BACKEND_LOCAL
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_by_default() {
        let store = open_object_store(&ObjectStoreConfig::default()).await.unwrap();
        assert!(store.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_local_requires_path() {
        let config = ObjectStoreConfig {
            backend: BACKEND_LOCAL.to_string(),
            path: None,
        };
        assert!(matches!(
            open_object_store(&config).await,
            Err(DbError::Config { .. })
        ));
    }
}
