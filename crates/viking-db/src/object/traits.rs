//! Object store traits and path helpers.
//!
//! Object paths are absolute, slash-separated strings (`/acme/resources/doc.md`).
//! Directories are first-class: they can exist while empty and are created
//! implicitly when a file is written below them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};

// ============================================================================
// ObjectEntry
// ============================================================================

/// Metadata for a single object or directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEntry {
    /// Normalized absolute path.
    pub path: String,

    /// Last path segment (empty for the root).
    pub name: String,

    /// Whether this entry is a directory.
    pub is_dir: bool,

    /// Size in bytes (0 for directories).
    pub size: u64,

    /// Last modification time.
    pub mod_time: DateTime<Utc>,
}

impl ObjectEntry {
    /// Create a directory entry.
    pub fn dir(path: impl Into<String>, mod_time: DateTime<Utc>) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path).to_string(),
            path,
            is_dir: true,
            size: 0,
            mod_time,
        }
    }

    /// Create a file entry.
    pub fn file(path: impl Into<String>, size: u64, mod_time: DateTime<Utc>) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path).to_string(),
            path,
            is_dir: false,
            size,
            mod_time,
        }
    }
}

// ============================================================================
// ObjectStore Trait
// ============================================================================

/// Byte storage addressed by hierarchical path.
///
/// ## Implementation Notes
///
/// - Backends must be `Send + Sync`; one store is shared by every tenant.
///   Tenant scoping is the caller's job (paths carry the account prefix).
/// - `write` and `rename` create missing parent directories.
/// - `list` returns children sorted by name.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read the full content of a file.
    async fn read(&self, path: &str) -> DbResult<Vec<u8>>;

    /// Create or replace a file.
    async fn write(&self, path: &str, data: &[u8]) -> DbResult<()>;

    /// Create a directory and any missing parents. Existing directories are kept.
    async fn mkdir(&self, path: &str) -> DbResult<()>;

    /// Remove a file or directory.
    ///
    /// Removing a non-empty directory requires `recursive`.
    async fn remove(&self, path: &str, recursive: bool) -> DbResult<()>;

    /// Move a file or directory subtree. Fails if `to` already exists.
    async fn rename(&self, from: &str, to: &str) -> DbResult<()>;

    /// List the direct children of a directory.
    async fn list(&self, path: &str) -> DbResult<Vec<ObjectEntry>>;

    /// Metadata for a single path.
    async fn stat(&self, path: &str) -> DbResult<ObjectEntry>;

    /// Whether anything exists at `path`.
    async fn exists(&self, path: &str) -> DbResult<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check that the backend is reachable.
    async fn health_check(&self) -> DbResult<bool> {
        self.stat("/").await.map(|entry| entry.is_dir)
    }
}

// ============================================================================
// Path Helpers
// ============================================================================

/// Normalize an absolute object path.
///
/// Collapses duplicate and trailing slashes. Rejects relative paths and
/// `.`/`..` segments.
pub fn normalize_path(path: &str) -> DbResult<String> {
    if !path.starts_with('/') {
        return Err(DbError::invalid_path(path));
    }

    let mut parts = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" => continue,
            "." | ".." => return Err(DbError::invalid_path(path)),
            s => parts.push(s),
        }
    }

    Ok(format!("/{}", parts.join("/")))
}

/// Parent of a normalized path, `None` for the root.
pub fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Join a child name onto a normalized directory path.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Last segment of a normalized path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/").unwrap(), "/");
        assert_eq!(normalize_path("//a//b/").unwrap(), "/a/b");
        assert!(normalize_path("a/b").is_err());
        assert!(normalize_path("/a/../b").is_err());
        assert!(normalize_path("/a/./b").is_err());
    }

    #[test]
    fn test_parent_and_join() {
        assert_eq!(parent_path("/"), None);
        assert_eq!(parent_path("/a"), Some("/"));
        assert_eq!(parent_path("/a/b"), Some("/a"));
        assert_eq!(join_path("/", "a"), "/a");
        assert_eq!(join_path("/a", "b"), "/a/b");
        assert_eq!(file_name("/a/b.md"), "b.md");
        assert_eq!(file_name("/"), "");
    }
}
