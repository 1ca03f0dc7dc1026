//! Local-directory object store.
//!
//! Maps object paths onto a root directory with `tokio::fs`. Durable across
//! restarts, which is what the embedding queue relies on for replay.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::traits::{normalize_path, ObjectEntry, ObjectStore};
use crate::error::{DbError, DbResult};

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> DbResult<Self> {
        let root = root.into();
        debug!("Opening LocalObjectStore at {:?}", root);
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> DbResult<(String, PathBuf)> {
        let normalized = normalize_path(path)?;
        let mut local = self.root.clone();
        for segment in normalized.split('/').filter(|s| !s.is_empty()) {
            local.push(segment);
        }
        Ok((normalized, local))
    }

    fn map_io(path: &str, err: std::io::Error) -> DbError {
        match err.kind() {
            ErrorKind::NotFound => DbError::not_found(path),
            ErrorKind::AlreadyExists => DbError::AlreadyExists {
                path: path.to_string(),
            },
            _ => DbError::Io(err),
        }
    }

    fn entry_from_metadata(path: &str, meta: &std::fs::Metadata) -> ObjectEntry {
        let mod_time = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        if meta.is_dir() {
            ObjectEntry::dir(path, mod_time)
        } else {
            ObjectEntry::file(path, meta.len(), mod_time)
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn read(&self, path: &str) -> DbResult<Vec<u8>> {
        let (path, local) = self.resolve(path)?;
        let meta = tokio::fs::metadata(&local)
            .await
            .map_err(|e| Self::map_io(&path, e))?;
        if meta.is_dir() {
            return Err(DbError::IsADirectory { path });
        }
        tokio::fs::read(&local)
            .await
            .map_err(|e| Self::map_io(&path, e))
    }

    async fn write(&self, path: &str, data: &[u8]) -> DbResult<()> {
        let (path, local) = self.resolve(path)?;
        if let Ok(meta) = tokio::fs::metadata(&local).await {
            if meta.is_dir() {
                return Err(DbError::IsADirectory { path });
            }
        }
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::map_io(&path, e))?;
        }
        tokio::fs::write(&local, data)
            .await
            .map_err(|e| Self::map_io(&path, e))
    }

    async fn mkdir(&self, path: &str) -> DbResult<()> {
        let (path, local) = self.resolve(path)?;
        if let Ok(meta) = tokio::fs::metadata(&local).await {
            if !meta.is_dir() {
                return Err(DbError::AlreadyExists { path });
            }
            return Ok(());
        }
        tokio::fs::create_dir_all(&local)
            .await
            .map_err(|e| Self::map_io(&path, e))
    }

    async fn remove(&self, path: &str, recursive: bool) -> DbResult<()> {
        let (path, local) = self.resolve(path)?;
        if path == "/" {
            return Err(DbError::invalid_path(path));
        }

        let meta = tokio::fs::metadata(&local)
            .await
            .map_err(|e| Self::map_io(&path, e))?;
        if !meta.is_dir() {
            return tokio::fs::remove_file(&local)
                .await
                .map_err(|e| Self::map_io(&path, e));
        }

        if recursive {
            return tokio::fs::remove_dir_all(&local)
                .await
                .map_err(|e| Self::map_io(&path, e));
        }

        let mut entries = tokio::fs::read_dir(&local)
            .await
            .map_err(|e| Self::map_io(&path, e))?;
        if entries.next_entry().await?.is_some() {
            return Err(DbError::DirectoryNotEmpty { path });
        }
        tokio::fs::remove_dir(&local)
            .await
            .map_err(|e| Self::map_io(&path, e))
    }

    async fn rename(&self, from: &str, to: &str) -> DbResult<()> {
        let (from, from_local) = self.resolve(from)?;
        let (to, to_local) = self.resolve(to)?;
        if from == "/" || to.starts_with(&format!("{}/", from)) {
            return Err(DbError::invalid_path(to));
        }

        tokio::fs::metadata(&from_local)
            .await
            .map_err(|e| Self::map_io(&from, e))?;
        if tokio::fs::metadata(&to_local).await.is_ok() {
            return Err(DbError::AlreadyExists { path: to });
        }
        if let Some(parent) = to_local.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::map_io(&to, e))?;
        }
        tokio::fs::rename(&from_local, &to_local)
            .await
            .map_err(|e| Self::map_io(&from, e))
    }

    async fn list(&self, path: &str) -> DbResult<Vec<ObjectEntry>> {
        let (path, local) = self.resolve(path)?;
        let meta = tokio::fs::metadata(&local)
            .await
            .map_err(|e| Self::map_io(&path, e))?;
        if !meta.is_dir() {
            return Err(DbError::NotADirectory { path });
        }

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&local)
            .await
            .map_err(|e| Self::map_io(&path, e))?;
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().to_string();
            let child = if path == "/" {
                format!("/{}", name)
            } else {
                format!("{}/{}", path, name)
            };
            let meta = item.metadata().await?;
            entries.push(Self::entry_from_metadata(&child, &meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> DbResult<ObjectEntry> {
        let (path, local) = self.resolve(path)?;
        let meta = tokio::fs::metadata(&local)
            .await
            .map_err(|e| Self::map_io(&path, e))?;
        Ok(Self::entry_from_metadata(&path, &meta))
    }
}
