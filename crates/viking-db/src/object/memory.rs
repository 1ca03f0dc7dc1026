//! In-memory object store.
//!
//! Keeps every node in a `BTreeMap` keyed by normalized path, so a subtree is
//! a contiguous key range. Intended for tests and ephemeral deployments.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::trace;

use super::traits::{normalize_path, parent_path, ObjectEntry, ObjectStore};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
enum Node {
    Dir { mod_time: DateTime<Utc> },
    File { data: Vec<u8>, mod_time: DateTime<Utc> },
}

/// Object store that keeps all data in process memory.
#[derive(Debug)]
pub struct MemoryObjectStore {
    nodes: RwLock<BTreeMap<String, Node>>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    /// Create an empty store containing only the root directory.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Dir { mod_time: Utc::now() });
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    fn lock_err<E: std::fmt::Display>(e: E) -> DbError {
        DbError::internal(format!("Failed to acquire store lock: {}", e))
    }

    /// Keys strictly below `path`.
    fn descendants<'a>(
        nodes: &'a BTreeMap<String, Node>,
        path: &str,
    ) -> impl Iterator<Item = &'a String> + 'a {
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        };
        nodes
            .range(prefix.clone()..)
            .take_while(move |(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k)
            .filter(move |k| k.as_str() != "/")
    }

    /// Create `path` and its ancestors as directories.
    fn ensure_dirs(nodes: &mut BTreeMap<String, Node>, path: &str) -> DbResult<()> {
        let mut missing = Vec::new();
        let mut current = Some(path);
        while let Some(p) = current {
            match nodes.get(p) {
                Some(Node::Dir { .. }) => break,
                Some(Node::File { .. }) => {
                    return Err(DbError::NotADirectory {
                        path: p.to_string(),
                    })
                }
                None => missing.push(p.to_string()),
            }
            current = parent_path(p);
        }

        let now = Utc::now();
        for p in missing {
            nodes.insert(p, Node::Dir { mod_time: now });
        }
        Ok(())
    }

    fn entry_for(path: &str, node: &Node) -> ObjectEntry {
        match node {
            Node::Dir { mod_time } => ObjectEntry::dir(path, *mod_time),
            Node::File { data, mod_time } => {
                ObjectEntry::file(path, data.len() as u64, *mod_time)
            }
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn read(&self, path: &str) -> DbResult<Vec<u8>> {
        let path = normalize_path(path)?;
        let nodes = self.nodes.read().map_err(Self::lock_err)?;
        match nodes.get(&path) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(Node::Dir { .. }) => Err(DbError::IsADirectory { path }),
            None => Err(DbError::not_found(path)),
        }
    }

    async fn write(&self, path: &str, data: &[u8]) -> DbResult<()> {
        let path = normalize_path(path)?;
        trace!(path = %path, bytes = data.len(), "memory store write");

        let mut nodes = self.nodes.write().map_err(Self::lock_err)?;
        if let Some(Node::Dir { .. }) = nodes.get(&path) {
            return Err(DbError::IsADirectory { path });
        }
        if let Some(parent) = parent_path(&path) {
            Self::ensure_dirs(&mut nodes, parent)?;
        }
        nodes.insert(
            path,
            Node::File {
                data: data.to_vec(),
                mod_time: Utc::now(),
            },
        );
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> DbResult<()> {
        let path = normalize_path(path)?;
        let mut nodes = self.nodes.write().map_err(Self::lock_err)?;
        match nodes.get(&path) {
            Some(Node::File { .. }) => Err(DbError::AlreadyExists { path }),
            _ => Self::ensure_dirs(&mut nodes, &path),
        }
    }

    async fn remove(&self, path: &str, recursive: bool) -> DbResult<()> {
        let path = normalize_path(path)?;
        if path == "/" {
            return Err(DbError::invalid_path(path));
        }

        let mut nodes = self.nodes.write().map_err(Self::lock_err)?;
        let is_dir = match nodes.get(&path) {
            None => return Err(DbError::not_found(path)),
            Some(node) => matches!(node, Node::Dir { .. }),
        };
        if !is_dir {
            nodes.remove(&path);
            return Ok(());
        }

        let children: Vec<String> = Self::descendants(&nodes, &path).cloned().collect();
        if !children.is_empty() && !recursive {
            return Err(DbError::DirectoryNotEmpty { path });
        }
        for child in children {
            nodes.remove(&child);
        }
        nodes.remove(&path);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> DbResult<()> {
        let from = normalize_path(from)?;
        let to = normalize_path(to)?;
        if from == "/" || to.starts_with(&format!("{}/", from)) {
            return Err(DbError::invalid_path(to));
        }

        let mut nodes = self.nodes.write().map_err(Self::lock_err)?;
        if !nodes.contains_key(&from) {
            return Err(DbError::not_found(from));
        }
        if nodes.contains_key(&to) {
            return Err(DbError::AlreadyExists { path: to });
        }
        if let Some(parent) = parent_path(&to) {
            Self::ensure_dirs(&mut nodes, parent)?;
        }

        let mut moved: Vec<String> = Self::descendants(&nodes, &from).cloned().collect();
        moved.push(from.clone());
        for old in moved {
            if let Some(node) = nodes.remove(&old) {
                let new = format!("{}{}", to, &old[from.len()..]);
                nodes.insert(new, node);
            }
        }
        Ok(())
    }

    async fn list(&self, path: &str) -> DbResult<Vec<ObjectEntry>> {
        let path = normalize_path(path)?;
        let nodes = self.nodes.read().map_err(Self::lock_err)?;
        match nodes.get(&path) {
            None => return Err(DbError::not_found(path)),
            Some(Node::File { .. }) => return Err(DbError::NotADirectory { path }),
            Some(Node::Dir { .. }) => {}
        }

        let prefix_len = if path == "/" { 1 } else { path.len() + 1 };
        let entries = Self::descendants(&nodes, &path)
            .filter(|k| !k[prefix_len..].contains('/'))
            .filter_map(|k| nodes.get(k).map(|node| Self::entry_for(k, node)))
            .collect();
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> DbResult<ObjectEntry> {
        let path = normalize_path(path)?;
        let nodes = self.nodes.read().map_err(Self::lock_err)?;
        nodes
            .get(&path)
            .map(|node| Self::entry_for(&path, node))
            .ok_or_else(|| DbError::not_found(path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parents() {
        let store = MemoryObjectStore::new();
        store.write("/acme/resources/a/b.md", b"hello").await.unwrap();

        assert!(store.stat("/acme/resources/a").await.unwrap().is_dir);
        assert_eq!(store.read("/acme/resources/a/b.md").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_list_direct_children_only() {
        let store = MemoryObjectStore::new();
        store.write("/x/a.md", b"1").await.unwrap();
        store.write("/x/sub/b.md", b"2").await.unwrap();

        let names: Vec<String> = store
            .list("/x")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.md", "sub"]);
    }

    #[tokio::test]
    async fn test_remove_non_empty_requires_recursive() {
        let store = MemoryObjectStore::new();
        store.write("/x/sub/b.md", b"2").await.unwrap();

        assert!(matches!(
            store.remove("/x", false).await,
            Err(DbError::DirectoryNotEmpty { .. })
        ));
        store.remove("/x", true).await.unwrap();
        assert!(!store.exists("/x/sub/b.md").await.unwrap());
        assert!(!store.exists("/x").await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_subtree() {
        let store = MemoryObjectStore::new();
        store.write("/x/a/1.md", b"1").await.unwrap();
        store.write("/x/a/deep/2.md", b"2").await.unwrap();

        store.rename("/x/a", "/y/b").await.unwrap();
        assert!(!store.exists("/x/a").await.unwrap());
        assert_eq!(store.read("/y/b/deep/2.md").await.unwrap(), b"2");
    }

    #[tokio::test]
    async fn test_rename_into_itself_rejected() {
        let store = MemoryObjectStore::new();
        store.mkdir("/x/a").await.unwrap();
        assert!(store.rename("/x/a", "/x/a/b").await.is_err());
    }

    #[tokio::test]
    async fn test_sibling_prefix_not_treated_as_child() {
        let store = MemoryObjectStore::new();
        store.write("/x/ab.md", b"1").await.unwrap();
        store.mkdir("/x/a").await.unwrap();

        store.remove("/x/a", false).await.unwrap();
        assert!(store.exists("/x/ab.md").await.unwrap());
    }
}
