//! Per-request access facade.
//!
//! [`FsService`] is what request handlers hold. It resolves unset limits from
//! the filesystem's [`FsConfig`](crate::config::FsConfig) and fails fast with
//! [`VikingError::NotInitialized`] until a [`ContextFs`] has been attached,
//! which only happens once startup has finished.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::errors::{VikingError, VikingResult};
use crate::fs::{
    ContextFs, FindResult, FsEntry, GrepMatch, ListOptions, ListView, Listing, MediaIngest,
    SessionMessage, TreeNode, WalkBounds,
};
use crate::identity::Identity;

/// Listing request; unset limits take the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LsRequest {
    pub recursive: bool,
    pub simple: bool,
    pub view: ListView,
    pub abs_limit: Option<usize>,
    pub show_hidden: bool,
    pub node_limit: Option<usize>,
    pub level_limit: Option<usize>,
}

/// Handle to the context filesystem, usable before it exists.
#[derive(Debug, Default)]
pub struct FsService {
    fs: RwLock<Option<Arc<ContextFs>>>,
}

impl FsService {
    /// A service with nothing attached yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the filesystem; requests succeed from now on.
    pub fn attach(&self, fs: Arc<ContextFs>) {
        match self.fs.write() {
            Ok(mut slot) => *slot = Some(fs),
            Err(poisoned) => *poisoned.into_inner() = Some(fs),
        }
    }

    /// Detach the filesystem; requests fail with `NotInitialized` again.
    pub fn detach(&self) -> Option<Arc<ContextFs>> {
        match self.fs.write() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Whether a filesystem is attached.
    pub fn is_initialized(&self) -> bool {
        self.get().is_ok()
    }

    /// The attached filesystem.
    pub fn get(&self) -> VikingResult<Arc<ContextFs>> {
        let slot = match self.fs.read() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone().ok_or(VikingError::NotInitialized)
    }

    fn list_options(fs: &ContextFs, request: &LsRequest, abs_default: usize) -> ListOptions {
        let config = fs.fs_config();
        ListOptions {
            recursive: request.recursive,
            simple: request.simple,
            view: request.view,
            abs_limit: request.abs_limit.unwrap_or(abs_default),
            show_hidden: request.show_hidden,
            node_limit: request.node_limit.unwrap_or(config.node_limit),
            level_limit: request.level_limit.unwrap_or(config.level_limit),
        }
    }

    fn bounds(fs: &ContextFs, node_limit: Option<usize>, level_limit: Option<usize>) -> WalkBounds {
        WalkBounds {
            node_limit: node_limit.unwrap_or(fs.fs_config().node_limit),
            level_limit: level_limit.unwrap_or(fs.fs_config().level_limit),
        }
    }

    // -------------------------------------------------------------------------
    // Delegation
    // -------------------------------------------------------------------------

    pub async fn ls(&self, uri: &str, identity: &Identity, request: &LsRequest) -> VikingResult<Listing> {
        let fs = self.get()?;
        let options = Self::list_options(&fs, request, fs.fs_config().abs_limit);
        fs.list(uri, identity, &options).await
    }

    /// Like `ls`, but agent-view abstracts default to the tree limit.
    pub async fn tree(
        &self,
        uri: &str,
        identity: &Identity,
        request: &LsRequest,
    ) -> VikingResult<Vec<TreeNode>> {
        let fs = self.get()?;
        let options = Self::list_options(&fs, request, fs.fs_config().tree_abs_limit);
        fs.tree(uri, identity, &options).await
    }

    pub async fn stat(&self, uri: &str, identity: &Identity) -> VikingResult<FsEntry> {
        self.get()?.stat(uri, identity).await
    }

    pub async fn read(
        &self,
        uri: &str,
        identity: &Identity,
        offset: usize,
        limit: i64,
    ) -> VikingResult<String> {
        self.get()?.read(uri, identity, offset, limit).await
    }

    pub async fn read_abstract(&self, uri: &str, identity: &Identity) -> VikingResult<String> {
        self.get()?.read_abstract(uri, identity).await
    }

    pub async fn read_overview(&self, uri: &str, identity: &Identity) -> VikingResult<String> {
        self.get()?.read_overview(uri, identity).await
    }

    pub async fn mkdir(&self, uri: &str, identity: &Identity) -> VikingResult<()> {
        self.get()?.mkdir(uri, identity).await
    }

    pub async fn rm(&self, uri: &str, recursive: bool, identity: &Identity) -> VikingResult<usize> {
        self.get()?.remove(uri, recursive, identity).await
    }

    pub async fn mv(&self, from: &str, to: &str, identity: &Identity) -> VikingResult<()> {
        self.get()?.mv(from, to, identity).await
    }

    pub async fn write(&self, uri: &str, content: &str, identity: &Identity) -> VikingResult<Context> {
        self.get()?.write(uri, content, identity).await
    }

    pub async fn write_abstract(&self, uri: &str, text: &str, identity: &Identity) -> VikingResult<Context> {
        self.get()?.write_abstract(uri, text, identity).await
    }

    pub async fn write_overview(&self, uri: &str, text: &str, identity: &Identity) -> VikingResult<Context> {
        self.get()?.write_overview(uri, text, identity).await
    }

    pub async fn grep(
        &self,
        uri: &str,
        pattern: &str,
        case_insensitive: bool,
        node_limit: Option<usize>,
        identity: &Identity,
    ) -> VikingResult<Vec<GrepMatch>> {
        let fs = self.get()?;
        let bounds = Self::bounds(&fs, node_limit, None);
        fs.grep(uri, pattern, case_insensitive, bounds, identity).await
    }

    pub async fn glob(
        &self,
        pattern: &str,
        uri: Option<&str>,
        node_limit: Option<usize>,
        identity: &Identity,
    ) -> VikingResult<Vec<String>> {
        let fs = self.get()?;
        let bounds = Self::bounds(&fs, node_limit, None);
        fs.glob(pattern, uri.unwrap_or(crate::uri::SCHEME), bounds, identity)
            .await
    }

    pub async fn find(
        &self,
        query: &str,
        identity: &Identity,
        limit: Option<usize>,
        target_uri: Option<&str>,
    ) -> VikingResult<FindResult> {
        let fs = self.get()?;
        let limit = limit.unwrap_or(fs.search_config().default_limit);
        fs.find(query, identity, limit, target_uri).await
    }

    pub async fn search(
        &self,
        query: &str,
        identity: &Identity,
        session_id: Option<&str>,
        limit: Option<usize>,
    ) -> VikingResult<FindResult> {
        let fs = self.get()?;
        let limit = limit.unwrap_or(fs.search_config().default_limit);
        fs.search(query, identity, session_id, limit).await
    }

    pub async fn append_session_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        identity: &Identity,
    ) -> VikingResult<SessionMessage> {
        self.get()?
            .append_session_message(session_id, role, content, identity)
            .await
    }

    pub async fn add_media(
        &self,
        name: &str,
        data: &[u8],
        format: Option<&str>,
        identity: &Identity,
    ) -> VikingResult<MediaIngest> {
        self.get()?.add_media(name, data, format, identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new("acme", "alice", "helper").unwrap()
    }

    #[tokio::test]
    async fn test_unattached_service_fails_fast() {
        let service = FsService::new();
        assert!(!service.is_initialized());

        let err = service
            .ls("viking://resources", &identity(), &LsRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VikingError::NotInitialized));
        assert!(err.is_retryable());

        assert!(matches!(
            service.find("q", &identity(), None, None).await,
            Err(VikingError::NotInitialized)
        ));
        assert!(service.detach().is_none());
    }

    #[test]
    fn test_ls_request_partial_json() {
        let request: LsRequest = serde_json::from_str(r#"{"recursive": true, "view": "agent"}"#).unwrap();
        assert!(request.recursive);
        assert_eq!(request.view, ListView::Agent);
        assert_eq!(request.node_limit, None);
    }
}
