//! Semantic retrieval over the vector index.
//!
//! Queries are embedded with the same provider the pipeline uses and run once
//! per partition (resource, memory, skill) under a tenant filter: the
//! caller's account, and owner spaces limited to shared nodes plus the
//! caller's user and agent spaces. Hits are re-checked for visibility before
//! they are returned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use viking_db::vector::{VectorSearchFilter, CONTEXT_TYPE_MEMORY, CONTEXT_TYPE_RESOURCE, CONTEXT_TYPE_SKILL};
use viking_model::l2_normalize;

use super::ContextFs;
use crate::context::{Context, ContextType};
use crate::errors::{VikingError, VikingResult};
use crate::identity::Identity;
use crate::uri::{UriRoot, VikingUri};

/// File holding a session's messages, one JSON object per line.
pub const SESSION_MESSAGES_FILE: &str = "messages.jsonl";

// ============================================================================
// Result types
// ============================================================================

/// One semantic hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedContext {
    pub uri: String,
    pub context_type: ContextType,
    pub level: u8,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub score: f32,
    pub category: String,
}

/// Hits grouped by partition, each sorted by descending score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindResult {
    pub resources: Vec<MatchedContext>,
    pub memories: Vec<MatchedContext>,
    pub skills: Vec<MatchedContext>,
}

impl FindResult {
    /// Total hits across partitions.
    pub fn total(&self) -> usize {
        self.resources.len() + self.memories.len() + self.skills.len()
    }

    /// Every hit, best first.
    pub fn merged(&self) -> Vec<&MatchedContext> {
        let mut all: Vec<&MatchedContext> = self
            .resources
            .iter()
            .chain(&self.memories)
            .chain(&self.skills)
            .collect();
        all.sort_by(|a, b| b.score.total_cmp(&a.score));
        all
    }
}

/// One entry of a session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMessage {
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// ContextFs: find / search / sessions
// ============================================================================

impl ContextFs {
    /// Top-`limit` hits per partition for `query`, optionally restricted to
    /// the subtree at `target_uri`.
    pub async fn find(
        &self,
        query: &str,
        identity: &Identity,
        limit: usize,
        target_uri: Option<&str>,
    ) -> VikingResult<FindResult> {
        let target = target_uri
            .map(|uri| self.resolve(uri, identity))
            .transpose()?;
        let embedding = self.embed_query(query).await?;
        self.query_partitions(&embedding, identity, limit, target.as_ref())
            .await
    }

    /// Like [`find`](Self::find), conditioned on the recent messages of a
    /// session.
    ///
    /// The last `session_window` messages are embedded together and blended
    /// into the query vector with weight `session_weight`. Without a session,
    /// or with an empty one, this is `find` over the whole namespace.
    pub async fn search(
        &self,
        query: &str,
        identity: &Identity,
        session_id: Option<&str>,
        limit: usize,
    ) -> VikingResult<FindResult> {
        let mut embedding = self.embed_query(query).await?;

        if let Some(session_id) = session_id {
            let recent = self.session_messages(session_id, identity).await?;
            let window = self.search_config.session_window;
            let context: Vec<&str> = recent
                .iter()
                .skip(recent.len().saturating_sub(window))
                .map(|m| m.content.as_str())
                .collect();
            if !context.is_empty() {
                let session_vec = self.embed_query(&context.join("\n")).await?;
                let weight = self.search_config.session_weight.clamp(0.0, 1.0);
                for (q, s) in embedding.iter_mut().zip(session_vec) {
                    *q = *q * (1.0 - weight) + s * weight;
                }
                l2_normalize(&mut embedding);
                debug!(session_id, messages = context.len(), "blended session context");
            }
        }

        self.query_partitions(&embedding, identity, limit, None).await
    }

    /// Append a message to `viking://session/{user_space}/{session_id}/messages.jsonl`.
    pub async fn append_session_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        identity: &Identity,
    ) -> VikingResult<SessionMessage> {
        let uri = session_log_uri(session_id, identity)?;
        let path = self.physical(&uri, identity);

        let mut log = match self.store.read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(super::map_db_error(&uri, e)),
        };
        let message = SessionMessage {
            role: role.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        if !log.is_empty() && !log.ends_with(b"\n") {
            log.push(b'\n');
        }
        log.extend(serde_json::to_vec(&message)?);
        log.push(b'\n');

        self.store
            .write(&path, &log)
            .await
            .map_err(|e| super::map_db_error(&uri, e))?;
        Ok(message)
    }

    /// All messages of a session, oldest first. Missing sessions are empty.
    pub async fn session_messages(
        &self,
        session_id: &str,
        identity: &Identity,
    ) -> VikingResult<Vec<SessionMessage>> {
        let uri = session_log_uri(session_id, identity)?;
        let bytes = match self.store.read(&self.physical(&uri, identity)).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(super::map_db_error(&uri, e)),
        };

        let text = String::from_utf8_lossy(&bytes);
        let mut messages = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<SessionMessage>(line) {
                Ok(message) => messages.push(message),
                Err(e) => debug!(session_id, "skipping malformed session line: {}", e),
            }
        }
        Ok(messages)
    }

    async fn embed_query(&self, text: &str) -> VikingResult<Vec<f32>> {
        self.provider
            .embed_one(text)
            .await
            .map_err(|e| VikingError::provider(self.provider.model_id(), e.to_string()))
    }

    async fn query_partitions(
        &self,
        embedding: &[f32],
        identity: &Identity,
        limit: usize,
        target: Option<&VikingUri>,
    ) -> VikingResult<FindResult> {
        let mut base = VectorSearchFilter::new()
            .with_account(identity.account_id())
            .with_owner_spaces(vec![
                String::new(),
                identity.user_space_name().to_string(),
                identity.agent_space_name(),
            ]);
        if let Some(target) = target {
            base = base.with_uri_prefix(target.to_string());
        }

        let mut result = FindResult::default();
        for (context_type, bucket) in [
            (CONTEXT_TYPE_RESOURCE, &mut result.resources),
            (CONTEXT_TYPE_MEMORY, &mut result.memories),
            (CONTEXT_TYPE_SKILL, &mut result.skills),
        ] {
            let filter = base.clone().with_context_type(context_type);
            let hits = self.index.query(embedding, limit, &filter).await?;
            for hit in hits {
                if let Some(matched) = matched_context(hit.payload, hit.score, identity) {
                    bucket.push(matched);
                }
            }
        }
        debug!(account = identity.account_id(), hits = result.total(), "semantic query");
        Ok(result)
    }
}

fn session_log_uri(session_id: &str, identity: &Identity) -> VikingResult<VikingUri> {
    let valid = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(VikingError::validation(
            "session_id",
            format!("`{}` must be non-empty and use only [A-Za-z0-9_-]", session_id),
        ));
    }
    VikingUri::root_dir(UriRoot::Session).join(&format!(
        "{}/{}/{}",
        identity.user_space_name(),
        session_id,
        SESSION_MESSAGES_FILE
    ))
}

/// Build a hit from a stored record, dropping anything the caller cannot see.
fn matched_context(payload: serde_json::Value, score: f32, identity: &Identity) -> Option<MatchedContext> {
    let context = Context::from_record(payload).ok()?;
    let visible = VikingUri::parse(&context.uri)
        .map(|uri| uri.is_visible_to(identity))
        .unwrap_or(false);
    if !visible || context.account_id != identity.account_id() {
        return None;
    }
    Some(MatchedContext {
        level: context.level.as_u8(),
        uri: context.uri,
        context_type: context.context_type,
        abstract_text: context.abstract_text,
        score,
        category: context.category,
    })
}
