//! Embedding queue message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{Context, ContextLevel};

/// One unit of work for the embedding pipeline: the text to embed plus a
/// fully tenant-qualified copy of the context record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMsg {
    /// Queue message id (not the context id).
    pub id: String,

    /// Text to embed.
    pub message: String,

    /// The context being indexed; its `id` keys the vector entry.
    pub context: Context,

    /// When the message entered the queue.
    pub enqueued_at: DateTime<Utc>,
}

impl EmbeddingMsg {
    /// Create a message with a fresh id.
    pub fn new(message: impl Into<String>, context: Context) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message: message.into(),
            context,
            enqueued_at: Utc::now(),
        }
    }

    /// Digest tier of the embedded node.
    pub fn level(&self) -> ContextLevel {
        self.context.level
    }

    /// Serialize for the durable queue.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse a message written by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    #[test]
    fn test_bytes_roundtrip_keeps_identity_and_level() {
        let identity = Identity::new("acme", "alice", "helper").unwrap();
        let ctx = Context::new("viking://resources/docs/.overview.md", Some(identity));
        let msg = EmbeddingMsg::new("overview text", ctx);

        let parsed = EmbeddingMsg::from_bytes(&msg.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(parsed.level(), ContextLevel::Overview);
        assert_eq!(parsed.context.user.unwrap().user_id(), "alice");
    }
}
