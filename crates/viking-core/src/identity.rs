//! Caller identity and tenant space names.
//!
//! An [`Identity`] is the `(account_id, user_id, agent_id)` triple every
//! filesystem call is scoped by. Space names derived from it decide which
//! `user`/`agent`/`session` subtrees the caller can see.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::errors::{VikingError, VikingResult};

/// Account id used for contexts created without an identity.
pub const DEFAULT_ACCOUNT_ID: &str = "default";

/// Length of the hex token returned by [`Identity::agent_space_name`].
pub const AGENT_SPACE_LEN: usize = 12;

/// A validated `(account_id, user_id, agent_id)` triple.
///
/// Every field is non-empty and limited to `[A-Za-z0-9_-]`. Two identities are
/// equal iff all three fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawIdentity")]
pub struct Identity {
    account_id: String,
    user_id: String,
    agent_id: String,
}

/// Unvalidated wire form.
#[derive(Deserialize)]
struct RawIdentity {
    account_id: String,
    user_id: String,
    agent_id: String,
}

impl TryFrom<RawIdentity> for Identity {
    type Error = VikingError;

    fn try_from(raw: RawIdentity) -> Result<Self, Self::Error> {
        Identity::new(raw.account_id, raw.user_id, raw.agent_id)
    }
}

impl Identity {
    /// Construct an identity, validating every field.
    ///
    /// # Errors
    ///
    /// Returns [`VikingError::Validation`] naming the first invalid field.
    pub fn new(
        account_id: impl Into<String>,
        user_id: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> VikingResult<Self> {
        let identity = Self {
            account_id: account_id.into(),
            user_id: user_id.into(),
            agent_id: agent_id.into(),
        };
        validate_field("account_id", &identity.account_id)?;
        validate_field("user_id", &identity.user_id)?;
        validate_field("agent_id", &identity.agent_id)?;
        Ok(identity)
    }

    /// The owning account.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// The user id.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The agent id.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Space name for user-scoped data: the user id verbatim.
    pub fn user_space_name(&self) -> &str {
        &self.user_id
    }

    /// Space name for agent-scoped data.
    ///
    /// First 12 hex chars of `md5(user_id + agent_id)`. Deterministic per
    /// pair; not collision-proof, which is tolerated because storage paths
    /// and vector filters are additionally scoped by account.
    pub fn agent_space_name(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.user_id.as_bytes());
        hasher.update(self.agent_id.as_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..AGENT_SPACE_LEN].to_string()
    }

    /// Root of the agent's memories: `viking://agent/{agent_space}/memories`.
    pub fn memory_space_uri(&self) -> String {
        format!("viking://agent/{}/memories", self.agent_space_name())
    }

    /// Root of the agent's workspaces: `viking://agent/{agent_space}/workspaces`.
    pub fn work_space_uri(&self) -> String {
        format!("viking://agent/{}/workspaces", self.agent_space_name())
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.account_id, self.user_id, self.agent_id)
    }
}

fn validate_field(field: &str, value: &str) -> VikingResult<()> {
    if value.is_empty() {
        return Err(VikingError::validation(field, "must not be empty"));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(VikingError::validation(
            field,
            format!("character {:?} is not allowed; use [A-Za-z0-9_-]", bad),
        ));
    }
    Ok(())
}
