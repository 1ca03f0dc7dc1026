//! Tenant-aware filter for vector queries and deletes.

use serde::{Deserialize, Serialize};

use super::traits::VectorInsert;

// ============================================================================
// VectorSearchFilter
// ============================================================================

/// Filter criteria for vector search queries.
///
/// Fields are combined with AND logic. `None`/empty fields are ignored, except
/// that `owner_spaces` is an any-of list: a record matches when its owner space
/// is one of the listed values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchFilter {
    /// Filter by exact account id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Allowed owner spaces. The empty string stands for shared nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_spaces: Vec<String>,

    /// Filter by context type ("resource", "memory", "skill").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_type: Option<String>,

    /// Restrict to a URI subtree: the URI itself and everything below it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri_prefix: Option<String>,

    /// Filter by digest level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

impl VectorSearchFilter {
    /// Create an empty filter (matches all).
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by account.
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Allow an additional owner space.
    pub fn with_owner_space(mut self, owner_space: impl Into<String>) -> Self {
        self.owner_spaces.push(owner_space.into());
        self
    }

    /// Replace the allowed owner spaces.
    pub fn with_owner_spaces(mut self, owner_spaces: Vec<String>) -> Self {
        self.owner_spaces = owner_spaces;
        self
    }

    /// Filter by context type.
    pub fn with_context_type(mut self, context_type: impl Into<String>) -> Self {
        self.context_type = Some(context_type.into());
        self
    }

    /// Filter by URI subtree.
    pub fn with_uri_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.uri_prefix = Some(prefix.into());
        self
    }

    /// Filter by digest level.
    pub fn with_level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }

    /// Check if the filter is empty (matches all).
    pub fn is_empty(&self) -> bool {
        self.account_id.is_none()
            && self.owner_spaces.is_empty()
            && self.context_type.is_none()
            && self.uri_prefix.is_none()
            && self.level.is_none()
    }

    /// Whether a stored record matches this filter.
    pub fn matches(&self, record: &VectorInsert) -> bool {
        if let Some(ref account_id) = self.account_id {
            if &record.account_id != account_id {
                return false;
            }
        }

        if !self.owner_spaces.is_empty() && !self.owner_spaces.contains(&record.owner_space) {
            return false;
        }

        if let Some(ref context_type) = self.context_type {
            if &record.context_type != context_type {
                return false;
            }
        }

        if let Some(ref prefix) = self.uri_prefix {
            if !uri_in_subtree(&record.uri, prefix) {
                return false;
            }
        }

        if let Some(level) = self.level {
            if record.level != level {
                return false;
            }
        }

        true
    }
}

/// Whether `uri` equals `prefix` or lies below it.
///
/// `viking://resources/ab` is not below `viking://resources/a`.
pub fn uri_in_subtree(uri: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.ends_with(':') || prefix.is_empty() {
        // Bare scheme (`viking://`) covers everything.
        return uri.starts_with(prefix);
    }
    uri == prefix
        || uri
            .strip_prefix(prefix)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

// ============================================================================
// Context Type Constants
// ============================================================================

/// Context type for resources.
pub const CONTEXT_TYPE_RESOURCE: &str = "resource";

/// Context type for memories.
pub const CONTEXT_TYPE_MEMORY: &str = "memory";

/// Context type for skills.
pub const CONTEXT_TYPE_SKILL: &str = "skill";
