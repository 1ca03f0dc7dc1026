//! The Context entity: one addressable node of the namespace.
//!
//! Type, category, level and owner space are derived from the uri (and the
//! owning identity) through the rule tables below. Derived values are filled
//! in at construction and can always be recomputed with the `derive_*`
//! functions; callers may still override them explicitly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{VikingError, VikingResult};
use crate::identity::{Identity, DEFAULT_ACCOUNT_ID};
use crate::uri::{ABSTRACT_FILE, OVERVIEW_FILE, SCHEME};

// ============================================================================
// ContextType
// ============================================================================

/// Partition a context belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Skill,
    Memory,
    #[default]
    Resource,
}

impl ContextType {
    /// Lowercase name, as stored in vector records.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Skill => "skill",
            ContextType::Memory => "memory",
            ContextType::Resource => "resource",
        }
    }
}

impl std::fmt::Display for ContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContextType {
    type Err = VikingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skill" => Ok(ContextType::Skill),
            "memory" => Ok(ContextType::Memory),
            "resource" => Ok(ContextType::Resource),
            other => Err(VikingError::validation(
                "context_type",
                format!("unknown context type `{}`", other),
            )),
        }
    }
}

// ============================================================================
// ContextLevel
// ============================================================================

/// Digest tier of a context: L0 abstract, L1 overview, L2 detail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ContextLevel {
    Abstract = 0,
    Overview = 1,
    #[default]
    Detail = 2,
}

impl ContextLevel {
    /// Level implied by a uri suffix.
    pub fn from_uri(uri: &str) -> Self {
        if uri.ends_with(ABSTRACT_FILE) {
            ContextLevel::Abstract
        } else if uri.ends_with(OVERVIEW_FILE) {
            ContextLevel::Overview
        } else {
            ContextLevel::Detail
        }
    }

    /// Numeric tier.
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl From<ContextLevel> for u8 {
    fn from(level: ContextLevel) -> Self {
        level.as_u8()
    }
}

impl TryFrom<u8> for ContextLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ContextLevel::Abstract),
            1 => Ok(ContextLevel::Overview),
            2 => Ok(ContextLevel::Detail),
            other => Err(format!("invalid context level {}", other)),
        }
    }
}

// ============================================================================
// Derivation Rules
// ============================================================================

/// Ordered `(uri substring, type)` rules. First match wins; no match means
/// [`ContextType::Resource`].
pub const CONTEXT_TYPE_RULES: &[(&str, ContextType)] = &[
    ("/skills", ContextType::Skill),
    ("/memories", ContextType::Memory),
];

/// Category vocabulary, in priority order. A category applies when it is a
/// path segment of the uri.
pub const CATEGORY_RULES: &[&str] = &[
    "patterns",
    "cases",
    "profile",
    "preferences",
    "entities",
    "events",
];

/// Uri prefix owned by the agent space.
pub const AGENT_SPACE_PREFIX: &str = "viking://agent/";

/// Uri prefixes owned by the user space.
pub const USER_SPACE_PREFIXES: &[&str] = &["viking://user/", "viking://session/"];

/// Context type for a uri.
pub fn derive_context_type(uri: &str) -> ContextType {
    CONTEXT_TYPE_RULES
        .iter()
        .find(|(needle, _)| uri.contains(needle))
        .map(|(_, ty)| *ty)
        .unwrap_or_default()
}

/// Category for a uri, empty when no vocabulary word is a segment.
pub fn derive_category(uri: &str) -> String {
    let path = uri.strip_prefix(SCHEME).unwrap_or(uri);
    CATEGORY_RULES
        .iter()
        .find(|cat| path.split('/').any(|segment| segment == **cat))
        .map(|cat| cat.to_string())
        .unwrap_or_default()
}

/// Owner space for a uri as seen by `identity`.
///
/// Uris under [`AGENT_SPACE_PREFIX`] belong to the agent space, uris under
/// [`USER_SPACE_PREFIXES`] to the user space. Everything else is shared, as is
/// anything without an identity. The bare roots themselves are shared too.
pub fn derive_owner_space(uri: &str, identity: Option<&Identity>) -> String {
    let Some(identity) = identity else {
        return String::new();
    };
    if uri.starts_with(AGENT_SPACE_PREFIX) {
        identity.agent_space_name()
    } else if USER_SPACE_PREFIXES.iter().any(|prefix| uri.starts_with(prefix)) {
        identity.user_space_name().to_string()
    } else {
        String::new()
    }
}

/// Account for a context: the identity's account or [`DEFAULT_ACCOUNT_ID`].
pub fn derive_account_id(identity: Option<&Identity>) -> String {
    identity
        .map(|id| id.account_id().to_string())
        .unwrap_or_else(|| DEFAULT_ACCOUNT_ID.to_string())
}

/// Deterministic id for the namespace node `uri` within `account_id`.
pub fn context_id_for(account_id: &str, uri: &str) -> String {
    let name = format!("{}\n{}", account_id, uri);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

fn new_context_id() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// Context
// ============================================================================

/// One node of the namespace: a resource, memory, or skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Unique id; also the key of the node's vector entry.
    #[serde(default = "new_context_id")]
    pub id: String,

    /// Namespace uri.
    pub uri: String,

    /// Parent directory uri.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uri: Option<String>,

    /// Whether this node is a leaf (file) rather than a directory.
    #[serde(default)]
    pub is_leaf: bool,

    /// L0 summary text.
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,

    /// Partition, derived from the uri.
    #[serde(default)]
    pub context_type: ContextType,

    /// Category from [`CATEGORY_RULES`], or empty.
    #[serde(default)]
    pub category: String,

    /// Creation time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last update or access time.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    /// Number of recorded accesses. Never decreases.
    #[serde(default)]
    pub active_count: u64,

    /// Related uris, in insertion order.
    #[serde(default)]
    pub related_uri: Vec<String>,

    /// Free-form metadata.
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,

    /// Session this context was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Owning identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,

    /// Owning account. Empty means "not yet attributed".
    #[serde(default)]
    pub account_id: String,

    /// Owner space. Empty for shared nodes (or not yet attributed).
    #[serde(default)]
    pub owner_space: String,

    /// Digest tier, derived from the uri suffix.
    #[serde(default)]
    pub level: ContextLevel,

    /// Embedding, present only after indexing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,

    /// Text to embed. Falls back to `abstract_text` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectorize_text: Option<String>,
}

impl Context {
    /// Build a context for `uri`, deriving every derivable field.
    pub fn new(uri: impl Into<String>, user: Option<Identity>) -> Self {
        let uri = uri.into();
        let now = Utc::now();
        Self {
            id: new_context_id(),
            context_type: derive_context_type(&uri),
            category: derive_category(&uri),
            account_id: derive_account_id(user.as_ref()),
            owner_space: derive_owner_space(&uri, user.as_ref()),
            level: ContextLevel::from_uri(&uri),
            uri,
            parent_uri: None,
            is_leaf: false,
            abstract_text: String::new(),
            created_at: now,
            updated_at: now,
            active_count: 0,
            related_uri: Vec::new(),
            meta: BTreeMap::new(),
            session_id: None,
            user,
            vector: None,
            vectorize_text: None,
        }
    }

    /// Set the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the parent uri.
    pub fn with_parent_uri(mut self, parent_uri: impl Into<String>) -> Self {
        self.parent_uri = Some(parent_uri.into());
        self
    }

    /// Mark as leaf or directory.
    pub fn with_leaf(mut self, is_leaf: bool) -> Self {
        self.is_leaf = is_leaf;
        self
    }

    /// Set the abstract.
    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = text.into();
        self
    }

    /// Override the derived context type.
    pub fn with_context_type(mut self, context_type: ContextType) -> Self {
        self.context_type = context_type;
        self
    }

    /// Override the derived category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Override the derived account.
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// Override the derived owner space.
    pub fn with_owner_space(mut self, owner_space: impl Into<String>) -> Self {
        self.owner_space = owner_space.into();
        self
    }

    /// Set the session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Append a related uri.
    pub fn with_related_uri(mut self, uri: impl Into<String>) -> Self {
        self.related_uri.push(uri.into());
        self
    }

    /// Insert a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Set the text to embed.
    pub fn with_vectorize_text(mut self, text: impl Into<String>) -> Self {
        self.vectorize_text = Some(text.into());
        self
    }

    /// Text handed to the embedding provider.
    pub fn vectorizable_text(&self) -> &str {
        self.vectorize_text
            .as_deref()
            .unwrap_or(self.abstract_text.as_str())
    }

    /// Record an access: bump `active_count` and refresh `updated_at`.
    pub fn update_activity(&mut self) {
        self.active_count = self.active_count.saturating_add(1);
        self.updated_at = Utc::now().max(self.created_at);
    }

    /// Serialize to a storage record.
    ///
    /// Skills additionally expose `name` and `description` from metadata at
    /// the top level of the record.
    pub fn to_record(&self) -> VikingResult<Value> {
        let mut record = serde_json::to_value(self)?;
        if self.context_type == ContextType::Skill {
            if let Value::Object(map) = &mut record {
                for key in ["name", "description"] {
                    let value = self
                        .meta
                        .get(key)
                        .cloned()
                        .unwrap_or_else(|| Value::String(String::new()));
                    map.insert(key.to_string(), value);
                }
            }
        }
        Ok(record)
    }

    /// Parse a storage record produced by [`to_record`](Self::to_record).
    ///
    /// Derivable fields absent from the record (type, category, level,
    /// account and owner space) are re-derived from the uri and owning
    /// identity rather than left at their type defaults.
    pub fn from_record(record: Value) -> VikingResult<Self> {
        let surfaced: Vec<(String, Value)> = ["name", "description"]
            .into_iter()
            .filter_map(|key| record.get(key).map(|v| (key.to_string(), v.clone())))
            .collect();
        let missing = |key: &str| record.get(key).map(Value::is_null).unwrap_or(true);
        let derive_type = missing("context_type");
        let derive_cat = missing("category");
        let derive_level = missing("level");
        let derive_account = missing("account_id");
        let derive_space = missing("owner_space");

        let mut context: Context = serde_json::from_value(record)?;
        if derive_type {
            context.context_type = derive_context_type(&context.uri);
        }
        if derive_cat {
            context.category = derive_category(&context.uri);
        }
        if derive_level {
            context.level = ContextLevel::from_uri(&context.uri);
        }
        if derive_account || context.account_id.is_empty() {
            context.account_id = derive_account_id(context.user.as_ref());
        }
        if derive_space {
            context.owner_space = derive_owner_space(&context.uri, context.user.as_ref());
        }
        if context.context_type == ContextType::Skill {
            for (key, value) in surfaced {
                let empty = value.as_str().map(str::is_empty).unwrap_or(false);
                if !empty {
                    context.meta.entry(key).or_insert(value);
                }
            }
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alice() -> Identity {
        Identity::new("acme", "alice", "helper").unwrap()
    }

    #[test]
    fn test_type_rules() {
        assert_eq!(derive_context_type("viking://skills/search"), ContextType::Skill);
        assert_eq!(
            derive_context_type("viking://user/alice/memories/x.md"),
            ContextType::Memory
        );
        assert_eq!(derive_context_type("viking://resources/doc.md"), ContextType::Resource);
        // First rule wins.
        assert_eq!(
            derive_context_type("viking://agent/x/memories/skills"),
            ContextType::Skill
        );
    }

    #[test]
    fn test_category_rules() {
        assert_eq!(
            derive_category("viking://user/memories/preferences/me.md"),
            "preferences"
        );
        assert_eq!(derive_category("viking://agent/memories/cases/me.md"), "cases");
        assert_eq!(derive_category("viking://resources/events-log/me.md"), "");
        assert_eq!(derive_category("viking://resources/doc.md"), "");
    }

    #[test]
    fn test_owner_space_rules() {
        let id = alice();
        assert_eq!(
            derive_owner_space("viking://agent/memories/cases/me.md", Some(&id)),
            id.agent_space_name()
        );
        assert_eq!(derive_owner_space("viking://user/memories/x", Some(&id)), "alice");
        assert_eq!(derive_owner_space("viking://session/s1/x", Some(&id)), "alice");
        assert_eq!(derive_owner_space("viking://resources/doc.md", Some(&id)), "");
        assert_eq!(derive_owner_space("viking://user/memories/x", None), "");
    }

    #[test]
    fn test_owner_space_needs_full_root_prefix() {
        let id = alice();
        assert_eq!(derive_owner_space("viking://agent", Some(&id)), "");
        assert_eq!(derive_owner_space("viking://user", Some(&id)), "");
        assert_eq!(derive_owner_space("viking://agentx/notes.md", Some(&id)), "");
        assert_eq!(derive_owner_space("agent/x", Some(&id)), "");
        assert_eq!(derive_owner_space("user/memories/x", Some(&id)), "");
        assert_eq!(derive_owner_space("viking://agent/x", Some(&id)), id.agent_space_name());
    }

    #[test]
    fn test_level_from_uri() {
        assert_eq!(
            ContextLevel::from_uri("viking://resources/d/.abstract.md"),
            ContextLevel::Abstract
        );
        assert_eq!(
            ContextLevel::from_uri("viking://resources/d/.overview.md"),
            ContextLevel::Overview
        );
        assert_eq!(ContextLevel::from_uri("viking://resources/d/a.md"), ContextLevel::Detail);
    }

    #[test]
    fn test_new_derives_fields() {
        let ctx = Context::new("viking://user/memories/preferences/me.md", Some(alice()));
        assert_eq!(ctx.context_type, ContextType::Memory);
        assert_eq!(ctx.category, "preferences");
        assert_eq!(ctx.account_id, "acme");
        assert_eq!(ctx.owner_space, "alice");
        assert_eq!(ctx.level, ContextLevel::Detail);

        let anonymous = Context::new("viking://resources/doc.md", None);
        assert_eq!(anonymous.account_id, DEFAULT_ACCOUNT_ID);
        assert_eq!(anonymous.owner_space, "");
    }

    #[test]
    fn test_overrides_win() {
        let ctx = Context::new("viking://resources/doc.md", None)
            .with_context_type(ContextType::Skill)
            .with_category("patterns")
            .with_owner_space("custom");
        assert_eq!(ctx.context_type, ContextType::Skill);
        assert_eq!(ctx.category, "patterns");
        assert_eq!(ctx.owner_space, "custom");
    }

    #[test]
    fn test_update_activity() {
        let mut ctx = Context::new("viking://resources/doc.md", None);
        let before = ctx.updated_at;
        ctx.update_activity();
        ctx.update_activity();
        assert_eq!(ctx.active_count, 2);
        assert!(ctx.updated_at >= before);
        assert!(ctx.created_at <= ctx.updated_at);
    }

    #[test]
    fn test_vectorizable_text_defaults_to_abstract() {
        let ctx = Context::new("viking://resources/doc.md", None).with_abstract("summary");
        assert_eq!(ctx.vectorizable_text(), "summary");
        let ctx = ctx.with_vectorize_text("full body");
        assert_eq!(ctx.vectorizable_text(), "full body");
    }

    #[test]
    fn test_record_roundtrip() {
        let mut ctx = Context::new("viking://agent/memories/cases/me.md", Some(alice()))
            .with_parent_uri("viking://agent/memories/cases")
            .with_leaf(true)
            .with_abstract("a case")
            .with_session_id("s1")
            .with_related_uri("viking://resources/doc.md")
            .with_meta("source", serde_json::json!("chat"))
            .with_vectorize_text("body");
        ctx.vector = Some(vec![0.5, -0.5]);
        ctx.update_activity();

        let record = ctx.to_record().unwrap();
        assert_eq!(record["abstract"], "a case");
        assert_eq!(record["level"], 2);
        assert_eq!(record["user"]["user_id"], "alice");

        let back = Context::from_record(record).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn test_sparse_record_rederives_fields() {
        let ctx = Context::from_record(serde_json::json!({
            "uri": "viking://user/alice/memories/preferences/x.md"
        }))
        .unwrap();
        assert_eq!(ctx.context_type, ContextType::Memory);
        assert_eq!(ctx.category, "preferences");
        assert_eq!(ctx.level, ContextLevel::Detail);
        assert_eq!(ctx.account_id, DEFAULT_ACCOUNT_ID);
        assert_eq!(ctx.owner_space, "");

        let digest = Context::from_record(serde_json::json!({
            "uri": "viking://skills/search/.abstract.md",
            "user": alice(),
        }))
        .unwrap();
        assert_eq!(digest.context_type, ContextType::Skill);
        assert_eq!(digest.level, ContextLevel::Abstract);
        assert_eq!(digest.account_id, "acme");

        let owned = Context::from_record(serde_json::json!({
            "uri": "viking://agent/memories/cases/c.md",
            "user": alice(),
        }))
        .unwrap();
        assert_eq!(owned.owner_space, alice().agent_space_name());
        assert_eq!(owned.category, "cases");
    }

    #[test]
    fn test_explicit_record_fields_win() {
        let record = serde_json::json!({
            "uri": "viking://resources/doc.md",
            "context_type": "skill",
            "category": "",
            "level": 0,
            "account_id": "other",
            "owner_space": "custom",
        });
        let ctx = Context::from_record(record).unwrap();
        assert_eq!(ctx.context_type, ContextType::Skill);
        assert_eq!(ctx.category, "");
        assert_eq!(ctx.level, ContextLevel::Abstract);
        assert_eq!(ctx.account_id, "other");
        assert_eq!(ctx.owner_space, "custom");
    }

    #[test]
    fn test_skill_record_surfaces_name_and_description() {
        let ctx = Context::new("viking://skills/search/SKILL.md", None)
            .with_meta("name", serde_json::json!("search"))
            .with_meta("description", serde_json::json!("Find things"));

        let record = ctx.to_record().unwrap();
        assert_eq!(record["name"], "search");
        assert_eq!(record["description"], "Find things");
        assert_eq!(Context::from_record(record).unwrap(), ctx);

        let resource = Context::new("viking://resources/doc.md", None).to_record().unwrap();
        assert!(resource.get("name").is_none());
    }

    proptest! {
        #[test]
        fn prop_context_type_rule(
            prefix in "x[a-z]{0,5}",
            middle in "[a-z]{0,6}",
            pick in 0usize..3,
        ) {
            let marker = ["/skills", "/memories", ""][pick];
            let uri = format!("viking://{}{}/{}", prefix, marker, middle);
            let expected = match pick {
                0 => ContextType::Skill,
                1 => ContextType::Memory,
                _ if uri.contains("/skills") => ContextType::Skill,
                _ if uri.contains("/memories") => ContextType::Memory,
                _ => ContextType::Resource,
            };
            prop_assert_eq!(derive_context_type(&uri), expected);
        }

        #[test]
        fn prop_owner_space_rule(root in "(agent|user|session|resources|skills)", rest in "[a-z/]{0,12}") {
            let id = Identity::new("acme", "alice", "helper").unwrap();
            let uri = format!("viking://{}/{}", root, rest);
            let expected = match root.as_str() {
                "agent" => id.agent_space_name(),
                "user" | "session" => "alice".to_string(),
                _ => String::new(),
            };
            prop_assert_eq!(derive_owner_space(&uri, Some(&id)), expected);
        }
    }
}
