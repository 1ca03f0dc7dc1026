//! `viking://` uri parsing, tenant visibility, and physical placement.
//!
//! ```text
//! viking://                                   namespace root (lists the five roots)
//! viking://resources/docs/guide.md            shared within the account
//! viking://skills/search/SKILL.md             shared within the account
//! viking://user/{user_space}/memories/...     visible to that user only
//! viking://session/{user_space}/{session}/... visible to that user only
//! viking://agent/{agent_space}/memories/...   visible to that user+agent only
//! ```
//!
//! Every uri maps to the object path `/{account_id}/{root}/{segments}`, so two
//! accounts never share storage even when their space names collide.

use serde::{Deserialize, Serialize};

use crate::errors::{VikingError, VikingResult};
use crate::identity::Identity;

/// Uri scheme prefix.
pub const SCHEME: &str = "viking://";

/// L0 digest companion file name.
pub const ABSTRACT_FILE: &str = ".abstract.md";

/// L1 digest companion file name.
pub const OVERVIEW_FILE: &str = ".overview.md";

// ============================================================================
// UriRoot
// ============================================================================

/// Top-level namespace roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UriRoot {
    Resources,
    Skills,
    Agent,
    User,
    Session,
}

impl UriRoot {
    /// Every root, in listing order.
    pub const ALL: [UriRoot; 5] = [
        UriRoot::Resources,
        UriRoot::Skills,
        UriRoot::Agent,
        UriRoot::User,
        UriRoot::Session,
    ];

    /// Root name as it appears in a uri.
    pub fn as_str(&self) -> &'static str {
        match self {
            UriRoot::Resources => "resources",
            UriRoot::Skills => "skills",
            UriRoot::Agent => "agent",
            UriRoot::User => "user",
            UriRoot::Session => "session",
        }
    }

    /// Whether nodes under this root belong to a single space.
    pub fn is_tenant_scoped(&self) -> bool {
        matches!(self, UriRoot::Agent | UriRoot::User | UriRoot::Session)
    }

    /// The space name `identity` owns under this root, if the root is scoped.
    pub fn space_of(&self, identity: &Identity) -> Option<String> {
        match self {
            UriRoot::Agent => Some(identity.agent_space_name()),
            UriRoot::User | UriRoot::Session => Some(identity.user_space_name().to_string()),
            UriRoot::Resources | UriRoot::Skills => None,
        }
    }
}

impl std::fmt::Display for UriRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UriRoot {
    type Err = VikingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UriRoot::ALL
            .into_iter()
            .find(|root| root.as_str() == s)
            .ok_or_else(|| {
                VikingError::invalid_uri(
                    format!("{}{}", SCHEME, s),
                    "root must be one of resources, skills, agent, user, session",
                )
            })
    }
}

// ============================================================================
// VikingUri
// ============================================================================

/// A parsed, normalized `viking://` uri.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VikingUri {
    root: Option<UriRoot>,
    segments: Vec<String>,
}

impl VikingUri {
    /// The namespace root, `viking://`.
    pub fn namespace_root() -> Self {
        Self {
            root: None,
            segments: Vec::new(),
        }
    }

    /// The uri of a top-level root directory.
    pub fn root_dir(root: UriRoot) -> Self {
        Self {
            root: Some(root),
            segments: Vec::new(),
        }
    }

    /// Parse a uri. Trailing and repeated slashes are collapsed.
    ///
    /// # Errors
    ///
    /// [`VikingError::InvalidUri`] for a missing scheme, unknown root, or a
    /// `.`/`..` segment.
    pub fn parse(input: &str) -> VikingResult<Self> {
        let rest = input
            .trim()
            .strip_prefix(SCHEME)
            .ok_or_else(|| VikingError::invalid_uri(input, "missing viking:// scheme"))?;

        let mut parts = rest.split('/').filter(|s| !s.is_empty());
        let root = match parts.next() {
            None => return Ok(Self::namespace_root()),
            Some(root) => root
                .parse::<UriRoot>()
                .map_err(|_| VikingError::invalid_uri(input, format!("unknown root `{}`", root)))?,
        };

        let mut segments = Vec::new();
        for part in parts {
            if part == "." || part == ".." {
                return Err(VikingError::invalid_uri(input, "relative segments are not allowed"));
            }
            segments.push(part.to_string());
        }

        Ok(Self {
            root: Some(root),
            segments,
        })
    }

    /// The root, `None` for `viking://`.
    pub fn root(&self) -> Option<UriRoot> {
        self.root
    }

    /// Segments below the root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this is `viking://`.
    pub fn is_namespace_root(&self) -> bool {
        self.root.is_none()
    }

    /// Last segment, or the root name for a root directory.
    pub fn name(&self) -> &str {
        match (self.segments.last(), self.root) {
            (Some(last), _) => last,
            (None, Some(root)) => root.as_str(),
            (None, None) => "",
        }
    }

    /// Whether the last segment starts with `.` (digest companions and other
    /// bookkeeping files).
    pub fn is_hidden(&self) -> bool {
        self.segments
            .last()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
    }

    /// Parent uri, `None` for `viking://`.
    pub fn parent(&self) -> Option<VikingUri> {
        let root = self.root?;
        if self.segments.is_empty() {
            return Some(Self::namespace_root());
        }
        Some(Self {
            root: Some(root),
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Child uri. `name` may contain `/` to descend several levels.
    pub fn join(&self, name: &str) -> VikingResult<VikingUri> {
        let joined = format!("{}/{}", self, name);
        VikingUri::parse(&joined)
    }

    /// Whether `self` equals `other` or lies below it.
    pub fn starts_with(&self, other: &VikingUri) -> bool {
        match other.root {
            None => true,
            Some(root) => {
                self.root == Some(root)
                    && self.segments.len() >= other.segments.len()
                    && self.segments[..other.segments.len()] == other.segments[..]
            }
        }
    }

    /// Depth below `ancestor` (0 for the same uri). `None` if not a descendant.
    pub fn depth_below(&self, ancestor: &VikingUri) -> Option<usize> {
        if !self.starts_with(ancestor) {
            return None;
        }
        let own = self.segments.len() + usize::from(self.root.is_some());
        let base = ancestor.segments.len() + usize::from(ancestor.root.is_some());
        Some(own - base)
    }

    /// Path of `self` relative to `ancestor`, `/`-joined. Empty for the same uri.
    pub fn relative_to(&self, ancestor: &VikingUri) -> Option<String> {
        if !self.starts_with(ancestor) {
            return None;
        }
        let mut parts: Vec<&str> = Vec::new();
        match (ancestor.root, self.root) {
            (None, Some(root)) => {
                parts.push(root.as_str());
                parts.extend(self.segments.iter().map(String::as_str));
            }
            (None, None) => {}
            (Some(_), _) => {
                parts.extend(self.segments[ancestor.segments.len()..].iter().map(String::as_str))
            }
        }
        Some(parts.join("/"))
    }

    /// Owner space segment for tenant-scoped roots, if present.
    pub fn space(&self) -> Option<&str> {
        match self.root {
            Some(root) if root.is_tenant_scoped() => self.segments.first().map(String::as_str),
            _ => None,
        }
    }

    /// Whether `identity` may see this node.
    ///
    /// Shared roots and the bare `user`/`agent`/`session` directories are
    /// visible to everyone in the account; anything deeper in a scoped root is
    /// visible only to the owner of its space.
    pub fn is_visible_to(&self, identity: &Identity) -> bool {
        let Some(root) = self.root else {
            return true;
        };
        match (self.space(), root.space_of(identity)) {
            (Some(space), Some(own)) => space == own,
            _ => true,
        }
    }

    /// Fail with [`VikingError::Authorization`] unless visible to `identity`.
    pub fn ensure_visible(&self, identity: &Identity) -> VikingResult<()> {
        if self.is_visible_to(identity) {
            Ok(())
        } else {
            Err(VikingError::authorization(
                self.to_string(),
                format!("outside the tenant scope of {}", identity),
            ))
        }
    }

    /// Object-store path: `/{account_id}/{root}/{segments...}`.
    pub fn physical_path(&self, account_id: &str) -> String {
        let mut path = format!("/{}", account_id);
        if let Some(root) = self.root {
            path.push('/');
            path.push_str(root.as_str());
            for segment in &self.segments {
                path.push('/');
                path.push_str(segment);
            }
        }
        path
    }

    /// Inverse of [`physical_path`](Self::physical_path).
    pub fn from_physical(account_id: &str, path: &str) -> VikingResult<VikingUri> {
        let prefix = format!("/{}", account_id);
        let rest = path
            .strip_prefix(&prefix)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(|| {
                VikingError::invalid_uri(path, format!("not inside account `{}`", account_id))
            })?;
        VikingUri::parse(&format!("{}{}", SCHEME, rest.trim_start_matches('/')))
    }
}

impl std::fmt::Display for VikingUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(SCHEME)?;
        if let Some(root) = self.root {
            f.write_str(root.as_str())?;
            for segment in &self.segments {
                write!(f, "/{}", segment)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for VikingUri {
    type Err = VikingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VikingUri::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new("acme", "alice", "helper").unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        let uri = VikingUri::parse("viking://resources//docs/guide.md/").unwrap();
        assert_eq!(uri.root(), Some(UriRoot::Resources));
        assert_eq!(uri.segments(), ["docs", "guide.md"]);
        assert_eq!(uri.to_string(), "viking://resources/docs/guide.md");
        assert_eq!(uri.name(), "guide.md");

        assert!(VikingUri::parse("viking://").unwrap().is_namespace_root());
        assert_eq!(VikingUri::parse("viking://").unwrap().to_string(), "viking://");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(VikingUri::parse("resources/a").is_err());
        assert!(VikingUri::parse("viking://nope/a").is_err());
        assert!(VikingUri::parse("viking://resources/../a").is_err());
    }

    #[test]
    fn test_parent_join_and_subtree() {
        let uri = VikingUri::parse("viking://resources/a/b").unwrap();
        assert_eq!(uri.parent().unwrap().to_string(), "viking://resources/a");
        assert_eq!(
            VikingUri::root_dir(UriRoot::Skills).parent().unwrap(),
            VikingUri::namespace_root()
        );
        assert!(VikingUri::namespace_root().parent().is_none());

        let child = uri.join("c/d.md").unwrap();
        assert_eq!(child.to_string(), "viking://resources/a/b/c/d.md");
        assert!(child.starts_with(&uri));
        assert_eq!(child.depth_below(&uri), Some(2));
        assert_eq!(child.relative_to(&uri).unwrap(), "c/d.md");

        let sibling = VikingUri::parse("viking://resources/a/bc").unwrap();
        assert!(!sibling.starts_with(&uri));
    }

    #[test]
    fn test_relative_to_namespace_root() {
        let uri = VikingUri::parse("viking://resources/a.md").unwrap();
        assert_eq!(
            uri.relative_to(&VikingUri::namespace_root()).unwrap(),
            "resources/a.md"
        );
        assert_eq!(uri.depth_below(&VikingUri::namespace_root()), Some(2));
        let root = VikingUri::root_dir(UriRoot::Resources);
        assert_eq!(uri.relative_to(&root).unwrap(), "a.md");
        assert_eq!(root.relative_to(&root).unwrap(), "");
    }

    #[test]
    fn test_visibility() {
        let id = alice();
        let agent_space = id.agent_space_name();

        assert!(VikingUri::parse("viking://resources/x").unwrap().is_visible_to(&id));
        assert!(VikingUri::parse("viking://user").unwrap().is_visible_to(&id));
        assert!(VikingUri::parse("viking://user/alice/memories").unwrap().is_visible_to(&id));
        assert!(!VikingUri::parse("viking://user/bob/memories").unwrap().is_visible_to(&id));
        assert!(VikingUri::parse("viking://session/alice/s1").unwrap().is_visible_to(&id));
        assert!(!VikingUri::parse("viking://session/bob/s1").unwrap().is_visible_to(&id));
        assert!(VikingUri::parse(&format!("viking://agent/{}/memories", agent_space))
            .unwrap()
            .is_visible_to(&id));
        assert!(!VikingUri::parse("viking://agent/000000000000").unwrap().is_visible_to(&id));

        let err = VikingUri::parse("viking://user/bob")
            .unwrap()
            .ensure_visible(&id)
            .unwrap_err();
        assert!(matches!(err, VikingError::Authorization { .. }));
    }

    #[test]
    fn test_physical_roundtrip() {
        let uri = VikingUri::parse("viking://user/alice/memories/m.md").unwrap();
        let path = uri.physical_path("acme");
        assert_eq!(path, "/acme/user/alice/memories/m.md");
        assert_eq!(VikingUri::from_physical("acme", &path).unwrap(), uri);
        assert_eq!(VikingUri::namespace_root().physical_path("acme"), "/acme");
        assert!(VikingUri::from_physical("acm", &path).is_err());
    }

    #[test]
    fn test_hidden() {
        assert!(VikingUri::parse("viking://resources/d/.abstract.md").unwrap().is_hidden());
        assert!(!VikingUri::parse("viking://resources/d").unwrap().is_hidden());
    }
}
