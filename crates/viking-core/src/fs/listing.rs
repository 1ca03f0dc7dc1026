//! Directory listings and bounded tree walks.
//!
//! Listings come in three shapes selected by [`ListOptions`]: bare uris
//! (`simple`, no abstract lookups), the full [`FsEntry`] record, or the
//! compact [`AgentEntry`] with a truncated abstract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use viking_db::object::ObjectEntry;

use super::{truncate_chars, ContextFs};
use crate::config::{DEFAULT_ABS_LIMIT, DEFAULT_LEVEL_LIMIT, DEFAULT_NODE_LIMIT};
use crate::errors::{VikingError, VikingResult};
use crate::identity::Identity;
use crate::uri::{UriRoot, VikingUri};

// ============================================================================
// Options
// ============================================================================

/// Record shape of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListView {
    /// Full records.
    #[default]
    Original,
    /// Compact records for agent prompts.
    Agent,
}

impl std::str::FromStr for ListView {
    type Err = VikingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(ListView::Original),
            "agent" => Ok(ListView::Agent),
            other => Err(VikingError::validation(
                "view",
                format!("unknown view `{}` (expected original or agent)", other),
            )),
        }
    }
}

/// Limits of a recursive walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkBounds {
    /// Max nodes returned.
    pub node_limit: usize,
    /// Max depth; direct children are level 1.
    pub level_limit: usize,
}

impl Default for WalkBounds {
    fn default() -> Self {
        Self {
            node_limit: DEFAULT_NODE_LIMIT,
            level_limit: DEFAULT_LEVEL_LIMIT,
        }
    }
}

/// Options for [`ContextFs::list`] and [`ContextFs::tree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    pub recursive: bool,
    /// Return bare uris and skip abstract lookups.
    pub simple: bool,
    pub view: ListView,
    /// Abstract truncation for [`ListView::Agent`].
    pub abs_limit: usize,
    /// Include dot-files such as the digest companions.
    pub show_hidden: bool,
    pub node_limit: usize,
    pub level_limit: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            simple: false,
            view: ListView::Original,
            abs_limit: DEFAULT_ABS_LIMIT,
            show_hidden: false,
            node_limit: DEFAULT_NODE_LIMIT,
            level_limit: DEFAULT_LEVEL_LIMIT,
        }
    }
}

impl ListOptions {
    /// Walk limits of these options.
    pub fn bounds(&self) -> WalkBounds {
        WalkBounds {
            node_limit: self.node_limit,
            level_limit: self.level_limit,
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// Full listing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsEntry {
    pub uri: String,
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    /// Directory abstract; empty for files and undigested directories.
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

impl FsEntry {
    pub(crate) fn from_object(uri: &VikingUri, entry: &ObjectEntry, abstract_text: String) -> Self {
        Self {
            uri: uri.to_string(),
            name: uri.name().to_string(),
            is_dir: entry.is_dir,
            size: entry.size,
            mod_time: entry.mod_time,
            abstract_text,
        }
    }
}

/// Compact listing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEntry {
    pub uri: String,
    pub is_dir: bool,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

/// A listing in the shape the caller asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", content = "entries", rename_all = "lowercase")]
pub enum Listing {
    Uris(Vec<String>),
    Original(Vec<FsEntry>),
    Agent(Vec<AgentEntry>),
}

impl Listing {
    /// Number of records.
    pub fn len(&self) -> usize {
        match self {
            Listing::Uris(v) => v.len(),
            Listing::Original(v) => v.len(),
            Listing::Agent(v) => v.len(),
        }
    }

    /// Whether the listing is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The uris in listing order.
    pub fn uris(&self) -> Vec<&str> {
        match self {
            Listing::Uris(v) => v.iter().map(String::as_str).collect(),
            Listing::Original(v) => v.iter().map(|e| e.uri.as_str()).collect(),
            Listing::Agent(v) => v.iter().map(|e| e.uri.as_str()).collect(),
        }
    }
}

/// A node of [`ContextFs::tree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub entry: FsEntry,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

/// One node visited by a walk.
#[derive(Debug, Clone)]
pub(crate) struct WalkItem {
    pub uri: VikingUri,
    pub entry: ObjectEntry,
    pub level: usize,
}

// ============================================================================
// ContextFs: list / tree
// ============================================================================

impl ContextFs {
    /// List a directory (or a single file).
    ///
    /// With `recursive`, walks depth-first within `node_limit` and
    /// `level_limit`. Bare `user`, `agent` and `session` roots list only the
    /// caller's own space.
    pub async fn list(
        &self,
        uri: &str,
        identity: &Identity,
        options: &ListOptions,
    ) -> VikingResult<Listing> {
        let base = self.resolve(uri, identity)?;
        let bounds = if options.recursive {
            options.bounds()
        } else {
            WalkBounds {
                node_limit: options.node_limit,
                level_limit: 1,
            }
        };
        let items = self.walk(&base, identity, bounds, options.show_hidden).await?;

        if options.simple {
            return Ok(Listing::Uris(
                items.into_iter().map(|item| item.uri.to_string()).collect(),
            ));
        }

        let entries = self.entries_with_abstracts(items, identity).await;
        Ok(match options.view {
            ListView::Original => Listing::Original(entries.into_iter().map(|(_, e)| e).collect()),
            ListView::Agent => Listing::Agent(
                entries
                    .into_iter()
                    .map(|(_, e)| AgentEntry {
                        uri: e.uri,
                        is_dir: e.is_dir,
                        abstract_text: truncate_chars(&e.abstract_text, options.abs_limit),
                    })
                    .collect(),
            ),
        })
    }

    /// Nested listing within the same bounds as a recursive `list`.
    ///
    /// [`ListView::Agent`] truncates abstracts to `abs_limit`.
    pub async fn tree(
        &self,
        uri: &str,
        identity: &Identity,
        options: &ListOptions,
    ) -> VikingResult<Vec<TreeNode>> {
        let base = self.resolve(uri, identity)?;
        let items = self
            .walk(&base, identity, options.bounds(), options.show_hidden)
            .await?;

        let mut entries = if options.simple {
            items
                .into_iter()
                .map(|item| {
                    let entry = FsEntry::from_object(&item.uri, &item.entry, String::new());
                    (item.level, entry)
                })
                .collect::<Vec<_>>()
        } else {
            self.entries_with_abstracts(items, identity).await
        };
        if options.view == ListView::Agent {
            for (_, entry) in entries.iter_mut() {
                entry.abstract_text = truncate_chars(&entry.abstract_text, options.abs_limit);
            }
        }

        let first_level = entries.first().map(|(level, _)| *level).unwrap_or(1);
        let mut iter = entries.into_iter().peekable();
        Ok(assemble(&mut iter, first_level))
    }

    /// Visible children of a directory, sorted by name.
    pub(crate) async fn children(
        &self,
        dir: &VikingUri,
        identity: &Identity,
        show_hidden: bool,
    ) -> VikingResult<Vec<(VikingUri, ObjectEntry)>> {
        if dir.is_namespace_root() {
            let mut roots = Vec::with_capacity(UriRoot::ALL.len());
            for root in UriRoot::ALL {
                let uri = VikingUri::root_dir(root);
                let entry = self.stat_entry(&uri, identity).await?;
                roots.push((uri, entry));
            }
            return Ok(roots);
        }

        let listed = match self.store.list(&self.physical(dir, identity)).await {
            Ok(listed) => listed,
            Err(e) if e.is_not_found() && dir.segments().is_empty() => Vec::new(),
            Err(e) => return Err(super::map_db_error(dir, e)),
        };

        let mut children = Vec::with_capacity(listed.len());
        for entry in listed {
            let child = dir.join(&entry.name)?;
            if (!show_hidden && child.is_hidden()) || !child.is_visible_to(identity) {
                continue;
            }
            children.push((child, entry));
        }
        Ok(children)
    }

    /// Depth-first, pre-order walk below `base` within `bounds`.
    ///
    /// A file base yields itself at level 0.
    pub(crate) async fn walk(
        &self,
        base: &VikingUri,
        identity: &Identity,
        bounds: WalkBounds,
        show_hidden: bool,
    ) -> VikingResult<Vec<WalkItem>> {
        let base_entry = self.stat_entry(base, identity).await?;
        if !base_entry.is_dir {
            return Ok(vec![WalkItem {
                uri: base.clone(),
                entry: base_entry,
                level: 0,
            }]);
        }

        let mut out = Vec::new();
        if bounds.level_limit == 0 {
            return Ok(out);
        }

        let mut stack: Vec<WalkItem> = self
            .children(base, identity, show_hidden)
            .await?
            .into_iter()
            .rev()
            .map(|(uri, entry)| WalkItem { uri, entry, level: 1 })
            .collect();

        while let Some(item) = stack.pop() {
            if out.len() >= bounds.node_limit {
                break;
            }
            if item.entry.is_dir && item.level < bounds.level_limit {
                let children = self.children(&item.uri, identity, show_hidden).await?;
                let level = item.level + 1;
                stack.extend(
                    children
                        .into_iter()
                        .rev()
                        .map(|(uri, entry)| WalkItem { uri, entry, level }),
                );
            }
            out.push(item);
        }
        Ok(out)
    }

    async fn entries_with_abstracts(
        &self,
        items: Vec<WalkItem>,
        identity: &Identity,
    ) -> Vec<(usize, FsEntry)> {
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let abstract_text = if item.entry.is_dir && !item.uri.is_namespace_root() {
                self.dir_abstract(&item.uri, identity).await
            } else {
                String::new()
            };
            entries.push((item.level, FsEntry::from_object(&item.uri, &item.entry, abstract_text)));
        }
        entries
    }
}

/// Rebuild nesting from a pre-order sequence of `(level, entry)`.
fn assemble<I>(items: &mut std::iter::Peekable<I>, level: usize) -> Vec<TreeNode>
where
    I: Iterator<Item = (usize, FsEntry)>,
{
    let mut nodes = Vec::new();
    while let Some((next_level, _)) = items.peek() {
        if *next_level != level {
            break;
        }
        let Some((_, entry)) = items.next() else {
            break;
        };
        let children = assemble(items, level + 1);
        nodes.push(TreeNode { entry, children });
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> FsEntry {
        FsEntry {
            uri: format!("viking://resources/{}", name),
            name: name.to_string(),
            is_dir: true,
            size: 0,
            mod_time: Utc::now(),
            abstract_text: String::new(),
        }
    }

    #[test]
    fn test_assemble_nests_by_level() {
        let items = vec![
            (1, entry("a")),
            (2, entry("a1")),
            (3, entry("a1x")),
            (2, entry("a2")),
            (1, entry("b")),
        ];
        let tree = assemble(&mut items.into_iter().peekable(), 1);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].entry.name, "a");
        assert_eq!(tree[0].children.len(), 2);
        assert_eq!(tree[0].children[0].children[0].entry.name, "a1x");
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_list_view_parse() {
        assert_eq!("agent".parse::<ListView>().unwrap(), ListView::Agent);
        assert!("compact".parse::<ListView>().is_err());
    }

    #[test]
    fn test_listing_serializes_tagged() {
        let listing = Listing::Uris(vec!["viking://resources".to_string()]);
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["view"], "uris");
        assert_eq!(json["entries"][0], "viking://resources");
    }
}
