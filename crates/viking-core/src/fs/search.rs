//! Subtree content and path scans.

use globset::GlobBuilder;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::listing::WalkBounds;
use super::ContextFs;
use crate::errors::{VikingError, VikingResult};
use crate::identity::Identity;

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepMatch {
    pub uri: String,
    /// 1-based line number.
    pub line: usize,
    pub content: String,
}

impl ContextFs {
    /// Regex search over the files below `uri` (or `uri` itself).
    ///
    /// Hidden files are skipped. Files that are not valid UTF-8 are scanned
    /// lossily.
    pub async fn grep(
        &self,
        uri: &str,
        pattern: &str,
        case_insensitive: bool,
        bounds: WalkBounds,
        identity: &Identity,
    ) -> VikingResult<Vec<GrepMatch>> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| VikingError::validation("pattern", e.to_string()))?;
        let base = self.resolve(uri, identity)?;

        let mut matches = Vec::new();
        for item in self.walk(&base, identity, bounds, false).await? {
            if item.entry.is_dir {
                continue;
            }
            let text = self.read_text(&item.uri, identity).await?;
            let file_uri = item.uri.to_string();
            for (idx, line) in text.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(GrepMatch {
                        uri: file_uri.clone(),
                        line: idx + 1,
                        content: line.to_string(),
                    });
                }
            }
        }
        trace!(uri = %base, pattern, matches = matches.len(), "grep");
        Ok(matches)
    }

    /// Uris below `uri` whose path relative to `uri` matches a glob pattern.
    ///
    /// `*` does not cross `/`; use `**` to descend.
    pub async fn glob(
        &self,
        pattern: &str,
        uri: &str,
        bounds: WalkBounds,
        identity: &Identity,
    ) -> VikingResult<Vec<String>> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| VikingError::validation("pattern", e.to_string()))?
            .compile_matcher();
        let base = self.resolve(uri, identity)?;

        let mut uris = Vec::new();
        for item in self.walk(&base, identity, bounds, false).await? {
            let Some(relative) = item.uri.relative_to(&base) else {
                continue;
            };
            if !relative.is_empty() && matcher.is_match(&relative) {
                uris.push(item.uri.to_string());
            }
        }
        Ok(uris)
    }
}
