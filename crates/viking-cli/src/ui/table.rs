//! Table rendering for `--table` output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `viking ls --table` | `render_entries_table()` |
//! | `viking find --table` | `render_matches_table()` |
//! | `viking ready --table` | `render_readiness_table()` |

use chrono::Utc;
use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, Table};

use viking_core::{FsEntry, MatchedContext, ReadinessReport};

use super::color::terminal_width;
use super::format::{format_age, format_bytes, one_line};

// Width left for free text once the fixed columns are laid out.
fn text_width(fixed: usize) -> usize {
    terminal_width().saturating_sub(fixed).max(20)
}

/// Render a listing.
///
/// ```text
/// NAME       SIZE     MODIFIED     ABSTRACT
/// docs/      -        3h ago       Product documentation
/// notes.md   1.2 KB   just now
/// ```
pub fn render_entries_table(entries: &[FsEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("NAME"),
        Cell::new("SIZE").set_alignment(CellAlignment::Right),
        Cell::new("MODIFIED"),
        Cell::new("ABSTRACT"),
    ]);

    let now = Utc::now();
    let name_width = entries.iter().map(|e| e.name.chars().count() + 1).max().unwrap_or(4);
    let width = text_width(name_width + 30);
    for entry in entries {
        let (name, size) = if entry.is_dir {
            (format!("{}/", entry.name), "-".to_string())
        } else {
            (entry.name.clone(), format_bytes(entry.size))
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(size).set_alignment(CellAlignment::Right),
            Cell::new(format_age(entry.mod_time, now)),
            Cell::new(one_line(&entry.abstract_text, width)),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render semantic search hits, best first.
///
/// ```text
/// SCORE   TYPE       URI                              ABSTRACT
/// 0.912   resource   viking://resources/acme/a.md     Quarterly tax filing
/// ```
pub fn render_matches_table(matches: &[&MatchedContext]) -> String {
    if matches.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
        Cell::new("TYPE"),
        Cell::new("URI"),
        Cell::new("ABSTRACT"),
    ]);

    let uri_width = matches.iter().map(|m| m.uri.chars().count()).max().unwrap_or(3);
    let width = text_width(uri_width + 24);
    for hit in matches {
        table.add_row(vec![
            Cell::new(format!("{:.3}", hit.score)).set_alignment(CellAlignment::Right),
            Cell::new(hit.context_type.as_str()),
            Cell::new(&hit.uri),
            Cell::new(one_line(&hit.abstract_text, width)),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render a readiness report, one row per check.
pub fn render_readiness_table(report: &ReadinessReport) -> String {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_header(vec![Cell::new("CHECK"), Cell::new("STATUS"), Cell::new("DETAIL")]);

    for (name, status) in &report.checks {
        let (label, detail) = match status {
            viking_core::CheckStatus::Ok => ("ok", String::new()),
            viking_core::CheckStatus::NotConfigured => ("not configured", String::new()),
            viking_core::CheckStatus::Unhealthy => ("unhealthy", String::new()),
            viking_core::CheckStatus::Error(message) => ("error", message.clone()),
        };
        table.add_row(vec![Cell::new(name), Cell::new(label), Cell::new(detail)]);
    }

    table.trim_fmt().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, is_dir: bool, size: u64, abstract_text: &str) -> FsEntry {
        FsEntry {
            uri: format!("viking://resources/{}", name),
            name: name.to_string(),
            is_dir,
            size,
            mod_time: Utc::now(),
            abstract_text: abstract_text.to_string(),
        }
    }

    #[test]
    fn test_entries_table_marks_directories() {
        let out = render_entries_table(&[
            entry("docs", true, 0, "Product documentation"),
            entry("notes.md", false, 2048, ""),
        ]);
        assert!(out.contains("NAME"));
        assert!(out.contains("docs/"));
        assert!(out.contains("2.0 KB"));
        assert!(out.contains("Product documentation"));
    }

    #[test]
    fn test_empty_tables_render_nothing() {
        assert!(render_entries_table(&[]).is_empty());
        assert!(render_matches_table(&[]).is_empty());
    }
}
