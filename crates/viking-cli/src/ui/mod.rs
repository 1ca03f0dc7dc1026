//! # CLI UI Module
//!
//! Styling and formatting for `viking` output that is meant for people.
//! Commands print JSON by default; the helpers here back the `--table`
//! renderings and the error lines on stderr.
//!
//! ## Module Structure
//!
//! - `color`: Color mode detection (`--color`, `NO_COLOR`, TTY)
//! - `style`: Message prefixes and error formatting
//! - `format`: Size, time, and text truncation helpers
//! - `table`: Table rendering with comfy-table

pub mod color;
pub mod format;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use style::{MessageType, Style};
