//! Changed-file extraction from unified diffs.
//!
//! Recovers the post-change path of every file section in a commit diff
//! without reading hunks. Paths are split using the fixed-width `a/` and
//! ` b/` markers and the section's rename/copy metadata, never a bare
//! substring search.

pub mod parser;

pub use parser::{changed_files, extract, Extraction};
