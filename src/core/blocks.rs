//! Shared data model for parsed edit blocks
//!
//! One `EditBlock` is one edit instruction extracted from AI-response text.
//! A `ParseResult` is the ordered sequence of blocks in source-text order;
//! that order is also the application order.

use std::path::PathBuf;

use serde::Serialize;

/// How an `EditBlock` mutates its target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditType {
    /// Anchored patch: replace the first exact occurrence of `search_content`.
    SearchReplace,
    /// Replace the file's entire content with `replace_content`.
    WholeFile,
    /// Unified diff: `replace_content` carries the verbatim hunk body.
    Udiff,
}

impl std::fmt::Display for EditType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditType::SearchReplace => write!(f, "search/replace"),
            EditType::WholeFile => write!(f, "whole-file"),
            EditType::Udiff => write!(f, "udiff"),
        }
    }
}

/// One parsed edit instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditBlock {
    /// Target path as written in the response (resolved later against a root).
    pub file_path: String,

    /// Language tag from the fence line; a hint only, may be empty.
    pub language: String,

    /// Exact-match anchor for `SearchReplace`; empty otherwise.
    pub search_content: String,

    /// New content (`SearchReplace`/`WholeFile`) or verbatim udiff body.
    pub replace_content: String,

    pub edit_type: EditType,
}

/// Ordered parse output; blocks appear in the order their spans begin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    pub blocks: Vec<EditBlock>,
}

impl ParseResult {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EditBlock> {
        self.blocks.iter()
    }
}

impl IntoIterator for ParseResult {
    type Item = EditBlock;
    type IntoIter = std::vec::IntoIter<EditBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.into_iter()
    }
}

/// File-scoped apply failures. Never batch-fatal: each failing block turns
/// into a `false` entry in the outcome map and a log line, nothing more.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// Existing file targeted by a blank search anchor.
    #[error("empty search content for existing file {path:?}")]
    MissingSearchContent { path: PathBuf },

    /// Anchor not present in the file's current bytes.
    #[error("search content not found in file {path:?}")]
    SearchNotFound { path: PathBuf },

    /// Creation/write error (permissions, missing path).
    #[error("I/O failure on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Udiff body without usable headers or hunks.
    #[error("malformed unified diff for {path:?}: {detail}")]
    BadUdiff { path: PathBuf, detail: String },

    /// A hunk's context could not be located; file left unmodified.
    #[error("hunk context not found in {path:?}: {detail}")]
    HunkMismatch { path: PathBuf, detail: String },
}
