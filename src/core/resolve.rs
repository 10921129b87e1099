//! Block classification and overlap resolution
//!
//! All matchers run first; this module reconciles their candidates. For any
//! set of overlapping spans only the highest-priority candidate survives, and
//! a whole-file candidate whose body carries the SEARCH/REPLACE marker
//! triplet is never allowed to win no matter what else matched. Survivors
//! are emitted in span-start order.

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::{AppContext, ParseArgs};
use crate::core::blocks::{EditType, ParseResult};
use crate::core::detect::{self, Candidate};
use crate::infra::config::{Config, load_config};
use crate::infra::io::read_response_input;

/// Instruction preamble the default backend prepends to edit responses. Its
/// illustrative fence would parse as a real edit, so `parse_blocks` strips it
/// when the response starts with it verbatim.
pub const SEARCH_REPLACE_PREAMBLE: &str = "\
Reply with one *SEARCH/REPLACE* block per change. Name the file on the line \
before the fence, then give the exact lines to find and their replacement:

```
path/to/file.py
<<<<<<< SEARCH
def hello():
    print(\"old\")
=======
def hello():
    print(\"new\")
>>>>>>> REPLACE
```

The SEARCH section must match the current file contents exactly. Use an \
empty SEARCH section only when creating a new file.
";

/// Parser front door: strips known instruction preambles, runs the matcher
/// chain, resolves candidates into an ordered [`ParseResult`].
///
/// Backend adapters share this one engine; a backend with its own
/// instruction text registers it via [`with_preamble`](Self::with_preamble).
#[derive(Debug, Clone)]
pub struct BlockParser {
    preambles: Vec<String>,
}

impl Default for BlockParser {
    fn default() -> Self {
        Self {
            preambles: vec![SEARCH_REPLACE_PREAMBLE.to_string()],
        }
    }
}

impl BlockParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional exact-match preamble to strip before parsing.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preambles.push(preamble.into());
        self
    }

    /// Drop all registered preambles, including the built-in one.
    pub fn without_preambles(mut self) -> Self {
        self.preambles.clear();
        self
    }

    /// Parse response text into an ordered list of edit blocks.
    ///
    /// Deterministic: identical input yields an identical result. Spans no
    /// matcher claims are silently omitted; the caller simply sees fewer
    /// edits than the raw text suggested.
    pub fn parse_blocks(&self, text: &str) -> ParseResult {
        let text = self.strip_preamble(text);
        let candidates = detect::collect_candidates(text);
        resolve(candidates)
    }

    fn strip_preamble<'a>(&self, text: &'a str) -> &'a str {
        for preamble in &self.preambles {
            if let Some(rest) = text.strip_prefix(preamble.as_str()) {
                debug!(bytes = preamble.len(), "stripped instruction preamble");
                return rest;
            }
        }
        text
    }
}

/// Priority-first overlap resolution.
fn resolve(mut candidates: Vec<Candidate>) -> ParseResult {
    let total = candidates.len();

    // A fence that looks like a whole-file rewrite but contains the marker
    // triplet is never a whole-file edit; whichever SEARCH/REPLACE pattern
    // still applies will claim the span instead.
    candidates.retain(|c| {
        c.block.edit_type != EditType::WholeFile
            || !c.block.replace_content.contains("<<<<<<< SEARCH")
    });

    // Highest priority claims its span first; ties go to the earlier span.
    candidates.sort_by_key(|c| (c.priority, c.span.0, c.span.1));

    let mut accepted: Vec<Candidate> = Vec::new();
    for cand in candidates {
        let overlaps = accepted
            .iter()
            .any(|kept| cand.span.0 < kept.span.1 && kept.span.0 < cand.span.1);
        if !overlaps {
            accepted.push(cand);
        }
    }

    // Emission order is source-text order, which is also application order.
    accepted.sort_by_key(|c| c.span.0);

    debug!(candidates = total, emitted = accepted.len(), "resolved edit blocks");

    ParseResult {
        blocks: accepted.into_iter().map(|c| c.block).collect(),
    }
}

/// Build a parser honoring the loaded configuration.
pub(crate) fn parser_from_config(cfg: &Config) -> BlockParser {
    let mut parser = BlockParser::new();
    if !cfg.strip_preambles {
        parser = parser.without_preambles();
    }
    for preamble in &cfg.preambles {
        parser = parser.with_preamble(preamble.clone());
    }
    parser
}

pub(crate) fn render_listing(parsed: &ParseResult) -> String {
    if parsed.is_empty() {
        return "No edit blocks recognized.\n".to_string();
    }
    let mut out = String::new();
    for (i, block) in parsed.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}. {} ({})\n",
            i + 1,
            block.file_path,
            block.edit_type
        ));
    }
    out
}

/// `pfence parse`: list the blocks a response would produce, writing nothing.
pub fn run(args: ParseArgs, ctx: &AppContext) -> Result<()> {
    let text = read_response_input(args.response_file.as_deref(), args.from_clipboard)?;
    let cfg = load_config()?;
    let parsed = parser_from_config(&cfg).parse_blocks(&text);

    if args.json {
        println!(
            "{}",
            serde_json::to_string(&parsed).context("Failed to serialize blocks")?
        );
    } else if !ctx.quiet {
        print!("{}", render_listing(&parsed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::blocks::EditType;

    #[test]
    fn marker_body_is_never_whole_file() {
        let text = "a.txt\n```\n<<<<<<< SEARCH\nfoo\n=======\nbar\n>>>>>>> REPLACE\n```";
        let parsed = BlockParser::new().parse_blocks(text);

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.blocks[0].edit_type, EditType::SearchReplace);
        assert_eq!(parsed.blocks[0].search_content, "foo");
    }

    #[test]
    fn quad_beats_nested_triple_interpretations() {
        let text = "a.txt\n````\n<<<<<<< SEARCH\nfoo\n=======\nbar\n>>>>>>> REPLACE\n````";
        let parsed = BlockParser::new().parse_blocks(text);

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.blocks[0].edit_type, EditType::SearchReplace);
        assert_eq!(parsed.blocks[0].file_path, "a.txt");
    }

    #[test]
    fn blocks_come_out_in_source_order() {
        let text = "\
one.txt
```
<<<<<<< SEARCH
aa
=======
bb
>>>>>>> REPLACE
```

two.py
```python
print(1)
```
";
        let parsed = BlockParser::new().parse_blocks(text);

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.blocks[0].file_path, "one.txt");
        assert_eq!(parsed.blocks[1].file_path, "two.py");
        assert_eq!(parsed.blocks[1].edit_type, EditType::WholeFile);
    }

    #[test]
    fn parse_is_deterministic() {
        let text = "a.rs\n```rust\n<<<<<<< SEARCH\nx\n=======\ny\n>>>>>>> REPLACE\n```\n\nb.py\n```python\nprint(1)\n```";
        let parser = BlockParser::new();
        assert_eq!(parser.parse_blocks(text), parser.parse_blocks(text));
    }

    #[test]
    fn builtin_preamble_is_stripped() {
        let text = format!(
            "{SEARCH_REPLACE_PREAMBLE}\nreal.txt\n```\n<<<<<<< SEARCH\nfoo\n=======\nbar\n>>>>>>> REPLACE\n```"
        );
        let parsed = BlockParser::new().parse_blocks(&text);

        // Only the real edit survives; the preamble's illustrative fence is
        // never seen by the matchers.
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.blocks[0].file_path, "real.txt");
    }

    #[test]
    fn preamble_fence_parses_when_stripping_disabled() {
        let text = format!(
            "{SEARCH_REPLACE_PREAMBLE}\nreal.txt\n```\n<<<<<<< SEARCH\nfoo\n=======\nbar\n>>>>>>> REPLACE\n```"
        );
        let parsed = BlockParser::new().without_preambles().parse_blocks(&text);

        // Sanity check that stripping was load-bearing above.
        assert!(parsed.len() > 1);
    }

    #[test]
    fn custom_backend_preamble() {
        let custom = "EDIT PROTOCOL v2\n```\nexample.py\n<<<<<<< SEARCH\na\n=======\nb\n>>>>>>> REPLACE\n```\n";
        let text = format!("{custom}target.rs\n```rust\nfn f() {{}}\n```");
        let parsed = BlockParser::new().with_preamble(custom).parse_blocks(&text);

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.blocks[0].file_path, "target.rs");
    }

    #[test]
    fn unmatched_text_is_omitted_not_an_error() {
        let parsed = BlockParser::new().parse_blocks("just prose, no fences at all");
        assert!(parsed.is_empty());
    }
}
