//! Format detection and raw block extraction
//!
//! A prioritized chain of regex matchers, one per textual edit convention.
//! Every matcher runs over the whole response text and emits candidates with
//! the byte span it matched; reconciling overlapping candidates is the
//! resolver's job, not ours. The chain is a plain ordered array, so the
//! quad-over-triple priority stays a one-line policy choice.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::blocks::{EditBlock, EditType};
use crate::core::udiff;

/// One raw match: where it was found, how specific its convention is
/// (lower = more specific), and the block it would produce.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub span: (usize, usize),
    pub priority: usize,
    pub block: EditBlock,
}

// Fence language tags: `python`, `c++`, `objective-c`, ...
const LANG: &str = r"[A-Za-z0-9_+.#-]";

// SEARCH body, divider, REPLACE body. The divider and closer are delimiter
// *lines*: each must sit directly after a newline and fill its own line, so a
// body line that merely ends in equals signs cannot split the block. Both
// bodies capture their trailing newline (stripped later) and may be empty.
const SR_BODY: &str = r"<<<<<<< SEARCH[ \t]*\r?\n(?P<search>(?:.*?\r?\n)??)=======[ \t]*\r?\n(?P<replace>(?:.*?\r?\n)??)>>>>>>> REPLACE";

static QUAD_SR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?ms)^(?P<path>[^`\r\n]+)\r?\n````(?P<lang>{LANG}*)[ \t]*\r?\n{SR_BODY}[ \t]*\r?\n````"
    ))
    .expect("quad search/replace pattern")
});

static TRIPLE_LANG_SR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?ms)^(?P<path>[^`\r\n]+)\r?\n```(?P<lang>{LANG}+)[ \t]*\r?\n{SR_BODY}[ \t]*\r?\n```"
    ))
    .expect("triple-with-language search/replace pattern")
});

static TRIPLE_PLAIN_SR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?ms)^(?P<path>[^`\r\n]+)\r?\n```[ \t]*\r?\n{SR_BODY}[ \t]*\r?\n```"
    ))
    .expect("triple-plain search/replace pattern")
});

// Path appears as the first line *inside* the fence. The first character
// class keeps marker lines from being mistaken for paths.
static DIFF_FENCED_SR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?ms)^```{LANG}*[ \t]*\r?\n(?P<path>[^`\r\n<=>][^`\r\n]*)\r?\n{SR_BODY}[ \t]*\r?\n```"
    ))
    .expect("diff-fenced search/replace pattern")
});

static UDIFF_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^```diff[ \t]*\r?\n(?P<body>---.*?)\r?\n```[ \t]*\r?$")
        .expect("unified diff fence pattern")
});

// Path line, fence, body with no marker triplet. Marker-bearing bodies are
// rejected later; here we only capture the shape.
static WHOLE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?ms)^(?P<path>[^`\r\n<=>][^`\r\n]*)\r?\n```(?P<lang>{LANG}*)[ \t]*\r?\n(?:(?P<body>.*?)\r?\n)?```[ \t]*\r?$"
    ))
    .expect("whole-file fence pattern")
});

/// Fixed matcher priority, most specific first. Quad fences outrank triple
/// fences even though they are rare in the wild.
pub(crate) const PRIORITY_QUAD: usize = 0;
pub(crate) const PRIORITY_TRIPLE_LANG: usize = 1;
pub(crate) const PRIORITY_TRIPLE_PLAIN: usize = 2;
pub(crate) const PRIORITY_DIFF_FENCED: usize = 3;
pub(crate) const PRIORITY_UDIFF: usize = 4;
pub(crate) const PRIORITY_WHOLE_FILE: usize = 5;

/// Run every matcher and collect all candidates, overlapping or not.
pub(crate) fn collect_candidates(text: &str) -> Vec<Candidate> {
    let mut out = Vec::new();

    for (priority, re) in [
        (PRIORITY_QUAD, &*QUAD_SR),
        (PRIORITY_TRIPLE_LANG, &*TRIPLE_LANG_SR),
        (PRIORITY_TRIPLE_PLAIN, &*TRIPLE_PLAIN_SR),
        (PRIORITY_DIFF_FENCED, &*DIFF_FENCED_SR),
    ] {
        for caps in re.captures_iter(text) {
            let whole = caps.get(0).expect("match span");
            let Some(path) = clean_path(&caps["path"]) else {
                continue;
            };
            out.push(Candidate {
                span: (whole.start(), whole.end()),
                priority,
                block: EditBlock {
                    file_path: path,
                    language: caps
                        .name("lang")
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default(),
                    search_content: marker_body(&caps["search"]),
                    replace_content: marker_body(&caps["replace"]),
                    edit_type: EditType::SearchReplace,
                },
            });
        }
    }

    for caps in UDIFF_FENCE.captures_iter(text) {
        let whole = caps.get(0).expect("match span");
        let body = strip_cr(&caps["body"]);
        // Target comes from the +++/--- headers; fences without usable
        // headers are not udiff edits and produce no candidate.
        let Some(path) = udiff::header_target(&body) else {
            continue;
        };
        out.push(Candidate {
            span: (whole.start(), whole.end()),
            priority: PRIORITY_UDIFF,
            block: EditBlock {
                file_path: path,
                language: "diff".to_string(),
                search_content: String::new(),
                replace_content: body,
                edit_type: EditType::Udiff,
            },
        });
    }

    for caps in WHOLE_FILE.captures_iter(text) {
        let whole = caps.get(0).expect("match span");
        let Some(path) = clean_path(&caps["path"]) else {
            continue;
        };
        out.push(Candidate {
            span: (whole.start(), whole.end()),
            priority: PRIORITY_WHOLE_FILE,
            block: EditBlock {
                file_path: path,
                language: caps["lang"].to_string(),
                search_content: String::new(),
                replace_content: caps
                    .name("body")
                    .map(|m| strip_cr(m.as_str()))
                    .unwrap_or_default(),
                edit_type: EditType::WholeFile,
            },
        });
    }

    out
}

fn strip_cr(s: &str) -> String {
    s.replace('\r', "")
}

// SR bodies include the newline that anchors the following marker line.
fn marker_body(s: &str) -> String {
    strip_cr(s.strip_suffix('\n').unwrap_or(s))
}

/// Normalize a captured path line: models wrap paths in bold markers or
/// terminate them with a colon. Reject anything that still looks like prose.
fn clean_path(raw: &str) -> Option<String> {
    let p = raw
        .trim()
        .trim_start_matches('*')
        .trim_end_matches('*')
        .trim_end_matches(':')
        .trim();

    if p.is_empty() || p.contains(char::is_whitespace) {
        return None;
    }
    Some(p.to_string())
}
