//! Unified diff parsing and all-or-nothing application
//!
//! Hunk text arrives verbatim from the extractor. Context location is exact:
//! the old side of a hunk (context + removed lines) must appear verbatim in
//! the file, anchored on line boundaries. If any hunk fails to locate, the
//! whole patch fails and the caller leaves the file untouched; a partial
//! hunk set is never applied.

#[derive(Debug, thiserror::Error)]
pub enum UdiffError {
    #[error("missing ---/+++ file headers")]
    MissingHeaders,

    #[error("no @@ hunks in diff body")]
    NoHunks,

    #[error("hunk {index} has no locatable context")]
    NoContext { index: usize },

    #[error("hunk {index} context not found in file")]
    ContextNotFound { index: usize },
}

/// One hunk, already flattened: `old_lines` is what must currently be in the
/// file (context + removals), `new_lines` is what replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_lines: Vec<String>,
    pub new_lines: Vec<String>,
}

/// A parsed single-file diff.
#[derive(Debug, Clone)]
pub struct UdiffPatch {
    pub path: String,
    pub hunks: Vec<Hunk>,
    /// `--- /dev/null` header: the patch creates the file from scratch.
    pub creates_file: bool,
}

/// Pull the target path out of the `---`/`+++` headers without parsing the
/// rest of the body. Used by the extractor to name the block's file.
pub(crate) fn header_target(body: &str) -> Option<String> {
    let (old, new) = header_paths(body)?;
    let picked = if new != "/dev/null" {
        new
    } else if old != "/dev/null" {
        old
    } else {
        return None;
    };
    Some(strip_ab_prefix(picked).to_string())
}

fn header_paths(body: &str) -> Option<(&str, &str)> {
    let mut old = None;
    let mut new = None;
    for line in body.lines() {
        if let Some(p) = line.strip_prefix("--- ") {
            old = Some(p.trim());
        } else if let Some(p) = line.strip_prefix("+++ ") {
            new = Some(p.trim());
            break;
        } else if line.starts_with("@@") {
            break;
        }
    }
    Some((old?, new?))
}

fn strip_ab_prefix(path: &str) -> &str {
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
}

/// Parse a fence body into hunks.
pub fn parse_udiff(body: &str) -> Result<UdiffPatch, UdiffError> {
    let (old_header, _) = header_paths(body).ok_or(UdiffError::MissingHeaders)?;
    let path = header_target(body).ok_or(UdiffError::MissingHeaders)?;
    let creates_file = old_header == "/dev/null";

    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in body.lines() {
        if line.starts_with("@@") {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            current = Some(Hunk {
                old_lines: Vec::new(),
                new_lines: Vec::new(),
            });
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            continue; // header region
        };

        if let Some(rest) = line.strip_prefix('+') {
            hunk.new_lines.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix('-') {
            hunk.old_lines.push(rest.to_string());
        } else if line == "\\ No newline at end of file" {
            // metadata, not content
        } else {
            // Context line; models frequently emit blank context without the
            // leading space, so take the line as-is when it has no prefix.
            let rest = line.strip_prefix(' ').unwrap_or(line);
            hunk.old_lines.push(rest.to_string());
            hunk.new_lines.push(rest.to_string());
        }
    }
    if let Some(hunk) = current.take() {
        hunks.push(hunk);
    }

    if hunks.is_empty() {
        return Err(UdiffError::NoHunks);
    }

    Ok(UdiffPatch {
        path,
        hunks,
        creates_file,
    })
}

/// Apply all hunks against `content` (already `\n`-normalized), or fail
/// without reporting any partial result.
pub fn apply_hunks(content: &str, hunks: &[Hunk]) -> Result<String, UdiffError> {
    let mut result = content.to_string();
    // Hunks arrive in file order; keep a forward cursor so identical context
    // later in the file is not re-matched at an earlier offset.
    let mut cursor = 0usize;

    for (index, hunk) in hunks.iter().enumerate() {
        if hunk.old_lines.is_empty() {
            return Err(UdiffError::NoContext { index });
        }

        let needle = hunk.old_lines.join("\n");
        let replacement = hunk.new_lines.join("\n");

        let at = find_line_anchored(&result, &needle, cursor)
            .or_else(|| find_line_anchored(&result, &needle, 0))
            .ok_or(UdiffError::ContextNotFound { index })?;

        result.replace_range(at..at + needle.len(), &replacement);
        cursor = at + replacement.len();
    }

    Ok(result)
}

/// Render the content of a file a `/dev/null` diff creates.
pub fn new_file_content(hunks: &[Hunk]) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for hunk in hunks {
        lines.extend(hunk.new_lines.iter().map(String::as_str));
    }
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// First occurrence of `needle` at or after `from` that starts and ends on a
/// line boundary; a hunk must never split a line.
fn find_line_anchored(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let mut search_at = from;
    while let Some(rel) = haystack[search_at..].find(needle) {
        let at = search_at + rel;
        let end = at + needle.len();
        let starts_line = at == 0 || haystack.as_bytes()[at - 1] == b'\n';
        let ends_line = end == haystack.len() || haystack.as_bytes()[end] == b'\n';
        if starts_line && ends_line {
            return Some(at);
        }
        // Step past this false hit, staying on a char boundary.
        search_at = at + haystack[at..].chars().next().map_or(1, char::len_utf8);
        if search_at >= haystack.len() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "\
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,3 +1,3 @@
 fn main() {
-    old();
+    new();
 }";

    #[test]
    fn parses_headers_and_hunk() {
        let patch = parse_udiff(SIMPLE).unwrap();
        assert_eq!(patch.path, "src/main.rs");
        assert!(!patch.creates_file);
        assert_eq!(patch.hunks.len(), 1);
        assert_eq!(
            patch.hunks[0].old_lines,
            ["fn main() {", "    old();", "}"]
        );
        assert_eq!(
            patch.hunks[0].new_lines,
            ["fn main() {", "    new();", "}"]
        );
    }

    #[test]
    fn applies_single_hunk() {
        let patch = parse_udiff(SIMPLE).unwrap();
        let out = apply_hunks("fn main() {\n    old();\n}\n", &patch.hunks).unwrap();
        assert_eq!(out, "fn main() {\n    new();\n}\n");
    }

    #[test]
    fn all_or_nothing_on_second_hunk_miss() {
        let body = "\
--- a/t.txt
+++ b/t.txt
@@ -1,2 +1,2 @@
 alpha
-beta
+BETA
@@ -4,2 +4,2 @@
 nope
-missing
+present";
        let patch = parse_udiff(body).unwrap();
        let err = apply_hunks("alpha\nbeta\ngamma\n", &patch.hunks).unwrap_err();
        assert!(matches!(err, UdiffError::ContextNotFound { index: 1 }));
    }

    #[test]
    fn forward_cursor_disambiguates_repeated_context() {
        let body = "\
--- a/t.txt
+++ b/t.txt
@@ -1,2 +1,2 @@
 x
-first
+FIRST
@@ -4,2 +4,2 @@
 x
-second
+SECOND";
        let patch = parse_udiff(body).unwrap();
        let out = apply_hunks("x\nfirst\nx\nsecond\n", &patch.hunks).unwrap();
        assert_eq!(out, "x\nFIRST\nx\nSECOND\n");
    }

    #[test]
    fn match_must_sit_on_line_boundaries() {
        let body = "\
--- a/t.txt
+++ b/t.txt
@@ -1 +1 @@
-foo
+bar";
        let patch = parse_udiff(body).unwrap();
        // "foo" appears only inside "xfoo"; that must not count as context.
        let err = apply_hunks("xfoo\n", &patch.hunks).unwrap_err();
        assert!(matches!(err, UdiffError::ContextNotFound { .. }));
    }

    #[test]
    fn dev_null_marks_file_creation() {
        let body = "\
--- /dev/null
+++ b/new.txt
@@ -0,0 +1,2 @@
+hello
+world";
        let patch = parse_udiff(body).unwrap();
        assert!(patch.creates_file);
        assert_eq!(patch.path, "new.txt");
        assert_eq!(new_file_content(&patch.hunks), "hello\nworld\n");
    }

    #[test]
    fn header_target_prefers_new_side() {
        assert_eq!(
            header_target("--- a/old.rs\n+++ b/renamed.rs\n@@").as_deref(),
            Some("renamed.rs")
        );
        assert_eq!(
            header_target("--- a/gone.rs\n+++ /dev/null\n@@").as_deref(),
            Some("gone.rs")
        );
        assert_eq!(header_target("no headers here"), None);
    }

    #[test]
    fn body_without_hunks_is_rejected() {
        let err = parse_udiff("--- a/x\n+++ b/x\njust text").unwrap_err();
        assert!(matches!(err, UdiffError::NoHunks));
    }
}
