//! Patch application against the real file tree
//!
//! Replays an ordered [`ParseResult`] under an injected project root. Every
//! block succeeds or fails on its own; a failing block becomes a `false`
//! entry in the outcome map and a log line, never an early return. Writes go
//! through a same-directory tempfile and an atomic rename.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, error, warn};

use crate::cli::{AppContext, ApplyArgs};
use crate::core::blocks::{ApplyError, EditBlock, EditType, ParseResult};
use crate::core::resolve;
use crate::core::udiff::{self, UdiffError};
use crate::infra::config::load_config;
use crate::infra::io::read_response_input;

type RefreshHook = Box<dyn Fn(&Path) + Send + Sync>;

/// Applies parsed edit blocks to files under a project root.
///
/// Single-owner and synchronous: one applier per editing session, blocks
/// applied in parse order. The modified-files accumulator spans multiple
/// `apply_blocks` calls until [`clear_modified_files`](Self::clear_modified_files).
pub struct PatchApplier {
    project_root: PathBuf,
    refresh_hook: Option<RefreshHook>,
    modified: IndexSet<PathBuf>,
}

impl std::fmt::Debug for PatchApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchApplier")
            .field("project_root", &self.project_root)
            .field("refresh_hook", &self.refresh_hook.is_some())
            .field("modified", &self.modified)
            .finish()
    }
}

impl PatchApplier {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            refresh_hook: None,
            modified: IndexSet::new(),
        }
    }

    /// Register a hook invoked with the resolved path after every write that
    /// changed on-disk bytes (editor buffer refresh in the original setting).
    pub fn with_refresh_hook(mut self, hook: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.refresh_hook = Some(Box::new(hook));
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Resolved paths whose bytes changed since the last clear, in first-write
    /// order.
    pub fn modified_files(&self) -> impl Iterator<Item = &Path> {
        self.modified.iter().map(PathBuf::as_path)
    }

    pub fn clear_modified_files(&mut self) {
        self.modified.clear();
    }

    /// Apply every block in order; the returned map is keyed by the block's
    /// `file_path` exactly as written in the response. A later block for the
    /// same path overwrites the earlier verdict.
    pub fn apply_blocks(&mut self, parsed: &ParseResult) -> IndexMap<String, bool> {
        let mut outcome = IndexMap::new();

        for block in parsed.iter() {
            match self.apply_block(block) {
                Ok(written) => {
                    debug!(
                        path = %block.file_path,
                        edit_type = %block.edit_type,
                        "applied edit block"
                    );
                    if let Some(path) = written {
                        if let Some(hook) = &self.refresh_hook {
                            hook(&path);
                        }
                        self.modified.insert(path);
                    }
                    outcome.insert(block.file_path.clone(), true);
                }
                Err(err) => {
                    match &err {
                        ApplyError::Io { .. } => {
                            error!(edit_type = %block.edit_type, "edit failed: {err}");
                        }
                        _ => warn!(edit_type = %block.edit_type, "edit failed: {err}"),
                    }
                    outcome.insert(block.file_path.clone(), false);
                }
            }
        }

        outcome
    }

    /// Apply one block. `Ok(Some(path))` means on-disk bytes changed at the
    /// resolved path; `Ok(None)` means the edit was a no-op.
    fn apply_block(&self, block: &EditBlock) -> Result<Option<PathBuf>, ApplyError> {
        let target = self.resolve_in_root(&block.file_path);

        match block.edit_type {
            EditType::SearchReplace => self.apply_search_replace(&target, block),
            EditType::WholeFile => self.apply_whole_file(&target, block),
            EditType::Udiff => self.apply_udiff(&target, block),
        }
    }

    /// Re-root a response path under the project root. Absolute paths that
    /// already live under the root keep their relative part; anything else is
    /// reduced to its normal components, so `..` can never escape the root.
    fn resolve_in_root(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        let rel: PathBuf = match path.strip_prefix(&self.project_root) {
            Ok(stripped) => stripped.to_path_buf(),
            Err(_) => path
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part),
                    _ => None,
                })
                .collect(),
        };
        self.project_root.join(rel)
    }

    fn apply_search_replace(
        &self,
        target: &Path,
        block: &EditBlock,
    ) -> Result<Option<PathBuf>, ApplyError> {
        if !target.exists() {
            // Absent target: the block creates the file verbatim, search
            // content is ignored (models usually leave it blank here).
            write_new_file(target, &block.replace_content)?;
            return Ok(Some(target.to_path_buf()));
        }

        if block.search_content.trim().is_empty() {
            return Err(ApplyError::MissingSearchContent {
                path: target.to_path_buf(),
            });
        }

        let content = read_file(target)?;
        let normalized = content.replace("\r\n", "\n");

        if !normalized.contains(&block.search_content) {
            return Err(ApplyError::SearchNotFound {
                path: target.to_path_buf(),
            });
        }

        let mut updated = normalized.replacen(&block.search_content, &block.replace_content, 1);
        if dominant_crlf(&content) {
            updated = updated.replace('\n', "\r\n");
        }

        if updated == content {
            return Ok(None);
        }
        write_atomic(target, updated.as_bytes())
            .map_err(|source| io_err(target, source))?;
        Ok(Some(target.to_path_buf()))
    }

    fn apply_whole_file(
        &self,
        target: &Path,
        block: &EditBlock,
    ) -> Result<Option<PathBuf>, ApplyError> {
        if target.exists() {
            // Byte compare: the current target may not be UTF-8, and a
            // whole-file rewrite must still land on it.
            let current = fs::read(target).map_err(|source| io_err(target, source))?;
            if current == block.replace_content.as_bytes() {
                return Ok(None);
            }
            write_atomic(target, block.replace_content.as_bytes())
                .map_err(|source| io_err(target, source))?;
        } else {
            write_new_file(target, &block.replace_content)?;
        }
        Ok(Some(target.to_path_buf()))
    }

    fn apply_udiff(
        &self,
        target: &Path,
        block: &EditBlock,
    ) -> Result<Option<PathBuf>, ApplyError> {
        let patch = udiff::parse_udiff(&block.replace_content).map_err(|e| match e {
            UdiffError::MissingHeaders | UdiffError::NoHunks => ApplyError::BadUdiff {
                path: target.to_path_buf(),
                detail: e.to_string(),
            },
            other => ApplyError::HunkMismatch {
                path: target.to_path_buf(),
                detail: other.to_string(),
            },
        })?;

        if patch.creates_file || !target.exists() {
            let content = udiff::new_file_content(&patch.hunks);
            write_new_file(target, &content)?;
            return Ok(Some(target.to_path_buf()));
        }

        let content = read_file(target)?;
        let normalized = content.replace("\r\n", "\n");

        let mut updated =
            udiff::apply_hunks(&normalized, &patch.hunks).map_err(|e| match e {
                UdiffError::MissingHeaders | UdiffError::NoHunks => ApplyError::BadUdiff {
                    path: target.to_path_buf(),
                    detail: e.to_string(),
                },
                other => ApplyError::HunkMismatch {
                    path: target.to_path_buf(),
                    detail: other.to_string(),
                },
            })?;

        if dominant_crlf(&content) {
            updated = updated.replace('\n', "\r\n");
        }

        if updated == content {
            return Ok(None);
        }
        write_atomic(target, updated.as_bytes())
            .map_err(|source| io_err(target, source))?;
        Ok(Some(target.to_path_buf()))
    }
}

fn io_err(path: &Path, source: std::io::Error) -> ApplyError {
    ApplyError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn read_file(path: &Path) -> Result<String, ApplyError> {
    fs::read_to_string(path).map_err(|source| io_err(path, source))
}

/// True when CRLF is the file's dominant newline style (counted, not just the
/// first hit, so a single stray `\n` cannot flip a CRLF file to LF).
fn dominant_crlf(content: &str) -> bool {
    let crlf = content.matches("\r\n").count();
    let lone_lf = content.matches('\n').count() - crlf;
    crlf > 0 && crlf >= lone_lf
}

fn write_new_file(path: &Path, content: &str) -> Result<(), ApplyError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| io_err(path, source))?;
    }
    write_atomic(path, content.as_bytes()).map_err(|source| io_err(path, source))
}

/// Atomic write with robust temp file strategy.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    // Prefer same-dir tempfile so the final rename stays on one filesystem;
    // fall back to the OS temp dir on EPERM/ENOENT.
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    // Preserve original permissions when the file already exists
    let perms = fs::metadata(path).map(|m| m.permissions()).ok();

    let tmp = match tempfile::NamedTempFile::new_in(dir) {
        Ok(t) => t,
        Err(_) => tempfile::NamedTempFile::new()?,
    };

    let mut file = tmp.as_file();
    file.set_len(0)?;
    file.write_all(data)?;
    file.sync_all()?;

    if let Some(perms) = perms {
        fs::set_permissions(tmp.path(), perms)?;
    }

    // fsync parent dir to ensure durability on Unix
    #[cfg(unix)]
    {
        if let Ok(parent_file) = fs::File::open(dir) {
            let _ = parent_file.sync_all();
        }
    }

    match tmp.persist(path) {
        Ok(_) => {}
        Err(e) => {
            // Different filesystem? Try copy fallback
            fs::copy(e.file.path(), path)?;
        }
    }

    Ok(())
}

/// `pfence apply`: parse a response and apply it, preview-only by default.
pub fn run(args: ApplyArgs, ctx: &AppContext) -> Result<ExitCode> {
    let text = read_response_input(args.response_file.as_deref(), args.from_clipboard)?;
    let cfg = load_config()?;
    let parsed = resolve::parser_from_config(&cfg).parse_blocks(&text);

    if parsed.is_empty() {
        if !ctx.quiet {
            println!("No edit blocks recognized.");
        }
        return Ok(ExitCode::SUCCESS);
    }

    // Safe default is preview unless --apply was passed; --dry-run always wins.
    if !args.apply || ctx.dry_run {
        if !ctx.quiet && !args.apply {
            eprintln!("Safety mode: listing blocks only. Use --apply to write changes.");
        }
        if args.json {
            println!(
                "{}",
                serde_json::to_string(&parsed).context("Failed to serialize blocks")?
            );
        } else if !ctx.quiet {
            print!("{}", resolve::render_listing(&parsed));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let root = resolve_root(args.root.as_ref().or(cfg.root.as_ref()))?;
    let mut applier = PatchApplier::new(&root);
    let outcome = applier.apply_blocks(&parsed);

    if args.json {
        // JSON output (single line for machine parsing)
        println!(
            "{}",
            serde_json::to_string(&outcome).context("Failed to serialize outcome")?
        );
    } else if !ctx.quiet {
        for (path, ok) in &outcome {
            println!("{} {}", if *ok { "applied" } else { " FAILED" }, path);
        }
        if args.verbose {
            for path in applier.modified_files() {
                println!("modified: {}", path.display());
            }
        }
    }

    if outcome.values().all(|ok| *ok) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}

fn resolve_root(requested: Option<&PathBuf>) -> Result<PathBuf> {
    let root = match requested {
        Some(path) => {
            PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
        }
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    // Canonicalize without UNC weirdness on Windows; keep the raw path if the
    // directory does not exist yet.
    Ok(dunce::canonicalize(&root).unwrap_or(root))
}
