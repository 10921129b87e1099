use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,   // global --quiet
    pub dry_run: bool, // global --dry-run
}

#[derive(Parser)]
#[command(name = "pfence")]
#[command(about = "Parse AI-assistant edit fences and apply them to a project tree")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without writing files
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a response and apply the recognized edit blocks
    Apply(ApplyArgs),

    /// Parse a response and list the recognized edit blocks
    Parse(ParseArgs),

    /// Initialize a patchfence.toml config file
    Init(InitArgs),
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Response file to parse
    pub response_file: Option<PathBuf>,

    /// Read response text from clipboard
    #[arg(long, conflicts_with = "response_file")]
    pub from_clipboard: bool,

    /// Project root to apply edits under (defaults to config, then cwd)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Write changes to files (default is a preview listing)
    #[arg(long)]
    pub apply: bool,

    /// Output the per-file outcome in JSON format (single line)
    #[arg(long)]
    pub json: bool,

    /// Show modified files after applying
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser)]
pub struct ParseArgs {
    /// Response file to parse
    pub response_file: Option<PathBuf>,

    /// Read response text from clipboard
    #[arg(long, conflicts_with = "response_file")]
    pub from_clipboard: bool,

    /// Output blocks in JSON format (single line)
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}
