//! **patchfence** - Parse AI-assistant edit fences and apply them to a project tree
//!
//! Recognizes the competing fenced-block edit conventions found in model
//! responses (SEARCH/REPLACE fences, whole-file fences, unified diffs) and
//! replays them against a project root with CRLF preservation, atomic writes,
//! and per-file success reporting.

/// Command-line interface with clap integration
pub mod cli;

/// Core pipeline - detection, resolution, application
pub mod core {
    /// Shared data model for parsed edit blocks
    pub mod blocks;
    pub use blocks::{ApplyError, EditBlock, EditType, ParseResult};

    /// Regex matcher chain, one per fenced edit convention
    pub mod detect;

    /// Candidate resolution and the parser front door
    pub mod resolve;
    pub use resolve::{BlockParser, SEARCH_REPLACE_PREAMBLE, run as parse_run};

    /// Ordered block application under a project root
    pub mod apply;
    pub use apply::{PatchApplier, run as apply_run};

    /// Unified diff parsing with all-or-nothing hunk application
    pub mod udiff;
    pub use udiff::{Hunk, UdiffPatch, parse_udiff};
}

/// Infrastructure - Configuration and CLI input
pub mod infra {
    /// Configuration management with TOML support
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Response text input (file or clipboard)
    pub mod io;
    pub use io::read_response_input;
}

// Strategic re-exports for clean CLI interface
pub use crate::cli::{AppContext, Cli, Commands};
pub use crate::core::{apply_run, parse_run};
pub use crate::core::{ApplyError, BlockParser, EditBlock, EditType, ParseResult, PatchApplier};
pub use crate::infra::{Config, load_config};
