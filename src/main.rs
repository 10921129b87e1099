use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use patchfence::cli::{AppContext, Cli, Commands};

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Apply(args) => patchfence::apply_run(args, &ctx),
        Commands::Parse(args) => {
            patchfence::parse_run(args, &ctx).map(|()| ExitCode::SUCCESS)
        }
        Commands::Init(args) => {
            patchfence::infra::config::init(args, &ctx).map(|()| ExitCode::SUCCESS)
        }
    }
}
