use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default project root for apply (overridden by --root)
    pub root: Option<PathBuf>,

    /// Strip known instruction preambles before parsing
    pub strip_preambles: bool,

    /// Extra backend preambles to strip (exact prefix match)
    pub preambles: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: None,
            strip_preambles: true,
            preambles: Vec::new(),
        }
    }
}

pub fn load_config() -> Result<Config> {
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    let config_paths = ["patchfence.toml", ".patchfence.toml"];

    for path in &config_paths {
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
            break;
        }
    }

    // Add environment variables with PATCHFENCE_ prefix. No key separator:
    // the config keys are flat, and a "_" separator would split multi-word
    // names like strip_preambles into nested keys.
    builder = builder.add_source(config::Environment::with_prefix("PATCHFENCE").try_parsing(true));

    let cfg = builder.build().context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(args: InitArgs, ctx: &AppContext) -> Result<()> {
    let config_path = args.path.join("patchfence.toml");

    if config_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_strip_preambles() {
        let cfg = Config::default();
        assert!(cfg.strip_preambles);
        assert!(cfg.root.is_none());
        assert!(cfg.preambles.is_empty());
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let toml_string = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&toml_string).unwrap();
        assert!(parsed.strip_preambles);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let parsed: Config = toml::from_str("root = \"/work/proj\"").unwrap();
        assert_eq!(parsed.root.as_deref(), Some(Path::new("/work/proj")));
        assert!(parsed.strip_preambles);
    }

    #[test]
    fn env_override_reaches_multiword_keys() {
        // set_var is unsafe in edition 2024; this test owns the variable.
        unsafe { std::env::set_var("PATCHFENCE_STRIP_PREAMBLES", "false") };
        let cfg = load_config().unwrap();
        unsafe { std::env::remove_var("PATCHFENCE_STRIP_PREAMBLES") };

        assert!(!cfg.strip_preambles);
    }
}
