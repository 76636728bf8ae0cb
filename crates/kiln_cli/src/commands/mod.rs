//! CLI command definitions.
//!
//! Each subcommand works on the blueprint collection selected by the global
//! `--blueprints` flag or the configuration file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kiln_core::KilnConfig;
use kiln_templates::{BlueprintLoader, BlueprintRegistry, FileProvider, ProviderConfig};
use tracing::debug;

use crate::embedded;

pub mod generate;
pub mod list;
pub mod show;
pub mod validate;

/// kiln - scaffold Go projects from blueprints
#[derive(Parser)]
#[command(name = "kiln")]
#[command(version, about = "kiln - scaffold Go projects from blueprints")]
#[command(long_about = r#"
kiln renders a blueprint (a manifest plus template files) into a new Go
project, merges its module requirements into go.mod and runs its
post-generation hooks.

COMMANDS:
  generate  → Create a project from a blueprint
  list      → List available blueprints
  show      → Describe one blueprint
  validate  → Check blueprint manifests and their files

VARIABLES:
  Values are taken from blueprint defaults, then [variables] in the config
  file, then KILN_<NAME> environment variables, then flags, then prompts.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or unknown blueprint
  3 - Validation failure
  4 - Template error
  5 - Unsafe path
  6 - Write error
  7 - Post-generation hook failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Blueprint collection directory (overrides the configured source)
    #[arg(long, global = true, env = "KILN_BLUEPRINTS", value_name = "DIR")]
    pub blueprints: Option<PathBuf>,

    /// Configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a project from a blueprint
    Generate(generate::GenerateArgs),

    /// List available blueprints
    List(list::ListArgs),

    /// Describe one blueprint
    Show(show::ShowArgs),

    /// Validate blueprint manifests
    Validate(validate::ValidateArgs),
}

/// State shared by every command: configuration, process environment and
/// the blueprint source.
pub struct Session {
    pub config: KilnConfig,
    pub env: HashMap<String, String>,
    pub provider: Arc<dyn FileProvider>,
    pub quiet: bool,
}

impl Session {
    pub fn open(cli: &Cli) -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let config = KilnConfig::discover(cli.config.as_deref(), &env)?;

        let source = match &cli.blueprints {
            Some(dir) => ProviderConfig::disk(dir),
            None => config.source.clone(),
        };
        let provider = source
            .build(embedded::BUNDLE)
            .context("Failed to open blueprint source")?;
        debug!("Blueprint source: {}", provider.describe());

        Ok(Self {
            config,
            env,
            provider,
            quiet: cli.quiet,
        })
    }

    pub fn loader(&self) -> BlueprintLoader {
        BlueprintLoader::new(self.provider.clone())
    }

    /// Load every blueprint from the source.
    pub fn registry(&self) -> Result<BlueprintRegistry> {
        let registry = self
            .loader()
            .load_all()
            .with_context(|| format!("Failed to load blueprints from {}", self.provider.describe()))?;
        Ok(registry.with_default_id(self.config.generation.default_blueprint.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "kiln",
            "list",
            "--blueprints",
            "/srv/blueprints",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.blueprints, Some(PathBuf::from("/srv/blueprints")));
        assert!(matches!(cli.command, Commands::List(_)));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["kiln", "-v", "-q", "list"]).is_err());
    }
}
