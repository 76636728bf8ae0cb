//! Generate command - Create a project from a blueprint.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use kiln_core::{GenerateRequest, GenerationReport, Generator};
use kiln_runner::{HookStatus, ProcessHookRunner};
use kiln_templates::{derive_id, BindSources};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Session;
use crate::prompt::DialoguerPrompter;

/// Generation succeeded but hooks did not.
#[derive(Debug, Error)]
#[error("{0} post-generation hook(s) did not succeed")]
pub struct HooksFailed(pub usize);

#[derive(Args)]
pub struct GenerateArgs {
    /// Blueprint type, e.g. api, cli or simple (defaults to the configured blueprint)
    #[arg(value_name = "TYPE")]
    blueprint_type: Option<String>,

    /// Architecture variant of the blueprint type
    #[arg(short, long)]
    architecture: Option<String>,

    /// Project name (ProjectName)
    #[arg(short, long)]
    name: Option<String>,

    /// Go module path (ModulePath)
    #[arg(short, long)]
    module: Option<String>,

    /// Logging library (Logger)
    #[arg(long)]
    logger: Option<String>,

    /// Database driver (Database)
    #[arg(long)]
    database: Option<String>,

    /// HTTP framework (Framework)
    #[arg(long)]
    framework: Option<String>,

    /// Set any variable; repeatable
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, String)>,

    /// Output directory (defaults to ./<name>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing files
    #[arg(short, long)]
    force: bool,

    /// Never prompt; missing required values are errors
    #[arg(long)]
    non_interactive: bool,

    /// Resolve and plan without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Skip post-generation hooks
    #[arg(long)]
    no_hooks: bool,

    /// Concurrent file writes
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    workers: Option<u16>,

    /// Print the generation report as JSON
    #[arg(long)]
    json: bool,
}

impl GenerateArgs {
    /// Variables set through dedicated flags and `--set`, the latter winning.
    fn flag_values(&self) -> Vec<(String, String)> {
        let named = [
            ("ProjectName", &self.name),
            ("ModulePath", &self.module),
            ("Logger", &self.logger),
            ("Database", &self.database),
            ("Framework", &self.framework),
        ];
        named
            .into_iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
            .chain(self.set.iter().cloned())
            .collect()
    }

    fn output_dir(&self) -> PathBuf {
        match (&self.output, &self.name) {
            (Some(output), _) => output.clone(),
            (None, Some(name)) => PathBuf::from(name),
            (None, None) => PathBuf::from("."),
        }
    }
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{}`", raw)),
    }
}

pub async fn execute(args: GenerateArgs, session: &Session) -> Result<()> {
    let registry = Arc::new(session.registry()?);
    let id = match &args.blueprint_type {
        Some(blueprint_type) => derive_id(blueprint_type, args.architecture.as_deref()),
        None => registry.default_id().to_string(),
    };
    let descriptor = registry.get(&id)?;
    info!("Using blueprint: {} ({})", descriptor.name, descriptor.id);

    let mut sources = BindSources::new()
        .with_config(session.config.variable_values())
        .with_env(session.env.clone());
    for (name, value) in args.flag_values() {
        sources = sources.with_flag(name, value);
    }
    if !args.non_interactive && std::io::stdin().is_terminal() {
        sources = sources.with_prompter(Arc::new(DialoguerPrompter::new()));
    }

    let runner = ProcessHookRunner::new().with_grace_period(session.config.hook_grace_period());
    let generator = Generator::new(registry.clone(), session.provider.clone(), Arc::new(runner))
        .with_workers(session.config.generation.workers);

    let mut request = GenerateRequest::new(&id, args.output_dir())
        .with_sources(sources)
        .force(args.force || session.config.generation.force)
        .dry_run(args.dry_run)
        .skip_hooks(args.no_hooks);
    if let Some(workers) = args.workers {
        request = request.workers(usize::from(workers));
    }

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping generation");
                cancel.cancel();
            }
        })
    };
    let result = generator.generate(&request, &cancel).await;
    interrupt.abort();
    let report = result.with_context(|| format!("Failed to generate {}", id))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !session.quiet {
        print_summary(&report);
    }

    let failed = report.hooks.failures().len();
    if failed > 0 {
        return Err(HooksFailed(failed).into());
    }
    Ok(())
}

fn print_summary(report: &GenerationReport) {
    let output = report.output_dir.display();
    if report.dry_run {
        println!("🔍 Dry run of '{}' into {}", report.blueprint_id, output);
        println!();
        println!("Would write:");
    } else {
        println!("✅ Generated '{}' into {}", report.blueprint_id, output);
        println!();
        println!("Files:");
    }
    for file in &report.files_written {
        println!("  📄 {}", file);
    }
    if let Some(manifest) = &report.manifest {
        println!("  📦 {} ({} requirement(s))", manifest, report.dependencies.len());
    }

    if !report.skipped_files.is_empty() {
        println!();
        println!("Skipped:");
        for skipped in &report.skipped_files {
            println!("  ⏭️  {} ({})", skipped.source, skipped.reason);
        }
    }

    if !report.hooks.is_empty() {
        println!();
        println!("Hooks:");
        for record in &report.hooks.records {
            let icon = match record.status {
                HookStatus::Succeeded => "✅",
                HookStatus::Skipped => "⏭️ ",
                _ => "❌",
            };
            match &record.message {
                Some(message) => println!("  {} {}: {}", icon, record.name, message),
                None => println!("  {} {}", icon, record.name),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> GenerateArgs {
        let argv = std::iter::once("kiln").chain(std::iter::once("generate")).chain(args.iter().copied());
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Generate(args) => args,
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("Port=9090").unwrap(),
            ("Port".to_string(), "9090".to_string())
        );
        assert_eq!(
            parse_assignment("DatabaseURL=postgres://x?a=b").unwrap().1,
            "postgres://x?a=b"
        );
        assert!(parse_assignment("Port").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_flag_values_set_wins() {
        let args = parse(&[
            "api",
            "--name",
            "orders",
            "--logger",
            "zap",
            "--set",
            "Logger=zerolog",
            "--set",
            "Port=9090",
        ]);
        assert_eq!(args.blueprint_type.as_deref(), Some("api"));

        let values: std::collections::HashMap<_, _> = args.flag_values().into_iter().collect();
        assert_eq!(values["ProjectName"], "orders");
        assert_eq!(values["Logger"], "zerolog");
        assert_eq!(values["Port"], "9090");
        assert!(!values.contains_key("ModulePath"));
    }

    #[test]
    fn test_output_dir_defaults() {
        assert_eq!(parse(&["api", "-n", "orders"]).output_dir(), PathBuf::from("orders"));
        assert_eq!(
            parse(&["api", "-n", "orders", "-o", "/tmp/x"]).output_dir(),
            PathBuf::from("/tmp/x")
        );
        assert_eq!(parse(&["api"]).output_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let argv = ["kiln", "generate", "api", "--workers", "0"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
