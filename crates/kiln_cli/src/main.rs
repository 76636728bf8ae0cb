//! kiln CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or unknown blueprint
//! - 3: Validation failure
//! - 4: Template error
//! - 5: Unsafe path
//! - 6: Write error
//! - 7: Post-generation hook failure

use std::process::ExitCode;

use clap::Parser;
use kiln_core::{CoreError, ErrorKind};
use kiln_templates::TemplateError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod embedded;
mod prompt;

use commands::{Cli, Commands, Session};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
    pub const PATH_SECURITY: u8 = 5;
    pub const WRITE_ERROR: u8 = 6;
    pub const HOOK_FAILURE: u8 = 7;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match Session::open(&cli) {
        Ok(session) => match cli.command {
            Commands::Generate(args) => commands::generate::execute(args, &session).await,
            Commands::List(args) => commands::list::execute(args, &session).await,
            Commands::Show(args) => commands::show::execute(args, &session).await,
            Commands::Validate(args) => commands::validate::execute(args, &session).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Logs go to stderr so `--json` output stays clean.
fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "warn,kiln_cli=debug,kiln_core=debug,kiln_templates=debug,kiln_runner=debug"
    } else if quiet {
        "error"
    } else {
        "warn,kiln_cli=info,kiln_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Already initialized is fine
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init();
}

/// Pick the exit code from the typed error at the root of `e`.
fn categorize_error(e: &anyhow::Error) -> u8 {
    if e.downcast_ref::<commands::generate::HooksFailed>().is_some() {
        return ExitCodes::HOOK_FAILURE;
    }
    if e.downcast_ref::<commands::validate::InvalidBlueprints>().is_some() {
        return ExitCodes::VALIDATION_FAILURE;
    }
    let kind = if let Some(core) = e.downcast_ref::<CoreError>() {
        core.kind()
    } else if let Some(template) = e.downcast_ref::<TemplateError>() {
        ErrorKind::from(template)
    } else {
        ErrorKind::General
    };
    exit_code(kind)
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::NotFound => ExitCodes::INVALID_ARGS,
        ErrorKind::Validation => ExitCodes::VALIDATION_FAILURE,
        ErrorKind::Template => ExitCodes::TEMPLATE_ERROR,
        ErrorKind::PathSecurity => ExitCodes::PATH_SECURITY,
        ErrorKind::Write => ExitCodes::WRITE_ERROR,
        ErrorKind::Config => ExitCodes::INVALID_ARGS,
        ErrorKind::General => ExitCodes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::path::PathBuf;

    #[test]
    fn test_categorize_through_context() {
        let err: anyhow::Result<()> = Err(CoreError::OutputExists(PathBuf::from("main.go")))
            .context("Failed to generate api");
        assert_eq!(categorize_error(&err.unwrap_err()), ExitCodes::WRITE_ERROR);

        let err = anyhow::Error::new(TemplateError::NotFound("nope".into()));
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);

        let err = anyhow::Error::new(CoreError::Template(TemplateError::Validation {
            variable: "ProjectName".into(),
            message: "required".into(),
        }));
        assert_eq!(categorize_error(&err), ExitCodes::VALIDATION_FAILURE);

        let err = anyhow::Error::new(commands::generate::HooksFailed(2));
        assert_eq!(categorize_error(&err), ExitCodes::HOOK_FAILURE);

        assert_eq!(
            categorize_error(&anyhow::anyhow!("something else")),
            ExitCodes::GENERAL_ERROR
        );
    }
}
