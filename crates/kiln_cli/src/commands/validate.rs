//! Validate command - Check blueprint manifests and the files they reference.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use kiln_templates::{BlueprintLoader, DiskProvider, FileProvider};
use thiserror::Error;
use tracing::info;

use super::Session;

/// One or more blueprints reported problems.
#[derive(Debug, Error)]
#[error("{0} blueprint(s) failed validation")]
pub struct InvalidBlueprints(pub usize);

#[derive(Args)]
pub struct ValidateArgs {
    /// Blueprint directory or collection (defaults to the configured source)
    dir: Option<PathBuf>,
}

pub async fn execute(args: ValidateArgs, session: &Session) -> Result<()> {
    let loader = match &args.dir {
        Some(dir) => {
            if !dir.is_dir() {
                anyhow::bail!("Not a directory: {}", dir.display());
            }
            let provider: Arc<dyn FileProvider> = Arc::new(DiskProvider::new(dir));
            BlueprintLoader::new(provider)
        }
        None => session.loader(),
    };
    info!("Validating blueprints in {}", loader.provider().describe());

    let dirs = loader.discover()?;
    if dirs.is_empty() {
        anyhow::bail!("No blueprint found in {}", loader.provider().describe());
    }

    let mut failed = 0;
    for dir in &dirs {
        let label = display_dir(dir);
        let issues = loader.validate_blueprint(dir);
        if issues.is_empty() {
            println!("✅ {}", label);
        } else {
            failed += 1;
            println!("❌ {}", label);
            for issue in &issues {
                println!("   - {}", issue);
            }
        }
    }

    println!();
    if failed > 0 {
        return Err(InvalidBlueprints(failed).into());
    }
    println!("All {} blueprint(s) are valid", dirs.len());
    Ok(())
}

fn display_dir(dir: &Path) -> String {
    if dir.as_os_str().is_empty() {
        ".".to_string()
    } else {
        dir.display().to_string()
    }
}
