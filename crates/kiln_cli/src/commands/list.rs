//! List command - Show available blueprints.

use anyhow::Result;
use clap::Args;
use kiln_templates::BlueprintDescriptor;
use serde::Serialize;

use super::Session;

#[derive(Args)]
pub struct ListArgs {
    /// Only blueprints of this type
    #[arg(short = 't', long = "type")]
    blueprint_type: Option<String>,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct BlueprintSummary<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    blueprint_type: &'a str,
    architecture: Option<&'a str>,
    version: &'a str,
    description: &'a str,
}

impl<'a> From<&'a BlueprintDescriptor> for BlueprintSummary<'a> {
    fn from(d: &'a BlueprintDescriptor) -> Self {
        Self {
            id: &d.id,
            name: &d.name,
            blueprint_type: &d.blueprint_type,
            architecture: d.architecture_variant(),
            version: &d.version,
            description: &d.description,
        }
    }
}

pub async fn execute(args: ListArgs, session: &Session) -> Result<()> {
    let registry = session.registry()?;
    let blueprints = match &args.blueprint_type {
        Some(t) => registry.get_by_type(t),
        None => registry.list(),
    };
    let summaries: Vec<BlueprintSummary> = blueprints.iter().map(|d| d.as_ref().into()).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No blueprints found in {}", session.provider.describe());
        return Ok(());
    }

    println!("{:<16} {:<8} {:<10} {:<8} DESCRIPTION", "ID", "TYPE", "ARCH", "VERSION");
    for s in &summaries {
        println!(
            "{:<16} {:<8} {:<10} {:<8} {}",
            s.id,
            s.blueprint_type,
            s.architecture.unwrap_or("standard"),
            s.version,
            s.description
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_json() {
        let descriptor = BlueprintDescriptor::new("REST API", "api")
            .with_id("api-clean")
            .with_architecture("clean");
        let json = serde_json::to_value(BlueprintSummary::from(&descriptor)).unwrap();
        assert_eq!(json["id"], "api-clean");
        assert_eq!(json["type"], "api");
        assert_eq!(json["architecture"], "clean");
    }
}
