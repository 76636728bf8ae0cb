//! Show command - Describe one blueprint.

use anyhow::Result;
use clap::Args;
use kiln_templates::BlueprintDescriptor;

use super::Session;

#[derive(Args)]
pub struct ShowArgs {
    /// Blueprint id
    id: String,

    /// Print the resolved descriptor as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: ShowArgs, session: &Session) -> Result<()> {
    let registry = session.registry()?;
    let descriptor = registry.get(&args.id)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(descriptor.as_ref())?);
    } else {
        print!("{}", describe(&descriptor));
    }
    Ok(())
}

fn describe(d: &BlueprintDescriptor) -> String {
    let mut out = format!("{} ({}) v{}\n", d.name, d.id, d.version);
    if !d.description.is_empty() {
        out.push_str(&format!("{}\n", d.description));
    }
    out.push_str(&format!(
        "type: {}, architecture: {}\n",
        d.blueprint_type,
        d.architecture_variant().unwrap_or("standard")
    ));

    if !d.variables.is_empty() {
        out.push_str("\nVariables:\n");
        for v in &d.variables {
            let mut line = format!("  {} ({})", v.name, v.var_type);
            if v.required {
                line.push_str(" required");
            }
            if let Some(default) = &v.default {
                line.push_str(&format!(" default={}", default.as_raw()));
            }
            if !v.choices.is_empty() {
                line.push_str(&format!(" [{}]", v.choice_values().join("|")));
            }
            if let Some(condition) = &v.condition {
                line.push_str(&format!(" when {}", condition));
            }
            out.push_str(&line);
            out.push('\n');
        }
    }

    if !d.files.is_empty() {
        out.push_str("\nFiles:\n");
        for f in &d.files {
            out.push_str(&format!("  {} -> {}", f.source, f.destination_template()));
            if let Some(condition) = &f.condition {
                out.push_str(&format!(" when {}", condition));
            }
            out.push('\n');
        }
    }

    if !d.dependencies.is_empty() {
        out.push_str(&format!("\nDependencies ({}):\n", d.module_manifest));
        for dep in &d.dependencies {
            out.push_str(&format!("  {} {}", dep.module, dep.version));
            if let Some(condition) = &dep.condition {
                out.push_str(&format!(" when {}", condition));
            }
            out.push('\n');
        }
    }

    if !d.post_hooks.is_empty() {
        out.push_str("\nHooks:\n");
        for h in &d.post_hooks {
            out.push_str(&format!("  {}: {} {}", h.name, h.command, h.args.join(" ")));
            if h.continue_on_error {
                out.push_str(" (continue on error)");
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_templates::{FileSpec, ScalarValue, VariableSpec, VariableType};

    #[test]
    fn test_describe() {
        let descriptor = BlueprintDescriptor::new("Simple", "simple")
            .with_id("simple")
            .with_variable(VariableSpec::new("ProjectName").required())
            .with_variable(
                VariableSpec::new("Logger")
                    .with_type(VariableType::Select)
                    .with_choices(["slog", "zap"])
                    .with_default(ScalarValue::Str("slog".into())),
            )
            .with_file(FileSpec::new("main.go.tmpl", "cmd/{{.ProjectName}}/main.go"));

        let text = describe(&descriptor);
        assert!(text.starts_with("Simple (simple) v"));
        assert!(text.contains("  ProjectName (string) required\n"));
        assert!(text.contains("  Logger (select) default=slog [slog|zap]\n"));
        assert!(text.contains("  main.go.tmpl -> cmd/{{.ProjectName}}/main.go\n"));
        assert!(!text.contains("Hooks:"));
    }
}
