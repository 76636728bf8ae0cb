//! Terminal prompts for variables that have no value yet.

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use kiln_templates::{parse_bool, Prompter, TemplateError, TemplateResult, VariableSpec, VariableType};

/// Asks on the controlling terminal, one question per variable.
#[derive(Debug, Default)]
pub struct DialoguerPrompter;

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for DialoguerPrompter {
    fn prompt(&self, variable: &VariableSpec, default: Option<String>) -> TemplateResult<Option<String>> {
        let theme = ColorfulTheme::default();
        let label = variable.prompt_label();

        let answer = match variable.var_type {
            VariableType::Bool => {
                let preset = default.as_deref().and_then(parse_bool).unwrap_or(false);
                Confirm::with_theme(&theme)
                    .with_prompt(label)
                    .default(preset)
                    .interact()
                    .map(|b| Some(b.to_string()))
            }
            VariableType::Select if !variable.choices.is_empty() => {
                let choices = variable.choice_values();
                let preset = default
                    .as_deref()
                    .and_then(|d| choices.iter().position(|c| c == d))
                    .unwrap_or(0);
                Select::with_theme(&theme)
                    .with_prompt(label)
                    .items(&choices)
                    .default(preset)
                    .interact()
                    .map(|i| choices.get(i).cloned())
            }
            _ => {
                let mut input = Input::<String>::with_theme(&theme)
                    .with_prompt(label)
                    .allow_empty(!variable.required);
                if let Some(default) = default {
                    input = input.default(default);
                }
                input
                    .interact_text()
                    .map(|s| Some(s).filter(|s| !s.trim().is_empty()))
            }
        };

        answer.map_err(|e| TemplateError::Prompt {
            variable: variable.name.clone(),
            message: e.to_string(),
        })
    }
}
