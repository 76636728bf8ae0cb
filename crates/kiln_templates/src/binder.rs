//! Variable binding.
//!
//! Turns the variables a blueprint declares into a [`RenderContext`] by
//! layering value sources, coercing each value to its declared type and
//! applying the blueprint's validation rules.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use heck::ToShoutySnakeCase;
use regex::Regex;
use tracing::debug;

use crate::context::{RenderContext, VarValue};
use crate::error::{TemplateError, TemplateResult, VariableIssue};
use crate::manifest::{
    BlueprintDescriptor, ScalarValue, ValidationRule, VariableSpec, VariableType,
};
use crate::renderer::TemplateRenderer;

/// Prefix of environment variables that supply blueprint variables.
pub const ENV_PREFIX: &str = "KILN_";

/// Environment key for a variable: `ProjectName` -> `KILN_PROJECT_NAME`.
pub fn env_key(variable: &str) -> String {
    format!("{}{}", ENV_PREFIX, variable.to_shouty_snake_case())
}

/// Asks the user for a variable value.
#[cfg_attr(test, mockall::automock)]
pub trait Prompter: Send + Sync {
    /// Prompt for `variable`, offering `default` as the preset answer.
    /// `None` keeps the default.
    fn prompt(
        &self,
        variable: &VariableSpec,
        default: Option<String>,
    ) -> TemplateResult<Option<String>>;
}

/// Value sources, lowest precedence first: defaults, `config`, `env`,
/// `flags`, then prompt answers.
#[derive(Clone, Default)]
pub struct BindSources {
    pub config: HashMap<String, String>,
    pub env: HashMap<String, String>,
    pub flags: HashMap<String, String>,
    /// Set only for interactive runs.
    pub prompter: Option<Arc<dyn Prompter>>,
}

impl BindSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: HashMap<String, String>) -> Self {
        self.config = config;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.prompter.is_some()
    }

    /// A value given on the command line or in the environment. These are
    /// taken verbatim.
    fn explicit(&self, name: &str) -> Option<&str> {
        self.flags
            .get(name)
            .or_else(|| self.env.get(&env_key(name)))
            .map(String::as_str)
    }
}

impl std::fmt::Debug for BindSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindSources")
            .field("config", &self.config)
            .field("env", &self.env.len())
            .field("flags", &self.flags)
            .field("interactive", &self.is_interactive())
            .finish()
    }
}

/// Binds declared variables into a render context.
#[derive(Debug, Clone, Default)]
pub struct VariableBinder {
    renderer: TemplateRenderer,
}

/// Declaration index of every variable, used to reject templates that
/// look ahead.
struct Declared<'a> {
    positions: HashMap<&'a str, usize>,
}

impl<'a> Declared<'a> {
    fn new(variables: &'a [VariableSpec]) -> Self {
        Self {
            positions: variables
                .iter()
                .enumerate()
                .map(|(i, v)| (v.name.as_str(), i))
                .collect(),
        }
    }

    /// First of `refs` declared at or after `index`.
    fn later<'r>(&self, refs: &'r [String], index: usize) -> Option<&'r String> {
        refs.iter()
            .find(|r| self.positions.get(r.as_str()).is_some_and(|&p| p >= index))
    }
}

enum BindFailure {
    Issue(String),
    Fatal(TemplateError),
}

impl VariableBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every variable of `descriptor`, in declaration order.
    ///
    /// Missing or invalid values are collected while binding continues. One
    /// issue is reported as [`TemplateError::Validation`], several as
    /// [`TemplateError::ValidationErrors`]. A condition, templated default
    /// or templated config value that refers to a variable declared later
    /// fails immediately.
    pub fn bind(
        &self,
        descriptor: &BlueprintDescriptor,
        sources: &BindSources,
    ) -> TemplateResult<RenderContext> {
        let declared = Declared::new(&descriptor.variables);

        let mut ctx = RenderContext::new();
        let mut issues: Vec<VariableIssue> = Vec::new();
        let mut failed: HashSet<&str> = HashSet::new();

        for (index, var) in descriptor.variables.iter().enumerate() {
            if let Some(condition) = &var.condition {
                let refs = self.renderer.references(condition)?;
                if let Some(later) = declared.later(&refs, index) {
                    return Err(TemplateError::validation(
                        &var.name,
                        format!("condition references {} which is declared later", later),
                    ));
                }
                if refs.iter().any(|r| failed.contains(r.as_str())) {
                    debug!(
                        "Stopping at {}: condition depends on a failed variable",
                        var.name
                    );
                    break;
                }
                if !self.renderer.eval_condition(condition, &ctx)? {
                    debug!("Skipping variable {}: condition is false", var.name);
                    continue;
                }
            }

            match self.resolve(var, index, &declared, &descriptor.validation, sources, &ctx) {
                Ok(Some(value)) => {
                    debug!("Bound {} = {}", var.name, value);
                    ctx.insert(&var.name, value);
                }
                Ok(None) => {}
                Err(BindFailure::Issue(message)) => {
                    issues.push(VariableIssue {
                        variable: var.name.clone(),
                        message,
                    });
                    failed.insert(&var.name);
                }
                Err(BindFailure::Fatal(e)) => return Err(e),
            }
        }

        if issues.len() == 1 {
            let issue = issues.remove(0);
            return Err(TemplateError::validation(issue.variable, issue.message));
        }
        if !issues.is_empty() {
            return Err(TemplateError::ValidationErrors(issues));
        }

        for feature in descriptor.features.iter().filter(|f| f.enabled) {
            let on = match &feature.condition {
                Some(condition) => self.renderer.eval_condition(condition, &ctx)?,
                None => true,
            };
            if on {
                ctx.enable_feature(&feature.name);
            }
        }

        Ok(ctx)
    }

    /// Resolve, prompt, coerce and validate one variable.
    fn resolve(
        &self,
        var: &VariableSpec,
        index: usize,
        declared: &Declared<'_>,
        rules: &[ValidationRule],
        sources: &BindSources,
        ctx: &RenderContext,
    ) -> Result<Option<VarValue>, BindFailure> {
        let mut candidate = match (sources.explicit(&var.name), sources.config.get(&var.name)) {
            (Some(value), _) => Some(value.to_string()),
            (None, Some(value)) => Some(self.expand(var, "config", value, index, declared, ctx)?),
            (None, None) => match &var.default {
                None => None,
                Some(ScalarValue::Str(s)) => {
                    Some(self.expand(var, "default", s, index, declared, ctx)?)
                }
                Some(other) => Some(other.as_raw()),
            },
        };

        if let Some(prompter) = &sources.prompter {
            let answer = prompter
                .prompt(var, candidate.clone())
                .map_err(BindFailure::Fatal)?;
            if let Some(answer) = answer.filter(|a| !a.is_empty()) {
                candidate = Some(answer);
            }
        }

        let raw = match candidate {
            Some(raw) if !raw.is_empty() => raw,
            _ if var.required => return Err(BindFailure::Issue("required".to_string())),
            _ => return Ok(zero_value(var.var_type)),
        };

        let value = coerce(var, &raw).map_err(BindFailure::Issue)?;
        for rule in rules.iter().filter(|r| r.variable == var.name) {
            check_rule(rule, &value.to_string()).map_err(BindFailure::Issue)?;
        }
        Ok(Some(value))
    }

    /// Defaults and config values may be templates over the variables
    /// bound so far.
    fn expand(
        &self,
        var: &VariableSpec,
        origin: &str,
        text: &str,
        index: usize,
        declared: &Declared<'_>,
        ctx: &RenderContext,
    ) -> Result<String, BindFailure> {
        if !text.contains("{{") {
            return Ok(text.to_string());
        }
        let invalid = |e: TemplateError| BindFailure::Issue(format!("{}: {}", origin, e));
        let refs = self.renderer.references(text).map_err(invalid)?;
        if let Some(later) = declared.later(&refs, index) {
            return Err(BindFailure::Fatal(TemplateError::validation(
                &var.name,
                format!("{} references {} which is declared later", origin, later),
            )));
        }
        self.renderer.render_content(text, ctx).map_err(invalid)
    }
}

/// Value bound when an optional variable has no value. Selects stay unset.
fn zero_value(var_type: VariableType) -> Option<VarValue> {
    match var_type {
        VariableType::String => Some(VarValue::Str(String::new())),
        VariableType::Bool => Some(VarValue::Bool(false)),
        VariableType::Int => Some(VarValue::Int(0)),
        VariableType::Select => None,
    }
}

/// Parse a boolean the way flags and environment variables spell it.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn coerce(var: &VariableSpec, raw: &str) -> Result<VarValue, String> {
    match var.var_type {
        VariableType::String => Ok(VarValue::Str(raw.to_string())),
        VariableType::Bool => parse_bool(raw)
            .map(VarValue::Bool)
            .ok_or_else(|| format!("expected a boolean, got '{}'", raw)),
        VariableType::Int => raw
            .trim()
            .parse::<i64>()
            .map(VarValue::Int)
            .map_err(|_| format!("expected an integer, got '{}'", raw)),
        VariableType::Select if var.is_choice(raw) => Ok(VarValue::Str(raw.to_string())),
        VariableType::Select => Err(format!(
            "'{}' is not one of: {}",
            raw,
            var.choice_values().join(", ")
        )),
    }
}

fn check_rule(rule: &ValidationRule, value: &str) -> Result<(), String> {
    let fail = |fallback: String| Err(rule.message.clone().unwrap_or(fallback));

    let length = value.chars().count();
    if let Some(min) = rule.min_length {
        if length < min {
            return fail(format!("must be at least {} characters", min));
        }
    }
    if let Some(max) = rule.max_length {
        if length > max {
            return fail(format!("must be at most {} characters", max));
        }
    }
    if let Some(pattern) = &rule.pattern {
        let re = Regex::new(pattern).map_err(|e| format!("invalid pattern {}: {}", pattern, e))?;
        if !re.is_match(value) {
            return fail(format!("must match {}", pattern));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::FeatureSpec;

    fn descriptor() -> BlueprintDescriptor {
        BlueprintDescriptor::new("API", "api")
            .with_id("api")
            .with_variable(VariableSpec::new("ProjectName").required())
            .with_variable(
                VariableSpec::new("ModulePath")
                    .with_default(ScalarValue::Str("github.com/acme/{{.ProjectName}}".into())),
            )
            .with_variable(
                VariableSpec::new("Database")
                    .with_choices(["postgres", "mysql", "none"])
                    .with_default(ScalarValue::Str("none".into())),
            )
            .with_variable(
                VariableSpec::new("DatabaseURL")
                    .with_condition(r#"ne .Database "none""#)
                    .required(),
            )
            .with_variable(
                VariableSpec::new("UseDocker")
                    .with_type(VariableType::Bool)
                    .with_default(ScalarValue::Bool(true)),
            )
            .with_variable(
                VariableSpec::new("Port")
                    .with_type(VariableType::Int)
                    .with_default(ScalarValue::Int(8080)),
            )
    }

    #[test]
    fn test_env_key() {
        assert_eq!(env_key("ProjectName"), "KILN_PROJECT_NAME");
        assert_eq!(env_key("UseDocker"), "KILN_USE_DOCKER");
    }

    #[test]
    fn test_parse_bool() {
        for raw in ["true", "YES", "1", "on", " y "] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["false", "No", "0", "off"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_bind_defaults_and_templated_default() {
        let sources = BindSources::new().with_flag("ProjectName", "orders");
        let ctx = VariableBinder::new().bind(&descriptor(), &sources).unwrap();

        assert_eq!(ctx.get("ProjectName"), Some(&VarValue::from("orders")));
        assert_eq!(
            ctx.get("ModulePath"),
            Some(&VarValue::from("github.com/acme/orders"))
        );
        assert_eq!(ctx.get("UseDocker"), Some(&VarValue::Bool(true)));
        assert_eq!(ctx.get("Port"), Some(&VarValue::Int(8080)));
        assert!(!ctx.contains("DatabaseURL"));
    }

    #[test]
    fn test_precedence() {
        let binder = VariableBinder::new();
        let d = descriptor();
        let config: HashMap<String, String> = [("Port".to_string(), "1000".to_string())].into();
        let env: HashMap<String, String> = [("KILN_PORT".to_string(), "2000".to_string())].into();

        let base = BindSources::new().with_flag("ProjectName", "x");
        let ctx = binder
            .bind(&d, &base.clone().with_config(config.clone()))
            .unwrap();
        assert_eq!(ctx.get("Port"), Some(&VarValue::Int(1000)));

        let ctx = binder
            .bind(&d, &base.clone().with_config(config.clone()).with_env(env.clone()))
            .unwrap();
        assert_eq!(ctx.get("Port"), Some(&VarValue::Int(2000)));

        let flags = base
            .with_config(config)
            .with_env(env)
            .with_flag("Port", "3000");
        let ctx = binder.bind(&d, &flags).unwrap();
        assert_eq!(ctx.get("Port"), Some(&VarValue::Int(3000)));
    }

    #[test]
    fn test_config_value_is_templated() {
        let config: HashMap<String, String> = [(
            "ModulePath".to_string(),
            "github.com/acme/{{.ProjectName}}".to_string(),
        )]
        .into();
        let sources = BindSources::new()
            .with_config(config)
            .with_flag("ProjectName", "orders");
        let ctx = VariableBinder::new().bind(&descriptor(), &sources).unwrap();
        assert_eq!(
            ctx.get("ModulePath"),
            Some(&VarValue::from("github.com/acme/orders"))
        );

        let verbatim = BindSources::new()
            .with_flag("ProjectName", "orders")
            .with_flag("ModulePath", "example.com/{{x}}");
        let ctx = VariableBinder::new().bind(&descriptor(), &verbatim).unwrap();
        assert_eq!(ctx.get("ModulePath"), Some(&VarValue::from("example.com/{{x}}")));
    }

    #[test]
    fn test_prompt_beats_flags() {
        let mut prompter = MockPrompter::new();
        prompter
            .expect_prompt()
            .withf(|var, default| var.name == "ProjectName" && default.as_deref() == Some("flag"))
            .times(1)
            .returning(|_, _| Ok(Some("prompted".to_string())));
        prompter
            .expect_prompt()
            .returning(|_, _| Ok(None));

        let sources = BindSources::new()
            .with_flag("ProjectName", "flag")
            .with_prompter(Arc::new(prompter));
        let ctx = VariableBinder::new().bind(&descriptor(), &sources).unwrap();
        assert_eq!(ctx.get("ProjectName"), Some(&VarValue::from("prompted")));
        assert_eq!(
            ctx.get("ModulePath"),
            Some(&VarValue::from("github.com/acme/prompted"))
        );
    }

    #[test]
    fn test_missing_required_is_validation_error() {
        let err = VariableBinder::new()
            .bind(&descriptor(), &BindSources::new())
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.invalid_variables().first(), Some(&"ProjectName"));
        assert!(err.to_string().contains("ProjectName: required"));
    }

    #[test]
    fn test_issues_are_collected() {
        let sources = BindSources::new()
            .with_flag("Port", "eighty")
            .with_flag("UseDocker", "perhaps");
        let err = VariableBinder::new()
            .bind(&descriptor(), &sources)
            .unwrap_err();
        assert_eq!(
            err.invalid_variables(),
            vec!["ProjectName", "ModulePath", "UseDocker", "Port"]
        );
    }

    #[test]
    fn test_conditional_variable_required_when_enabled() {
        let sources = BindSources::new()
            .with_flag("ProjectName", "x")
            .with_flag("Database", "postgres");
        let err = VariableBinder::new()
            .bind(&descriptor(), &sources)
            .unwrap_err();
        assert_eq!(err.invalid_variables(), vec!["DatabaseURL"]);
    }

    #[test]
    fn test_select_outside_choices() {
        let sources = BindSources::new()
            .with_flag("ProjectName", "x")
            .with_flag("Database", "oracle");
        let err = VariableBinder::new()
            .bind(&descriptor(), &sources)
            .unwrap_err();
        assert!(err.to_string().contains("not one of"));
    }

    #[test]
    fn test_dependent_condition_stops_after_failure() {
        let d = BlueprintDescriptor::new("X", "x")
            .with_id("x")
            .with_variable(
                VariableSpec::new("Database").with_choices(["postgres", "none"]),
            )
            .with_variable(VariableSpec::new("Dsn").with_condition(".Database").required())
            .with_variable(VariableSpec::new("Later").required());
        let sources = BindSources::new().with_flag("Database", "oracle");
        let err = VariableBinder::new().bind(&d, &sources).unwrap_err();
        assert_eq!(err.invalid_variables(), vec!["Database"]);
    }

    #[test]
    fn test_forward_reference_rejected() {
        let d = BlueprintDescriptor::new("X", "x")
            .with_id("x")
            .with_variable(VariableSpec::new("A").with_condition(".B"))
            .with_variable(VariableSpec::new("B"));
        let err = VariableBinder::new()
            .bind(&d, &BindSources::new())
            .unwrap_err();
        assert!(matches!(
            &err,
            TemplateError::Validation { variable, message }
                if variable == "A" && message.contains("declared later")
        ));
    }

    #[test]
    fn test_default_forward_reference_rejected() {
        let d = BlueprintDescriptor::new("X", "x")
            .with_id("x")
            .with_variable(VariableSpec::new("Mode").with_default(ScalarValue::Str(
                "{{if .UseDocker}}container{{else}}local{{end}}".into(),
            )))
            .with_variable(
                VariableSpec::new("UseDocker")
                    .with_type(VariableType::Bool)
                    .with_default(ScalarValue::Bool(true)),
            );
        let err = VariableBinder::new()
            .bind(&d, &BindSources::new())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(
            &err,
            TemplateError::Validation { variable, message }
                if variable == "Mode" && message.contains("UseDocker which is declared later")
        ));

        let config: HashMap<String, String> =
            [("Mode".to_string(), "{{.UseDocker}}".to_string())].into();
        let err = VariableBinder::new()
            .bind(&d, &BindSources::new().with_config(config))
            .unwrap_err();
        assert!(err.to_string().contains("config references UseDocker"));
    }

    #[test]
    fn test_numeric_select_choices() {
        let var: VariableSpec =
            serde_yaml::from_str("name: Port\ntype: select\nchoices: [8080, 9090]\n").unwrap();
        let d = BlueprintDescriptor::new("X", "x").with_id("x").with_variable(var);

        let ctx = VariableBinder::new()
            .bind(&d, &BindSources::new().with_flag("Port", "9090"))
            .unwrap();
        assert_eq!(ctx.get("Port"), Some(&VarValue::from("9090")));

        let err = VariableBinder::new()
            .bind(&d, &BindSources::new().with_flag("Port", "80"))
            .unwrap_err();
        assert!(err.to_string().contains("not one of: 8080, 9090"));
    }

    #[test]
    fn test_validation_rules() {
        let mut d = descriptor();
        d.validation.push(ValidationRule {
            variable: "ProjectName".to_string(),
            pattern: Some("^[a-z][a-z0-9-]*$".to_string()),
            min_length: Some(2),
            max_length: None,
            message: None,
        });

        let binder = VariableBinder::new();
        let ok = BindSources::new().with_flag("ProjectName", "order-api");
        assert!(binder.bind(&d, &ok).is_ok());

        let bad = BindSources::new().with_flag("ProjectName", "Order_API");
        let err = binder.bind(&d, &bad).unwrap_err();
        assert!(err.to_string().contains("must match"));

        let short = BindSources::new().with_flag("ProjectName", "o");
        let err = binder.bind(&d, &short).unwrap_err();
        assert!(err.to_string().contains("at least 2"));
    }

    #[test]
    fn test_features() {
        let mut d = descriptor();
        d.features = vec![
            FeatureSpec {
                name: "docker".to_string(),
                description: String::new(),
                enabled: true,
                condition: Some(".UseDocker".to_string()),
            },
            FeatureSpec {
                name: "metrics".to_string(),
                description: String::new(),
                enabled: false,
                condition: None,
            },
            FeatureSpec {
                name: "db".to_string(),
                description: String::new(),
                enabled: true,
                condition: Some(r#"ne .Database "none""#.to_string()),
            },
        ];
        let sources = BindSources::new().with_flag("ProjectName", "x");
        let ctx = VariableBinder::new().bind(&d, &sources).unwrap();
        assert!(ctx.has_feature("docker"));
        assert!(!ctx.has_feature("metrics"));
        assert!(!ctx.has_feature("db"));
    }
}
