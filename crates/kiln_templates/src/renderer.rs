//! Template rendering.
//!
//! Rendering is a pure function of the template text and the
//! [`RenderContext`]: the renderer holds no state and never mutates the
//! context, so a single renderer can be shared across threads.

use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToTitleCase, ToUpperCamelCase};

use crate::context::{RenderContext, VarValue};
use crate::error::{TemplateError, TemplateResult};
use crate::syntax::{self, Arg, Command, Node, Pipeline, SyntaxError};

/// Suffix marking a file as a template.
pub const TEMPLATE_SUFFIX: &str = ".tmpl";

/// Variable holding the generated module path, used by `importPath`.
pub const MODULE_PATH_VAR: &str = "ModulePath";

const INLINE: &str = "<inline>";

/// Strip exactly one trailing template marker.
pub fn strip_template_suffix(path: &str) -> &str {
    path.strip_suffix(TEMPLATE_SUFFIX).unwrap_or(path)
}

/// Evaluated expression value. `Nil` carries the name of an undefined variable.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    Nil(String),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Nil(_) => false,
        }
    }

    fn text(&self) -> Result<String, String> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Nil(name) => Err(format!("variable .{} is not defined", name)),
        }
    }

    fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil(_), Value::Nil(_)) => true,
            (Value::Nil(_), _) | (_, Value::Nil(_)) => false,
            (a, b) => a.text().ok() == b.text().ok(),
        }
    }
}

impl From<&VarValue> for Value {
    fn from(value: &VarValue) -> Self {
        match value {
            VarValue::Str(s) => Value::Str(s.clone()),
            VarValue::Bool(b) => Value::Bool(*b),
            VarValue::Int(i) => Value::Int(*i),
        }
    }
}

/// Renders destination paths, file contents and conditions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    /// Create a new template renderer.
    pub fn new() -> Self {
        Self
    }

    /// Render template content against the context.
    pub fn render_content(&self, template: &str, ctx: &RenderContext) -> TemplateResult<String> {
        let nodes = syntax::parse(template).map_err(syntax_error)?;
        let mut out = String::with_capacity(template.len());
        render_nodes(&nodes, ctx, &mut out).map_err(render_error)?;
        Ok(out)
    }

    /// Render a destination path and strip one trailing `.tmpl` marker.
    pub fn render_path(&self, template: &str, ctx: &RenderContext) -> TemplateResult<String> {
        let rendered = self.render_content(template, ctx)?;
        Ok(strip_template_suffix(&rendered).to_string())
    }

    /// Evaluate a condition.
    ///
    /// Accepts a bare expression (`eq .Database "postgres"`), a single wrapped
    /// action (`{{.UseDocker}}`) or a full template whose trimmed output is
    /// interpreted as a boolean. Undefined variables are false.
    pub fn eval_condition(&self, expr: &str, ctx: &RenderContext) -> TemplateResult<bool> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Ok(true);
        }
        if !trimmed.contains("{{") {
            let pipeline = syntax::parse_pipeline(trimmed, 1).map_err(syntax_error)?;
            return eval_pipeline(&pipeline, ctx)
                .map(|v| v.truthy())
                .map_err(render_error);
        }

        let nodes = syntax::parse(trimmed).map_err(syntax_error)?;
        if let [Node::Action(pipeline)] = nodes.as_slice() {
            return eval_pipeline(pipeline, ctx)
                .map(|v| v.truthy())
                .map_err(render_error);
        }
        let mut out = String::new();
        render_nodes(&nodes, ctx, &mut out).map_err(render_error)?;
        Ok(!matches!(
            out.trim().to_ascii_lowercase().as_str(),
            "" | "false" | "0" | "no"
        ))
    }

    /// Variable names an expression or template refers to, in order of appearance.
    pub fn references(&self, expr: &str) -> TemplateResult<Vec<String>> {
        let trimmed = expr.trim();
        let mut fields = Vec::new();
        if trimmed.is_empty() {
            return Ok(fields);
        }
        if trimmed.contains("{{") {
            let nodes = syntax::parse(trimmed).map_err(syntax_error)?;
            syntax::collect_fields(&nodes, &mut fields);
        } else {
            syntax::parse_pipeline(trimmed, 1)
                .map_err(syntax_error)?
                .fields(&mut fields);
        }
        Ok(fields)
    }
}

fn syntax_error(e: SyntaxError) -> TemplateError {
    TemplateError::Render {
        file: INLINE.to_string(),
        message: e.to_string(),
    }
}

fn render_error(message: String) -> TemplateError {
    TemplateError::Render {
        file: INLINE.to_string(),
        message,
    }
}

type EvalResult<T> = Result<T, String>;

fn render_nodes(nodes: &[Node], ctx: &RenderContext, out: &mut String) -> EvalResult<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Action(pipeline) => out.push_str(&eval_pipeline(pipeline, ctx)?.text()?),
            Node::If {
                branches,
                otherwise,
            } => {
                let mut taken = false;
                for (cond, body) in branches {
                    if eval_pipeline(cond, ctx)?.truthy() {
                        render_nodes(body, ctx, out)?;
                        taken = true;
                        break;
                    }
                }
                if !taken {
                    render_nodes(otherwise, ctx, out)?;
                }
            }
        }
    }
    Ok(())
}

fn eval_pipeline(pipeline: &Pipeline, ctx: &RenderContext) -> EvalResult<Value> {
    let mut piped: Option<Value> = None;
    for command in &pipeline.commands {
        piped = Some(eval_command(command, piped, ctx)?);
    }
    piped.ok_or_else(|| "empty pipeline".to_string())
}

fn eval_command(command: &Command, piped: Option<Value>, ctx: &RenderContext) -> EvalResult<Value> {
    let (head, rest) = command
        .args
        .split_first()
        .ok_or_else(|| "empty command".to_string())?;

    if let Arg::Ident(name) = head {
        let mut args = rest
            .iter()
            .map(|a| eval_arg(a, ctx))
            .collect::<EvalResult<Vec<_>>>()?;
        args.extend(piped);
        return call(name, args, ctx);
    }

    if !rest.is_empty() || piped.is_some() {
        return Err(format!("can't give arguments to non-function {:?}", head));
    }
    eval_arg(head, ctx)
}

fn eval_arg(arg: &Arg, ctx: &RenderContext) -> EvalResult<Value> {
    Ok(match arg {
        Arg::Field(name) => ctx
            .get(name)
            .map(Value::from)
            .unwrap_or_else(|| Value::Nil(name.clone())),
        Arg::Str(s) => Value::Str(s.clone()),
        Arg::Int(i) => Value::Int(*i),
        Arg::Bool(b) => Value::Bool(*b),
        Arg::Nested(pipeline) => eval_pipeline(pipeline, ctx)?,
        Arg::Ident(name) => call(name, Vec::new(), ctx)?,
    })
}

fn arity(name: &str, args: &[Value], expected: usize) -> EvalResult<()> {
    if args.len() != expected {
        return Err(format!(
            "{} expects {} argument(s), got {}",
            name,
            expected,
            args.len()
        ));
    }
    Ok(())
}

fn string_fn(name: &str, args: &[Value], f: impl Fn(&str) -> String) -> EvalResult<Value> {
    arity(name, args, 1)?;
    Ok(Value::Str(f(&args[0].text()?)))
}

fn call(name: &str, args: Vec<Value>, ctx: &RenderContext) -> EvalResult<Value> {
    match name {
        "eq" => {
            if args.len() < 2 {
                return Err("eq expects at least 2 arguments".to_string());
            }
            let first = &args[0];
            Ok(Value::Bool(args[1..].iter().any(|a| first.loosely_equals(a))))
        }
        "ne" => {
            arity(name, &args, 2)?;
            Ok(Value::Bool(!args[0].loosely_equals(&args[1])))
        }
        "not" => {
            arity(name, &args, 1)?;
            Ok(Value::Bool(!args[0].truthy()))
        }
        "and" => {
            if args.is_empty() {
                return Err("and expects at least 1 argument".to_string());
            }
            Ok(Value::Bool(args.iter().all(Value::truthy)))
        }
        "or" => {
            if args.is_empty() {
                return Err("or expects at least 1 argument".to_string());
            }
            Ok(Value::Bool(args.iter().any(Value::truthy)))
        }
        "default" => {
            arity(name, &args, 2)?;
            let mut args = args;
            let value = args.pop().unwrap_or(Value::Nil(String::new()));
            let fallback = args.pop().unwrap_or(Value::Nil(String::new()));
            Ok(if value.truthy() { value } else { fallback })
        }
        "lower" => string_fn(name, &args, |s| s.to_lowercase()),
        "upper" => string_fn(name, &args, |s| s.to_uppercase()),
        "title" => string_fn(name, &args, |s| s.to_title_case()),
        "snake" => string_fn(name, &args, |s| s.to_snake_case()),
        "camel" => string_fn(name, &args, |s| s.to_lower_camel_case()),
        "pascal" => string_fn(name, &args, |s| s.to_upper_camel_case()),
        "kebab" => string_fn(name, &args, |s| s.to_kebab_case()),
        "shout" => string_fn(name, &args, |s| s.to_shouty_snake_case()),
        "moduleBase" => string_fn(name, &args, |s| module_base(s).to_string()),
        "replace" => {
            arity(name, &args, 3)?;
            let (old, new, src) = (args[0].text()?, args[1].text()?, args[2].text()?);
            Ok(Value::Str(src.replace(&old, &new)))
        }
        "trimSuffix" => {
            arity(name, &args, 2)?;
            let (suffix, src) = (args[0].text()?, args[1].text()?);
            Ok(Value::Str(
                src.strip_suffix(suffix.as_str()).unwrap_or(&src).to_string(),
            ))
        }
        "trimPrefix" => {
            arity(name, &args, 2)?;
            let (prefix, src) = (args[0].text()?, args[1].text()?);
            Ok(Value::Str(
                src.strip_prefix(prefix.as_str()).unwrap_or(&src).to_string(),
            ))
        }
        "hasFeature" => {
            arity(name, &args, 1)?;
            Ok(Value::Bool(ctx.has_feature(&args[0].text()?)))
        }
        "importPath" => {
            arity(name, &args, 1)?;
            let module = ctx
                .get(MODULE_PATH_VAR)
                .map(|v| v.to_string())
                .ok_or_else(|| format!("importPath needs .{}", MODULE_PATH_VAR))?;
            let sub = args[0].text()?;
            let sub = sub.trim_matches('/');
            Ok(Value::Str(if sub.is_empty() {
                module
            } else {
                format!("{}/{}", module.trim_end_matches('/'), sub)
            }))
        }
        other => Err(format!("function {} is not defined", other)),
    }
}

/// Last path segment of a module path, ignoring a `/vN` major version suffix.
fn module_base(module: &str) -> &str {
    let mut segments = module.trim_end_matches('/').rsplit('/');
    let last = segments.next().unwrap_or(module);
    let is_major = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    if is_major {
        segments.next().unwrap_or(last)
    } else {
        last
    }
}
