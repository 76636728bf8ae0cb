//! Error types for blueprints.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for blueprint operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// A single variable binding failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableIssue {
    pub variable: String,
    pub message: String,
}

impl std::fmt::Display for VariableIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.variable, self.message)
    }
}

/// Errors that can occur while loading, binding or rendering blueprints.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to parse {file}: {source}")]
    Parse {
        file: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to resolve include {include}: {message}")]
    IncludeResolution { include: PathBuf, message: String },

    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Invalid manifest in blueprint {template}: {message}")]
    InvalidManifest { template: String, message: String },

    #[error("Invalid variable {variable}: {message}")]
    Validation { variable: String, message: String },

    #[error("Variable validation failed: {}", format_issues(.0))]
    ValidationErrors(Vec<VariableIssue>),

    #[error("Template rendering failed in {file}: {message}")]
    Render { file: String, message: String },

    #[error("Conflicting versions for module {module}: {existing} vs {requested}")]
    DependencyConflict {
        module: String,
        existing: String,
        requested: String,
    },

    #[error("Prompt failed for {variable}: {message}")]
    Prompt { variable: String, message: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_issues(issues: &[VariableIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl TemplateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TemplateError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn validation(variable: impl Into<String>, message: impl Into<String>) -> Self {
        TemplateError::Validation {
            variable: variable.into(),
            message: message.into(),
        }
    }

    /// Attach a file name to a render error produced from an anonymous template.
    pub fn in_file(self, file: impl Into<String>) -> Self {
        match self {
            TemplateError::Render { message, .. } => TemplateError::Render {
                file: file.into(),
                message,
            },
            other => other,
        }
    }

    /// Names of the variables a validation error refers to, in report order.
    pub fn invalid_variables(&self) -> Vec<&str> {
        match self {
            TemplateError::Validation { variable, .. } => vec![variable.as_str()],
            TemplateError::ValidationErrors(issues) => {
                issues.iter().map(|i| i.variable.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Whether this is a variable validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TemplateError::Validation { .. } | TemplateError::ValidationErrors(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_file_rewrites_render_errors_only() {
        let err = TemplateError::Render {
            file: "<inline>".into(),
            message: "boom".into(),
        }
        .in_file("main.go.tmpl");
        assert!(err.to_string().contains("main.go.tmpl"));

        let err = TemplateError::NotFound("api".into()).in_file("x");
        assert!(matches!(err, TemplateError::NotFound(_)));
    }

    #[test]
    fn test_invalid_variables() {
        let err = TemplateError::ValidationErrors(vec![
            VariableIssue {
                variable: "ProjectName".into(),
                message: "required".into(),
            },
            VariableIssue {
                variable: "Port".into(),
                message: "not an integer".into(),
            },
        ]);
        assert_eq!(err.invalid_variables(), vec!["ProjectName", "Port"]);
        assert!(err.is_validation());
        assert!(err.to_string().contains("ProjectName: required"));
    }
}
