//! Error types for the core module.

use std::path::PathBuf;

use kiln_templates::{PathViolation, TemplateError};
use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while generating a project.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Unsafe path {path}: {reason}")]
    PathSecurity {
        path: String,
        #[source]
        reason: PathViolation,
    },

    #[error("Files {first} and {second} both render to {destination}")]
    DuplicateDestination {
        destination: String,
        first: String,
        second: String,
    },

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    OutputExists(PathBuf),

    #[error("Failed to read blueprint file {}: {source}", .path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generation cancelled")]
    Cancelled,
}

/// Broad error category, used to pick a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Template,
    PathSecurity,
    Write,
    Config,
    General,
}

impl From<&TemplateError> for ErrorKind {
    fn from(e: &TemplateError) -> Self {
        match e {
            TemplateError::NotFound(_) => ErrorKind::NotFound,
            TemplateError::Validation { .. } | TemplateError::ValidationErrors(_) => {
                ErrorKind::Validation
            }
            TemplateError::Parse { .. }
            | TemplateError::IncludeResolution { .. }
            | TemplateError::InvalidManifest { .. }
            | TemplateError::Render { .. }
            | TemplateError::DependencyConflict { .. }
            | TemplateError::Io { .. } => ErrorKind::Template,
            TemplateError::Prompt { .. } => ErrorKind::General,
        }
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Template(e) => ErrorKind::from(e),
            CoreError::PathSecurity { .. } => ErrorKind::PathSecurity,
            CoreError::DuplicateDestination { .. } | CoreError::ReadSource { .. } => {
                ErrorKind::Template
            }
            CoreError::OutputExists(_) | CoreError::Write { .. } => ErrorKind::Write,
            CoreError::Config(_) => ErrorKind::Config,
            CoreError::Cancelled => ErrorKind::General,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let not_found: CoreError = TemplateError::NotFound("api".into()).into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let validation: CoreError = TemplateError::Validation {
            variable: "ProjectName".into(),
            message: "required".into(),
        }
        .into();
        assert_eq!(validation.kind(), ErrorKind::Validation);

        let conflict: CoreError = TemplateError::DependencyConflict {
            module: "m".into(),
            existing: "v1".into(),
            requested: "v2".into(),
        }
        .into();
        assert_eq!(conflict.kind(), ErrorKind::Template);

        let path = CoreError::PathSecurity {
            path: "../x".into(),
            reason: PathViolation::ParentSegment("../x".into()),
        };
        assert_eq!(path.kind(), ErrorKind::PathSecurity);
        assert!(path.to_string().contains("../x"));

        assert_eq!(
            CoreError::OutputExists(PathBuf::from("main.go")).kind(),
            ErrorKind::Write
        );
    }
}
