//! Confinement of rendered paths to an output root.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Why a rendered path was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathViolation {
    #[error("path is empty")]
    Empty,

    #[error("absolute path not allowed: {0}")]
    Absolute(String),

    #[error("parent directory segment not allowed: {0}")]
    ParentSegment(String),

    #[error("path escapes the output directory: {0}")]
    Escapes(String),
}

/// Join `relative` onto `root`, refusing anything that could land outside it.
///
/// Both `/` and `\` count as separators so a template cannot smuggle a
/// Windows-style path past the check on Unix.
pub fn safe_join(root: &Path, relative: &str) -> Result<PathBuf, PathViolation> {
    let trimmed = relative.trim();
    if trimmed.is_empty() {
        return Err(PathViolation::Empty);
    }
    if is_absolute(trimmed) {
        return Err(PathViolation::Absolute(relative.to_string()));
    }

    let mut clean = PathBuf::new();
    for segment in trimmed.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathViolation::ParentSegment(relative.to_string())),
            s => clean.push(s),
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(PathViolation::Empty);
    }
    // `push` may read a segment as a prefix on some platforms.
    if clean
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(PathViolation::Escapes(relative.to_string()));
    }

    Ok(root.join(clean))
}

fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with('/')
        || path.starts_with('\\')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}
