//! Dependency collection and merging into the generated module manifest.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};

/// Go toolchain version written into newly created manifests.
pub const DEFAULT_GO_VERSION: &str = "1.21";

/// Module requirements collected from a blueprint, one version per module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependencySet {
    modules: BTreeMap<String, String>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a requirement. Returns `false` when the identical requirement was
    /// already present; a different version for the same module is a conflict.
    pub fn insert(
        &mut self,
        module: impl Into<String>,
        version: impl Into<String>,
    ) -> TemplateResult<bool> {
        let module = module.into();
        let version = version.into();
        match self.modules.get(&module) {
            Some(existing) if *existing == version => Ok(false),
            Some(existing) => Err(TemplateError::DependencyConflict {
                module,
                existing: existing.clone(),
                requested: version,
            }),
            None => {
                self.modules.insert(module, version);
                Ok(true)
            }
        }
    }

    pub fn get(&self, module: &str) -> Option<&str> {
        self.modules.get(module).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.modules.iter().map(|(m, v)| (m.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Requirement {
    version: String,
    indirect: bool,
}

/// A `go.mod` file: the module line, the `go` directive, the `require`
/// directives and every other line kept as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoModFile {
    module: String,
    go_version: Option<String>,
    requires: BTreeMap<String, Requirement>,
    other: Vec<String>,
}

impl GoModFile {
    /// A fresh manifest for `module`.
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            go_version: Some(DEFAULT_GO_VERSION.to_string()),
            requires: BTreeMap::new(),
            other: Vec::new(),
        }
    }

    /// Parse an existing manifest. Only `require` directives are interpreted;
    /// `replace`, `exclude` and the like are preserved verbatim.
    pub fn parse(content: &str) -> Self {
        let mut file = Self {
            module: String::new(),
            go_version: None,
            requires: BTreeMap::new(),
            other: Vec::new(),
        };

        let mut in_require = false;
        let mut in_other = false;
        for line in content.lines() {
            let trimmed = line.trim();

            if in_require {
                if trimmed == ")" {
                    in_require = false;
                } else {
                    file.add_require_line(trimmed);
                }
                continue;
            }
            if in_other {
                file.other.push(line.to_string());
                if trimmed == ")" {
                    in_other = false;
                }
                continue;
            }

            if let Some(module) = trimmed.strip_prefix("module ") {
                file.module = module.trim().trim_matches('"').to_string();
            } else if let Some(version) = trimmed.strip_prefix("go ") {
                file.go_version = Some(version.trim().to_string());
            } else if trimmed == "require (" || trimmed == "require(" {
                in_require = true;
            } else if let Some(single) = trimmed.strip_prefix("require ") {
                file.add_require_line(single);
            } else if trimmed.ends_with('(') {
                in_other = true;
                file.other.push(line.to_string());
            } else if !trimmed.is_empty() {
                file.other.push(line.to_string());
            }
        }
        file
    }

    fn add_require_line(&mut self, line: &str) {
        let (spec, comment) = match line.split_once("//") {
            Some((spec, comment)) => (spec, comment.trim()),
            None => (line, ""),
        };
        let mut parts = spec.split_whitespace();
        if let (Some(module), Some(version)) = (parts.next(), parts.next()) {
            self.requires.insert(
                module.to_string(),
                Requirement {
                    version: version.to_string(),
                    indirect: comment == "indirect",
                },
            );
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Version required for `module`, if any.
    pub fn requirement(&self, module: &str) -> Option<&str> {
        self.requires.get(module).map(|r| r.version.as_str())
    }

    /// Merge `deps` into the require list. Returns how many were added.
    pub fn merge(&mut self, deps: &DependencySet) -> TemplateResult<usize> {
        let mut added = 0;
        for (module, version) in deps.iter() {
            match self.requires.get(module) {
                Some(existing) if existing.version == version => {}
                Some(existing) => {
                    return Err(TemplateError::DependencyConflict {
                        module: module.to_string(),
                        existing: existing.version.clone(),
                        requested: version.to_string(),
                    })
                }
                None => {
                    debug!("Adding requirement {} {}", module, version);
                    self.requires.insert(
                        module.to_string(),
                        Requirement {
                            version: version.to_string(),
                            indirect: false,
                        },
                    );
                    added += 1;
                }
            }
        }
        Ok(added)
    }

    pub fn render(&self) -> String {
        let mut out = format!("module {}\n", self.module);
        if let Some(go) = &self.go_version {
            out.push_str(&format!("\ngo {}\n", go));
        }
        if !self.requires.is_empty() {
            out.push_str("\nrequire (\n");
            for (module, req) in &self.requires {
                out.push_str(&format!("\t{} {}", module, req.version));
                if req.indirect {
                    out.push_str(" // indirect");
                }
                out.push('\n');
            }
            out.push_str(")\n");
        }
        if !self.other.is_empty() {
            out.push('\n');
            for line in &self.other {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}
