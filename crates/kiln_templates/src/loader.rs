//! Blueprint loading functionality.

use std::collections::{BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{TemplateError, TemplateResult};
use crate::manifest::{
    BlueprintDescriptor, DependencySpec, FeatureSpec, Fragment, FragmentEntries, FragmentSlot,
    VariableSpec, VariableType, MANIFEST_FILE, MANIFEST_FILE_ALT, METADATA_PATH,
};
use crate::provider::FileProvider;
use crate::registry::BlueprintRegistry;

/// Blueprint loader.
pub struct BlueprintLoader {
    provider: Arc<dyn FileProvider>,
}

impl BlueprintLoader {
    /// Create a loader reading from `provider`.
    pub fn new(provider: Arc<dyn FileProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn FileProvider> {
        &self.provider
    }

    /// Load every blueprint below the provider root into a new registry.
    pub fn load_all(&self) -> TemplateResult<BlueprintRegistry> {
        let dirs = self.discover()?;
        let registry = BlueprintRegistry::new();

        for dir in dirs {
            let descriptor = self.load_blueprint(&dir)?;
            if let Ok(existing) = registry.get(&descriptor.id) {
                return Err(TemplateError::InvalidManifest {
                    template: descriptor.id.clone(),
                    message: format!(
                        "duplicate id, also defined in {}",
                        existing.path().unwrap_or("<unknown>")
                    ),
                });
            }
            info!("Loaded blueprint: {} ({})", descriptor.name, descriptor.id);
            registry.register(descriptor)?;
        }

        Ok(registry)
    }

    /// Blueprint directories below the root, sorted.
    ///
    /// Lists directories from the root down and stops at the first directory
    /// holding a manifest. When the root cannot be listed a full walk is used
    /// instead; both yield the same set.
    pub fn discover(&self) -> TemplateResult<Vec<PathBuf>> {
        match self.discover_by_listing() {
            Ok(dirs) => Ok(dirs),
            Err(e) => {
                debug!(
                    "Listing {} failed ({}), falling back to a full walk",
                    self.provider.describe(),
                    e
                );
                self.discover_by_walk()
                    .map_err(|e| TemplateError::io(self.provider.describe(), e))
            }
        }
    }

    fn discover_by_listing(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        self.visit(Path::new(""), &mut dirs)?;
        dirs.sort();
        Ok(dirs)
    }

    fn visit(&self, dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        let entries = self.provider.read_dir(dir)?;
        let has_manifest = entries
            .iter()
            .any(|e| !e.is_dir && is_manifest_name(&e.path));
        if has_manifest {
            out.push(dir.to_path_buf());
            return Ok(());
        }
        for entry in entries.iter().filter(|e| e.is_dir) {
            self.visit(&entry.path, out)?;
        }
        Ok(())
    }

    fn discover_by_walk(&self) -> std::io::Result<Vec<PathBuf>> {
        let candidates: BTreeSet<PathBuf> = self
            .provider
            .walk_files()?
            .into_iter()
            .filter(|p| is_manifest_name(p))
            .map(|p| p.parent().map(Path::to_path_buf).unwrap_or_default())
            .collect();

        // A manifest nested inside another blueprint is blueprint content.
        Ok(candidates
            .iter()
            .filter(|dir| {
                !candidates
                    .iter()
                    .any(|other| other != *dir && dir.starts_with(other))
            })
            .cloned()
            .collect())
    }

    /// Load a single blueprint from a directory, resolving its includes.
    pub fn load_blueprint(&self, dir: &Path) -> TemplateResult<BlueprintDescriptor> {
        let manifest_path = self.manifest_path(dir)?;
        debug!("Loading manifest from {:?}", manifest_path);

        let content = self
            .provider
            .read_to_string(&manifest_path)
            .map_err(|e| TemplateError::io(&manifest_path, e))?;
        let mut descriptor: BlueprintDescriptor =
            serde_yaml::from_str(&content).map_err(|source| TemplateError::Parse {
                file: manifest_path.clone(),
                source,
            })?;

        let includes: Vec<(FragmentSlot, String)> = descriptor
            .include
            .slots()
            .into_iter()
            .map(|(slot, path)| (slot, path.to_string()))
            .collect();
        for (slot, include) in includes {
            let entries = self.load_fragment(dir, slot, &include)?;
            debug!(
                "Merged {} {} from {}",
                entries.len(),
                slot.key(),
                include
            );
            descriptor.append_fragment(entries);
        }

        descriptor.resolve_id();
        if descriptor.id.is_empty() {
            return Err(TemplateError::InvalidManifest {
                template: dir.display().to_string(),
                message: "blueprint has neither an id nor a type".to_string(),
            });
        }
        if let Some(dup) = duplicate_variable(&descriptor.variables) {
            return Err(TemplateError::InvalidManifest {
                template: dir.display().to_string(),
                message: format!("duplicate variable {}", dup),
            });
        }
        descriptor
            .metadata
            .insert(METADATA_PATH.to_string(), path_string(dir));

        Ok(descriptor)
    }

    fn manifest_path(&self, dir: &Path) -> TemplateResult<PathBuf> {
        let primary = dir.join(MANIFEST_FILE);
        if self.provider.is_file(&primary) {
            return Ok(primary);
        }
        let alt = dir.join(MANIFEST_FILE_ALT);
        if self.provider.is_file(&alt) {
            return Ok(alt);
        }
        Err(TemplateError::NotFound(format!(
            "No {} found in {:?}",
            MANIFEST_FILE, dir
        )))
    }

    /// Parse one include fragment and return the entries for `slot`.
    fn load_fragment(
        &self,
        dir: &Path,
        slot: FragmentSlot,
        include: &str,
    ) -> TemplateResult<FragmentEntries> {
        let include_path = dir.join(include);
        let fail = |message: String| TemplateError::IncludeResolution {
            include: include_path.clone(),
            message,
        };

        if !is_contained(Path::new(include)) {
            return Err(fail("include path must stay inside the blueprint".into()));
        }

        let content = self
            .provider
            .read_to_string(&include_path)
            .map_err(|e| fail(format!("cannot read fragment: {}", e)))?;
        let value: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|e| fail(e.to_string()))?;

        match value {
            serde_yaml::Value::Null => Ok(empty_entries(slot)),
            serde_yaml::Value::Sequence(_) => {
                typed_list(slot, value).map_err(|e| fail(e.to_string()))
            }
            serde_yaml::Value::Mapping(_) => {
                let fragment: Fragment =
                    serde_yaml::from_value(value).map_err(|e| fail(e.to_string()))?;
                fragment
                    .take(slot)
                    .ok_or_else(|| fail(format!("fragment does not declare `{}`", slot.key())))
            }
            _ => Err(fail("fragment must be a mapping or a list".into())),
        }
    }

    /// Check a blueprint directory and report problems without failing.
    pub fn validate_blueprint(&self, dir: &Path) -> Vec<String> {
        let mut issues = Vec::new();

        let descriptor = match self.load_blueprint(dir) {
            Ok(d) => d,
            Err(e) => {
                issues.push(format!("Invalid manifest: {}", e));
                return issues;
            }
        };

        for file in &descriptor.files {
            // Sources with expressions are only known at generation time.
            if file.source.contains("{{") {
                continue;
            }
            if !self.provider.is_file(&dir.join(&file.source)) {
                issues.push(format!("Referenced file does not exist: {}", file.source));
            }
        }

        for var in &descriptor.variables {
            issues.extend(check_variable(var));
        }

        for rule in &descriptor.validation {
            if descriptor.variable(&rule.variable).is_none() {
                issues.push(format!(
                    "Validation rule references unknown variable: {}",
                    rule.variable
                ));
            }
            if let Some(pattern) = &rule.pattern {
                if let Err(e) = regex::Regex::new(pattern) {
                    issues.push(format!("Invalid pattern for {}: {}", rule.variable, e));
                }
            }
        }

        if issues.is_empty() {
            debug!("Blueprint {} is valid", descriptor.id);
        } else {
            warn!("Blueprint {} has {} issue(s)", descriptor.id, issues.len());
        }
        issues
    }
}

fn duplicate_variable(variables: &[VariableSpec]) -> Option<String> {
    let mut seen = HashSet::new();
    variables
        .iter()
        .find(|v| !seen.insert(v.name.as_str()))
        .map(|v| v.name.clone())
}

fn check_variable(var: &VariableSpec) -> Vec<String> {
    let mut issues = Vec::new();
    if var.var_type == VariableType::Select {
        if var.choices.is_empty() {
            issues.push(format!("Select variable {} has no choices", var.name));
        } else if let Some(default) = &var.default {
            let raw = default.as_raw();
            if !var.is_choice(&raw) {
                issues.push(format!(
                    "Default '{}' of {} is not one of its choices",
                    raw, var.name
                ));
            }
        }
    }
    issues
}

fn typed_list(
    slot: FragmentSlot,
    value: serde_yaml::Value,
) -> Result<FragmentEntries, serde_yaml::Error> {
    Ok(match slot {
        FragmentSlot::Variables => {
            FragmentEntries::Variables(serde_yaml::from_value::<Vec<VariableSpec>>(value)?)
        }
        FragmentSlot::Dependencies => {
            FragmentEntries::Dependencies(serde_yaml::from_value::<Vec<DependencySpec>>(value)?)
        }
        FragmentSlot::Features => {
            FragmentEntries::Features(serde_yaml::from_value::<Vec<FeatureSpec>>(value)?)
        }
    })
}

fn empty_entries(slot: FragmentSlot) -> FragmentEntries {
    match slot {
        FragmentSlot::Variables => FragmentEntries::Variables(Vec::new()),
        FragmentSlot::Dependencies => FragmentEntries::Dependencies(Vec::new()),
        FragmentSlot::Features => FragmentEntries::Features(Vec::new()),
    }
}

fn is_manifest_name(path: &Path) -> bool {
    matches!(
        path.file_name().and_then(|n| n.to_str()),
        Some(MANIFEST_FILE) | Some(MANIFEST_FILE_ALT)
    )
}

fn is_contained(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn path_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
