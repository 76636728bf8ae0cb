//! Read-only file access for blueprint collections.
//!
//! Blueprints are read either from a directory on disk (development) or from a
//! bundle compiled into the binary. Which one, and whether the collection sits
//! in a named subdirectory of that root, is declared by the caller through
//! [`ProviderConfig`]; nothing is inferred by probing the filesystem.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{TemplateError, TemplateResult};

/// Entry returned when listing a provider directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProviderEntry {
    /// Path relative to the provider root.
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Read-only filesystem handle. All paths are relative to the provider root.
pub trait FileProvider: Send + Sync + std::fmt::Debug {
    /// Read a file as UTF-8 text.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// List the direct children of a directory, sorted by path.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<ProviderEntry>>;

    /// Every file below the root, sorted.
    fn walk_files(&self) -> io::Result<Vec<PathBuf>>;

    /// Whether `path` names an existing file.
    fn is_file(&self, path: &Path) -> bool;

    /// Human readable description for logs.
    fn describe(&self) -> String;
}

/// Provider backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DiskProvider {
    root: PathBuf,
}

impl DiskProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileProvider for DiskProvider {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(self.root.join(path))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<ProviderEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.root.join(path))? {
            let entry = entry?;
            entries.push(ProviderEntry {
                path: path.join(entry.file_name()),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        entries.sort();
        Ok(entries)
    }

    fn walk_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                    files.push(relative.to_path_buf());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.root.join(path).is_file()
    }

    fn describe(&self) -> String {
        format!("disk:{}", self.root.display())
    }
}

/// In-memory provider, typically built from `include_str!` constants.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedProvider {
    files: BTreeMap<PathBuf, String>,
}

impl EmbeddedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a static `(path, contents)` bundle.
    pub fn from_static(bundle: &[(&str, &str)]) -> Self {
        let mut provider = Self::new();
        for (path, contents) in bundle {
            provider.insert(*path, *contents);
        }
        provider
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl AsRef<Path>, contents: impl Into<String>) {
        self.files
            .insert(normalize(path.as_ref()), contents.into());
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileProvider for EmbeddedProvider {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(&normalize(path)).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not in the embedded bundle", path.display()),
            )
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<ProviderEntry>> {
        let dir = normalize(path);
        let mut children: BTreeSet<ProviderEntry> = BTreeSet::new();

        for file in self.files.keys() {
            let Ok(rest) = file.strip_prefix(&dir) else {
                continue;
            };
            let mut components = rest.components();
            let Some(first) = components.next() else {
                continue;
            };
            children.insert(ProviderEntry {
                path: dir.join(first.as_os_str()),
                is_dir: components.next().is_some(),
            });
        }

        if children.is_empty() && dir.as_os_str() != "" {
            if self.files.contains_key(&dir) {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} is a file", path.display()),
                ));
            }
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not in the embedded bundle", path.display()),
            ));
        }

        Ok(children.into_iter().collect())
    }

    fn walk_files(&self) -> io::Result<Vec<PathBuf>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }

    fn describe(&self) -> String {
        format!("embedded:{} files", self.files.len())
    }
}

/// View of another provider rooted at a fixed subdirectory.
#[derive(Debug, Clone)]
pub struct SubdirProvider {
    inner: Arc<dyn FileProvider>,
    prefix: PathBuf,
}

impl SubdirProvider {
    pub fn new(inner: Arc<dyn FileProvider>, prefix: impl AsRef<Path>) -> Self {
        Self {
            inner,
            prefix: normalize(prefix.as_ref()),
        }
    }
}

impl FileProvider for SubdirProvider {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.inner.read_to_string(&self.prefix.join(path))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<ProviderEntry>> {
        let entries = self.inner.read_dir(&self.prefix.join(path))?;
        Ok(entries
            .into_iter()
            .filter_map(|e| {
                e.path.strip_prefix(&self.prefix).ok().map(|p| ProviderEntry {
                    path: p.to_path_buf(),
                    is_dir: e.is_dir,
                })
            })
            .collect())
    }

    fn walk_files(&self) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .inner
            .walk_files()?
            .into_iter()
            .filter_map(|p| p.strip_prefix(&self.prefix).ok().map(Path::to_path_buf))
            .collect())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.inner.is_file(&self.prefix.join(path))
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.inner.describe(), self.prefix.display())
    }
}

/// Where blueprints are read from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Bundle compiled into the binary.
    #[default]
    Embedded,
    /// Directory on disk.
    Disk,
}

/// Caller-declared provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: SourceKind,
    /// Root directory for [`SourceKind::Disk`].
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Subdirectory of the root holding the blueprint collection.
    #[serde(default)]
    pub subdir: Option<String>,
}

impl ProviderConfig {
    pub fn embedded() -> Self {
        Self::default()
    }

    pub fn disk(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: SourceKind::Disk,
            path: Some(path.into()),
            subdir: None,
        }
    }

    pub fn with_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = Some(subdir.into());
        self
    }

    /// Build the provider. `bundle` is used for [`SourceKind::Embedded`].
    pub fn build(&self, bundle: &[(&str, &str)]) -> TemplateResult<Arc<dyn FileProvider>> {
        let base: Arc<dyn FileProvider> = match self.kind {
            SourceKind::Embedded => Arc::new(EmbeddedProvider::from_static(bundle)),
            SourceKind::Disk => {
                let path = self.path.clone().ok_or_else(|| TemplateError::InvalidManifest {
                    template: "<source>".to_string(),
                    message: "disk source requires a path".to_string(),
                })?;
                Arc::new(DiskProvider::new(path))
            }
        };

        let provider = match self.subdir.as_deref().filter(|s| !s.is_empty()) {
            Some(subdir) => Arc::new(SubdirProvider::new(base, subdir)) as Arc<dyn FileProvider>,
            None => base,
        };
        debug!("Using blueprint source {}", provider.describe());
        Ok(provider)
    }
}

/// Normalize a provider path: forward components only, no `.` segments.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bundle() -> EmbeddedProvider {
        EmbeddedProvider::new()
            .with_file("blueprints/api/template.yaml", "name: API")
            .with_file("blueprints/api/files/main.go.tmpl", "package main")
            .with_file("blueprints/cli/template.yaml", "name: CLI")
    }

    #[test]
    fn test_embedded_read_dir() {
        let provider = bundle();
        let root = provider.read_dir(Path::new("")).unwrap();
        assert_eq!(
            root,
            vec![ProviderEntry {
                path: PathBuf::from("blueprints"),
                is_dir: true
            }]
        );

        let api = provider.read_dir(Path::new("blueprints/api")).unwrap();
        assert_eq!(api.len(), 2);
        assert!(api[0].is_dir);
        assert!(!api[1].is_dir);

        assert!(provider.read_dir(Path::new("nope")).is_err());
    }

    #[test]
    fn test_subdir_provider_strips_prefix() {
        let provider = SubdirProvider::new(Arc::new(bundle()), "blueprints");
        let root = provider.read_dir(Path::new("")).unwrap();
        let names: Vec<_> = root.iter().map(|e| e.path.clone()).collect();
        assert_eq!(names, vec![PathBuf::from("api"), PathBuf::from("cli")]);
        assert_eq!(
            provider
                .read_to_string(Path::new("cli/template.yaml"))
                .unwrap(),
            "name: CLI"
        );
        assert_eq!(provider.walk_files().unwrap().len(), 3);
    }

    #[test]
    fn test_disk_provider() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("api/files")).unwrap();
        fs::write(temp.path().join("api/template.yaml"), "name: API").unwrap();
        fs::write(temp.path().join("api/files/a.tmpl"), "a").unwrap();

        let provider = DiskProvider::new(temp.path());
        let files = provider.walk_files().unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("api/files/a.tmpl"),
                PathBuf::from("api/template.yaml")
            ]
        );
        assert!(provider.is_file(Path::new("api/template.yaml")));
        assert!(!provider.is_file(Path::new("api")));
    }

    #[test]
    fn test_config_requires_path_for_disk() {
        let config = ProviderConfig {
            kind: SourceKind::Disk,
            path: None,
            subdir: None,
        };
        assert!(config.build(&[]).is_err());

        let provider = ProviderConfig::embedded()
            .with_subdir("blueprints")
            .build(&[("blueprints/simple/template.yaml", "name: Simple")])
            .unwrap();
        assert!(provider.is_file(Path::new("simple/template.yaml")));
    }
}
