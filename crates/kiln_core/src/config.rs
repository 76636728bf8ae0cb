//! Persisted kiln configuration.
//!
//! ```toml
//! [source]
//! kind = "disk"
//! path = "/home/me/blueprints"
//! subdir = "go"
//!
//! [generation]
//! workers = 8
//! hook_grace_period_secs = 5
//! force = false
//! default_blueprint = "simple"
//!
//! [variables]
//! ModulePath = "github.com/acme/{{.ProjectName}}"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use kiln_templates::{ProviderConfig, DEFAULT_BLUEPRINT_ID};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "KILN_CONFIG";

/// File name inside the platform config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Settings for generation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Concurrent file writes
    pub workers: usize,
    /// Seconds a cancelled hook gets before it is killed
    pub hook_grace_period_secs: u64,
    /// Overwrite existing files
    pub force: bool,
    /// Blueprint listed first
    pub default_blueprint: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            hook_grace_period_secs: 5,
            force: false,
            default_blueprint: DEFAULT_BLUEPRINT_ID.to_string(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    pub source: ProviderConfig,
    pub generation: GenerationSettings,
    /// Variable values applied above blueprint defaults
    pub variables: BTreeMap<String, String>,
}

impl KilnConfig {
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Locate and load the configuration.
    ///
    /// Order: `explicit`, then `$KILN_CONFIG` from `env`, then the platform
    /// config directory. The first two must exist; a missing platform file
    /// yields the defaults.
    pub fn discover(explicit: Option<&Path>, env: &HashMap<String, String>) -> CoreResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = env.get(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Self::load(Path::new(path));
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `<platform config dir>/kiln/config.toml`, when a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "kiln", "kiln").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| CoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn hook_grace_period(&self) -> Duration {
        Duration::from_secs(self.generation.hook_grace_period_secs)
    }

    /// Variable values in the shape the binder takes.
    pub fn variable_values(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn validate(&self) -> CoreResult<()> {
        if self.generation.workers == 0 {
            return Err(CoreError::Config(
                "generation.workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_templates::SourceKind;

    #[test]
    fn test_defaults() {
        let config = KilnConfig::from_toml_str("").unwrap();
        assert_eq!(config, KilnConfig::default());
        assert_eq!(config.source.kind, SourceKind::Embedded);
        assert_eq!(config.generation.workers, 4);
        assert_eq!(config.hook_grace_period(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_full() {
        let config = KilnConfig::from_toml_str(
            r#"
[source]
kind = "disk"
path = "/srv/blueprints"
subdir = "go"

[generation]
workers = 8
force = true

[variables]
ModulePath = "github.com/acme/x"
"#,
        )
        .unwrap();
        assert_eq!(config.source.kind, SourceKind::Disk);
        assert_eq!(config.source.path, Some(PathBuf::from("/srv/blueprints")));
        assert_eq!(config.source.subdir.as_deref(), Some("go"));
        assert_eq!(config.generation.workers, 8);
        assert!(config.generation.force);
        assert_eq!(config.generation.default_blueprint, "simple");
        assert_eq!(
            config.variable_values().get("ModulePath").map(String::as_str),
            Some("github.com/acme/x")
        );
    }

    #[test]
    fn test_rejects_zero_workers_and_unknown_kind() {
        assert!(KilnConfig::from_toml_str("[generation]\nworkers = 0\n").is_err());
        assert!(KilnConfig::from_toml_str("[source]\nkind = \"s3\"\n").is_err());
    }

    #[test]
    fn test_discover_order() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        let from_env = dir.path().join("env.toml");
        std::fs::write(&explicit, "[generation]\nworkers = 2\n").unwrap();
        std::fs::write(&from_env, "[generation]\nworkers = 3\n").unwrap();

        let env: HashMap<String, String> =
            [(CONFIG_ENV.to_string(), from_env.display().to_string())].into();

        let config = KilnConfig::discover(Some(&explicit), &env).unwrap();
        assert_eq!(config.generation.workers, 2);

        let config = KilnConfig::discover(None, &env).unwrap();
        assert_eq!(config.generation.workers, 3);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            KilnConfig::discover(Some(&missing), &env),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = KilnConfig::default();
        config.generation.workers = 6;
        config.variables.insert("Logger".into(), "zap".into());
        config.save(&path).unwrap();

        assert_eq!(KilnConfig::load(&path).unwrap(), config);
    }
}
