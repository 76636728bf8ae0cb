//! Blueprint manifest definitions.
//!
//! A blueprint is described by a `template.yaml` manifest. Variables,
//! dependencies and features may be split out into include fragments which
//! the loader appends to the lists declared in the manifest itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Primary manifest file name.
pub const MANIFEST_FILE: &str = "template.yaml";
/// Accepted alternative manifest file name.
pub const MANIFEST_FILE_ALT: &str = "template.yml";
/// Architecture name that does not contribute to the derived id.
pub const STANDARD_ARCHITECTURE: &str = "standard";
/// Metadata key holding the directory a blueprint was loaded from.
pub const METADATA_PATH: &str = "path";

/// Declared type of a blueprint variable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    #[default]
    String,
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "integer", alias = "number")]
    Int,
    #[serde(alias = "choice")]
    Select,
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VariableType::String => "string",
            VariableType::Bool => "bool",
            VariableType::Int => "int",
            VariableType::Select => "select",
        };
        f.write_str(name)
    }
}

/// Scalar value as written in YAML (`default: true`, `default: 8080`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl ScalarValue {
    /// Textual form used as input to type coercion.
    pub fn as_raw(&self) -> String {
        match self {
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Int(i) => i.to_string(),
            ScalarValue::Str(s) => s.clone(),
        }
    }
}

/// Blueprint variable definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub var_type: VariableType,
    #[serde(default)]
    pub default: Option<ScalarValue>,
    #[serde(default)]
    pub required: bool,
    /// Allowed values of a select; YAML numbers and booleans are accepted.
    #[serde(default)]
    pub choices: Vec<ScalarValue>,
    /// Expression deciding whether the variable applies at all.
    #[serde(default)]
    pub condition: Option<String>,
    /// Text shown when asking for the value interactively.
    #[serde(default)]
    pub prompt: Option<String>,
}

impl VariableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            var_type: VariableType::String,
            default: None,
            required: false,
            choices: Vec::new(),
            condition: None,
            prompt: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_type(mut self, var_type: VariableType) -> Self {
        self.var_type = var_type;
        self
    }

    pub fn with_default(mut self, default: ScalarValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.var_type = VariableType::Select;
        self.choices = choices
            .into_iter()
            .map(|c| ScalarValue::Str(c.into()))
            .collect();
        self
    }

    /// Choices in the textual form values are compared against.
    pub fn choice_values(&self) -> Vec<String> {
        self.choices.iter().map(ScalarValue::as_raw).collect()
    }

    pub fn is_choice(&self, raw: &str) -> bool {
        self.choices.iter().any(|c| c.as_raw() == raw)
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Prompt label, falling back to the description and then the name.
    pub fn prompt_label(&self) -> &str {
        self.prompt
            .as_deref()
            .filter(|p| !p.is_empty())
            .or_else(|| Some(self.description.as_str()).filter(|d| !d.is_empty()))
            .unwrap_or(&self.name)
    }
}

/// A file to render into the generated project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSpec {
    /// Template path relative to the blueprint directory.
    pub source: String,
    /// Destination path template relative to the output root.
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

impl FileSpec {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: Some(destination.into()),
            condition: None,
        }
    }

    /// The destination template, defaulting to the source path.
    pub fn destination_template(&self) -> &str {
        self.destination
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.source)
    }
}

/// A module dependency merged into the generated module manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencySpec {
    pub module: String,
    pub version: String,
    #[serde(default)]
    pub condition: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

/// Optional capability of a blueprint, queried from templates via `hasFeature`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub condition: Option<String>,
}

/// Extra constraint applied to a bound variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationRule {
    pub variable: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Command run after all files are written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostHook {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory relative to the output root.
    #[serde(default)]
    pub dir: Option<String>,
    /// Extra environment for the command; values are templates.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub continue_on_error: bool,
}

/// Fragment files referenced from the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IncludeRefs {
    #[serde(default)]
    pub variables: Option<String>,
    #[serde(default)]
    pub dependencies: Option<String>,
    #[serde(default)]
    pub features: Option<String>,
}

impl IncludeRefs {
    /// Declared includes in merge order.
    pub fn slots(&self) -> Vec<(FragmentSlot, &str)> {
        [
            (FragmentSlot::Variables, self.variables.as_deref()),
            (FragmentSlot::Dependencies, self.dependencies.as_deref()),
            (FragmentSlot::Features, self.features.as_deref()),
        ]
        .into_iter()
        .filter_map(|(slot, path)| path.filter(|p| !p.is_empty()).map(|p| (slot, p)))
        .collect()
    }
}

/// Which descriptor list an include fragment contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentSlot {
    Variables,
    Dependencies,
    Features,
}

impl FragmentSlot {
    pub fn key(&self) -> &'static str {
        match self {
            FragmentSlot::Variables => "variables",
            FragmentSlot::Dependencies => "dependencies",
            FragmentSlot::Features => "features",
        }
    }
}

/// Keyed form of an include fragment. Unknown keys are rejected at parse time.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Fragment {
    #[serde(default)]
    pub variables: Option<Vec<VariableSpec>>,
    #[serde(default)]
    pub dependencies: Option<Vec<DependencySpec>>,
    #[serde(default)]
    pub features: Option<Vec<FeatureSpec>>,
}

impl Fragment {
    /// Take the section matching `slot`, if the fragment declares it.
    pub fn take(self, slot: FragmentSlot) -> Option<FragmentEntries> {
        match slot {
            FragmentSlot::Variables => self.variables.map(FragmentEntries::Variables),
            FragmentSlot::Dependencies => self.dependencies.map(FragmentEntries::Dependencies),
            FragmentSlot::Features => self.features.map(FragmentEntries::Features),
        }
    }
}

/// Typed entries contributed by one include fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentEntries {
    Variables(Vec<VariableSpec>),
    Dependencies(Vec<DependencySpec>),
    Features(Vec<FeatureSpec>),
}

impl FragmentEntries {
    pub fn len(&self) -> usize {
        match self {
            FragmentEntries::Variables(v) => v.len(),
            FragmentEntries::Dependencies(d) => d.len(),
            FragmentEntries::Features(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_module_manifest() -> String {
    "go.mod".to_string()
}

/// Fully resolved blueprint descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlueprintDescriptor {
    /// Explicit id; derived from type and architecture when empty.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub blueprint_type: String,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub include: IncludeRefs,
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    #[serde(default)]
    pub files: Vec<FileSpec>,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    #[serde(default)]
    pub features: Vec<FeatureSpec>,
    #[serde(default, alias = "validation_rules")]
    pub validation: Vec<ValidationRule>,
    #[serde(default, alias = "hooks")]
    pub post_hooks: Vec<PostHook>,
    /// Output-relative path of the dependency manifest to merge into.
    #[serde(default = "default_module_manifest")]
    pub module_manifest: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Derive a blueprint id from its type and architecture variant.
pub fn derive_id(blueprint_type: &str, architecture: Option<&str>) -> String {
    match architecture.map(str::trim) {
        None | Some("") | Some(STANDARD_ARCHITECTURE) => blueprint_type.to_string(),
        Some(arch) => format!("{}-{}", blueprint_type, arch),
    }
}

impl BlueprintDescriptor {
    pub fn new(name: impl Into<String>, blueprint_type: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: String::new(),
            blueprint_type: blueprint_type.into(),
            architecture: None,
            version: default_version(),
            author: None,
            include: IncludeRefs::default(),
            variables: Vec::new(),
            files: Vec::new(),
            dependencies: Vec::new(),
            features: Vec::new(),
            validation: Vec::new(),
            post_hooks: Vec::new(),
            module_manifest: default_module_manifest(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = Some(architecture.into());
        self
    }

    pub fn with_variable(mut self, variable: VariableSpec) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_file(mut self, file: FileSpec) -> Self {
        self.files.push(file);
        self
    }

    /// Fill in the id when the manifest did not set one explicitly.
    pub fn resolve_id(&mut self) {
        if self.id.trim().is_empty() {
            self.id = derive_id(&self.blueprint_type, self.architecture.as_deref());
        }
    }

    /// Architecture variant, `None` for the standard layout.
    pub fn architecture_variant(&self) -> Option<&str> {
        self.architecture
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty() && *a != STANDARD_ARCHITECTURE)
    }

    /// Directory the blueprint was loaded from.
    pub fn path(&self) -> Option<&str> {
        self.metadata.get(METADATA_PATH).map(String::as_str)
    }

    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Get required variables.
    pub fn required_variables(&self) -> Vec<&VariableSpec> {
        self.variables.iter().filter(|v| v.required).collect()
    }

    /// Append fragment entries after the ones declared in the manifest.
    pub fn append_fragment(&mut self, entries: FragmentEntries) {
        match entries {
            FragmentEntries::Variables(v) => self.variables.extend(v),
            FragmentEntries::Dependencies(d) => self.dependencies.extend(d),
            FragmentEntries::Features(f) => self.features.extend(f),
        }
    }
}
