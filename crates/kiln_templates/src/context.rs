//! Bound variable values used to render one generation run.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// A bound variable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VarValue {
    Str(String),
    Bool(bool),
    Int(i64),
}

impl VarValue {
    /// Truthiness used by conditions: empty strings, `false` and `0` are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            VarValue::Str(s) => !s.is_empty(),
            VarValue::Bool(b) => *b,
            VarValue::Int(i) => *i != 0,
        }
    }
}

impl std::fmt::Display for VarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarValue::Str(s) => f.write_str(s),
            VarValue::Bool(b) => write!(f, "{}", b),
            VarValue::Int(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for VarValue {
    fn from(value: &str) -> Self {
        VarValue::Str(value.to_string())
    }
}

impl From<String> for VarValue {
    fn from(value: String) -> Self {
        VarValue::Str(value)
    }
}

impl From<bool> for VarValue {
    fn from(value: bool) -> Self {
        VarValue::Bool(value)
    }
}

impl From<i64> for VarValue {
    fn from(value: i64) -> Self {
        VarValue::Int(value)
    }
}

/// Fully resolved variables and enabled features for one run.
///
/// Built once by the binder and only read afterwards; the builder methods
/// consume `self`, so a context handed to the renderer cannot change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderContext {
    values: BTreeMap<String, VarValue>,
    features: BTreeSet<String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<VarValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.insert(feature.into());
        self
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: VarValue) {
        self.values.insert(name.into(), value);
    }

    pub(crate) fn enable_feature(&mut self, feature: impl Into<String>) {
        self.features.insert(feature.into());
    }

    pub fn get(&self, name: &str) -> Option<&VarValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    pub fn values(&self) -> &BTreeMap<String, VarValue> {
        &self.values
    }

    pub fn features(&self) -> &BTreeSet<String> {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
