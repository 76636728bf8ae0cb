//! Registry of loaded blueprints.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::manifest::BlueprintDescriptor;

/// Id of the blueprint listed first when present.
pub const DEFAULT_BLUEPRINT_ID: &str = "simple";

/// Thread-safe registry of resolved blueprint descriptors.
///
/// Lookups share a read lock; `register` and `remove` take the write lock.
/// Descriptors are stored behind `Arc`, so readers always observe a complete
/// descriptor or none at all.
pub struct BlueprintRegistry {
    blueprints: RwLock<HashMap<String, Arc<BlueprintDescriptor>>>,
    default_id: String,
}

impl Default for BlueprintRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BlueprintRegistry {
    pub fn new() -> Self {
        Self {
            blueprints: RwLock::new(HashMap::new()),
            default_id: DEFAULT_BLUEPRINT_ID.to_string(),
        }
    }

    /// Use a different id as the blueprint listed first.
    pub fn with_default_id(mut self, id: impl Into<String>) -> Self {
        self.default_id = id.into();
        self
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Register a blueprint, replacing any entry with the same id.
    pub fn register(&self, descriptor: BlueprintDescriptor) -> TemplateResult<()> {
        if descriptor.id.trim().is_empty() {
            return Err(TemplateError::InvalidManifest {
                template: descriptor.name.clone(),
                message: "blueprint id must not be empty".to_string(),
            });
        }
        debug!("Registering blueprint: {}", descriptor.id);
        let descriptor = Arc::new(descriptor);
        self.blueprints
            .write()
            .insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    /// Get a blueprint by id.
    pub fn get(&self, id: &str) -> TemplateResult<Arc<BlueprintDescriptor>> {
        self.blueprints
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    /// Check if a blueprint exists.
    pub fn exists(&self, id: &str) -> bool {
        self.blueprints.read().contains_key(id)
    }

    /// Remove a blueprint, returning it if it was registered.
    pub fn remove(&self, id: &str) -> Option<Arc<BlueprintDescriptor>> {
        debug!("Removing blueprint: {}", id);
        self.blueprints.write().remove(id)
    }

    /// All blueprints: the default first, then by type, then by id.
    pub fn list(&self) -> Vec<Arc<BlueprintDescriptor>> {
        let mut all: Vec<_> = self.blueprints.read().values().cloned().collect();
        all.sort_by(|a, b| self.compare(a, b));
        all
    }

    /// Blueprints of exactly the given type, in listing order.
    pub fn get_by_type(&self, blueprint_type: &str) -> Vec<Arc<BlueprintDescriptor>> {
        let mut matching: Vec<_> = self
            .blueprints
            .read()
            .values()
            .filter(|d| d.blueprint_type == blueprint_type)
            .cloned()
            .collect();
        matching.sort_by(|a, b| self.compare(a, b));
        matching
    }

    /// Distinct blueprint types, sorted.
    pub fn template_types(&self) -> Vec<String> {
        self.blueprints
            .read()
            .values()
            .map(|d| d.blueprint_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.blueprints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.read().is_empty()
    }

    fn compare(&self, a: &BlueprintDescriptor, b: &BlueprintDescriptor) -> Ordering {
        let a_default = a.id == self.default_id;
        let b_default = b.id == self.default_id;
        b_default
            .cmp(&a_default)
            .then_with(|| a.blueprint_type.cmp(&b.blueprint_type))
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl std::fmt::Debug for BlueprintRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.list().iter().map(|d| d.id.clone()).collect();
        f.debug_struct("BlueprintRegistry")
            .field("blueprints", &ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn blueprint(id: &str, blueprint_type: &str) -> BlueprintDescriptor {
        BlueprintDescriptor::new(id, blueprint_type).with_id(id)
    }

    #[test]
    fn test_register_rejects_empty_id() {
        let registry = BlueprintRegistry::new();
        let err = registry
            .register(BlueprintDescriptor::new("Nameless", "api"))
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidManifest { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let registry = BlueprintRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(TemplateError::NotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_list_order() {
        let registry = BlueprintRegistry::new();
        for (id, ty) in [
            ("web-clean", "web"),
            ("api-ddd", "api"),
            ("simple", "simple"),
            ("api", "api"),
            ("cli", "cli"),
        ] {
            registry.register(blueprint(id, ty)).unwrap();
        }

        let ids: Vec<_> = registry.list().iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec!["simple", "api", "api-ddd", "cli", "web-clean"]);

        for _ in 0..10 {
            let again: Vec<_> = registry.list().iter().map(|d| d.id.clone()).collect();
            assert_eq!(again, ids);
        }
    }

    #[test]
    fn test_list_without_default() {
        let registry = BlueprintRegistry::new().with_default_id("cli");
        registry.register(blueprint("api", "api")).unwrap();
        registry.register(blueprint("cli", "cli")).unwrap();
        registry.register(blueprint("simple", "simple")).unwrap();
        let ids: Vec<_> = registry.list().iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec!["cli", "api", "simple"]);
    }

    #[test]
    fn test_type_queries() {
        let registry = BlueprintRegistry::new();
        registry.register(blueprint("api-clean", "api")).unwrap();
        registry.register(blueprint("api", "api")).unwrap();
        registry.register(blueprint("cli", "cli")).unwrap();

        let apis: Vec<_> = registry
            .get_by_type("api")
            .iter()
            .map(|d| d.id.clone())
            .collect();
        assert_eq!(apis, vec!["api", "api-clean"]);
        assert_eq!(registry.template_types(), vec!["api", "cli"]);
        assert!(registry.get_by_type("worker").is_empty());
    }

    #[test]
    fn test_exists_and_remove() {
        let registry = BlueprintRegistry::new();
        registry.register(blueprint("api", "api")).unwrap();
        assert!(registry.exists("api"));
        assert!(registry.remove("api").is_some());
        assert!(!registry.exists("api"));
        assert!(registry.remove("api").is_none());
    }

    #[test]
    fn test_concurrent_access() {
        let registry = Arc::new(BlueprintRegistry::new());
        let mut handles = Vec::new();

        for worker in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for i in 0..200 {
                    let id = format!("bp-{}-{}", worker, i % 10);
                    let mut descriptor = blueprint(&id, "api");
                    descriptor.description = format!("{}", i);
                    registry.register(descriptor).unwrap();

                    if let Ok(found) = registry.get(&id) {
                        assert_eq!(found.id, id);
                        assert_eq!(found.blueprint_type, "api");
                    }
                    for entry in registry.list() {
                        assert!(!entry.id.is_empty());
                        assert_eq!(entry.name, entry.id);
                    }
                    if i % 3 == 0 {
                        registry.remove(&id);
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.len() <= 80);
    }
}
