//! Plugin registry.
//!
//! The manager is the only writer of the type factory and the validation
//! registry, which keeps the three mutually consistent: a type has a
//! constructor exactly when it has a plugin, and that plugin's rules are in
//! the validation registry. Registration happens at bootstrap through
//! `&mut self`; afterwards the manager is shared read-only behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::domain::ArtifactType;
use crate::error::{ArtifactError, Result};

use super::factory::{Constructor, TypeFactory};
use super::plugin::ArtifactPlugin;
use super::validation::ValidationRegistry;

/// Registry of artifact plugins, indexed by id and by type
#[derive(Default)]
pub struct PluginManager {
    /// Registration order is preserved
    by_id: IndexMap<String, Arc<dyn ArtifactPlugin>>,

    /// Last registered plugin per type
    by_type: HashMap<ArtifactType, Arc<dyn ArtifactPlugin>>,

    factory: TypeFactory,
    validation: ValidationRegistry,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin and wire it into the factory and validation registry.
    ///
    /// Every check runs before anything is wired, so a rejected plugin leaves
    /// no trace.
    pub fn register(&mut self, plugin: Arc<dyn ArtifactPlugin>) -> Result<()> {
        let manifest = plugin.manifest().clone();

        if manifest.id.trim().is_empty() {
            return Err(ArtifactError::InvalidPluginMetadata {
                plugin_id: manifest.id,
                reason: "plugin id must not be empty".to_string(),
            });
        }
        if manifest.name.trim().is_empty() || manifest.version.trim().is_empty() {
            return Err(ArtifactError::InvalidPluginMetadata {
                plugin_id: manifest.id,
                reason: "plugin name and version must not be empty".to_string(),
            });
        }

        let artifact_type = manifest
            .artifact_type
            .ok_or_else(|| ArtifactError::MissingArtifactType {
                plugin_id: manifest.id.clone(),
            })?;

        let rules = plugin.validation_rules();
        let mut missing = Vec::new();
        if rules.is_empty() {
            missing.push("validation_rules");
        }
        // A factory producing another type does not provide this one
        if plugin.create_instance().artifact_type() != artifact_type {
            missing.push("factory");
        }
        if !missing.is_empty() {
            return Err(ArtifactError::MissingRequiredMethods {
                plugin_id: manifest.id,
                methods: missing,
            });
        }

        if self.by_id.contains_key(&manifest.id) {
            return Err(ArtifactError::DuplicatePlugin {
                plugin_id: manifest.id,
            });
        }

        if let Some(previous) = self.by_type.get(&artifact_type) {
            warn!(
                %artifact_type,
                previous = previous.id(),
                plugin = %manifest.id,
                "Another plugin already governs this type; lookups by type will resolve to the newer one"
            );
        }

        let constructor: Constructor = {
            let plugin = Arc::clone(&plugin);
            Arc::new(move || plugin.create_instance())
        };
        self.factory.register(artifact_type, constructor);

        for rule in rules {
            self.validation.add_rule(artifact_type, rule);
        }

        self.by_type.insert(artifact_type, Arc::clone(&plugin));
        self.by_id.insert(manifest.id.clone(), plugin);

        info!(plugin = %manifest.id, %artifact_type, "Registered plugin");
        Ok(())
    }

    /// Register several plugins in order, stopping at the first failure
    pub fn register_all<I>(&mut self, plugins: I) -> Result<()>
    where
        I: IntoIterator<Item = Arc<dyn ArtifactPlugin>>,
    {
        for plugin in plugins {
            self.register(plugin)?;
        }
        Ok(())
    }

    pub fn plugin(&self, plugin_id: &str) -> Option<Arc<dyn ArtifactPlugin>> {
        self.by_id.get(plugin_id).cloned()
    }

    /// The plugin governing a type (the last registered, if several)
    pub fn plugin_for_type(&self, artifact_type: ArtifactType) -> Option<Arc<dyn ArtifactPlugin>> {
        self.by_type.get(&artifact_type).cloned()
    }

    /// Like [`plugin_for_type`](Self::plugin_for_type), failing the way the factory does
    pub fn require_plugin(&self, artifact_type: ArtifactType) -> Result<Arc<dyn ArtifactPlugin>> {
        self.plugin_for_type(artifact_type)
            .ok_or_else(|| ArtifactError::ConstructorNotFound {
                tag: artifact_type.to_string(),
            })
    }

    /// All plugins, in registration order
    pub fn plugins(&self) -> impl Iterator<Item = &Arc<dyn ArtifactPlugin>> {
        self.by_id.values()
    }

    /// Types with at least one plugin, in tag order
    pub fn registered_types(&self) -> Vec<ArtifactType> {
        let mut types: Vec<_> = self.by_type.keys().copied().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn factory(&self) -> &TypeFactory {
        &self.factory
    }

    pub fn validation(&self) -> &ValidationRegistry {
        &self.validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plugin::PluginManifest;
    use crate::core::validation::{FieldKind, RequiredFields, ValidationRule};
    use crate::domain::Artifact;
    use async_trait::async_trait;
    use serde_json::json;

    struct StubPlugin {
        manifest: PluginManifest,
        produces: ArtifactType,
        rules: usize,
    }

    impl StubPlugin {
        fn new(id: &str, artifact_type: ArtifactType) -> Self {
            Self {
                manifest: PluginManifest::new(id, "Stub", artifact_type),
                produces: artifact_type,
                rules: 1,
            }
        }
    }

    #[async_trait]
    impl ArtifactPlugin for StubPlugin {
        fn manifest(&self) -> &PluginManifest {
            &self.manifest
        }

        fn create_instance(&self) -> Artifact {
            Artifact::empty(self.produces)
        }

        fn validation_rules(&self) -> Vec<Arc<dyn ValidationRule>> {
            (0..self.rules)
                .map(|_| {
                    Arc::new(RequiredFields::new(&[("content", FieldKind::NonEmptyString)]))
                        as Arc<dyn ValidationRule>
                })
                .collect()
        }
    }

    #[test]
    fn test_register_wires_factory_and_rules() {
        let mut manager = PluginManager::new();
        manager
            .register(Arc::new(StubPlugin::new("doc", ArtifactType::Document)))
            .unwrap();

        assert!(manager.factory().contains(ArtifactType::Document));
        assert!(manager.validation().has_rules(ArtifactType::Document));
        assert_eq!(manager.plugin("doc").unwrap().id(), "doc");
        assert_eq!(
            manager.plugin_for_type(ArtifactType::Document).unwrap().id(),
            "doc"
        );
    }

    #[test]
    fn test_duplicate_plugin_is_rejected_without_wiring() {
        let mut manager = PluginManager::new();
        manager
            .register(Arc::new(StubPlugin::new("doc", ArtifactType::Document)))
            .unwrap();

        let mut second = StubPlugin::new("doc", ArtifactType::Code);
        second.rules = 3;
        let err = manager.register(Arc::new(second)).unwrap_err();

        assert!(matches!(err, ArtifactError::DuplicatePlugin { ref plugin_id } if plugin_id == "doc"));
        assert!(!manager.factory().contains(ArtifactType::Code));
        assert!(!manager.validation().has_rules(ArtifactType::Code));
        assert_eq!(manager.validation().rules_for(ArtifactType::Document).len(), 1);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_invalid_metadata() {
        let mut manager = PluginManager::new();
        let err = manager
            .register(Arc::new(StubPlugin::new("  ", ArtifactType::Document)))
            .unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidPluginMetadata { .. }));

        let mut unnamed = StubPlugin::new("unnamed", ArtifactType::Document);
        unnamed.manifest.name = String::new();
        let err = manager.register(Arc::new(unnamed)).unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidPluginMetadata { .. }));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_missing_artifact_type() {
        let mut manager = PluginManager::new();
        let mut plugin = StubPlugin::new("untyped", ArtifactType::Document);
        plugin.manifest.artifact_type = None;

        let err = manager.register(Arc::new(plugin)).unwrap_err();
        assert!(matches!(err, ArtifactError::MissingArtifactType { .. }));
    }

    #[test]
    fn test_missing_required_methods() {
        let mut manager = PluginManager::new();

        let mut ruleless = StubPlugin::new("ruleless", ArtifactType::Document);
        ruleless.rules = 0;
        let err = manager.register(Arc::new(ruleless)).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::MissingRequiredMethods { ref methods, .. } if methods == &vec!["validation_rules"]
        ));

        let mut mismatched = StubPlugin::new("mismatched", ArtifactType::Document);
        mismatched.produces = ArtifactType::Code;
        let err = manager.register(Arc::new(mismatched)).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::MissingRequiredMethods { ref methods, .. } if methods == &vec!["factory"]
        ));

        assert!(!manager.factory().contains(ArtifactType::Document));
    }

    #[tokio::test]
    async fn test_same_type_different_ids_coexist() {
        let mut manager = PluginManager::new();
        manager
            .register(Arc::new(StubPlugin::new("doc-a", ArtifactType::Document)))
            .unwrap();
        manager
            .register(Arc::new(StubPlugin::new("doc-b", ArtifactType::Document)))
            .unwrap();

        assert_eq!(manager.len(), 2);
        assert_eq!(
            manager.plugin_for_type(ArtifactType::Document).unwrap().id(),
            "doc-b"
        );
        // Rules from both accumulate
        assert_eq!(manager.validation().rules_for(ArtifactType::Document).len(), 2);

        let ids: Vec<_> = manager.plugins().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["doc-a", "doc-b"]);

        manager
            .validation()
            .validate(ArtifactType::Document, &json!({ "content": "hello" }))
            .await
            .unwrap();
    }

    #[test]
    fn test_require_plugin_for_unregistered_type() {
        let manager = PluginManager::new();
        let err = manager.require_plugin(ArtifactType::Voice).err().unwrap();
        assert!(matches!(err, ArtifactError::ConstructorNotFound { ref tag } if tag == "voice"));
    }
}
