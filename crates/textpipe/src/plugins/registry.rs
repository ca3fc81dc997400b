//! Plugin registration and discovery.
//!
//! The registry maps plugin names to factories. Plugins hold their settings, so a
//! pipeline built from configuration gets fresh instances rather than shared
//! ones.

use crate::builtin;
use crate::core::config::{PipelineConfig, StageConfig};
use crate::core::pipeline::Pipeline;
use crate::plugins::{PluginDescriptor, PluginKind, Stage};
use crate::{Result, TextpipeError};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

/// Creates a fresh, unconfigured stage.
pub type StageFactory = Arc<dyn Fn() -> Stage + Send + Sync>;

/// Validate a plugin name before registration.
///
/// # Rules
///
/// - Name cannot be empty
/// - Name cannot contain whitespace
///
/// # Errors
///
/// Returns `ValidationError` if the name is invalid.
fn validate_plugin_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TextpipeError::validation("Plugin name cannot be empty"));
    }

    if name.contains(char::is_whitespace) {
        return Err(TextpipeError::validation(format!(
            "Plugin name '{}' cannot contain whitespace",
            name
        )));
    }

    Ok(())
}

struct RegisteredPlugin {
    kind: PluginKind,
    descriptor: PluginDescriptor,
    factory: StageFactory,
}

/// Registry of plugin factories.
///
/// # Thread Safety
///
/// The global instance is wrapped in `Arc<RwLock<_>>`; see [`get_plugin_registry`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use textpipe::builtin::Lowercase;
/// use textpipe::plugins::{PluginRegistry, Stage};
///
/// let mut registry = PluginRegistry::new_empty();
/// registry.register(|| Stage::Linear(Arc::new(Lowercase::new()))).unwrap();
/// assert_eq!(registry.list(), vec!["lowercase".to_string()]);
/// ```
pub struct PluginRegistry {
    plugins: IndexMap<String, RegisteredPlugin>,
}

impl PluginRegistry {
    /// Create a registry holding every built-in plugin.
    pub fn new() -> Self {
        let mut registry = Self::new_empty();
        builtin::register_builtins(&mut registry);
        registry
    }

    /// Create a registry without the built-in plugins.
    pub fn new_empty() -> Self {
        Self {
            plugins: IndexMap::new(),
        }
    }

    /// Register a plugin factory. A later registration under the same name
    /// replaces the earlier one.
    ///
    /// # Errors
    ///
    /// `ValidationError` if the produced plugin's name is invalid.
    pub fn register<F>(&mut self, factory: F) -> Result<()>
    where
        F: Fn() -> Stage + Send + Sync + 'static,
    {
        let sample = factory();
        let name = sample.name().to_string();
        validate_plugin_name(&name)?;

        if self.plugins.contains_key(&name) {
            tracing::debug!(plugin = %name, "Replacing registered plugin");
        }

        self.plugins.insert(
            name,
            RegisteredPlugin {
                kind: sample.kind(),
                descriptor: sample.descriptor().clone(),
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    /// Create a fresh instance of the named plugin.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` if no plugin of that name is registered.
    pub fn create(&self, name: &str) -> Result<Stage> {
        self.plugins
            .get(name)
            .map(|registered| (registered.factory)())
            .ok_or_else(|| {
                TextpipeError::pipeline_configuration(format!(
                    "unknown plugin '{}' (registered: {})",
                    name,
                    self.list().join(", ")
                ))
            })
    }

    pub fn descriptor(&self, name: &str) -> Option<&PluginDescriptor> {
        self.plugins.get(name).map(|registered| &registered.descriptor)
    }

    pub fn kind(&self, name: &str) -> Option<PluginKind> {
        self.plugins.get(name).map(|registered| registered.kind)
    }

    /// Registered plugin names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<_> = self.plugins.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of the registered plugins of one kind, sorted.
    pub fn list_kind(&self, kind: PluginKind) -> Vec<String> {
        let mut names: Vec<_> = self
            .plugins
            .iter()
            .filter(|(_, registered)| registered.kind == kind)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Descriptors of every registered plugin, ordered by category then name.
    pub fn descriptors(&self) -> Vec<(PluginKind, &PluginDescriptor)> {
        let mut entries: Vec<_> = self
            .plugins
            .values()
            .map(|registered| (registered.kind, &registered.descriptor))
            .collect();
        entries.sort_by(|a, b| (&a.1.category, &a.1.name).cmp(&(&b.1.category, &b.1.name)));
        entries
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.plugins.shift_remove(name);
        Ok(())
    }

    /// Build a pipeline from its configuration: create every stage, import its
    /// settings and validate the chain.
    ///
    /// # Errors
    ///
    /// - `ConfigurationError` for unknown plugins, plugins used in the wrong
    ///   position and incompatible stage pairs
    /// - `SettingsError` when a plugin rejects its settings
    pub fn build_pipeline(&self, config: &PipelineConfig) -> Result<Pipeline> {
        let input = match self.instantiate(0, &config.input, PluginKind::Input)? {
            Stage::Input(input) => input,
            other => {
                return Err(TextpipeError::configuration(
                    "stage 0",
                    format!("'{}' is not an input plugin", other.name()),
                ));
            }
        };

        let mut builder = Pipeline::builder().input(input).engine(config.engine.clone());

        for (offset, stage_config) in config.linear.iter().enumerate() {
            builder = builder.stage(self.instantiate(offset + 1, stage_config, PluginKind::Linear)?);
        }

        let output_position = config.linear.len() + 1;
        builder = builder.stage(self.instantiate(output_position, &config.output, PluginKind::Output)?);

        builder.build()
    }

    fn instantiate(&self, position: usize, config: &StageConfig, expected: PluginKind) -> Result<Stage> {
        let stage = self.create(&config.plugin).map_err(|e| match e {
            TextpipeError::Configuration { message, .. } => TextpipeError::Configuration {
                message,
                stage: Some(format!("stage {}", position)),
            },
            other => other,
        })?;

        if stage.kind() != expected {
            return Err(TextpipeError::configuration(
                format!("stage {} '{}' ({})", position, stage.name(), stage.kind()),
                format!("a {} plugin cannot be used as the {} stage", stage.kind(), expected),
            ));
        }

        stage.plugin().import_settings(&config.settings)?;
        Ok(stage)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global plugin registry.
pub static PLUGIN_REGISTRY: Lazy<Arc<RwLock<PluginRegistry>>> =
    Lazy::new(|| Arc::new(RwLock::new(PluginRegistry::new())));

/// Get the global plugin registry.
pub fn get_plugin_registry() -> Arc<RwLock<PluginRegistry>> {
    PLUGIN_REGISTRY.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{Lowercase, MemoryInput};
    use crate::core::config::StageConfig;

    fn config(linear: Vec<StageConfig>) -> PipelineConfig {
        PipelineConfig {
            engine: Default::default(),
            input: StageConfig::new("memory-input").with("texts", "a|b"),
            linear,
            output: StageConfig::new("memory-output"),
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = PluginRegistry::new();
        let names = registry.list();
        for expected in [
            "csv-output",
            "directory-input",
            "lowercase",
            "memory-input",
            "memory-output",
            "segmenter",
            "tokenizer",
            "word-count",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {}", expected);
        }
        assert_eq!(registry.list_kind(PluginKind::Output), vec!["csv-output", "memory-output"]);
    }

    #[test]
    fn test_create_returns_fresh_instances() {
        let registry = PluginRegistry::new();
        let first = registry.create("lowercase").unwrap();
        let second = registry.create("lowercase").unwrap();
        match (first, second) {
            (Stage::Linear(a), Stage::Linear(b)) => assert!(!Arc::ptr_eq(&a, &b)),
            _ => panic!("lowercase should be linear"),
        }
    }

    #[test]
    fn test_unknown_plugin_is_configuration_error() {
        let registry = PluginRegistry::new();
        let err = registry.create("nope").unwrap_err();
        assert!(matches!(err, TextpipeError::Configuration { .. }));
        assert!(err.to_string().contains("unknown plugin 'nope'"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(validate_plugin_name("").is_err());
        assert!(validate_plugin_name("two words").is_err());
        assert!(validate_plugin_name("word-count").is_ok());
    }

    #[test]
    fn test_descriptors_sorted_by_category() {
        let registry = PluginRegistry::new();
        let descriptors = registry.descriptors();
        let keys: Vec<_> = descriptors
            .iter()
            .map(|(_, d)| (d.category.clone(), d.name.clone()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_register_and_remove() {
        let mut registry = PluginRegistry::new_empty();
        registry.register(|| Stage::Input(Arc::new(MemoryInput::new()))).unwrap();
        registry.register(|| Stage::Linear(Arc::new(Lowercase::new()))).unwrap();
        assert_eq!(registry.kind("lowercase"), Some(PluginKind::Linear));
        registry.remove("lowercase").unwrap();
        assert_eq!(registry.list(), vec!["memory-input"]);
    }

    #[test]
    fn test_build_pipeline_from_config() {
        let registry = PluginRegistry::new();
        let pipeline = registry
            .build_pipeline(&config(vec![StageConfig::new("lowercase"), StageConfig::new("word-count")]))
            .unwrap();
        let names: Vec<_> = pipeline.stages().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["memory-input", "lowercase", "word-count", "memory-output"]);
        assert_eq!(pipeline.input().item_count(), 2);
    }

    #[test]
    fn test_build_pipeline_rejects_misplaced_plugin() {
        let registry = PluginRegistry::new();
        let err = registry
            .build_pipeline(&config(vec![StageConfig::new("memory-output")]))
            .unwrap_err();
        assert!(err.to_string().contains("stage 1 'memory-output' (output)"), "{}", err);
    }

    #[test]
    fn test_build_pipeline_propagates_settings_errors() {
        let registry = PluginRegistry::new();
        let err = registry
            .build_pipeline(&config(vec![
                StageConfig::new("word-count").with("emit_totals", "sometimes"),
            ]))
            .unwrap_err();
        assert!(matches!(err, TextpipeError::Settings { .. }));
    }

    #[test]
    fn test_global_registry_is_shared() {
        let a = get_plugin_registry();
        let b = get_plugin_registry();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.read().unwrap().descriptor("word-count").is_some());
    }
}
