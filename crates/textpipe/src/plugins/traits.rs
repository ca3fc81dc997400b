//! Base plugin trait and descriptor.
//!
//! Every plugin, whatever its variant, implements [`Plugin`]: metadata, lifecycle,
//! settings exchange and header declaration.

use crate::Result;
use crate::types::{Header, Payload, Settings};
use serde::{Deserialize, Serialize};

/// Identity, presentation metadata and data-type contract of a plugin.
///
/// The type contract (`input_types` / `output_type`) is only used to check that
/// adjacent stages fit together; it never drives execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub category: String,
    pub version: String,
    pub author: String,
    pub description: String,
    /// Link to further help about the plugin.
    pub tutorial: String,
    /// Whether a plugin browser should list this plugin at the top level.
    pub top_level: bool,
    /// Icon reference for a presentation layer (path or resource id).
    pub icon: Option<String>,
    /// Upstream output tags this plugin accepts. Empty for Input plugins.
    pub input_types: Vec<String>,
    /// Tag of the data this plugin produces.
    pub output_type: String,
}

impl PluginDescriptor {
    /// Whether `tag` is one of the accepted upstream output tags.
    pub fn accepts(&self, tag: &str) -> bool {
        self.input_types.iter().any(|t| t == tag)
    }
}

/// Discriminant of the three plugin variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Input,
    Linear,
    Output,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PluginKind::Input => "input",
            PluginKind::Linear => "linear",
            PluginKind::Output => "output",
        };
        f.write_str(label)
    }
}

/// Base trait all plugins implement.
///
/// # Thread Safety
///
/// Plugins are shared as `Arc<dyn ...>` and invoked from several lanes at once on
/// distinct payloads, so they must be `Send + Sync`. Methods take `&self`; use
/// interior mutability (`parking_lot::Mutex`, `RwLock`, atomics) for state.
///
/// # Example
///
/// ```rust
/// use textpipe::plugins::{Plugin, PluginDescriptor};
/// use textpipe::{Result, Settings};
///
/// struct Noop {
///     descriptor: PluginDescriptor,
/// }
///
/// impl Plugin for Noop {
///     fn descriptor(&self) -> &PluginDescriptor {
///         &self.descriptor
///     }
///
///     fn export_settings(&self, _suppress_warnings: bool) -> Settings {
///         Settings::new()
///     }
///
///     fn import_settings(&self, _settings: &Settings) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// Descriptor with identity and type contract.
    fn descriptor(&self) -> &PluginDescriptor;

    /// Unique plugin name (kebab-case).
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Prepare for a run (load resources, open lookups, reset counters).
    ///
    /// Called once per run after settings inspection has passed.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Check that the current settings are usable.
    ///
    /// Must not perform I/O beyond cheap metadata checks. The returned error's
    /// message is reported as a configuration error naming this stage.
    fn inspect_settings(&self) -> Result<()> {
        Ok(())
    }

    /// Export current settings.
    ///
    /// With `suppress_warnings == false`, non-essential fields that cannot be
    /// represented faithfully are reported through `tracing::warn!`. The map
    /// returned is the same either way.
    fn export_settings(&self, suppress_warnings: bool) -> Settings;

    /// Import settings previously produced by [`Plugin::export_settings`].
    ///
    /// Unknown keys are ignored and missing keys fall back to defaults; a
    /// malformed value of a known key is rejected with `TextpipeError::Settings`.
    fn import_settings(&self, settings: &Settings) -> Result<()>;

    /// Header this plugin declares for its output columns.
    fn output_header(&self) -> Header {
        Header::new()
    }

    /// Whether this plugin defers to its predecessor's header.
    fn inherit_header(&self) -> bool {
        true
    }

    /// End-of-stream hook, called once per stage in stage order after every lane
    /// has drained.
    ///
    /// `trailing` is whatever the previous stage's `finish` returned. Returning
    /// `Some` forwards a payload (e.g. corpus-wide totals) down the chain and, at
    /// the end, into the output after all item blocks.
    fn finish(&self, trailing: Option<Payload>) -> Result<Option<Payload>> {
        Ok(trailing)
    }
}
