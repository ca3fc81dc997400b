//! Plugin system.
//!
//! Every stage of a pipeline is a plugin. All plugins share the [`Plugin`] base
//! trait (descriptor, lifecycle hooks, settings exchange, header contract) and
//! implement exactly one role trait:
//!
//! - [`InputPlugin`] - enumerates raw items
//! - [`LinearPlugin`] - transforms one payload into another
//! - [`OutputPlugin`] - renders rows and opens the destination
//!
//! Plugins are shared as `Arc<dyn Trait>` and called from many lanes at once,
//! so their methods take `&self` and any mutable state uses interior
//! mutability.
//!
//! # Type tags
//!
//! Compatibility between adjacent stages is decided by string tags: a stage's
//! `output_type` must appear in the next stage's `input_types`. The built-in
//! plugins use the tags in [`tags`].

mod input;
mod linear;
mod output;
pub mod registry;
mod settings;
mod stage;
mod traits;

pub use input::{InputPlugin, ItemStream};
pub use linear::LinearPlugin;
pub use output::{CreationMode, Destination, OutputPlugin};
pub use registry::{PluginRegistry, get_plugin_registry};
pub use settings::{SETTINGS_VERSION, SETTINGS_VERSION_KEY, SettingsReader, versioned_settings};
pub use stage::Stage;
pub use traits::{Plugin, PluginDescriptor, PluginKind};

/// Type tags used by the built-in plugins.
pub mod tags {
    /// Free text, one record per segment.
    pub const TEXT: &str = "text";
    /// One record per token, the token as the only field.
    pub const TOKENS: &str = "tokens";
    /// Computed value rows, one field per header column.
    pub const VALUES: &str = "values";
}
