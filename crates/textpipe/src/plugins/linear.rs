//! Linear plugin trait.

use crate::Result;
use crate::plugins::Plugin;
use crate::types::{Payload, ThreadBudget};

/// Trait for plugins that transform one payload into another.
///
/// # Concurrency
///
/// `run` is invoked concurrently for different items, never twice at once for
/// the same payload. `threads` is the most threads this call may use for its own
/// parallelism; it may use fewer. Calls run on blocking worker threads, so
/// CPU-heavy or blocking work is fine here.
///
/// # Errors
///
/// An error (or a panic) affects only the current item: it is logged, the item is
/// dropped from output and the run goes on unless fail-fast is configured.
///
/// # Example
///
/// ```rust
/// use textpipe::plugins::{LinearPlugin, Plugin, PluginDescriptor};
/// use textpipe::{Payload, Result, Settings, ThreadBudget};
///
/// struct Trim {
///     descriptor: PluginDescriptor,
/// }
///
/// impl Plugin for Trim {
///     fn descriptor(&self) -> &PluginDescriptor { &self.descriptor }
///     fn export_settings(&self, _: bool) -> Settings { Settings::new() }
///     fn import_settings(&self, _: &Settings) -> Result<()> { Ok(()) }
/// }
///
/// impl LinearPlugin for Trim {
///     fn run(&self, mut payload: Payload, _threads: ThreadBudget) -> Result<Payload> {
///         for record in &mut payload.records {
///             for field in &mut record.fields {
///                 *field = field.trim().to_string();
///             }
///         }
///         Ok(payload)
///     }
/// }
/// ```
pub trait LinearPlugin: Plugin {
    /// Transform a payload.
    fn run(&self, payload: Payload, threads: ThreadBudget) -> Result<Payload>;

    /// Latest status message, polled after each invocation.
    fn status(&self) -> Option<String> {
        None
    }
}
