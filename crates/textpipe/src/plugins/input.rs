//! Input plugin trait.

use crate::Result;
use crate::plugins::Plugin;
use crate::types::RawItem;

/// Lazy, finite, non-restartable sequence of raw items.
///
/// An `Err` element is a failure for that single item; enumeration continues.
pub type ItemStream = Box<dyn Iterator<Item = Result<RawItem>> + Send>;

/// Trait for plugins that produce raw text items.
///
/// The orchestrator calls [`InputPlugin::enumerate`] exactly once per run, on a
/// single coordinating thread. Workers never touch the stream.
pub trait InputPlugin: Plugin {
    /// Number of items the source will yield, known after
    /// [`Plugin::initialize`]. Used for progress reporting only.
    fn item_count(&self) -> usize;

    /// Start enumerating the source.
    fn enumerate(&self) -> Result<ItemStream>;

    /// Whether the exhausted stream (and the source handle it owns) should stay
    /// alive until every stage has finished.
    fn keep_stream_open(&self) -> bool {
        false
    }
}
