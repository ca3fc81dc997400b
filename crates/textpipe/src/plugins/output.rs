//! Output plugin trait and destination types.

use crate::Result;
use crate::plugins::Plugin;
use crate::types::{Header, Payload};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// How the output destination is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationMode {
    /// Create the destination, truncating existing content.
    #[default]
    Truncate,
    /// Create the destination if missing, otherwise append to it.
    Append,
}

impl std::str::FromStr for CreationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "truncate" | "create" => Ok(CreationMode::Truncate),
            "append" => Ok(CreationMode::Append),
            other => Err(format!("unknown mode '{}' (expected 'truncate' or 'append')", other)),
        }
    }
}

impl std::fmt::Display for CreationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreationMode::Truncate => f.write_str("truncate"),
            CreationMode::Append => f.write_str("append"),
        }
    }
}

/// An opened output destination, handed over to the writer.
pub struct Destination {
    /// Byte sink. Owned by the writer once handed over.
    pub sink: Box<dyn Write + Send>,
    /// First line of pre-existing content, when appending to a populated
    /// destination. The writer treats it as an already written header.
    pub existing_header: Option<String>,
}

impl Destination {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink,
            existing_header: None,
        }
    }
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("existing_header", &self.existing_header)
            .finish_non_exhaustive()
    }
}

/// Trait for plugins that consume payloads and describe how they are written.
///
/// Output plugins format; the engine's thread-safe writer performs every
/// physical write. The plugin never holds on to the sink it opens.
pub trait OutputPlugin: Plugin {
    /// Open (create, truncate or append) the destination.
    ///
    /// Called once per run, after settings inspection and header resolution.
    fn open_destination(&self) -> Result<Destination>;

    /// Render the header line, or `None` to write no header.
    fn render_header(&self, header: &Header) -> Option<String>;

    /// Render the body lines of one payload. Lines must not contain the line
    /// terminator.
    fn render_body(&self, payload: &Payload) -> Result<Vec<String>>;
}
