//! Error types for textpipe.
//!
//! All fallible operations return [`TextpipeError`]. The variants follow the
//! pipeline's failure taxonomy:
//!
//! - `Configuration` - incompatible type chain, failed settings inspection,
//!   unknown plugin, invalid engine settings. Raised before any I/O.
//! - `Processing` - a Linear stage failed for one item. The only recoverable
//!   variant: the item is dropped and the run continues unless fail-fast is set.
//! - `OutputWrite` - the writer could not write to its destination. Aborts the run.
//! - `Settings` - a plugin rejected imported settings.
//!
//! **System errors bubble up unchanged:** `TextpipeError::Io` wraps
//! `std::io::Error` from everything except the output writer, which reports
//! `OutputWrite` so the origin of a fatal write failure stays visible.
//!
//! # Example
//!
//! ```rust
//! use textpipe::{Result, TextpipeError};
//!
//! fn read_corpus_file(path: &str) -> Result<String> {
//!     let content = std::fs::read_to_string(path)?;
//!     if content.is_empty() {
//!         return Err(TextpipeError::validation(format!("File is empty: {}", path)));
//!     }
//!     Ok(content)
//! }
//! ```
use thiserror::Error;

/// Result type alias using `TextpipeError`.
pub type Result<T> = std::result::Result<T, TextpipeError>;

/// Main error type for all textpipe operations.
#[derive(Debug, Error)]
pub enum TextpipeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error{}: {message}", stage_suffix(.stage))]
    Configuration { message: String, stage: Option<String> },

    #[error("Processing error in '{plugin_name}' for item {item}: {message}")]
    Processing {
        message: String,
        plugin_name: String,
        item: String,
    },

    #[error("Output write error: {message}")]
    OutputWrite {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings error in '{plugin_name}': {message}")]
    Settings { message: String, plugin_name: String },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Plugin error in '{plugin_name}': {message}")]
    Plugin { message: String, plugin_name: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("{0}")]
    Other(String),
}

fn stage_suffix(stage: &Option<String>) -> String {
    match stage {
        Some(stage) => format!(" in {}", stage),
        None => String::new(),
    }
}

impl From<serde_json::Error> for TextpipeError {
    fn from(err: serde_json::Error) -> Self {
        TextpipeError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<toml::ser::Error> for TextpipeError {
    fn from(err: toml::ser::Error) -> Self {
        TextpipeError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl TextpipeError {
    error_constructor!(validation, Validation);
    error_constructor!(serialization, Serialization);

    /// Create a configuration error attributed to a stage.
    pub fn configuration<S: Into<String>, T: Into<String>>(stage: T, message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            stage: Some(stage.into()),
        }
    }

    /// Create a configuration error that concerns the pipeline as a whole.
    pub fn pipeline_configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            stage: None,
        }
    }

    /// Create a settings import error for a plugin.
    pub fn settings<S: Into<String>, P: Into<String>>(plugin_name: P, message: S) -> Self {
        Self::Settings {
            message: message.into(),
            plugin_name: plugin_name.into(),
        }
    }

    /// Create a plugin lifecycle error.
    pub fn plugin<S: Into<String>, P: Into<String>>(plugin_name: P, message: S) -> Self {
        Self::Plugin {
            message: message.into(),
            plugin_name: plugin_name.into(),
        }
    }

    /// Create an output write error.
    pub fn output_write<S: Into<String>>(message: S, source: std::io::Error) -> Self {
        Self::OutputWrite {
            message: message.into(),
            source,
        }
    }

    /// Whether this error aborts the whole run.
    ///
    /// Only per-item processing failures are recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TextpipeError::Processing { .. })
    }
}
