//! Configuration loading and management.
//!
//! A pipeline is described by a [`PipelineConfig`]: engine tuning plus the
//! plugin name and settings for every stage. It can be loaded from TOML, YAML or
//! JSON, discovered as `textpipe.toml` in the working directory hierarchy, or
//! exported from a live [`crate::core::pipeline::Pipeline`].
//!
//! ```toml
//! [engine]
//! max_threads = 8
//! ordering = "input"
//! fail_fast = false
//!
//! [input]
//! plugin = "directory-input"
//! settings = { location = "corpus", extension = "txt" }
//!
//! [[linear]]
//! plugin = "word-count"
//!
//! [output]
//! plugin = "csv-output"
//! settings = { location = "results.csv", mode = "truncate" }
//! ```

use crate::types::{OutputOrdering, Settings};
use crate::{Result, TextpipeError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file searched by [`PipelineConfig::discover`].
pub const CONFIG_FILE_NAME: &str = "textpipe.toml";

/// Engine execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Global worker-thread budget (None = number of CPUs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_threads: Option<usize>,

    /// Output ordering policy.
    #[serde(default)]
    pub ordering: OutputOrdering,

    /// Abort the whole run on the first per-item failure.
    #[serde(default)]
    pub fail_fast: bool,

    /// How many enumerated items may wait for a free lane, and how many
    /// finished items the input-order writer may hold back (None = thread budget).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_threads: None,
            ordering: OutputOrdering::Input,
            fail_fast: false,
            channel_capacity: None,
        }
    }
}

impl EngineConfig {
    /// Effective thread budget.
    pub fn thread_budget(&self) -> usize {
        self.max_threads.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Effective enumeration look-ahead.
    pub fn look_ahead(&self) -> usize {
        self.channel_capacity.unwrap_or_else(|| self.thread_budget()).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_threads == Some(0) {
            return Err(TextpipeError::pipeline_configuration("max_threads must be at least 1"));
        }
        if self.channel_capacity == Some(0) {
            return Err(TextpipeError::pipeline_configuration("channel_capacity must be at least 1"));
        }
        Ok(())
    }
}

/// One stage: which plugin, with which settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Registered plugin name.
    pub plugin: String,

    #[serde(default)]
    pub settings: Settings,
}

impl StageConfig {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            settings: Settings::new(),
        }
    }

    /// Builder-style settings entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// A complete pipeline description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    pub input: StageConfig,

    #[serde(default)]
    pub linear: Vec<StageConfig>,

    pub output: StageConfig,
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `TextpipeError::Validation` if the file can't be read or is invalid TOML.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        Self::from_toml_str(&content)
            .map_err(|e| TextpipeError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| TextpipeError::validation(format!("Invalid YAML in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_json::from_str(&content)
            .map_err(|e| TextpipeError::validation(format!("Invalid JSON in {}: {}", path.as_ref().display(), e)))
    }

    /// Load configuration choosing the format from the file extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("toml") => Self::from_toml_file(path),
            Some("yaml") | Some("yml") => Self::from_yaml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(TextpipeError::validation(format!(
                "Unsupported config format for {} (expected .toml, .yaml, .yml or .json)",
                path.display()
            ))),
        }
    }

    /// Parse TOML text.
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize to TOML text.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Discover `textpipe.toml` in the current directory or any parent.
    ///
    /// # Returns
    ///
    /// - `Some(config)` if found
    /// - `None` if no config file found
    pub fn discover() -> Result<Option<Self>> {
        let mut current = std::env::current_dir().map_err(TextpipeError::Io)?;

        loop {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Ok(Some(Self::from_toml_file(candidate)?));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| TextpipeError::validation(format!("Failed to read config file {}: {}", path.display(), e)))
}
