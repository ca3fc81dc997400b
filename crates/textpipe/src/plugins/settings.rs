//! Settings import helpers.
//!
//! Compatibility rule shared by every plugin:
//!
//! - unknown keys are ignored (logged at debug level),
//! - missing keys fall back to the plugin's defaults,
//! - malformed values of known keys are rejected,
//! - `settings_version` newer than the plugin understands is rejected.

use crate::types::Settings;
use crate::{Result, TextpipeError};
use std::str::FromStr;

/// Reserved key carrying the settings format version.
pub const SETTINGS_VERSION_KEY: &str = "settings_version";

/// Settings format version written by built-in plugins.
pub const SETTINGS_VERSION: u32 = 1;

/// Typed, rule-enforcing view over imported settings.
///
/// ```rust
/// use textpipe::plugins::SettingsReader;
/// use textpipe::Settings;
///
/// let mut settings = Settings::new();
/// settings.insert("words_per_segment".to_string(), "50".to_string());
/// settings.insert("colour".to_string(), "blue".to_string());
///
/// let reader = SettingsReader::new("segmenter", &settings, &["words_per_segment"]).unwrap();
/// assert_eq!(reader.parse("words_per_segment", 100usize).unwrap(), 50);
/// assert_eq!(reader.string("missing", "fallback"), "fallback");
/// ```
pub struct SettingsReader<'a> {
    plugin_name: &'a str,
    settings: &'a Settings,
}

impl<'a> SettingsReader<'a> {
    /// Create a reader, checking the version key and logging unknown keys.
    pub fn new(plugin_name: &'a str, settings: &'a Settings, known_keys: &[&str]) -> Result<Self> {
        if let Some(raw) = settings.get(SETTINGS_VERSION_KEY) {
            let version: u32 = raw.trim().parse().map_err(|_| {
                TextpipeError::settings(plugin_name, format!("invalid {} '{}'", SETTINGS_VERSION_KEY, raw))
            })?;
            if version > SETTINGS_VERSION {
                return Err(TextpipeError::settings(
                    plugin_name,
                    format!(
                        "settings version {} is newer than supported version {}",
                        version, SETTINGS_VERSION
                    ),
                ));
            }
        }

        for key in settings.keys() {
            if key != SETTINGS_VERSION_KEY && !known_keys.contains(&key.as_str()) {
                tracing::debug!(plugin = plugin_name, key = %key, "Ignoring unknown settings key");
            }
        }

        Ok(Self { plugin_name, settings })
    }

    /// String value, or `default` when missing.
    pub fn string(&self, key: &str, default: &str) -> String {
        self.settings
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Optional string value; empty strings count as missing.
    pub fn optional(&self, key: &str) -> Option<String> {
        self.settings.get(key).filter(|v| !v.is_empty()).cloned()
    }

    /// Parse a value with `FromStr`, or return `default` when missing.
    pub fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.settings.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|e| {
                TextpipeError::settings(self.plugin_name, format!("invalid value '{}' for '{}': {}", raw, key, e))
            }),
        }
    }

    /// Boolean value accepting `true/false`, `yes/no`, `1/0`.
    pub fn bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.settings.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(TextpipeError::settings(
                    self.plugin_name,
                    format!("invalid boolean '{}' for '{}'", v, key),
                )),
            },
        }
    }
}

/// Start an export map with the version key in front.
pub fn versioned_settings() -> Settings {
    let mut settings = Settings::new();
    settings.insert(SETTINGS_VERSION_KEY.to_string(), SETTINGS_VERSION.to_string());
    settings
}
