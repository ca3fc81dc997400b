//! Lowercasing stage.

use super::descriptor;
use crate::Result;
use crate::plugins::{LinearPlugin, Plugin, PluginDescriptor, SettingsReader, tags, versioned_settings};
use crate::types::{Payload, Settings, ThreadBudget};

/// Lowercases every field of every record.
pub struct Lowercase {
    descriptor: PluginDescriptor,
}

impl Lowercase {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor(
                "lowercase",
                "Normalization",
                "Convert all text to lowercase.",
                &[tags::TEXT, tags::TOKENS],
                tags::TEXT,
            ),
        }
    }
}

impl Default for Lowercase {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for Lowercase {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn export_settings(&self, _suppress_warnings: bool) -> Settings {
        versioned_settings()
    }

    fn import_settings(&self, settings: &Settings) -> Result<()> {
        SettingsReader::new(self.name(), settings, &[])?;
        Ok(())
    }
}

impl LinearPlugin for Lowercase {
    fn run(&self, mut payload: Payload, _threads: ThreadBudget) -> Result<Payload> {
        for record in &mut payload.records {
            for field in &mut record.fields {
                *field = field.to_lowercase();
            }
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawItem;

    #[test]
    fn test_lowercases_fields() {
        let payload = Payload::from_raw(0, RawItem::new("A.txt", "Hello WORLD"));
        let out = Lowercase::new().run(payload, ThreadBudget::single()).unwrap();
        assert_eq!(out.records[0].fields, vec!["hello world"]);
        assert_eq!(out.records[0].origin, "A.txt");
    }
}
