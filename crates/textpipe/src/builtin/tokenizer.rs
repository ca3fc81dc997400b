//! Word tokenization.

use super::descriptor;
use crate::Result;
use crate::plugins::{LinearPlugin, Plugin, PluginDescriptor, SettingsReader, tags, versioned_settings};
use crate::types::{Payload, Record, Settings, ThreadBudget};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Splits text into word tokens, one record per token.
///
/// A token is a maximal run of alphanumeric characters and apostrophes.
/// Tokens shorter than `min_length` characters are discarded.
pub struct Tokenizer {
    descriptor: PluginDescriptor,
    min_length: AtomicUsize,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor(
                "tokenizer",
                "Segmentation",
                "Split text into word tokens.",
                &[tags::TEXT],
                tags::TOKENS,
            ),
            min_length: AtomicUsize::new(1),
        }
    }

    fn tokens<'a>(&self, text: &'a str) -> impl Iterator<Item = &'a str> {
        let min_length = self.min_length.load(Ordering::Relaxed);
        text.split(|c: char| !c.is_alphanumeric() && c != '\'')
            .map(|t| t.trim_matches('\''))
            .filter(move |t| !t.is_empty() && t.chars().count() >= min_length)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for Tokenizer {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn export_settings(&self, _suppress_warnings: bool) -> Settings {
        let mut exported = versioned_settings();
        exported.insert(
            "min_length".to_string(),
            self.min_length.load(Ordering::Relaxed).to_string(),
        );
        exported
    }

    fn import_settings(&self, settings: &Settings) -> Result<()> {
        let reader = SettingsReader::new(self.name(), settings, &["min_length"])?;
        let min_length: usize = reader.parse("min_length", 1)?;
        self.min_length.store(min_length, Ordering::Relaxed);
        Ok(())
    }
}

impl LinearPlugin for Tokenizer {
    fn run(&self, payload: Payload, _threads: ThreadBudget) -> Result<Payload> {
        let mut records = Vec::new();
        for record in &payload.records {
            for field in &record.fields {
                records.extend(
                    self.tokens(field)
                        .map(|token| Record::text(record.origin.clone(), record.segment, token)),
                );
            }
        }
        Ok(payload.with_records(records))
    }
}
