//! Fixed-size segmentation.

use super::descriptor;
use crate::plugins::{LinearPlugin, Plugin, PluginDescriptor, SettingsReader, tags, versioned_settings};
use crate::types::{Payload, Record, Settings, ThreadBudget};
use crate::{Result, TextpipeError};
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_WORDS_PER_SEGMENT: usize = 100;

/// Splits text into segments of `words_per_segment` words.
///
/// Segments are renumbered from 1 for every origin. A record with no words
/// yields no segment.
pub struct Segmenter {
    descriptor: PluginDescriptor,
    words_per_segment: AtomicUsize,
}

impl Segmenter {
    pub fn new() -> Self {
        Self::with_words_per_segment(DEFAULT_WORDS_PER_SEGMENT)
    }

    pub fn with_words_per_segment(words: usize) -> Self {
        Self {
            descriptor: descriptor(
                "segmenter",
                "Segmentation",
                "Split each text into segments with a fixed number of words.",
                &[tags::TEXT],
                tags::TEXT,
            ),
            words_per_segment: AtomicUsize::new(words.max(1)),
        }
    }

    pub fn words_per_segment(&self) -> usize {
        self.words_per_segment.load(Ordering::Relaxed)
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for Segmenter {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn export_settings(&self, _suppress_warnings: bool) -> Settings {
        let mut exported = versioned_settings();
        exported.insert("words_per_segment".to_string(), self.words_per_segment().to_string());
        exported
    }

    fn import_settings(&self, settings: &Settings) -> Result<()> {
        let reader = SettingsReader::new(self.name(), settings, &["words_per_segment"])?;
        let words: usize = reader.parse("words_per_segment", DEFAULT_WORDS_PER_SEGMENT)?;
        if words == 0 {
            return Err(TextpipeError::settings(self.name(), "words_per_segment must be at least 1"));
        }
        self.words_per_segment.store(words, Ordering::Relaxed);
        Ok(())
    }
}

impl LinearPlugin for Segmenter {
    fn run(&self, mut payload: Payload, _threads: ThreadBudget) -> Result<Payload> {
        let size = self.words_per_segment();
        let mut records = Vec::new();
        let mut current_origin: Option<String> = None;
        let mut segment = 0usize;

        for record in std::mem::take(&mut payload.records) {
            if current_origin.as_deref() != Some(record.origin.as_str()) {
                current_origin = Some(record.origin.clone());
                segment = 0;
            }
            let text = record.joined();
            let words: Vec<&str> = text.split_whitespace().collect();
            for chunk in words.chunks(size) {
                segment += 1;
                records.push(Record::text(record.origin.clone(), segment, chunk.join(" ")));
            }
        }

        Ok(payload.with_records(records))
    }
}
