//! In-memory input.

use super::descriptor;
use crate::{Result, TextpipeError};
use crate::plugins::{InputPlugin, ItemStream, Plugin, PluginDescriptor, SettingsReader, tags, versioned_settings};
use crate::types::{RawItem, Settings};
use parking_lot::RwLock;

const DEFAULT_SEPARATOR: &str = "|";

/// Serves a fixed list of items.
///
/// When configured through settings, `texts` holds the item texts joined by
/// `separator` (default `|`) and `origins` the matching origins. Without
/// `origins`, origins are generated as `item1`, `item2`, ... A separator or
/// backslash inside a value is escaped with a backslash on export.
pub struct MemoryInput {
    descriptor: PluginDescriptor,
    items: RwLock<Vec<RawItem>>,
    separator: RwLock<String>,
}

impl MemoryInput {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor(
                "memory-input",
                "Input",
                "Serve items held in memory.",
                &[],
                tags::TEXT,
            ),
            items: RwLock::new(Vec::new()),
            separator: RwLock::new(DEFAULT_SEPARATOR.to_string()),
        }
    }

    pub fn from_items(items: impl IntoIterator<Item = RawItem>) -> Self {
        let input = Self::new();
        *input.items.write() = items.into_iter().collect();
        input
    }

    /// Items with generated origins `item1`, `item2`, ...
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_items(generated_items(texts))
    }

    pub fn push(&self, item: RawItem) {
        self.items.write().push(item);
    }
}

impl Default for MemoryInput {
    fn default() -> Self {
        Self::new()
    }
}

fn generated_items<I, S>(texts: I) -> Vec<RawItem>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| RawItem::new(format!("item{}", i + 1), text))
        .collect()
}

impl Plugin for MemoryInput {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn export_settings(&self, _suppress_warnings: bool) -> Settings {
        let separator = self.separator.read().clone();
        let items = self.items.read();

        let mut exported = versioned_settings();
        exported.insert(
            "texts".to_string(),
            join_escaped(items.iter().map(|item| item.content.as_str()), &separator),
        );
        exported.insert(
            "origins".to_string(),
            join_escaped(items.iter().map(|item| item.origin.as_str()), &separator),
        );
        exported.insert("separator".to_string(), separator);
        exported
    }

    fn import_settings(&self, settings: &Settings) -> Result<()> {
        let reader = SettingsReader::new(self.name(), settings, &["texts", "origins", "separator"])?;
        let separator = reader
            .optional("separator")
            .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());
        let texts = reader.optional("texts");

        let items = match reader.optional("origins") {
            Some(origins) => {
                let origins = split_escaped(&origins, &separator);
                let texts = split_escaped(texts.as_deref().unwrap_or_default(), &separator);
                if origins.len() != texts.len() {
                    return Err(TextpipeError::settings(
                        self.name(),
                        format!("{} origins given for {} texts", origins.len(), texts.len()),
                    ));
                }
                origins.into_iter().zip(texts).map(|(o, t)| RawItem::new(o, t)).collect()
            }
            None => match texts {
                Some(texts) => generated_items(split_escaped(&texts, &separator)),
                None => Vec::new(),
            },
        };
        *self.items.write() = items;
        *self.separator.write() = separator;
        Ok(())
    }
}

fn join_escaped<'a>(values: impl Iterator<Item = &'a str>, separator: &str) -> String {
    let escaped_separator = format!("\\{}", separator);
    values
        .map(|v| v.replace('\\', "\\\\").replace(separator, &escaped_separator))
        .collect::<Vec<_>>()
        .join(separator)
}

fn split_escaped(joined: &str, separator: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut rest = joined;
    while !rest.is_empty() {
        if let Some(escaped) = rest.strip_prefix('\\') {
            if let Some(sep_tail) = escaped.strip_prefix(separator) {
                current.push_str(separator);
                rest = sep_tail;
            } else {
                let mut chars = escaped.chars();
                match chars.next() {
                    Some(c) => current.push(c),
                    None => current.push('\\'),
                }
                rest = chars.as_str();
            }
        } else if let Some(tail) = rest.strip_prefix(separator) {
            values.push(std::mem::take(&mut current));
            rest = tail;
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                current.push(c);
            }
            rest = chars.as_str();
        }
    }
    values.push(current);
    values
}

impl InputPlugin for MemoryInput {
    fn item_count(&self) -> usize {
        self.items.read().len()
    }

    fn enumerate(&self) -> Result<ItemStream> {
        let items = self.items.read().clone();
        Ok(Box::new(items.into_iter().map(Ok)))
    }
}
