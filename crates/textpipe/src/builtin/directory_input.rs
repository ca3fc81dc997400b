//! Directory-of-files input.

use super::descriptor;
use crate::plugins::{InputPlugin, ItemStream, Plugin, PluginDescriptor, SettingsReader, tags, versioned_settings};
use crate::types::{RawItem, Settings};
use crate::{Result, TextpipeError};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How file bytes become text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// Invalid UTF-8 drops the file.
    #[default]
    Utf8,
    /// Invalid sequences are replaced with U+FFFD.
    Utf8Lossy,
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "utf-8-lossy" | "utf8-lossy" => Ok(TextEncoding::Utf8Lossy),
            other => Err(format!("unsupported encoding '{}'", other)),
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextEncoding::Utf8 => f.write_str("utf-8"),
            TextEncoding::Utf8Lossy => f.write_str("utf-8-lossy"),
        }
    }
}

#[derive(Debug, Clone)]
struct DirectorySettings {
    location: Option<PathBuf>,
    extension: String,
    encoding: TextEncoding,
    keep_stream_open: bool,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            location: None,
            extension: "txt".to_string(),
            encoding: TextEncoding::Utf8,
            keep_stream_open: false,
        }
    }
}

/// Reads every file with the configured extension from one directory.
///
/// Files are served in name order. The file name is the item origin.
pub struct DirectoryInput {
    descriptor: PluginDescriptor,
    settings: RwLock<DirectorySettings>,
    files: RwLock<Vec<PathBuf>>,
}

impl DirectoryInput {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor(
                "directory-input",
                "Input",
                "Read the text files of a directory, one item per file.",
                &[],
                tags::TEXT,
            ),
            settings: RwLock::new(DirectorySettings::default()),
            files: RwLock::new(Vec::new()),
        }
    }

    pub fn set_location(&self, location: impl AsRef<Path>) {
        self.settings.write().location = Some(location.as_ref().to_path_buf());
    }

    pub fn set_extension(&self, extension: impl Into<String>) {
        self.settings.write().extension = extension.into();
    }

    fn scan(&self, location: &Path, extension: &str) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(location)? {
            let path = entry?.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension));
            if path.is_file() && matches {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Default for DirectoryInput {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for DirectoryInput {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn inspect_settings(&self) -> Result<()> {
        let settings = self.settings.read();
        match &settings.location {
            None => Err(TextpipeError::settings(self.name(), "no input directory set")),
            Some(location) if !location.is_dir() => Err(TextpipeError::settings(
                self.name(),
                format!("{} is not a directory", location.display()),
            )),
            Some(_) => Ok(()),
        }
    }

    fn initialize(&self) -> Result<()> {
        let settings = self.settings.read().clone();
        let location = settings
            .location
            .ok_or_else(|| TextpipeError::settings(self.name(), "no input directory set"))?;
        let files = self.scan(&location, &settings.extension)?;
        tracing::debug!(
            location = %location.display(),
            extension = %settings.extension,
            files = files.len(),
            "Scanned input directory"
        );
        *self.files.write() = files;
        Ok(())
    }

    fn export_settings(&self, _suppress_warnings: bool) -> Settings {
        let settings = self.settings.read();
        let mut exported = versioned_settings();
        if let Some(location) = &settings.location {
            exported.insert("location".to_string(), location.display().to_string());
        }
        exported.insert("extension".to_string(), settings.extension.clone());
        exported.insert("encoding".to_string(), settings.encoding.to_string());
        exported.insert("keep_stream_open".to_string(), settings.keep_stream_open.to_string());
        exported
    }

    fn import_settings(&self, settings: &Settings) -> Result<()> {
        let reader = SettingsReader::new(
            self.name(),
            settings,
            &["location", "extension", "encoding", "keep_stream_open"],
        )?;
        let extension = reader.string("extension", "txt");
        let imported = DirectorySettings {
            location: reader.optional("location").map(PathBuf::from),
            extension: extension.trim_start_matches('.').to_string(),
            encoding: reader.parse("encoding", TextEncoding::Utf8)?,
            keep_stream_open: reader.bool("keep_stream_open", false)?,
        };
        *self.settings.write() = imported;
        Ok(())
    }
}

impl InputPlugin for DirectoryInput {
    fn item_count(&self) -> usize {
        self.files.read().len()
    }

    fn enumerate(&self) -> Result<ItemStream> {
        let files = self.files.read().clone();
        let encoding = self.settings.read().encoding;
        Ok(Box::new(files.into_iter().map(move |path| read_item(&path, encoding))))
    }

    fn keep_stream_open(&self) -> bool {
        self.settings.read().keep_stream_open
    }
}

fn read_item(path: &Path, encoding: TextEncoding) -> Result<RawItem> {
    let origin = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = std::fs::read(path)?;
    let content = match encoding {
        TextEncoding::Utf8 => String::from_utf8(bytes)
            .map_err(|e| TextpipeError::validation_with_source(format!("{} is not valid UTF-8", origin), e))?,
        TextEncoding::Utf8Lossy => String::from_utf8_lossy(&bytes).into_owned(),
    };
    Ok(RawItem::new(origin, content))
}
