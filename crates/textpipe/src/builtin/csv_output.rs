//! CSV file output.

use super::descriptor;
use crate::plugins::{
    CreationMode, Destination, OutputPlugin, Plugin, PluginDescriptor, SettingsReader, tags, versioned_settings,
};
use crate::types::{Header, Payload, Record, Settings};
use crate::{Result, TextpipeError};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Leading columns of every row.
const PREFIX_COLUMNS: [&str; 2] = ["Filename", "Segment"];

/// Column title used when no stage declares a header.
const DEFAULT_COLUMN: &str = "Text";

/// Row formatting shared by the CSV-style outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvFormat {
    pub delimiter: char,
    pub include_header: bool,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: ',',
            include_header: true,
        }
    }
}

impl CsvFormat {
    pub(crate) const KEYS: [&'static str; 2] = ["delimiter", "include_header"];

    pub(crate) fn import(reader: &SettingsReader<'_>, plugin_name: &str) -> Result<Self> {
        let delimiter = reader.string("delimiter", ",");
        let mut chars = delimiter.chars();
        let delimiter = match (chars.next(), chars.next()) {
            (Some(c), None) if c != '"' && c != '\n' && c != '\r' => c,
            _ => {
                return Err(TextpipeError::settings(
                    plugin_name,
                    format!("delimiter must be a single character other than a quote or newline, got '{}'", delimiter),
                ));
            }
        };
        Ok(Self {
            delimiter,
            include_header: reader.bool("include_header", true)?,
        })
    }

    pub(crate) fn export(&self, settings: &mut Settings) {
        settings.insert("delimiter".to_string(), self.delimiter.to_string());
        settings.insert("include_header".to_string(), self.include_header.to_string());
    }

    /// `Filename,Segment` followed by the header columns in key order.
    pub fn header_line(&self, header: &Header) -> Option<String> {
        if !self.include_header {
            return None;
        }
        let mut columns: Vec<(&usize, &String)> = header.iter().collect();
        columns.sort_by_key(|(key, _)| **key);

        let mut fields: Vec<String> = PREFIX_COLUMNS.iter().map(|c| c.to_string()).collect();
        if columns.is_empty() {
            fields.push(DEFAULT_COLUMN.to_string());
        } else {
            fields.extend(columns.into_iter().map(|(_, name)| name.clone()));
        }
        Some(self.join(&fields))
    }

    pub fn record_line(&self, record: &Record) -> String {
        let mut fields = Vec::with_capacity(record.fields.len() + 2);
        fields.push(record.origin.clone());
        fields.push(record.segment.to_string());
        fields.extend(record.fields.iter().cloned());
        self.join(&fields)
    }

    pub fn body_lines(&self, payload: &Payload) -> Vec<String> {
        payload.records.iter().map(|r| self.record_line(r)).collect()
    }

    fn join(&self, fields: &[String]) -> String {
        let delimiter = self.delimiter.to_string();
        fields
            .iter()
            .map(|f| self.quote(f))
            .collect::<Vec<_>>()
            .join(&delimiter)
    }

    fn quote(&self, field: &str) -> String {
        if field.contains(self.delimiter) || field.contains(['"', '\n', '\r']) {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CsvOutputSettings {
    location: Option<PathBuf>,
    mode: CreationMode,
    format: CsvFormat,
}

/// Writes rows to a CSV file.
///
/// Settings: `location` (required), `mode` (`truncate` or `append`),
/// `delimiter`, `include_header`.
pub struct CsvOutput {
    descriptor: PluginDescriptor,
    settings: RwLock<CsvOutputSettings>,
}

impl CsvOutput {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor(
                "csv-output",
                "Output",
                "Write one CSV row per record, prefixed with the file name and segment number.",
                &[tags::TEXT, tags::TOKENS, tags::VALUES],
                "",
            ),
            settings: RwLock::new(CsvOutputSettings::default()),
        }
    }

    pub fn set_location(&self, location: impl AsRef<Path>) {
        self.settings.write().location = Some(location.as_ref().to_path_buf());
    }

    pub fn set_mode(&self, mode: CreationMode) {
        self.settings.write().mode = mode;
    }

    pub fn location(&self) -> Option<PathBuf> {
        self.settings.read().location.clone()
    }
}

impl Default for CsvOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for CsvOutput {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn inspect_settings(&self) -> Result<()> {
        let settings = self.settings.read();
        let location = settings
            .location
            .as_ref()
            .ok_or_else(|| TextpipeError::settings(self.name(), "no output location set"))?;

        if location.is_dir() {
            return Err(TextpipeError::settings(
                self.name(),
                format!("output location {} is a directory", location.display()),
            ));
        }
        if let Some(parent) = location.parent().filter(|p| !p.as_os_str().is_empty())
            && !parent.is_dir()
        {
            return Err(TextpipeError::settings(
                self.name(),
                format!("output directory {} does not exist", parent.display()),
            ));
        }
        Ok(())
    }

    fn export_settings(&self, _suppress_warnings: bool) -> Settings {
        let settings = self.settings.read();
        let mut exported = versioned_settings();
        if let Some(location) = &settings.location {
            exported.insert("location".to_string(), location.display().to_string());
        }
        exported.insert("mode".to_string(), settings.mode.to_string());
        settings.format.export(&mut exported);
        exported
    }

    fn import_settings(&self, settings: &Settings) -> Result<()> {
        let mut keys = vec!["location", "mode"];
        keys.extend(CsvFormat::KEYS);
        let reader = SettingsReader::new(self.name(), settings, &keys)?;

        let imported = CsvOutputSettings {
            location: reader.optional("location").map(PathBuf::from),
            mode: reader.parse("mode", CreationMode::Truncate)?,
            format: CsvFormat::import(&reader, self.name())?,
        };
        *self.settings.write() = imported;
        Ok(())
    }
}

impl OutputPlugin for CsvOutput {
    fn open_destination(&self) -> Result<Destination> {
        let settings = self.settings.read().clone();
        let location = settings
            .location
            .ok_or_else(|| TextpipeError::settings(self.name(), "no output location set"))?;

        let open_error = |e: std::io::Error| {
            TextpipeError::output_write(format!("failed to open {}", location.display()), e)
        };

        let (file, existing_header) = match settings.mode {
            CreationMode::Truncate => (File::create(&location).map_err(open_error)?, None),
            CreationMode::Append => {
                let existing_header = read_first_line(&location).map_err(open_error)?;
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&location)
                    .map_err(open_error)?;
                (file, existing_header)
            }
        };

        tracing::debug!(
            location = %location.display(),
            mode = %settings.mode,
            existing_header = existing_header.is_some(),
            "Opened CSV destination"
        );

        Ok(Destination {
            sink: Box::new(BufWriter::new(file)),
            existing_header,
        })
    }

    fn render_header(&self, header: &Header) -> Option<String> {
        self.settings.read().format.header_line(header)
    }

    fn render_body(&self, payload: &Payload) -> Result<Vec<String>> {
        Ok(self.settings.read().format.body_lines(payload))
    }
}

/// First line of an existing, non-empty file.
fn read_first_line(path: &Path) -> std::io::Result<Option<String>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line)?;
    let line = line.trim_end_matches(['\n', '\r']);
    Ok((!line.is_empty()).then(|| line.to_string()))
}
