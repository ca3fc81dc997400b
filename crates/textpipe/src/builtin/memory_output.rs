//! In-memory output.

use super::csv_output::CsvFormat;
use super::descriptor;
use crate::Result;
use crate::plugins::{
    CreationMode, Destination, OutputPlugin, Plugin, PluginDescriptor, SettingsReader, tags, versioned_settings,
};
use crate::types::{Header, Payload, Settings};
use parking_lot::{Mutex, RwLock};
use std::io::Write;
use std::sync::Arc;

/// Sink appending to a shared buffer.
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Renders rows like [`super::CsvOutput`] into a buffer that can be read back.
///
/// In `append` mode the buffer survives between runs and its first line is
/// reported as the existing header.
pub struct MemoryOutput {
    descriptor: PluginDescriptor,
    buffer: Arc<Mutex<Vec<u8>>>,
    mode: RwLock<CreationMode>,
    format: RwLock<CsvFormat>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor(
                "memory-output",
                "Output",
                "Collect CSV-formatted rows in memory.",
                &[tags::TEXT, tags::TOKENS, tags::VALUES],
                "",
            ),
            buffer: Arc::new(Mutex::new(Vec::new())),
            mode: RwLock::new(CreationMode::Truncate),
            format: RwLock::new(CsvFormat::default()),
        }
    }

    pub fn set_mode(&self, mode: CreationMode) {
        *self.mode.write() = mode;
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Default for MemoryOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for MemoryOutput {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn export_settings(&self, _suppress_warnings: bool) -> Settings {
        let mut exported = versioned_settings();
        exported.insert("mode".to_string(), self.mode.read().to_string());
        self.format.read().export(&mut exported);
        exported
    }

    fn import_settings(&self, settings: &Settings) -> Result<()> {
        let mut keys = vec!["mode"];
        keys.extend(CsvFormat::KEYS);
        let reader = SettingsReader::new(self.name(), settings, &keys)?;
        let mode = reader.parse("mode", CreationMode::Truncate)?;
        let format = CsvFormat::import(&reader, self.name())?;
        *self.mode.write() = mode;
        *self.format.write() = format;
        Ok(())
    }
}

impl OutputPlugin for MemoryOutput {
    fn open_destination(&self) -> Result<Destination> {
        let existing_header = {
            let mut buffer = self.buffer.lock();
            match *self.mode.read() {
                CreationMode::Truncate => {
                    buffer.clear();
                    None
                }
                CreationMode::Append => String::from_utf8_lossy(&buffer)
                    .lines()
                    .next()
                    .filter(|line| !line.is_empty())
                    .map(str::to_string),
            }
        };
        Ok(Destination {
            sink: Box::new(SharedSink(Arc::clone(&self.buffer))),
            existing_header,
        })
    }

    fn render_header(&self, header: &Header) -> Option<String> {
        self.format.read().header_line(header)
    }

    fn render_body(&self, payload: &Payload) -> Result<Vec<String>> {
        Ok(self.format.read().body_lines(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawItem, Record};

    #[test]
    fn test_destination_writes_into_buffer() {
        let output = MemoryOutput::new();
        let mut destination = output.open_destination().unwrap();
        writeln!(destination.sink, "hello").unwrap();
        assert_eq!(output.lines(), vec!["hello"]);
    }

    #[test]
    fn test_truncate_clears_previous_run() {
        let output = MemoryOutput::new();
        writeln!(output.open_destination().unwrap().sink, "first").unwrap();
        let destination = output.open_destination().unwrap();
        assert!(destination.existing_header.is_none());
        assert!(output.contents().is_empty());
    }

    #[test]
    fn test_append_reports_existing_header() {
        let output = MemoryOutput::new();
        writeln!(output.open_destination().unwrap().sink, "Filename,Segment,Text").unwrap();
        output.set_mode(CreationMode::Append);
        let destination = output.open_destination().unwrap();
        assert_eq!(destination.existing_header.as_deref(), Some("Filename,Segment,Text"));
    }

    #[test]
    fn test_render_body() {
        let output = MemoryOutput::new();
        let mut payload = Payload::from_raw(0, RawItem::new("a.txt", "x"));
        payload.records.push(Record::text("a.txt", 2, "y"));
        assert_eq!(output.render_body(&payload).unwrap(), vec!["a.txt,1,x", "a.txt,2,y"]);
    }
}
