//! Thread-safe output writer.
//!
//! The writer is the only owner of the output destination. Lanes hand it
//! finished row blocks; it serializes physical writes, writes the header exactly
//! once ahead of the first body row, keeps each item's rows contiguous and,
//! in input-order mode, holds early finishers in a reorder buffer until the write
//! cursor reaches them.

use crate::plugins::Destination;
use crate::types::OutputOrdering;
use crate::{Result, TextpipeError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::Write;

/// Counters reported when the writer is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Whether this writer wrote a header line itself.
    pub header_written: bool,
    pub items_written: usize,
    pub rows_written: usize,
}

struct WriterState {
    sink: Option<Box<dyn Write + Send>>,
    header: Option<String>,
    header_done: bool,
    next_index: usize,
    pending: BTreeMap<usize, Option<Vec<String>>>,
    stats: WriterStats,
}

impl WriterState {
    fn sink(&mut self) -> Result<&mut Box<dyn Write + Send>> {
        self.sink.as_mut().ok_or_else(|| {
            TextpipeError::output_write(
                "writer already closed",
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "writer closed"),
            )
        })
    }

    fn ensure_header(&mut self) -> Result<()> {
        if self.header_done {
            return Ok(());
        }
        if let Some(header) = self.header.take() {
            let sink = self.sink()?;
            writeln!(sink, "{}", header)
                .map_err(|e| TextpipeError::output_write("failed to write header", e))?;
            self.stats.header_written = true;
        }
        self.header_done = true;
        Ok(())
    }

    fn write_block(&mut self, lines: &[String]) -> Result<()> {
        self.ensure_header()?;
        let sink = self.sink()?;
        for line in lines {
            writeln!(sink, "{}", line).map_err(|e| TextpipeError::output_write("failed to write row", e))?;
        }
        self.stats.items_written += 1;
        self.stats.rows_written += lines.len();
        Ok(())
    }

    fn drain_ready(&mut self) -> Result<()> {
        while let Some(block) = self.pending.remove(&self.next_index) {
            if let Some(lines) = block {
                self.write_block(&lines)?;
            }
            self.next_index += 1;
        }
        Ok(())
    }
}

/// Serializes concurrent writes into one destination.
pub struct ThreadsafeOutputWriter {
    ordering: OutputOrdering,
    state: Mutex<WriterState>,
}

impl ThreadsafeOutputWriter {
    /// Take ownership of `destination`.
    ///
    /// `header` is written before the first body row unless the destination
    /// already carries a header (append to a populated destination).
    pub fn new(destination: Destination, header: Option<String>, ordering: OutputOrdering) -> Self {
        let Destination { sink, existing_header } = destination;

        let header = match (existing_header, header) {
            (Some(existing), Some(wanted)) => {
                if existing.trim_end() != wanted.trim_end() {
                    tracing::warn!(
                        existing = %existing,
                        expected = %wanted,
                        "Appending to destination whose header differs from the pipeline header"
                    );
                }
                None
            }
            (Some(_), None) => None,
            (None, header) => header,
        };

        Self {
            ordering,
            state: Mutex::new(WriterState {
                sink: Some(sink),
                header,
                header_done: false,
                next_index: 0,
                pending: BTreeMap::new(),
                stats: WriterStats::default(),
            }),
        }
    }

    pub fn ordering(&self) -> OutputOrdering {
        self.ordering
    }

    /// Write the row block of item `index`.
    ///
    /// In arrival mode the block is written immediately. In input mode it is
    /// written once every lower index has been written or skipped.
    pub fn write_item(&self, index: usize, lines: Vec<String>) -> Result<()> {
        let mut state = self.state.lock();
        match self.ordering {
            OutputOrdering::Arrival => state.write_block(&lines),
            OutputOrdering::Input => {
                if index < state.next_index || state.pending.contains_key(&index) {
                    return Err(TextpipeError::Other(format!("item {} delivered to writer twice", index)));
                }
                state.pending.insert(index, Some(lines));
                state.drain_ready()
            }
        }
    }

    /// Mark item `index` as producing no output (dropped or cancelled).
    ///
    /// Required in input mode so the write cursor can move past it.
    pub fn skip_item(&self, index: usize) -> Result<()> {
        if self.ordering == OutputOrdering::Arrival {
            return Ok(());
        }
        let mut state = self.state.lock();
        if index < state.next_index || state.pending.contains_key(&index) {
            return Ok(());
        }
        state.pending.insert(index, None);
        state.drain_ready()
    }

    /// Write lines after every item block (trailing end-of-stream rows).
    ///
    /// Anything still held in the reorder buffer is flushed first, in index order.
    pub fn write_trailer(&self, lines: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        Self::flush_pending(&mut state)?;
        state.ensure_header()?;
        let sink = state.sink()?;
        for line in lines {
            writeln!(sink, "{}", line).map_err(|e| TextpipeError::output_write("failed to write trailer", e))?;
        }
        state.stats.rows_written += lines.len();
        Ok(())
    }

    /// Flush remaining blocks and the header, then close the destination.
    ///
    /// A run without any body rows still produces the header. Calling `finish`
    /// twice returns the same statistics.
    pub fn finish(&self) -> Result<WriterStats> {
        let mut state = self.state.lock();
        if state.sink.is_none() {
            return Ok(state.stats);
        }
        Self::flush_pending(&mut state)?;
        state.ensure_header()?;
        if let Some(mut sink) = state.sink.take() {
            sink.flush()
                .map_err(|e| TextpipeError::output_write("failed to flush output", e))?;
        }
        Ok(state.stats)
    }

    /// Number of finished blocks held in the reorder buffer.
    pub fn backlog(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Current counters.
    pub fn stats(&self) -> WriterStats {
        self.state.lock().stats
    }

    fn flush_pending(state: &mut WriterState) -> Result<()> {
        let pending = std::mem::take(&mut state.pending);
        for (index, block) in pending {
            if let Some(lines) = block {
                state.write_block(&lines)?;
            }
            state.next_index = index + 1;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ThreadsafeOutputWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadsafeOutputWriter")
            .field("ordering", &self.ordering)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn writer(buf: &SharedBuf, header: Option<&str>, ordering: OutputOrdering) -> ThreadsafeOutputWriter {
        ThreadsafeOutputWriter::new(
            Destination::new(Box::new(buf.clone())),
            header.map(str::to_string),
            ordering,
        )
    }

    fn block(tag: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}-{}", tag, i)).collect()
    }

    #[test]
    fn test_header_written_once_before_rows() {
        let buf = SharedBuf::default();
        let w = writer(&buf, Some("H"), OutputOrdering::Arrival);
        w.write_item(1, block("b", 2)).unwrap();
        w.write_item(0, block("a", 1)).unwrap();
        let stats = w.finish().unwrap();
        assert_eq!(buf.lines(), vec!["H", "b-0", "b-1", "a-0"]);
        assert!(stats.header_written);
        assert_eq!(stats.items_written, 2);
        assert_eq!(stats.rows_written, 3);
    }

    #[test]
    fn test_input_order_reorders_blocks() {
        let buf = SharedBuf::default();
        let w = writer(&buf, Some("H"), OutputOrdering::Input);
        w.write_item(2, block("c", 1)).unwrap();
        w.write_item(1, block("b", 1)).unwrap();
        assert_eq!(buf.lines(), Vec::<String>::new());
        w.write_item(0, block("a", 1)).unwrap();
        assert_eq!(buf.lines(), vec!["H", "a-0", "b-0", "c-0"]);
        w.finish().unwrap();
    }

    #[test]
    fn test_backlog_counts_held_blocks() {
        let buf = SharedBuf::default();
        let w = writer(&buf, None, OutputOrdering::Input);
        w.write_item(2, block("c", 1)).unwrap();
        w.write_item(1, block("b", 1)).unwrap();
        assert_eq!(w.backlog(), 2);
        w.write_item(0, block("a", 1)).unwrap();
        assert_eq!(w.backlog(), 0);

        let arrival = writer(&buf, None, OutputOrdering::Arrival);
        arrival.write_item(5, block("f", 1)).unwrap();
        assert_eq!(arrival.backlog(), 0);
    }

    #[test]
    fn test_skip_advances_cursor() {
        let buf = SharedBuf::default();
        let w = writer(&buf, None, OutputOrdering::Input);
        w.write_item(1, block("b", 1)).unwrap();
        w.skip_item(0).unwrap();
        w.write_item(2, block("c", 1)).unwrap();
        assert_eq!(buf.lines(), vec!["b-0", "c-0"]);
        assert_eq!(w.finish().unwrap().items_written, 2);
    }

    #[test]
    fn test_duplicate_delivery_rejected() {
        let buf = SharedBuf::default();
        let w = writer(&buf, None, OutputOrdering::Input);
        w.write_item(0, block("a", 1)).unwrap();
        assert!(w.write_item(0, block("a", 1)).is_err());
    }

    #[test]
    fn test_finish_flushes_gaps_and_writes_header_for_empty_run() {
        let buf = SharedBuf::default();
        let w = writer(&buf, Some("H"), OutputOrdering::Input);
        let stats = w.finish().unwrap();
        assert_eq!(buf.lines(), vec!["H"]);
        assert_eq!(stats.rows_written, 0);

        let buf = SharedBuf::default();
        let w = writer(&buf, Some("H"), OutputOrdering::Input);
        w.write_item(3, block("d", 1)).unwrap();
        w.finish().unwrap();
        assert_eq!(buf.lines(), vec!["H", "d-0"]);
    }

    #[test]
    fn test_existing_header_not_rewritten() {
        let buf = SharedBuf::default();
        let w = ThreadsafeOutputWriter::new(
            Destination {
                sink: Box::new(buf.clone()),
                existing_header: Some("H".to_string()),
            },
            Some("H".to_string()),
            OutputOrdering::Arrival,
        );
        w.write_item(0, block("a", 1)).unwrap();
        let stats = w.finish().unwrap();
        assert_eq!(buf.lines(), vec!["a-0"]);
        assert!(!stats.header_written);
    }

    #[test]
    fn test_trailer_follows_all_blocks() {
        let buf = SharedBuf::default();
        let w = writer(&buf, Some("H"), OutputOrdering::Input);
        w.write_item(1, block("b", 1)).unwrap();
        w.write_trailer(&["TOTAL".to_string()]).unwrap();
        w.finish().unwrap();
        assert_eq!(buf.lines(), vec!["H", "b-0", "TOTAL"]);
    }

    #[test]
    fn test_write_failure_is_output_write_error() {
        let w = ThreadsafeOutputWriter::new(
            Destination::new(Box::new(FailingSink)),
            Some("H".to_string()),
            OutputOrdering::Arrival,
        );
        let err = w.write_item(0, block("a", 1)).unwrap_err();
        assert!(matches!(err, TextpipeError::OutputWrite { .. }));
    }

    #[test]
    fn test_concurrent_blocks_stay_contiguous() {
        let buf = SharedBuf::default();
        let w = Arc::new(writer(&buf, Some("H"), OutputOrdering::Arrival));
        std::thread::scope(|scope| {
            for item in 0..16 {
                let w = Arc::clone(&w);
                scope.spawn(move || w.write_item(item, block(&format!("i{}", item), 5)).unwrap());
            }
        });
        w.finish().unwrap();

        let lines = buf.lines();
        assert_eq!(lines[0], "H");
        assert_eq!(lines.len(), 1 + 16 * 5);
        for chunk in lines[1..].chunks(5) {
            let tag = chunk[0].split('-').next().unwrap();
            assert!(chunk.iter().all(|l| l.starts_with(&format!("{}-", tag))));
        }
    }

    #[test]
    fn test_finish_is_idempotent() {
        let buf = SharedBuf::default();
        let w = writer(&buf, Some("H"), OutputOrdering::Arrival);
        w.write_item(0, block("a", 1)).unwrap();
        let first = w.finish().unwrap();
        let second = w.finish().unwrap();
        assert_eq!(first, second);
        assert!(w.write_item(1, block("b", 1)).is_err());
    }
}
