//! Run result types.

use serde::Serialize;
use std::time::Duration;

/// An item that produced no output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedItem {
    /// Enumeration index.
    pub index: usize,
    /// Origin identifier, when the item got far enough to have one.
    pub origin: Option<String>,
    /// Plugin that failed (the input plugin for enumeration failures).
    pub plugin: String,
    pub reason: String,
}

/// Outcome of a completed (or cancelled) run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub items_enumerated: usize,
    pub items_written: usize,
    pub rows_written: usize,
    pub dropped: Vec<DroppedItem>,
    /// Items abandoned because the run was cancelled.
    pub skipped: usize,
    pub cancelled: bool,
    /// Whether this run wrote a header line (false when appending under an
    /// existing one or when the output renders no header).
    pub header_written: bool,
    pub thread_budget: usize,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
}

impl RunSummary {
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    /// Indices of dropped items, ascending.
    pub fn dropped_indices(&self) -> Vec<usize> {
        let mut indices: Vec<_> = self.dropped.iter().map(|d| d.index).collect();
        indices.sort_unstable();
        indices
    }
}

fn serialize_duration<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_indices_sorted() {
        let summary = RunSummary {
            dropped: vec![
                DroppedItem {
                    index: 7,
                    origin: None,
                    plugin: "p".to_string(),
                    reason: "x".to_string(),
                },
                DroppedItem {
                    index: 2,
                    origin: Some("b.txt".to_string()),
                    plugin: "p".to_string(),
                    reason: "y".to_string(),
                },
            ],
            ..Default::default()
        };
        assert_eq!(summary.dropped_count(), 2);
        assert_eq!(summary.dropped_indices(), vec![2, 7]);
    }

    #[test]
    fn test_summary_serializes_duration_as_seconds() {
        let summary = RunSummary {
            duration: Duration::from_millis(1500),
            ..Default::default()
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["duration"], serde_json::json!(1.5));
    }
}
