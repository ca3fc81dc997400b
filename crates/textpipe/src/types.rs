//! Core data types passed between pipeline stages.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column index to column name, in declaration order.
pub type Header = IndexMap<usize, String>;

/// Plugin settings as exchanged with config files and the presentation layer.
///
/// Insertion order is preserved so exported settings read the same way every time.
pub type Settings = IndexMap<String, String>;

/// A raw text item produced by an Input plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    /// Origin identifier (usually a file name).
    pub origin: String,
    /// Raw text content.
    pub content: String,
}

impl RawItem {
    pub fn new(origin: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            content: content.into(),
        }
    }
}

/// One text record travelling through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Origin identifier of the item this record came from.
    pub origin: String,
    /// Segment index within the origin, starting at 1.
    pub segment: usize,
    /// Record fields. Inputs produce a single text field; analysis stages replace
    /// it with tokens or computed values.
    pub fields: Vec<String>,
}

impl Record {
    pub fn text(origin: impl Into<String>, segment: usize, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            segment,
            fields: vec![text.into()],
        }
    }

    /// All fields joined with a single space.
    pub fn joined(&self) -> String {
        self.fields.join(" ")
    }
}

/// The unit of data handed from one stage to the next for one item.
///
/// A payload is owned by exactly one lane at a time. Stages take it by value
/// and hand back a (possibly new) payload, so ownership moves at every stage
/// boundary and no two threads ever see the same instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Enumeration index of the item (0-based, dense).
    pub item_index: usize,
    /// Records in order.
    pub records: Vec<Record>,
    /// Names of the record fields, set by the last stage that declared its own
    /// header. Empty until then.
    #[serde(default)]
    pub header: Header,
}

impl Payload {
    /// Wrap a raw item as a single-record payload.
    pub fn from_raw(item_index: usize, raw: RawItem) -> Self {
        Self {
            item_index,
            records: vec![Record::text(raw.origin, 1, raw.content)],
            header: Header::new(),
        }
    }

    /// Same item and header, new records.
    pub fn with_records(self, records: Vec<Record>) -> Self {
        Self { records, ..self }
    }

    /// Origin of the first record, if any.
    pub fn origin(&self) -> Option<&str> {
        self.records.first().map(|r| r.origin.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Maximum number of threads one Linear invocation may use.
///
/// Handed out by the allocator, passed by value, never adjusted by a callee.
/// A budget is always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadBudget(usize);

impl ThreadBudget {
    /// Create a budget, clamping zero up to one.
    pub fn new(threads: usize) -> Self {
        Self(threads.max(1))
    }

    /// A single-thread budget.
    pub fn single() -> Self {
        Self(1)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output ordering policy for the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputOrdering {
    /// Row blocks appear as lanes complete.
    Arrival,
    /// Row blocks appear in enumeration order.
    #[default]
    Input,
}

impl std::str::FromStr for OutputOrdering {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arrival" => Ok(OutputOrdering::Arrival),
            "input" => Ok(OutputOrdering::Input),
            other => Err(format!("unknown ordering '{}' (expected 'input' or 'arrival')", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_from_raw() {
        let payload = Payload::from_raw(3, RawItem::new("a.txt", "hello world"));
        assert_eq!(payload.item_index, 3);
        assert_eq!(payload.len(), 1);
        assert_eq!(payload.origin(), Some("a.txt"));
        assert_eq!(payload.records[0].segment, 1);
        assert_eq!(payload.records[0].fields, vec!["hello world".to_string()]);
        assert!(payload.header.is_empty());
    }

    #[test]
    fn test_with_records_keeps_item_and_header() {
        let mut payload = Payload::from_raw(7, RawItem::new("a.txt", "x"));
        payload.header.insert(0, "Count".to_string());
        let next = payload.with_records(vec![Record::text("a.txt", 2, "y")]);
        assert_eq!(next.item_index, 7);
        assert_eq!(next.header.get(&0).map(String::as_str), Some("Count"));
        assert_eq!(next.records[0].segment, 2);
    }

    #[test]
    fn test_thread_budget_never_zero() {
        assert_eq!(ThreadBudget::new(0).get(), 1);
        assert_eq!(ThreadBudget::new(6).get(), 6);
        assert_eq!(ThreadBudget::single().get(), 1);
    }

    #[test]
    fn test_ordering_from_str() {
        assert_eq!("INPUT".parse::<OutputOrdering>().unwrap(), OutputOrdering::Input);
        assert_eq!("arrival".parse::<OutputOrdering>().unwrap(), OutputOrdering::Arrival);
        assert!("random".parse::<OutputOrdering>().is_err());
    }

    #[test]
    fn test_header_preserves_insertion_order() {
        let mut header = Header::new();
        header.insert(1, "B".to_string());
        header.insert(0, "A".to_string());
        let names: Vec<_> = header.values().cloned().collect();
        assert_eq!(names, vec!["B", "A"]);
    }
}
