//! Word counting.

use super::descriptor;
use crate::plugins::{LinearPlugin, Plugin, PluginDescriptor, SettingsReader, tags, versioned_settings};
use crate::types::{Header, Payload, Record, Settings, ThreadBudget};
use crate::{Result, TextpipeError};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Origin of the corpus totals row.
pub const TOTALS_ORIGIN: &str = "TOTAL";

#[derive(Debug, Default)]
struct Totals {
    words: usize,
    vocabulary: HashSet<String>,
}

/// Counts words and distinct words per segment.
///
/// Records sharing an origin and segment number are counted together, so the
/// stage works on untokenized text as well as on tokens. The per-invocation
/// counting runs on a rayon pool sized to the granted thread budget. Pools are
/// built once per budget size and reused across invocations.
///
/// With `emit_totals` the stage also reports one corpus-wide row when the run
/// finishes.
pub struct WordCount {
    descriptor: PluginDescriptor,
    emit_totals: AtomicBool,
    totals: Mutex<Totals>,
    pools: Mutex<HashMap<usize, Arc<rayon::ThreadPool>>>,
}

impl WordCount {
    pub fn new() -> Self {
        Self {
            descriptor: descriptor(
                "word-count",
                "Statistics",
                "Count words and unique words for every segment.",
                &[tags::TEXT, tags::TOKENS],
                tags::VALUES,
            ),
            emit_totals: AtomicBool::new(false),
            totals: Mutex::new(Totals::default()),
            pools: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_totals(self) -> Self {
        self.emit_totals.store(true, Ordering::Relaxed);
        self
    }

    fn pool(&self, threads: ThreadBudget) -> Result<Arc<rayon::ThreadPool>> {
        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get(&threads.get()) {
            return Ok(Arc::clone(pool));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.get())
            .thread_name(|i| format!("word-count-{}", i))
            .build()
            .map_err(|e| TextpipeError::plugin(self.name(), format!("failed to build thread pool: {}", e)))?;
        let pool = Arc::new(pool);
        pools.insert(threads.get(), Arc::clone(&pool));
        Ok(pool)
    }

    fn count(&self, payload: Payload, threads: ThreadBudget) -> Result<Payload> {
        let item_index = payload.item_index;
        let groups = group_segments(payload.records);
        let pool = self.pool(threads)?;

        let counted: Vec<(Record, Vec<String>)> = pool.install(|| {
            groups
                .into_par_iter()
                .map(|(origin, segment, words)| {
                    let unique: HashSet<&str> = words.iter().map(String::as_str).collect();
                    let record = Record {
                        origin,
                        segment,
                        fields: vec![words.len().to_string(), unique.len().to_string()],
                    };
                    (record, words)
                })
                .collect()
        });

        let mut records = Vec::with_capacity(counted.len());
        let mut totals = self.totals.lock();
        for (record, words) in counted {
            totals.words += words.len();
            totals.vocabulary.extend(words);
            records.push(record);
        }

        Ok(Payload {
            item_index,
            records,
            header: self.output_header(),
        })
    }
}

impl Default for WordCount {
    fn default() -> Self {
        Self::new()
    }
}

/// Consecutive records with the same origin and segment, with their words.
fn group_segments(records: Vec<Record>) -> Vec<(String, usize, Vec<String>)> {
    let mut groups: Vec<(String, usize, Vec<String>)> = Vec::new();
    for record in records {
        let words = record
            .fields
            .iter()
            .flat_map(|f| f.split_whitespace())
            .map(str::to_string);
        match groups.last_mut() {
            Some((origin, segment, group)) if *origin == record.origin && *segment == record.segment => {
                group.extend(words)
            }
            _ => {
                let collected = words.collect();
                groups.push((record.origin, record.segment, collected));
            }
        }
    }
    groups
}

impl Plugin for WordCount {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn initialize(&self) -> Result<()> {
        *self.totals.lock() = Totals::default();
        Ok(())
    }

    fn export_settings(&self, _suppress_warnings: bool) -> Settings {
        let mut exported = versioned_settings();
        exported.insert(
            "emit_totals".to_string(),
            self.emit_totals.load(Ordering::Relaxed).to_string(),
        );
        exported
    }

    fn import_settings(&self, settings: &Settings) -> Result<()> {
        let reader = SettingsReader::new(self.name(), settings, &["emit_totals"])?;
        let emit_totals = reader.bool("emit_totals", false)?;
        self.emit_totals.store(emit_totals, Ordering::Relaxed);
        Ok(())
    }

    fn output_header(&self) -> Header {
        let mut header = Header::new();
        header.insert(0, "WordCount".to_string());
        header.insert(1, "UniqueWords".to_string());
        header
    }

    fn inherit_header(&self) -> bool {
        false
    }

    fn finish(&self, trailing: Option<Payload>) -> Result<Option<Payload>> {
        let mut result = match trailing {
            Some(payload) => Some(self.count(payload, ThreadBudget::single())?),
            None => None,
        };

        if self.emit_totals.load(Ordering::Relaxed) {
            let totals = self.totals.lock();
            let row = Record {
                origin: TOTALS_ORIGIN.to_string(),
                segment: 0,
                fields: vec![totals.words.to_string(), totals.vocabulary.len().to_string()],
            };
            result
                .get_or_insert_with(|| Payload {
                    header: self.output_header(),
                    ..Payload::default()
                })
                .records
                .push(row);
        }
        Ok(result)
    }
}

impl LinearPlugin for WordCount {
    fn run(&self, payload: Payload, threads: ThreadBudget) -> Result<Payload> {
        self.count(payload, threads)
    }

    fn status(&self) -> Option<String> {
        Some(format!("{} words counted", self.totals.lock().words))
    }
}
