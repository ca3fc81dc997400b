//! Shared test plugins for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use textpipe::plugins::{LinearPlugin, Plugin, PluginDescriptor};
use textpipe::{CancellationToken, Header, Payload, Result, Settings, TextpipeError, ThreadBudget};

pub fn test_descriptor(name: &str) -> PluginDescriptor {
    PluginDescriptor {
        name: name.to_string(),
        category: "Testing".to_string(),
        version: "0.0.0".to_string(),
        input_types: vec!["text".to_string(), "tokens".to_string()],
        output_type: "text".to_string(),
        ..Default::default()
    }
}

/// Texts `doc0 ..`, `doc1 ..`, each with a different word count.
pub fn corpus(items: usize) -> Vec<String> {
    (0..items)
        .map(|i| {
            let mut words = vec![format!("doc{}", i)];
            words.extend((0..i % 5).map(|w| format!("w{}", w)));
            words.join(" ")
        })
        .collect()
}

/// Deterministic, uneven per-item delay so items finish out of order.
pub fn item_delay(index: usize) -> Duration {
    Duration::from_millis(((index * 7919) % 13) as u64)
}

macro_rules! plain_plugin {
    ($ty:ty) => {
        impl Plugin for $ty {
            fn descriptor(&self) -> &PluginDescriptor {
                &self.descriptor
            }

            fn export_settings(&self, _suppress_warnings: bool) -> Settings {
                Settings::new()
            }

            fn import_settings(&self, _settings: &Settings) -> Result<()> {
                Ok(())
            }
        }
    };
}

/// Fails (or panics) for the listed item indices, passes everything else.
pub struct FailOn {
    descriptor: PluginDescriptor,
    failing: HashSet<usize>,
    panic: bool,
}

impl FailOn {
    pub fn items(failing: impl IntoIterator<Item = usize>) -> Self {
        Self {
            descriptor: test_descriptor("fail-on"),
            failing: failing.into_iter().collect(),
            panic: false,
        }
    }

    pub fn panicking(failing: impl IntoIterator<Item = usize>) -> Self {
        Self {
            panic: true,
            ..Self::items(failing)
        }
    }
}

plain_plugin!(FailOn);

impl LinearPlugin for FailOn {
    fn run(&self, payload: Payload, _threads: ThreadBudget) -> Result<Payload> {
        if self.failing.contains(&payload.item_index) {
            if self.panic {
                panic!("injected panic for item {}", payload.item_index);
            }
            return Err(TextpipeError::Other(format!("injected failure for item {}", payload.item_index)));
        }
        Ok(payload)
    }
}

/// Sleeps for [`item_delay`] of the item index.
pub struct Jitter {
    descriptor: PluginDescriptor,
}

impl Jitter {
    pub fn new() -> Self {
        Self {
            descriptor: test_descriptor("jitter"),
        }
    }
}

plain_plugin!(Jitter);

impl LinearPlugin for Jitter {
    fn run(&self, payload: Payload, _threads: ThreadBudget) -> Result<Payload> {
        std::thread::sleep(item_delay(payload.item_index));
        Ok(payload)
    }
}

/// Tracks the sum of budgets held by concurrent invocations.
pub struct BudgetProbe {
    descriptor: PluginDescriptor,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    grants: Mutex<Vec<usize>>,
}

impl BudgetProbe {
    pub fn new(name: &str) -> Self {
        Self {
            descriptor: test_descriptor(name),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            grants: Mutex::new(Vec::new()),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn grants(&self) -> Vec<usize> {
        self.grants.lock().clone()
    }
}

plain_plugin!(BudgetProbe);

impl LinearPlugin for BudgetProbe {
    fn run(&self, payload: Payload, threads: ThreadBudget) -> Result<Payload> {
        let now = self.in_flight.fetch_add(threads.get(), Ordering::SeqCst) + threads.get();
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.grants.lock().push(threads.get());
        std::thread::sleep(Duration::from_millis(2) + item_delay(payload.item_index));
        self.in_flight.fetch_sub(threads.get(), Ordering::SeqCst);
        Ok(payload)
    }
}

/// Shared across stages: sums the budgets of every in-flight invocation.
#[derive(Default)]
pub struct GlobalBudgetGauge {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl GlobalBudgetGauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// A stage reporting into a shared [`GlobalBudgetGauge`].
pub struct GaugedStage {
    descriptor: PluginDescriptor,
    gauge: Arc<GlobalBudgetGauge>,
}

impl GaugedStage {
    pub fn new(name: &str, gauge: Arc<GlobalBudgetGauge>) -> Self {
        Self {
            descriptor: test_descriptor(name),
            gauge,
        }
    }
}

plain_plugin!(GaugedStage);

impl LinearPlugin for GaugedStage {
    fn run(&self, payload: Payload, threads: ThreadBudget) -> Result<Payload> {
        let now = self.gauge.in_flight.fetch_add(threads.get(), Ordering::SeqCst) + threads.get();
        self.gauge.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(item_delay(payload.item_index));
        self.gauge.in_flight.fetch_sub(threads.get(), Ordering::SeqCst);
        Ok(payload)
    }
}

/// Cancels a token once it has processed `after` items, then slows down.
pub struct CancelAfter {
    descriptor: PluginDescriptor,
    after: usize,
    seen: AtomicUsize,
    token: CancellationToken,
}

impl CancelAfter {
    pub fn new(after: usize, token: CancellationToken) -> Self {
        Self {
            descriptor: test_descriptor("cancel-after"),
            after,
            seen: AtomicUsize::new(0),
            token,
        }
    }
}

plain_plugin!(CancelAfter);

impl LinearPlugin for CancelAfter {
    fn run(&self, payload: Payload, _threads: ThreadBudget) -> Result<Payload> {
        if self.seen.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.token.cancel();
        }
        std::thread::sleep(Duration::from_millis(5));
        Ok(payload)
    }
}

/// Declares its own header (breaking inheritance) without changing payloads.
pub struct HeaderStage {
    descriptor: PluginDescriptor,
    columns: Vec<&'static str>,
}

impl HeaderStage {
    pub fn new(name: &str, columns: Vec<&'static str>) -> Self {
        Self {
            descriptor: test_descriptor(name),
            columns,
        }
    }
}

impl Plugin for HeaderStage {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn export_settings(&self, _suppress_warnings: bool) -> Settings {
        Settings::new()
    }

    fn import_settings(&self, _settings: &Settings) -> Result<()> {
        Ok(())
    }

    fn output_header(&self) -> Header {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, c)| (i, c.to_string()))
            .collect()
    }

    fn inherit_header(&self) -> bool {
        false
    }
}

impl LinearPlugin for HeaderStage {
    fn run(&self, payload: Payload, _threads: ThreadBudget) -> Result<Payload> {
        Ok(payload)
    }
}

/// Declares no header until `initialize`, like a stage loading its
/// column names from a dictionary.
pub struct InitHeader {
    descriptor: PluginDescriptor,
    columns: Vec<&'static str>,
    header: Mutex<Header>,
}

impl InitHeader {
    pub fn new(columns: Vec<&'static str>) -> Self {
        Self {
            descriptor: test_descriptor("init-header"),
            columns,
            header: Mutex::new(Header::new()),
        }
    }
}

impl Plugin for InitHeader {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn initialize(&self) -> Result<()> {
        *self.header.lock() = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (i, c.to_string()))
            .collect();
        Ok(())
    }

    fn export_settings(&self, _suppress_warnings: bool) -> Settings {
        Settings::new()
    }

    fn import_settings(&self, _settings: &Settings) -> Result<()> {
        Ok(())
    }

    fn output_header(&self) -> Header {
        self.header.lock().clone()
    }

    fn inherit_header(&self) -> bool {
        false
    }
}

impl LinearPlugin for InitHeader {
    fn run(&self, mut payload: Payload, _threads: ThreadBudget) -> Result<Payload> {
        payload.header = self.output_header();
        Ok(payload)
    }
}

/// Holds item 0 for `hold` and counts how many other items enter the stage
/// before item 0 leaves it.
pub struct SlowFirst {
    descriptor: PluginDescriptor,
    hold: Duration,
    first_done: std::sync::atomic::AtomicBool,
    overtaking: AtomicUsize,
}

impl SlowFirst {
    pub fn new(hold: Duration) -> Self {
        Self {
            descriptor: test_descriptor("slow-first"),
            hold,
            first_done: std::sync::atomic::AtomicBool::new(false),
            overtaking: AtomicUsize::new(0),
        }
    }

    pub fn overtaking(&self) -> usize {
        self.overtaking.load(Ordering::SeqCst)
    }
}

plain_plugin!(SlowFirst);

impl LinearPlugin for SlowFirst {
    fn run(&self, payload: Payload, _threads: ThreadBudget) -> Result<Payload> {
        if payload.item_index == 0 {
            std::thread::sleep(self.hold);
            self.first_done.store(true, Ordering::SeqCst);
        } else if !self.first_done.load(Ordering::SeqCst) {
            self.overtaking.fetch_add(1, Ordering::SeqCst);
        }
        Ok(payload)
    }
}
