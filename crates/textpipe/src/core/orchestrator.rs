//! Pipeline run orchestration.
//!
//! A run goes through these steps:
//! 1. Settings inspection of every stage (no I/O yet)
//! 2. `initialize` of the input (then its item count), every Linear stage and the output
//! 3. Header resolution (stages may declare their header during `initialize`),
//!    destination opening, writer construction
//! 4. Enumeration on one blocking coordinator thread, feeding a bounded channel
//! 5. One lane per item, at most `max_threads` lanes at once, each running the
//!    Linear chain in order with a budget granted at every stage entry
//! 6. Delivery of each finished payload to the writer
//! 7. After all lanes drain: `finish` on every stage in order, trailer rows,
//!    writer flush and close
//!
//! # Errors
//!
//! A failing (or panicking) Linear stage or output rendering drops only that
//! item unless fail-fast is on. Configuration, lifecycle, enumeration-start and
//! output write failures abort the run.

use crate::core::budget::{LaneGuard, ThreadBudgetAllocator};
use crate::core::header::resolve_header;
use crate::core::pipeline::{Pipeline, stage_label};
use crate::core::summary::{DroppedItem, RunSummary};
use crate::core::writer::{ThreadsafeOutputWriter, WriterStats};
use crate::plugins::{InputPlugin, ItemStream, LinearPlugin, OutputPlugin, Plugin, Stage};
use crate::types::{Payload, RawItem};
use crate::{Result, TextpipeError};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Global Tokio runtime for [`run_pipeline_sync`].
///
/// Built lazily on first use and shared by every sync call.
static GLOBAL_RUNTIME: Lazy<std::io::Result<tokio::runtime::Runtime>> =
    Lazy::new(|| tokio::runtime::Builder::new_multi_thread().enable_all().build());

/// Run a pipeline to completion.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use textpipe::builtin::{MemoryInput, MemoryOutput, WordCount};
/// use textpipe::{Pipeline, run_pipeline};
///
/// #[tokio::main]
/// async fn main() -> textpipe::Result<()> {
///     let output = Arc::new(MemoryOutput::new());
///     let pipeline = Pipeline::builder()
///         .input(Arc::new(MemoryInput::from_texts(["one two two", "three"])))
///         .linear(Arc::new(WordCount::new()))
///         .output(output.clone())
///         .build()?;
///
///     let summary = run_pipeline(&pipeline).await?;
///     assert_eq!(summary.items_written, 2);
///     assert_eq!(output.lines()[0], "Filename,Segment,WordCount,UniqueWords");
///     Ok(())
/// }
/// ```
pub async fn run_pipeline(pipeline: &Pipeline) -> Result<RunSummary> {
    run_pipeline_with_cancel(pipeline, CancellationToken::new()).await
}

/// Run a pipeline that can be cancelled through `cancel`.
///
/// Cancellation is cooperative: no new items are dispatched, lanes stop at their
/// next stage boundary, stages still finish and the writer is flushed. The
/// summary reports `cancelled = true`.
pub async fn run_pipeline_with_cancel(pipeline: &Pipeline, cancel: CancellationToken) -> Result<RunSummary> {
    let engine = pipeline.engine().clone();
    let span = tracing::info_span!(
        "pipeline_run",
        threads = engine.thread_budget(),
        ordering = ?engine.ordering,
        fail_fast = engine.fail_fast
    );
    Orchestrator::new(pipeline, cancel).run().instrument(span).await
}

/// Blocking variant of [`run_pipeline`] using a shared global runtime.
///
/// Must not be called from within an async runtime.
pub fn run_pipeline_sync(pipeline: &Pipeline) -> Result<RunSummary> {
    let runtime = GLOBAL_RUNTIME
        .as_ref()
        .map_err(|e| TextpipeError::Other(format!("Failed to create global Tokio runtime: {}", e)))?;
    runtime.block_on(run_pipeline(pipeline))
}

/// What a lane reports back to the coordinator.
enum LaneOutcome {
    Written,
    Dropped(DroppedItem),
    Cancelled { index: usize },
    Fatal(TextpipeError),
}

/// Shared, read-only state every lane needs.
struct LaneContext {
    linear: Arc<[Arc<dyn LinearPlugin>]>,
    output: Arc<dyn OutputPlugin>,
    writer: Arc<ThreadsafeOutputWriter>,
    allocator: Arc<ThreadBudgetAllocator>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Tally {
    enumerated: usize,
    skipped: usize,
    dropped: Vec<DroppedItem>,
}

struct Orchestrator {
    stages: Vec<Stage>,
    input: Arc<dyn InputPlugin>,
    linear: Arc<[Arc<dyn LinearPlugin>]>,
    output: Arc<dyn OutputPlugin>,
    engine: crate::core::config::EngineConfig,
    user_cancel: CancellationToken,
    run_cancel: CancellationToken,
}

impl Orchestrator {
    fn new(pipeline: &Pipeline, cancel: CancellationToken) -> Self {
        Self {
            stages: pipeline.stages(),
            input: Arc::clone(pipeline.input()),
            linear: Arc::from(pipeline.linear()),
            output: Arc::clone(pipeline.output()),
            engine: pipeline.engine().clone(),
            run_cancel: cancel.child_token(),
            user_cancel: cancel,
        }
    }

    async fn run(self) -> Result<RunSummary> {
        let started = Instant::now();
        let thread_budget = self.engine.thread_budget();

        let (writer, item_count) = self.prepare().await?;

        let allocator = Arc::new(ThreadBudgetAllocator::new(thread_budget));
        allocator.expect_lanes(item_count);
        let ctx = Arc::new(LaneContext {
            linear: Arc::clone(&self.linear),
            output: Arc::clone(&self.output),
            writer: Arc::clone(&writer),
            allocator: Arc::clone(&allocator),
            cancel: self.run_cancel.clone(),
        });

        let (tx, rx) = mpsc::channel(self.engine.look_ahead());
        let enumerator = self.spawn_enumerator(tx);

        let mut tasks: JoinSet<LaneOutcome> = JoinSet::new();
        let mut tally = Tally::default();

        if let Err(e) = self.dispatch(rx, &ctx, &mut tasks, &mut tally).await {
            tracing::error!(error = %e, "Aborting run");
            self.run_cancel.cancel();
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            return Err(e);
        }

        let retained = match enumerator.await {
            Ok(Ok(retained)) => retained,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Input enumeration failed");
                return Err(e);
            }
            Err(join_err) => return Err(TextpipeError::Other(format!("Enumeration task panicked: {}", join_err))),
        };

        let stats = self.finalize(Arc::clone(&writer)).await?;
        drop(retained);

        let summary = RunSummary {
            items_enumerated: tally.enumerated,
            items_written: stats.items_written,
            rows_written: stats.rows_written,
            dropped: tally.dropped,
            skipped: tally.skipped,
            cancelled: self.user_cancel.is_cancelled(),
            header_written: stats.header_written,
            thread_budget,
            duration: started.elapsed(),
        };

        tracing::info!(
            enumerated = summary.items_enumerated,
            written = summary.items_written,
            rows = summary.rows_written,
            dropped = summary.dropped_count(),
            cancelled = summary.cancelled,
            elapsed_ms = summary.duration.as_millis() as u64,
            "Run finished"
        );

        Ok(summary)
    }

    /// Settings inspection, lifecycle initialization and destination opening.
    ///
    /// Returns the writer and the item count reported by the input.
    async fn prepare(&self) -> Result<(Arc<ThreadsafeOutputWriter>, usize)> {
        let stages = self.stages.clone();
        let linear = Arc::clone(&self.linear);
        let input = Arc::clone(&self.input);
        let output = Arc::clone(&self.output);
        let ordering = self.engine.ordering;

        let (writer, item_count) = tokio::task::spawn_blocking(move || -> Result<(ThreadsafeOutputWriter, usize)> {
            for (position, stage) in stages.iter().enumerate() {
                if let Err(e) = stage.plugin().inspect_settings() {
                    return Err(TextpipeError::configuration(stage_label(position, stage), e.to_string()));
                }
            }

            for (position, stage) in stages.iter().enumerate() {
                stage
                    .plugin()
                    .initialize()
                    .map_err(|e| lifecycle_error(position, stage, "initialize", e))?;
                if let Stage::Input(input) = stage {
                    tracing::info!(input = input.name(), items = input.item_count(), "Input initialized");
                }
            }

            let header = resolve_header(linear.iter().map(|p| p.as_ref() as &dyn Plugin));
            let header_line = output.render_header(&header);
            let destination = output.open_destination()?;
            let writer = ThreadsafeOutputWriter::new(destination, header_line, ordering);
            Ok((writer, input.item_count()))
        })
        .await
        .map_err(|e| TextpipeError::Other(format!("Preparation task panicked: {}", e)))??;

        Ok((Arc::new(writer), item_count))
    }

    /// Enumerate the input on a dedicated blocking thread.
    ///
    /// Returns the exhausted stream when the input asks to keep it open.
    fn spawn_enumerator(
        &self,
        tx: mpsc::Sender<(usize, Result<RawItem>)>,
    ) -> tokio::task::JoinHandle<Result<Option<ItemStream>>> {
        let input = Arc::clone(&self.input);
        let cancel = self.run_cancel.clone();

        tokio::task::spawn_blocking(move || {
            let mut stream = input.enumerate()?;
            let mut index = 0usize;
            while !cancel.is_cancelled() {
                let Some(item) = stream.next() else {
                    break;
                };
                if tx.blocking_send((index, item)).is_err() {
                    break;
                }
                index += 1;
            }
            tracing::debug!(items = index, "Enumeration finished");
            Ok(input.keep_stream_open().then_some(stream))
        })
    }

    /// Receive items, start lanes and collect their outcomes until the input is
    /// exhausted (or the run is cancelled) and every lane has drained.
    async fn dispatch(
        &self,
        mut rx: mpsc::Receiver<(usize, Result<RawItem>)>,
        ctx: &Arc<LaneContext>,
        tasks: &mut JoinSet<LaneOutcome>,
        tally: &mut Tally,
    ) -> Result<()> {
        let max_lanes = ctx.allocator.max_threads();
        let max_backlog = self.engine.look_ahead();

        loop {
            if self.run_cancel.is_cancelled() {
                break;
            }

            // The item at the write cursor is always still in flight while the
            // reorder buffer is non-empty, so waiting on a lane cannot stall.
            let backlog_full = !tasks.is_empty() && ctx.writer.backlog() >= max_backlog;
            if tasks.len() >= max_lanes || backlog_full {
                if let Some(joined) = tasks.join_next().await {
                    self.collect(joined, &ctx.writer, tally)?;
                }
                continue;
            }

            tokio::select! {
                biased;
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    self.collect(joined, &ctx.writer, tally)?;
                }
                _ = self.run_cancel.cancelled() => break,
                next = rx.recv() => match next {
                    None => break,
                    Some((index, item)) => {
                        tally.enumerated += 1;
                        self.start_lane(index, item, ctx, tasks, tally)?;
                    }
                },
            }
        }

        if self.run_cancel.is_cancelled() {
            tracing::info!("Run cancelled, draining in-flight lanes");
            rx.close();
        }

        while let Some(joined) = tasks.join_next().await {
            self.collect(joined, &ctx.writer, tally)?;
        }
        Ok(())
    }

    fn start_lane(
        &self,
        index: usize,
        item: Result<RawItem>,
        ctx: &Arc<LaneContext>,
        tasks: &mut JoinSet<LaneOutcome>,
        tally: &mut Tally,
    ) -> Result<()> {
        match item {
            Ok(raw) => {
                let lane = ctx.allocator.open_lane();
                let span = tracing::debug_span!("lane", item = index, origin = %raw.origin);
                tasks.spawn(run_lane(Arc::clone(ctx), lane, index, raw).instrument(span));
                Ok(())
            }
            Err(e) => {
                ctx.allocator.retire_expected();
                let dropped = DroppedItem {
                    index,
                    origin: None,
                    plugin: self.input.name().to_string(),
                    reason: e.to_string(),
                };
                self.collect(Ok(LaneOutcome::Dropped(dropped)), &ctx.writer, tally)
            }
        }
    }

    /// Account for one lane outcome. Returns an error when the run must stop.
    fn collect(
        &self,
        joined: std::result::Result<LaneOutcome, JoinError>,
        writer: &ThreadsafeOutputWriter,
        tally: &mut Tally,
    ) -> Result<()> {
        let outcome = joined.map_err(|e| TextpipeError::Other(format!("Lane task failed: {}", e)))?;
        match outcome {
            LaneOutcome::Written => Ok(()),
            LaneOutcome::Cancelled { index } => {
                tally.skipped += 1;
                writer.skip_item(index)
            }
            LaneOutcome::Dropped(dropped) => {
                tracing::warn!(
                    item = dropped.index,
                    origin = dropped.origin.as_deref().unwrap_or("-"),
                    plugin = %dropped.plugin,
                    reason = %dropped.reason,
                    "Item dropped"
                );
                writer.skip_item(dropped.index)?;
                let fail_fast_error = self.engine.fail_fast.then(|| TextpipeError::Processing {
                    message: dropped.reason.clone(),
                    plugin_name: dropped.plugin.clone(),
                    item: item_label(dropped.index, dropped.origin.as_deref()),
                });
                tally.dropped.push(dropped);
                match fail_fast_error {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            }
            LaneOutcome::Fatal(e) => Err(e),
        }
    }

    /// Finish every stage in order, write trailing rows, close the writer.
    async fn finalize(&self, writer: Arc<ThreadsafeOutputWriter>) -> Result<WriterStats> {
        let stages = self.stages.clone();
        let output = Arc::clone(&self.output);

        tokio::task::spawn_blocking(move || -> Result<WriterStats> {
            let mut trailing: Option<Payload> = None;
            for (position, stage) in stages.iter().enumerate() {
                if matches!(stage, Stage::Output(_)) {
                    continue;
                }
                trailing = stage
                    .plugin()
                    .finish(trailing)
                    .map_err(|e| lifecycle_error(position, stage, "finish", e))?;
            }

            if let Some(payload) = trailing {
                let lines = output.render_body(&payload)?;
                writer.write_trailer(&lines)?;
            }

            let stats = writer.finish()?;

            let position = stages.len() - 1;
            if let Some(stage) = stages.last() {
                stage
                    .plugin()
                    .finish(None)
                    .map_err(|e| lifecycle_error(position, stage, "finish", e))?;
            }
            Ok(stats)
        })
        .await
        .map_err(|e| TextpipeError::Other(format!("Finalize task panicked: {}", e)))?
    }
}

/// Carry one item through the Linear chain and deliver it to the writer.
async fn run_lane(ctx: Arc<LaneContext>, _lane: LaneGuard, index: usize, raw: RawItem) -> LaneOutcome {
    let origin = raw.origin.clone();
    let mut payload = Payload::from_raw(index, raw);

    for stage in ctx.linear.iter() {
        if ctx.cancel.is_cancelled() {
            return LaneOutcome::Cancelled { index };
        }

        let grant = match ctx.allocator.enter_stage().await {
            Ok(grant) => grant,
            Err(e) => return LaneOutcome::Fatal(e),
        };
        let budget = grant.budget();
        tracing::debug!(stage = stage.name(), threads = budget.get(), "Entering stage");

        let plugin = Arc::clone(stage);
        let result = tokio::task::spawn_blocking(move || plugin.run(payload, budget)).await;
        drop(grant);

        payload = match result {
            Ok(Ok(next)) => next,
            Ok(Err(e)) => return dropped(index, &origin, stage.name(), e.to_string()),
            Err(join_err) => return dropped(index, &origin, stage.name(), panic_reason(join_err)),
        };

        if let Some(status) = stage.status() {
            tracing::debug!(stage = stage.name(), status = %status, "Stage status");
        }
    }

    if ctx.cancel.is_cancelled() {
        return LaneOutcome::Cancelled { index };
    }

    let output = Arc::clone(&ctx.output);
    let writer = Arc::clone(&ctx.writer);
    let delivered = tokio::task::spawn_blocking(move || -> std::result::Result<Result<()>, String> {
        let lines = output.render_body(&payload).map_err(|e| e.to_string())?;
        Ok(writer.write_item(index, lines))
    })
    .await;

    match delivered {
        Ok(Ok(Ok(()))) => LaneOutcome::Written,
        Ok(Ok(Err(write_err))) => LaneOutcome::Fatal(write_err),
        Ok(Err(render_err)) => dropped(index, &origin, ctx.output.name(), render_err),
        Err(join_err) => dropped(index, &origin, ctx.output.name(), panic_reason(join_err)),
    }
}

fn dropped(index: usize, origin: &str, plugin: &str, reason: String) -> LaneOutcome {
    LaneOutcome::Dropped(DroppedItem {
        index,
        origin: Some(origin.to_string()),
        plugin: plugin.to_string(),
        reason,
    })
}

fn panic_reason(err: JoinError) -> String {
    if err.is_panic() {
        let panic = err.into_panic();
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        format!("plugin panicked: {}", message)
    } else {
        "plugin task was cancelled".to_string()
    }
}

fn item_label(index: usize, origin: Option<&str>) -> String {
    match origin {
        Some(origin) => format!("#{} ({})", index, origin),
        None => format!("#{}", index),
    }
}

fn lifecycle_error(position: usize, stage: &Stage, step: &str, err: TextpipeError) -> TextpipeError {
    match err {
        TextpipeError::Settings { .. } | TextpipeError::Configuration { .. } => err,
        other => TextpipeError::plugin(
            stage.name(),
            format!("{} failed at {}: {}", step, stage_label(position, stage), other),
        ),
    }
}
