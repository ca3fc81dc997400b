use std::path::Path;

use anyhow::Result;
use textpipe::{CancellationToken, OutputOrdering, RunSummary, run_pipeline_with_cancel};

use crate::OutputFormat;

/// Engine settings given on the command line.
#[derive(Debug, Default)]
pub struct Overrides {
    pub max_threads: Option<usize>,
    pub ordering: Option<OutputOrdering>,
    pub fail_fast: bool,
}

/// Execute the `run` command: build the pipeline, run it, print the summary.
pub async fn execute(config_path: Option<&Path>, overrides: Overrides, format: OutputFormat) -> Result<()> {
    let config = super::load_config(config_path)?;
    let mut pipeline = super::build_pipeline(&config)?;

    let mut engine = pipeline.engine().clone();
    if let Some(max_threads) = overrides.max_threads {
        engine.max_threads = Some(max_threads);
    }
    if let Some(ordering) = overrides.ordering {
        engine.ordering = ordering;
    }
    engine.fail_fast |= overrides.fail_fast;
    pipeline.set_engine(engine)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    let summary = run_pipeline_with_cancel(&pipeline, cancel).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_summary(&summary),
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Items enumerated: {}", summary.items_enumerated);
    println!("Items written:    {}", summary.items_written);
    println!("Rows written:     {}", summary.rows_written);
    println!("Items dropped:    {}", summary.dropped_count());
    if summary.cancelled {
        println!("Run cancelled:    {} items skipped", summary.skipped);
    }
    println!("Thread budget:    {}", summary.thread_budget);
    println!("Elapsed:          {:.2}s", summary.duration.as_secs_f64());

    for dropped in &summary.dropped {
        println!(
            "  #{} {} [{}]: {}",
            dropped.index,
            dropped.origin.as_deref().unwrap_or("-"),
            dropped.plugin,
            dropped.reason
        );
    }
}
