//! Textpipe - Concurrent Text-Processing Pipeline Engine
//!
//! A pipeline is one Input stage, a chain of Linear stages and one Output stage.
//! Items from the input travel through the chain concurrently, each in its own
//! lane, under one global worker-thread budget. A single thread-safe writer
//! collects the results, writes the header exactly once and keeps every item's
//! rows together, optionally in input order.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use textpipe::builtin::{MemoryInput, MemoryOutput, Tokenizer, WordCount};
//! use textpipe::{Pipeline, run_pipeline_sync};
//!
//! # fn main() -> textpipe::Result<()> {
//! let output = Arc::new(MemoryOutput::new());
//! let pipeline = Pipeline::builder()
//!     .input(Arc::new(MemoryInput::from_texts(["a rose is a rose", "is a rose"])))
//!     .linear(Arc::new(Tokenizer::new()))
//!     .linear(Arc::new(WordCount::new()))
//!     .output(output.clone())
//!     .build()?;
//!
//! let summary = run_pipeline_sync(&pipeline)?;
//! assert_eq!(summary.items_written, 2);
//! assert_eq!(
//!     output.lines(),
//!     vec![
//!         "Filename,Segment,WordCount,UniqueWords",
//!         "item1,1,5,3",
//!         "item2,1,3,3",
//!     ]
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Plugins** (`plugins`): the plugin contract, type tags, settings exchange, registry
//! - **Core** (`core`): pipeline construction, header resolution, thread budget,
//!   output writer, run orchestration, configuration
//! - **Built-ins** (`builtin`): directory and memory inputs, text stages, CSV output
//!
//! # Failure model
//!
//! A Linear stage failing for one item drops that item and the run continues;
//! configuration problems are reported before any input is read, and an output
//! write failure aborts the run. See [`TextpipeError`].

#![deny(unsafe_code)]

pub mod builtin;
pub mod core;
pub mod error;
pub mod plugins;
pub mod types;

pub use error::{Result, TextpipeError};
pub use types::*;

pub use core::budget::ThreadBudgetAllocator;
pub use core::config::{EngineConfig, PipelineConfig, StageConfig};
pub use core::header::resolve_header;
pub use core::orchestrator::{run_pipeline, run_pipeline_sync, run_pipeline_with_cancel};
pub use core::pipeline::{Pipeline, PipelineBuilder};
pub use core::summary::{DroppedItem, RunSummary};
pub use core::writer::ThreadsafeOutputWriter;

pub use plugins::registry::get_plugin_registry;
pub use tokio_util::sync::CancellationToken;
