//! Core pipeline engine.
//!
//! Construction and validation live in [`pipeline`], execution in
//! [`orchestrator`]. The remaining modules are the pieces the orchestrator
//! coordinates.

pub mod budget;
pub mod config;
pub mod header;
pub mod orchestrator;
pub mod pipeline;
pub mod summary;
pub mod writer;

pub use budget::{BudgetGrant, LaneGuard, ThreadBudgetAllocator};
pub use config::{EngineConfig, PipelineConfig, StageConfig};
pub use header::resolve_header;
pub use orchestrator::{run_pipeline, run_pipeline_sync, run_pipeline_with_cancel};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use summary::{DroppedItem, RunSummary};
pub use writer::{ThreadsafeOutputWriter, WriterStats};
