//! SourceBridge Pipeline - batch ingestion of provider files
//!
//! Provides:
//! - Sequential per-file pipeline: download, intermediate storage, indexing
//! - Per-file failure isolation and cooperative cancellation
//! - Observable per-file progress
//!
//! ## Modules
//!
//! - [`job`] - Typed stage jobs (`Job<Pending>` through `Job<Indexed>`)
//! - [`orchestrator`] - [`BatchOrchestrator`](orchestrator::BatchOrchestrator)
//!   running one batch end to end
//! - [`progress`] - [`ProgressReporter`](progress::ProgressReporter) backed
//!   by a watch channel

pub mod job;
pub mod orchestrator;
pub mod progress;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::{BatchOrchestrator, BatchRequest};
pub use progress::{ProgressReporter, ProgressSnapshot};
