//! Step execution orchestration.

pub mod patterns;
pub mod pipeline;

pub use pipeline::{Pipeline, PipelineResult, RunOptions, RunProgress};
