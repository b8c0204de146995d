//! Core pipeline orchestration for the NeurIPS harvester.
//!
//! This crate ties together discovery, extraction, artifact download and
//! record persistence into one run:
//! - [`retry`]: bounded retry with exponential backoff
//! - [`pipeline`]: the per-item fetch → extract → download → persist chain
//! - [`dispatcher`]: year enumeration, the bounded work queue and the worker pool

pub mod dispatcher;
pub mod pipeline;
pub mod retry;

pub use dispatcher::{
    DATASETS_YEAR, DispatchPhase, Dispatcher, HarvestSummary, ItemStatus, ProgressReporter,
    SilentProgress,
};
pub use pipeline::{ItemContext, ItemOutcome, process_item, process_with_retry};
pub use retry::{RetryOutcome, RetryPolicy};
