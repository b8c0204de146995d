//! Page fetching and paper extraction.
//!
//! This crate provides:
//! - [`fetch`]: the shared HTTP session ([`Fetcher`])
//! - [`extract`]: layout-specific paper extractors selected by [`Layout::for_year`]

pub mod extract;
pub mod fetch;

pub use extract::{Layout, LegacyExtractor, ModernExtractor, PaperExtractor};
pub use fetch::Fetcher;
