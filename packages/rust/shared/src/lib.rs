//! Shared types, error model, and configuration for the NeurIPS harvester.
//!
//! This crate is the foundation depended on by all other harvester crates.
//! It provides:
//! - [`HarvestError`]: the unified error type
//! - Domain types ([`WorkItem`], [`Record`], [`YearSelection`])
//! - Configuration ([`AppConfig`], [`HarvestConfig`], config loading)
//! - Path helpers ([`sanitize_filename`])

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlSection, HarvestConfig, OutputSection, SiteSection, config_dir,
    config_file_path, init_config, init_config_at, load_config, load_config_from,
};
pub use error::{HarvestError, Result};
pub use paths::sanitize_filename;
pub use types::{
    END_YEAR, MAX_SELECTED_YEARS, NO_ABSTRACT, Record, START_YEAR, UNTITLED, WorkItem,
    YearSelection,
};
