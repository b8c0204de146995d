//! Application configuration for the harvester.
//!
//! User config lives at `~/.neurips-harvest/harvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "harvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".neurips-harvest";

// ---------------------------------------------------------------------------
// Config structs (matching harvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the proceedings live.
    #[serde(default)]
    pub site: SiteSection,

    /// Worker pool, timeout, and retry tuning.
    #[serde(default)]
    pub crawl: CrawlSection,

    /// Output locations.
    #[serde(default)]
    pub output: OutputSection,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSection {
    /// Proceedings root listing one link per year.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Separate 2021 datasets-and-benchmarks collection.
    #[serde(default = "default_datasets_url")]
    pub datasets_url: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            datasets_url: default_datasets_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://papers.nips.cc".into()
}
fn default_datasets_url() -> String {
    "https://datasets-benchmarks-proceedings.neurips.cc".into()
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSection {
    /// Number of worker tasks processing papers in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per paper before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Backoff unit; attempt `n` sleeps `backoff_base_ms * 2^n`.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Work items buffered ahead of the workers before enumeration blocks.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Write buffer size for PDF downloads.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            queue_capacity: default_queue_capacity(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_concurrency() -> usize {
    50
}
fn default_max_attempts() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_queue_capacity() -> usize {
    100
}
fn default_chunk_size() -> usize {
    16 * 1024
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Root directory for PDFs, metadata files, and the per-year logs.
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "neurips_output".into()
}

// ---------------------------------------------------------------------------
// Harvest config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime harvest configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub base_url: Url,
    pub datasets_url: Url,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff_base: Duration,
    pub queue_capacity: usize,
    pub chunk_size: usize,
    pub output_dir: PathBuf,
}

impl HarvestConfig {
    /// Reject settings that would stall or disable the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(HarvestError::config("concurrency must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(HarvestError::config("max_attempts must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(HarvestError::config("queue_capacity must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(HarvestError::config("chunk_size must be at least 1"));
        }
        Ok(())
    }
}

impl TryFrom<&AppConfig> for HarvestConfig {
    type Error = HarvestError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let parse = |field: &str, raw: &str| {
            Url::parse(raw)
                .map_err(|e| HarvestError::config(format!("invalid {field} '{raw}': {e}")))
        };

        Ok(Self {
            base_url: parse("site.base_url", &config.site.base_url)?,
            datasets_url: parse("site.datasets_url", &config.site.datasets_url)?,
            concurrency: config.crawl.concurrency,
            max_attempts: config.crawl.max_attempts,
            timeout: Duration::from_secs(config.crawl.timeout_secs),
            backoff_base: Duration::from_millis(config.crawl.backoff_base_ms),
            queue_capacity: config.crawl.queue_capacity,
            chunk_size: config.crawl.chunk_size,
            output_dir: PathBuf::from(&config.output.dir),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.neurips-harvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.neurips-harvest/harvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

/// Write a default config file at `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| HarvestError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| HarvestError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("papers.nips.cc"));
        assert!(toml_str.contains("concurrency"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[crawl]
concurrency = 8

[output]
dir = "/tmp/harvest"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.crawl.concurrency, 8);
        assert_eq!(config.crawl.max_attempts, 3);
        assert_eq!(config.crawl.timeout_secs, 60);
        assert_eq!(config.output.dir, "/tmp/harvest");
        assert_eq!(config.site.base_url, "https://papers.nips.cc");
    }

    #[test]
    fn harvest_config_from_app_config() {
        let app = AppConfig::default();
        let harvest = HarvestConfig::try_from(&app).expect("convert");
        assert_eq!(harvest.concurrency, 50);
        assert_eq!(harvest.max_attempts, 3);
        assert_eq!(harvest.timeout, Duration::from_secs(60));
        assert_eq!(harvest.backoff_base, Duration::from_secs(1));
        assert_eq!(harvest.chunk_size, 16384);
        assert_eq!(harvest.base_url.as_str(), "https://papers.nips.cc/");
        harvest.validate().expect("defaults are valid");
    }

    #[test]
    fn invalid_url_is_a_config_error() {
        let mut app = AppConfig::default();
        app.site.base_url = "not a url".into();
        let err = HarvestConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("site.base_url"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut app = AppConfig::default();
        app.crawl.concurrency = 0;
        let harvest = HarvestConfig::try_from(&app).expect("convert");
        assert!(harvest.validate().is_err());
    }

    #[test]
    fn init_then_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("harvest-config-test-{}", std::process::id()));
        let path = dir.join("nested").join(CONFIG_FILE_NAME);
        init_config_at(&path).expect("init");
        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded.crawl.queue_capacity, 100);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
