//! Record persistence for a harvest run.
//!
//! Every [`Record`] lands in three places under the output root:
//!
//! - `metadata/{year}/{sanitized title}.json`: pretty JSON, overwritten
//! - `neurips_{year}.json`: one compact JSON object per line
//! - `neurips_{year}.csv`: header once, then one row per record
//!
//! The two year logs are shared by all workers, so appends go through one
//! async mutex per log kind. Nothing is deduplicated: persisting a record
//! twice yields two lines in each log.

use std::path::{Path, PathBuf};

use harvest_shared::{HarvestError, Record, Result, sanitize_filename};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Column order of the CSV log.
pub const CSV_HEADER: [&str; 6] = ["year", "title", "authors", "abstract", "pdf_url", "paper_url"];

/// Separator used to flatten the author list into one CSV cell.
pub const AUTHOR_SEPARATOR: &str = "; ";

/// Shared sink for harvested records.
///
/// Wrap in an `Arc` and hand a clone to every worker.
pub struct PersistenceContext {
    root: PathBuf,
    json_log: Mutex<()>,
    csv_log: Mutex<()>,
}

impl PersistenceContext {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            root: output_root.into(),
            json_log: Mutex::new(()),
            csv_log: Mutex::new(()),
        }
    }

    /// `neurips_{year}.csv`
    pub fn csv_log_path(&self, year: u16) -> PathBuf {
        self.root.join(format!("neurips_{year}.csv"))
    }

    /// `neurips_{year}.json`
    pub fn json_log_path(&self, year: u16) -> PathBuf {
        self.root.join(format!("neurips_{year}.json"))
    }

    /// `metadata/{year}/{sanitized title}.json`
    pub fn metadata_path(&self, record: &Record) -> PathBuf {
        self.root
            .join("metadata")
            .join(record.year.to_string())
            .join(format!("{}.json", sanitize_filename(&record.title)))
    }

    /// Write `record` to its metadata file and append it to both year logs.
    #[instrument(skip_all, fields(year = record.year, title = %record.title))]
    pub async fn persist(&self, record: &Record) -> Result<()> {
        self.write_metadata(record).await?;
        self.append_json(record).await?;
        self.append_csv(record).await?;
        debug!("record persisted");
        Ok(())
    }

    async fn write_metadata(&self, record: &Record) -> Result<()> {
        let path = self.metadata_path(record);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HarvestError::persist(parent, e))?;
        }

        let body =
            serde_json::to_string_pretty(record).map_err(|e| HarvestError::persist(&path, e))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| HarvestError::persist(&path, e))
    }

    async fn append_json(&self, record: &Record) -> Result<()> {
        let path = self.json_log_path(record.year);
        let mut line = serde_json::to_vec(record).map_err(|e| HarvestError::persist(&path, e))?;
        line.push(b'\n');

        let _guard = self.json_log.lock().await;
        append(&path, &line).await
    }

    async fn append_csv(&self, record: &Record) -> Result<()> {
        let path = self.csv_log_path(record.year);

        // The existence check and the append must happen under one lock, or
        // two first writers could both emit the header.
        let _guard = self.csv_log.lock().await;
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| HarvestError::persist(&path, e))?;

        let bytes = csv_bytes(record, !exists).map_err(|e| HarvestError::persist(&path, e))?;
        append(&path, &bytes).await
    }
}

/// Encode `record` as one CSV row, preceded by the header when asked.
fn csv_bytes(record: &Record, with_header: bool) -> std::result::Result<Vec<u8>, String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    if with_header {
        writer.write_record(CSV_HEADER).map_err(|e| e.to_string())?;
    }
    writer
        .write_record([
            record.year.to_string().as_str(),
            record.title.as_str(),
            record.authors.join(AUTHOR_SEPARATOR).as_str(),
            record.abstract_text.as_str(),
            record.artifact_url.as_str(),
            record.source_url.as_str(),
        ])
        .map_err(|e| e.to_string())?;

    writer.into_inner().map_err(|e| e.to_string())
}

async fn append(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HarvestError::persist(parent, e))?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| HarvestError::persist(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| HarvestError::persist(path, e))?;
    file.flush().await.map_err(|e| HarvestError::persist(path, e))
}
