//! PDF artifact storage.
//!
//! [`ArtifactStore`] downloads each paper's PDF to
//! `{dir}/{sanitized year_title}.pdf`. A file already at that path is taken
//! as done and never re-fetched, which is the only resumability a harvest run
//! has. Bodies are streamed into a hidden temporary file in the same
//! directory and linked into place once complete, so an interrupted download
//! never leaves a truncated file under the final name. When two downloads of
//! the same name race, the file that lands first is kept.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use harvest_crawler::Fetcher;
use harvest_shared::{HarvestError, Result, sanitize_filename};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

/// What [`ArtifactStore::store`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The target existed, or another download placed it first; nothing was kept.
    AlreadyPresent { path: PathBuf },
    /// The body was streamed to `path`.
    Downloaded { path: PathBuf, bytes: u64 },
}

impl StoreOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::AlreadyPresent { path } | Self::Downloaded { path, .. } => path,
        }
    }
}

/// Directory of downloaded PDFs keyed by sanitized name.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    chunk_size: usize,
}

impl ArtifactStore {
    /// `chunk_size` is the write buffer size; it affects throughput only.
    pub fn new(dir: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            dir: dir.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Final on-disk location for `name_hint`.
    pub fn path_for(&self, name_hint: &str) -> PathBuf {
        self.dir.join(format!("{}.pdf", sanitize_filename(name_hint)))
    }

    /// Download `artifact_url` unless `path_for(name_hint)` already exists.
    #[instrument(skip_all, fields(url = %artifact_url))]
    pub async fn store(
        &self,
        fetcher: &Fetcher,
        artifact_url: &Url,
        name_hint: &str,
        cancel: &CancellationToken,
    ) -> Result<StoreOutcome> {
        let path = self.path_for(name_hint);

        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| HarvestError::io(&path, e))?;
        if exists {
            debug!(path = %path.display(), "file exists");
            return Ok(StoreOutcome::AlreadyPresent { path });
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HarvestError::io(&self.dir, e))?;

        let tmp = temp_path(&self.dir);
        let bytes = match self.stream_to(fetcher, artifact_url, &tmp, cancel).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e);
            }
        };

        let placed = publish(&tmp, &path)
            .await
            .map_err(|e| HarvestError::download(artifact_url.as_str(), e))?;
        if !placed {
            debug!(path = %path.display(), "another download finished first");
            return Ok(StoreOutcome::AlreadyPresent { path });
        }

        info!(path = %path.display(), bytes, "downloaded");
        Ok(StoreOutcome::Downloaded { path, bytes })
    }

    /// Stream the response body into `tmp`, returning the byte count.
    async fn stream_to(
        &self,
        fetcher: &Fetcher,
        url: &Url,
        tmp: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let mut response = fetcher
            .open_stream(url, cancel)
            .await
            .map_err(|e| into_download(url, e))?;

        let file = File::create(tmp).await.map_err(|e| {
            HarvestError::download(url.as_str(), format!("create {}: {e}", tmp.display()))
        })?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut bytes: u64 = 0;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
                chunk = response.chunk() => {
                    chunk.map_err(|e| HarvestError::download(url.as_str(), e))?
                }
            };
            let Some(chunk) = chunk else { break };

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| HarvestError::download(url.as_str(), e))?;
            bytes += chunk.len() as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| HarvestError::download(url.as_str(), e))?;
        writer
            .into_inner()
            .sync_all()
            .await
            .map_err(|e| HarvestError::download(url.as_str(), e))?;

        Ok(bytes)
    }
}

/// Fresh hidden file in `dir` that holds a body while it is still arriving.
///
/// The name has a fixed length so a title that fits as a final name always
/// fits here too.
fn temp_path(dir: &Path) -> PathBuf {
    dir.join(format!(".{}.part", Uuid::now_v7()))
}

/// Move a finished `tmp` to `path` without replacing an existing file.
///
/// Returns `false` when `path` already existed; the existing file is kept and
/// `tmp` is discarded either way.
async fn publish(tmp: &Path, path: &Path) -> std::io::Result<bool> {
    let linked = match tokio::fs::hard_link(tmp, path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        // Filesystems without hard links get a plain rename.
        Err(_) => tokio::fs::rename(tmp, path).await.map(|()| true),
    };
    let _ = tokio::fs::remove_file(tmp).await;
    linked
}

/// Failures opening the stream count as download failures, not page fetches.
fn into_download(url: &Url, err: HarvestError) -> HarvestError {
    match err {
        HarvestError::Fetch { cause, .. } => HarvestError::download(url.as_str(), cause),
        other => other,
    }
}
