//! Error types for the harvester.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all harvester operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Network failure, timeout, or non-2xx status while fetching a page.
    #[error("fetch failed for {url}: {cause}")]
    Fetch { url: String, cause: String },

    /// Markup did not yield a usable record.
    #[error("extraction failed for {url}: {message}")]
    Extract { url: String, message: String },

    /// The item page carries no PDF link. Logged and skipped, never retried.
    #[error("no PDF link found: {url}")]
    MissingArtifact { url: String },

    /// Transport or I/O failure while streaming an artifact to disk.
    #[error("download failed for {url}: {cause}")]
    Download { url: String, cause: String },

    /// Filesystem failure while writing a record to one of its sinks.
    #[error("persist failed at {path:?}: {cause}")]
    Persist { path: PathBuf, cause: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Input validation error (year selection, URLs, ...).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error outside the record sinks.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The run was cancelled while this operation was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a fetch error for `url`.
    pub fn fetch(url: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            cause: cause.to_string(),
        }
    }

    /// Create an extraction error for `url`.
    pub fn extract(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Extract {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a download error for `url`.
    pub fn download(url: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Download {
            url: url.into(),
            cause: cause.to_string(),
        }
    }

    /// Create a persist error for the sink at `path`.
    pub fn persist(path: impl Into<PathBuf>, cause: impl std::fmt::Display) -> Self {
        Self::Persist {
            path: path.into(),
            cause: cause.to_string(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Soft failures are logged and the item skipped without another attempt.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::MissingArtifact { .. })
    }

    /// Whether another attempt at the same item could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { .. }
            | Self::Extract { .. }
            | Self::Download { .. }
            | Self::Persist { .. }
            | Self::Io { .. } => true,
            Self::MissingArtifact { .. }
            | Self::Config { .. }
            | Self::Validation { .. }
            | Self::Cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = HarvestError::config("bad concurrency");
        assert_eq!(err.to_string(), "config error: bad concurrency");

        let err = HarvestError::fetch("https://papers.nips.cc/x", "HTTP 503");
        assert_eq!(
            err.to_string(),
            "fetch failed for https://papers.nips.cc/x: HTTP 503"
        );
    }

    #[test]
    fn missing_artifact_is_soft_and_not_retried() {
        let err = HarvestError::MissingArtifact {
            url: "https://papers.nips.cc/a".into(),
        };
        assert!(err.is_soft());
        assert!(!err.is_retryable());
    }

    #[test]
    fn per_item_failures_are_retryable() {
        assert!(HarvestError::fetch("u", "timeout").is_retryable());
        assert!(HarvestError::extract("u", "bad href").is_retryable());
        assert!(HarvestError::download("u", "reset").is_retryable());
        assert!(HarvestError::persist("/tmp/x.csv", "disk full").is_retryable());
        assert!(!HarvestError::Cancelled.is_retryable());
        assert!(!HarvestError::fetch("u", "timeout").is_soft());
    }
}
