use std::path::PathBuf;
use thiserror::Error;

use crate::core::update::UpdateMode;

/// Central error type for the update engine.
/// Every fallible module returns `Result<T, UpdaterError>`.
///
/// Only transport, extraction and invariant failures end up here. Signature
/// probes, version-record reads and config syncs degrade to fallbacks and
/// never surface an error to the caller.
#[derive(Debug, Error)]
pub enum UpdaterError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("No download URL configured for {0} update")]
    MissingDownloadUrl(UpdateMode),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip error in {path:?}: {source}")]
    Archive {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("Archive entry escapes the install root: {0}")]
    UnsafeArchiveEntry(String),

    // ── Version record ──────────────────────────────────
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Cycle control ───────────────────────────────────
    #[error("Update cancelled")]
    Cancelled,

    #[error("Another update cycle is already running for this installation")]
    CycleInProgress,

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type UpdaterResult<T> = Result<T, UpdaterError>;

impl UpdaterError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UpdaterError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for UpdaterError {
    fn from(source: std::io::Error) -> Self {
        UpdaterError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// ── Serialization for the GUI shell ─────────────────────
// The window layer only needs a message it can show next to the retry button.
impl serde::Serialize for UpdaterError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_display_string() {
        let err = UpdaterError::DownloadFailed {
            url: "https://cdn.example.com/client.zip".into(),
            status: 503,
        };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(
            json,
            "\"Download failed for https://cdn.example.com/client.zip: HTTP 503\""
        );
    }

    #[test]
    fn io_error_keeps_offending_path() {
        let err = UpdaterError::io(
            "/games/client/bin/client.exe",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
        );
        assert!(err.to_string().contains("client.exe"));
    }
}
