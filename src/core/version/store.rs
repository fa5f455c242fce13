// ─── Version Store ───
// `client_version.txt`: the only durable state the updater owns.
//
//   [raw version]          optional, e.g. "13.40.5500"
//   normalized version     digits only, e.g. "13405500"
//   [assets signature]     optional ETag or "<length>:<last-modified>"

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::codec::normalize;
use crate::core::error::{UpdaterError, UpdaterResult};

/// What the last successful cycle installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub version_raw: Option<String>,
    pub version_normalized: String,
    pub assets_signature: Option<String>,
}

/// On-disk shapes the record has had over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// `normalized`
    NormalizedOnly,
    /// `normalized`, `signature`
    NormalizedWithSignature,
    /// `raw`, `normalized`, `[signature]`
    RawNormalizedSignature,
}

#[derive(Debug, Clone)]
pub struct VersionStore {
    path: PathBuf,
}

impl VersionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record. Missing, empty, unreadable or malformed files all
    /// mean "no prior installation".
    pub fn load(&self) -> Option<VersionRecord> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Cannot read {:?}, treating as first install: {}", self.path, e);
                }
                return None;
            }
        };

        let lines: Vec<&str> = contents.lines().map(str::trim).collect();
        let (layout, record) = parse_record(&lines)?;
        debug!("Loaded version record ({:?}): {:?}", layout, record);
        Some(record)
    }

    /// Persist the record in a single replace-on-rename write.
    pub fn save(
        &self,
        version_raw: Option<&str>,
        version_normalized: &str,
        assets_signature: Option<&str>,
    ) -> UpdaterResult<()> {
        if version_normalized.trim().is_empty() {
            return Err(UpdaterError::InvalidVersion(
                "normalized version cannot be empty".into(),
            ));
        }

        let mut lines: Vec<&str> = Vec::with_capacity(3);
        if let Some(raw) = version_raw.filter(|r| !r.trim().is_empty()) {
            lines.push(raw);
        }
        lines.push(version_normalized);
        if let Some(signature) = assets_signature.filter(|s| !s.is_empty()) {
            lines.push(signature);
        }

        let mut contents = lines.join("\n");
        contents.push('\n');

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| UpdaterError::io(parent, e))?;
        }

        let staging = self.path.with_extension("txt.tmp");
        std::fs::write(&staging, contents).map_err(|e| UpdaterError::io(&staging, e))?;
        std::fs::rename(&staging, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&staging);
            UpdaterError::io(&self.path, e)
        })?;

        debug!("Saved version record {:?}", self.path);
        Ok(())
    }

    // ── Async wrappers ──────────────────────────────────

    /// [`load`](Self::load) on the blocking pool.
    pub async fn load_async(&self) -> Option<VersionRecord> {
        let store = self.clone();
        match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Version record read task failed: {}", e);
                None
            }
        }
    }

    /// [`save`](Self::save) on the blocking pool.
    pub async fn save_async(
        &self,
        version_raw: Option<String>,
        version_normalized: String,
        assets_signature: Option<String>,
    ) -> UpdaterResult<()> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            store.save(
                version_raw.as_deref(),
                &version_normalized,
                assets_signature.as_deref(),
            )
        })
        .await
        .map_err(|e| UpdaterError::Other(format!("Task join error: {e}")))?
    }
}

/// Try the current layout first, then fall back to the legacy ones.
fn parse_record(lines: &[&str]) -> Option<(RecordLayout, VersionRecord)> {
    let line = |i: usize| lines.get(i).copied().filter(|l| !l.is_empty());

    let (layout, record) = match lines.len() {
        0 => return None,
        1 => (
            RecordLayout::NormalizedOnly,
            VersionRecord {
                version_raw: None,
                version_normalized: line(0)?.to_string(),
                assets_signature: None,
            },
        ),
        _ => match (line(0), line(1)) {
            (Some(first), Some(second)) if normalize(first) == second => (
                RecordLayout::RawNormalizedSignature,
                VersionRecord {
                    version_raw: Some(first.to_string()),
                    version_normalized: second.to_string(),
                    assets_signature: line(2).map(str::to_string),
                },
            ),
            (first, second) => (
                RecordLayout::NormalizedWithSignature,
                VersionRecord {
                    version_raw: None,
                    version_normalized: first?.to_string(),
                    assets_signature: line(2).or(second).map(str::to_string),
                },
            ),
        },
    };

    if !record.version_normalized.chars().all(|c| c.is_ascii_digit()) {
        warn!(
            "Version record has a non-numeric version line {:?}; ignoring it",
            record.version_normalized
        );
        return None;
    }

    Some((layout, record))
}
