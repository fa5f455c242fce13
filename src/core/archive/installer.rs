// ─── Archive Installer ───
// Unpacks a client or assets zip over the install tree.
//
// Policy:
//   - a protected folder that already exists is never touched
//   - replace-folders are wiped before extraction (assets updates only wipe
//     the ones the archive actually ships)
//   - each entry is written to its own file, so a failure never corrupts
//     unrelated files

use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::events::EventSink;

const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// What to delete from the install tree before extracting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacePolicy {
    Keep,
    /// Remove every listed folder (full reinstall).
    ReplaceAll(Vec<String>),
    /// Remove a listed folder only if the archive ships a folder of that name.
    ReplaceIfInArchive(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files_written: usize,
    pub directories_created: usize,
    pub entries_skipped: usize,
    pub bytes_written: u64,
    pub folders_removed: Vec<PathBuf>,
    pub read_only_marked: usize,
}

#[derive(Debug, Clone)]
pub struct ArchiveInstaller {
    preserve_folders: Vec<String>,
    read_only_files: Vec<String>,
}

impl ArchiveInstaller {
    pub fn new(preserve_folders: Vec<String>, read_only_files: Vec<String>) -> Self {
        Self {
            preserve_folders,
            read_only_files,
        }
    }

    /// Prune, extract and lock down, on the blocking pool.
    pub async fn apply(
        &self,
        archive: &Path,
        install_root: &Path,
        policy: ReplacePolicy,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> UpdaterResult<ExtractSummary> {
        let archive = archive.to_path_buf();
        let install_root = install_root.to_path_buf();
        let preserve = self.preserve_folders.clone();
        let read_only = self.read_only_files.clone();
        let events = events.clone();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || -> UpdaterResult<ExtractSummary> {
            std::fs::create_dir_all(&install_root)
                .map_err(|e| UpdaterError::io(&install_root, e))?;

            let folders_removed = match &policy {
                ReplacePolicy::Keep => Vec::new(),
                ReplacePolicy::ReplaceAll(names) => {
                    prune_replaced_folders(&install_root, names, None)?
                }
                ReplacePolicy::ReplaceIfInArchive(names) => {
                    let shipped = top_level_folders(&archive)?;
                    prune_replaced_folders(&install_root, names, Some(&shipped))?
                }
            };

            let mut summary = extract_archive(&archive, &install_root, &preserve, &events, &cancel)?;
            summary.folders_removed = folders_removed;
            summary.read_only_marked = mark_read_only(&install_root, &read_only);
            Ok(summary)
        })
        .await
        .map_err(|e| UpdaterError::Other(format!("Task join error: {e}")))?
    }
}

// ── Extraction ──────────────────────────────────────────

struct PlannedEntry {
    index: usize,
    relative: PathBuf,
    is_dir: bool,
    size: u64,
}

/// Extract `archive_path` into `install_root`.
///
/// Entries under a protected folder that exists before extraction starts are
/// skipped; a protected folder that is not on disk yet is populated normally.
/// Extraction progress goes out as whole percentages of the bytes to write.
pub fn extract_archive(
    archive_path: &Path,
    install_root: &Path,
    protected_folders: &[String],
    events: &EventSink,
    cancel: &CancellationToken,
) -> UpdaterResult<ExtractSummary> {
    let zip_err = |source| UpdaterError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };

    let file = File::open(archive_path).map_err(|e| UpdaterError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(zip_err)?;

    let already_present: HashSet<String> = protected_folders
        .iter()
        .filter(|name| install_root.join(name.as_str()).is_dir())
        .map(|name| name.to_lowercase())
        .collect();
    if !already_present.is_empty() {
        info!("Preserving existing folders: {:?}", already_present);
    }

    let mut summary = ExtractSummary::default();
    let mut planned = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(zip_err)?;
        let name = entry.name().to_string();
        let segments =
            entry_segments(&name).ok_or_else(|| UpdaterError::UnsafeArchiveEntry(name.clone()))?;
        let Some(first) = segments.first() else {
            continue;
        };
        if already_present.contains(&first.to_lowercase()) {
            debug!("Skipping protected entry {}", name);
            summary.entries_skipped += 1;
            continue;
        }

        let is_dir = name.ends_with('/') || name.ends_with('\\');
        planned.push(PlannedEntry {
            index,
            relative: segments.iter().collect(),
            is_dir,
            size: if is_dir { 0 } else { entry.size() },
        });
    }

    let total_bytes: u64 = planned.iter().map(|e| e.size).sum();
    let mut processed: u64 = 0;
    let mut last_percent: Option<u8> = None;
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

    for entry in &planned {
        if cancel.is_cancelled() {
            info!("Extraction cancelled after {} files", summary.files_written);
            return Err(UpdaterError::Cancelled);
        }

        let dest = install_root.join(&entry.relative);
        if entry.is_dir {
            std::fs::create_dir_all(&dest).map_err(|e| UpdaterError::io(&dest, e))?;
            summary.directories_created += 1;
            continue;
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| UpdaterError::io(parent, e))?;
        }
        unlock_read_only(&dest)?;

        let mut zipped = archive.by_index(entry.index).map_err(zip_err)?;
        let mut out = File::create(&dest).map_err(|e| UpdaterError::io(&dest, e))?;
        loop {
            let read = zipped
                .read(&mut buffer)
                .map_err(|e| UpdaterError::io(&dest, e))?;
            if read == 0 {
                break;
            }
            out.write_all(&buffer[..read])
                .map_err(|e| UpdaterError::io(&dest, e))?;

            processed += read as u64;
            summary.bytes_written += read as u64;
            if total_bytes > 0 {
                let percent = (processed.saturating_mul(100) / total_bytes).min(100) as u8;
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    events.extraction(percent);
                }
            }
        }
        out.flush().map_err(|e| UpdaterError::io(&dest, e))?;
        summary.files_written += 1;
    }

    if last_percent != Some(100) {
        events.extraction(100);
    }

    info!(
        "Extracted {} files ({} bytes) into {:?}, skipped {} protected entries",
        summary.files_written, summary.bytes_written, install_root, summary.entries_skipped
    );
    Ok(summary)
}

/// Split an entry name on either separator. `None` if it would escape the
/// install root.
fn entry_segments(name: &str) -> Option<Vec<&str>> {
    let segments: Vec<&str> = name
        .split(|c| c == '/' || c == '\\')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.iter().any(|s| *s == ".." || s.contains(':')) {
        return None;
    }
    Some(segments)
}

fn unlock_read_only(path: &Path) -> UpdaterResult<()> {
    let Ok(metadata) = std::fs::metadata(path) else {
        return Ok(());
    };
    if !metadata.is_file() || !metadata.permissions().readonly() {
        return Ok(());
    }

    let mut permissions = metadata.permissions();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
    }
    std::fs::set_permissions(path, permissions).map_err(|e| UpdaterError::io(path, e))?;
    debug!("Unlocked read-only file {:?}", path);
    Ok(())
}

// ── Folder policy ───────────────────────────────────────

/// Lowercased names of the top-level folders an archive ships.
/// A lone top-level file does not count as a folder.
pub fn top_level_folders(archive_path: &Path) -> UpdaterResult<HashSet<String>> {
    let zip_err = |source| UpdaterError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };
    let file = File::open(archive_path).map_err(|e| UpdaterError::io(archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(zip_err)?;

    let mut folders = HashSet::new();
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(zip_err)?;
        let name = entry.name();
        let parts: Vec<&str> = name
            .split(|c| c == '/' || c == '\\')
            .filter(|s| !s.is_empty())
            .collect();
        let Some(first) = parts.first() else {
            continue;
        };
        let is_dir = name.ends_with('/') || name.ends_with('\\');
        if parts.len() == 1 && !is_dir {
            continue;
        }
        folders.insert(first.to_lowercase());
    }
    Ok(folders)
}

/// Delete configured folders from the install root.
///
/// With `only_if_shipped`, a folder is removed only when the archive carries
/// a top-level folder of the same name (case-insensitive). Names that are
/// not a single plain path component are ignored.
pub fn prune_replaced_folders(
    install_root: &Path,
    names: &[String],
    only_if_shipped: Option<&HashSet<String>>,
) -> UpdaterResult<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for name in names {
        let name = name.trim();
        if !is_plain_component(name) {
            warn!("Ignoring replace folder {:?}: not a plain folder name", name);
            continue;
        }
        if let Some(shipped) = only_if_shipped {
            if !shipped.contains(&name.to_lowercase()) {
                debug!("Keeping {:?}: the archive does not replace it", name);
                continue;
            }
        }

        let path = install_root.join(name);
        if path.is_dir() {
            std::fs::remove_dir_all(&path).map_err(|e| UpdaterError::io(&path, e))?;
            info!("Removed {:?} before extraction", path);
            removed.push(path);
        }
    }
    Ok(removed)
}

fn is_plain_component(name: &str) -> bool {
    if name.contains('\\') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Mark files read-only so the client cannot rewrite them.
/// Failures are logged and skipped; returns how many files were marked.
pub fn mark_read_only(install_root: &Path, files: &[String]) -> usize {
    let mut marked = 0;
    for relative in files {
        let path = install_root.join(relative);
        let Ok(metadata) = std::fs::metadata(&path) else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let mut permissions = metadata.permissions();
        permissions.set_readonly(true);
        match std::fs::set_permissions(&path, permissions) {
            Ok(()) => marked += 1,
            Err(e) => warn!("Cannot mark {:?} read-only: {}", path, e),
        }
    }
    marked
}
