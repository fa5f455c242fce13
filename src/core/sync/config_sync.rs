// ─── Config Synchronizer ───
// Refreshes the secondary launcher_config.json copies after an update.
// Either both copies end up with the new document, or both are put back
// exactly as they were. A failure here never fails the cycle.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::config::RemoteConfig;
use crate::core::downloader::Downloader;
use crate::core::error::{UpdaterError, UpdaterResult};

/// How a sync attempt ended. Every variant carries the config the rest of
/// the cycle should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Downloaded, written and parsed.
    Refreshed(RemoteConfig),
    /// Something failed; the targets were rolled back.
    Restored(RemoteConfig),
    /// Nothing was touched (backup could not be taken).
    Skipped(RemoteConfig),
}

impl SyncOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, SyncOutcome::Refreshed(_))
    }

    pub fn into_config(self) -> RemoteConfig {
        match self {
            SyncOutcome::Refreshed(c) | SyncOutcome::Restored(c) | SyncOutcome::Skipped(c) => c,
        }
    }
}

/// A target and the copy taken of it. `copy` is `None` when the target did
/// not exist before the sync.
struct Backup {
    target: PathBuf,
    copy: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ConfigSynchronizer {
    downloader: Downloader,
    backup_dir: PathBuf,
}

impl ConfigSynchronizer {
    pub fn new(downloader: Downloader) -> Self {
        Self::with_backup_dir(downloader, std::env::temp_dir())
    }

    pub fn with_backup_dir(downloader: Downloader, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloader,
            backup_dir: backup_dir.into(),
        }
    }

    pub async fn sync(
        &self,
        url: &str,
        base_path: &Path,
        install_path: &Path,
        original: &RemoteConfig,
        cancel: &CancellationToken,
    ) -> SyncOutcome {
        let mut targets = vec![base_path.to_path_buf()];
        if install_path != base_path {
            targets.push(install_path.to_path_buf());
        }

        let backups = match self.take_backups(&targets).await {
            Ok(backups) => backups,
            Err(e) => {
                warn!("Skipping launcher config refresh, backup failed: {}", e);
                return SyncOutcome::Skipped(original.clone());
            }
        };

        let outcome = match self.refresh(url, &targets, cancel).await {
            Ok(config) => {
                info!("Launcher config refreshed from {}", url);
                SyncOutcome::Refreshed(config)
            }
            Err(e) => {
                warn!("Launcher config refresh failed, restoring previous copies: {}", e);
                restore(&backups).await;
                SyncOutcome::Restored(original.clone())
            }
        };

        discard(&backups).await;
        outcome
    }

    async fn refresh(
        &self,
        url: &str,
        targets: &[PathBuf],
        cancel: &CancellationToken,
    ) -> UpdaterResult<RemoteConfig> {
        let document = self.downloader.fetch_text(url, cancel).await?;

        for target in targets {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| UpdaterError::io(parent, e))?;
            }
            tokio::fs::write(target, &document)
                .await
                .map_err(|e| UpdaterError::io(target, e))?;
        }

        RemoteConfig::from_json(&document)
    }

    async fn take_backups(&self, targets: &[PathBuf]) -> UpdaterResult<Vec<Backup>> {
        let mut backups = Vec::with_capacity(targets.len());
        for target in targets {
            if !tokio::fs::try_exists(target).await.unwrap_or(false) {
                backups.push(Backup {
                    target: target.clone(),
                    copy: None,
                });
                continue;
            }

            let copy = self
                .backup_dir
                .join(format!("launcher_config_{}.bak", Uuid::new_v4()));
            if let Err(e) = tokio::fs::copy(target, &copy).await {
                discard(&backups).await;
                return Err(UpdaterError::io(target, e));
            }
            debug!("Backed up {:?} to {:?}", target, copy);
            backups.push(Backup {
                target: target.clone(),
                copy: Some(copy),
            });
        }
        Ok(backups)
    }
}

async fn restore(backups: &[Backup]) {
    for backup in backups {
        let result = match &backup.copy {
            Some(copy) => tokio::fs::copy(copy, &backup.target).await.map(|_| ()),
            None => match tokio::fs::remove_file(&backup.target).await {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            error!("Cannot restore {:?}: {}", backup.target, e);
        }
    }
}

async fn discard(backups: &[Backup]) {
    for copy in backups.iter().filter_map(|b| b.copy.as_ref()) {
        if let Err(e) = tokio::fs::remove_file(copy).await {
            warn!("Cannot delete backup {:?}: {}", copy, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{self, ServedFile};
    use reqwest::Client;

    struct Fixture {
        _dir: tempfile::TempDir,
        backups: PathBuf,
        base: PathBuf,
        install: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let backups = dir.path().join("backups");
        std::fs::create_dir_all(&backups).unwrap();
        std::fs::create_dir_all(dir.path().join("Tibia")).unwrap();
        Fixture {
            base: dir.path().join("launcher_config.json"),
            install: dir.path().join("Tibia/launcher_config.json"),
            backups,
            _dir: dir,
        }
    }

    fn synchronizer(fx: &Fixture) -> ConfigSynchronizer {
        ConfigSynchronizer::with_backup_dir(Downloader::new(Client::new()), &fx.backups)
    }

    fn original() -> RemoteConfig {
        RemoteConfig {
            client_version: Some("1.0.1".into()),
            ..Default::default()
        }
    }

    fn backup_count(fx: &Fixture) -> usize {
        std::fs::read_dir(&fx.backups).unwrap().count()
    }

    #[tokio::test]
    async fn failed_fetch_restores_both_copies() {
        let fx = fixture();
        std::fs::write(&fx.base, "base copy").unwrap();
        std::fs::write(&fx.install, "install copy").unwrap();
        let base_url = test_support::serve(ServedFile::new(Vec::new()).failing_with(500)).await;

        let outcome = synchronizer(&fx)
            .sync(
                &format!("{base_url}/file"),
                &fx.base,
                &fx.install,
                &original(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome, SyncOutcome::Restored(original()));
        assert_eq!(std::fs::read(&fx.base).unwrap(), b"base copy");
        assert_eq!(std::fs::read(&fx.install).unwrap(), b"install copy");
        assert_eq!(backup_count(&fx), 0);
    }

    #[tokio::test]
    async fn unparsable_document_is_rolled_back() {
        let fx = fixture();
        std::fs::write(&fx.base, "base copy").unwrap();
        let base_url = test_support::serve(ServedFile::new(b"<html>oops</html>".to_vec())).await;

        let outcome = synchronizer(&fx)
            .sync(
                &format!("{base_url}/file"),
                &fx.base,
                &fx.install,
                &original(),
                &CancellationToken::new(),
            )
            .await;

        assert!(!outcome.is_refreshed());
        assert_eq!(std::fs::read(&fx.base).unwrap(), b"base copy");
        // Did not exist before the sync, so it must not exist after.
        assert!(!fx.install.exists());
        assert_eq!(backup_count(&fx), 0);
    }

    #[tokio::test]
    async fn successful_sync_writes_both_copies() {
        let fx = fixture();
        std::fs::write(&fx.base, "stale").unwrap();
        let document = br#"{"clientVersion":"1.0.2","clientFolder":"Tibia"}"#.to_vec();
        let base_url = test_support::serve(ServedFile::new(document.clone())).await;

        let outcome = synchronizer(&fx)
            .sync(
                &format!("{base_url}/file"),
                &fx.base,
                &fx.install,
                &original(),
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_refreshed());
        let config = outcome.into_config();
        assert_eq!(config.declared_version(), Some("1.0.2"));
        assert_eq!(std::fs::read(&fx.base).unwrap(), document);
        assert_eq!(std::fs::read(&fx.install).unwrap(), document);
        assert_eq!(backup_count(&fx), 0);
    }

    #[tokio::test]
    async fn same_path_is_written_once() {
        let fx = fixture();
        let base_url =
            test_support::serve(ServedFile::new(br#"{"clientVersion":"2.0"}"#.to_vec())).await;

        let outcome = synchronizer(&fx)
            .sync(
                &format!("{base_url}/file"),
                &fx.base,
                &fx.base,
                &original(),
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_refreshed());
        assert!(!fx.install.exists());
    }
}
