// ─── Update Orchestrator ───
// Runs one update cycle for a plan:
//
//   Planned -> Downloading -> Extracting -> SyncingConfig -> Persisting -> Done
//                  \______________\___________________________________ Failed
//
// A `None` plan goes straight to Done. Config sync and persisting never fail
// the cycle; download and extraction errors do.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::plan::{UpdateMode, UpdatePlan, UpdatePlanner};
use crate::core::archive::{ArchiveInstaller, ReplacePolicy};
use crate::core::config::{InstallLayout, RemoteConfig, UpdaterSettings};
use crate::core::downloader::{Downloader, SignatureFetcher, SignatureSource};
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::events::{CycleStage, EventSink};
use crate::core::sync::ConfigSynchronizer;
use crate::core::version::{normalize, VersionStore};

/// What is installed once a cycle finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub mode: UpdateMode,
    pub updated_config: RemoteConfig,
    pub installed_version_raw: Option<String>,
    pub installed_version_normalized: Option<String>,
    pub assets_signature: Option<String>,
}

pub struct UpdateOrchestrator {
    layout: InstallLayout,
    store: VersionStore,
    downloader: Downloader,
    signatures: Arc<dyn SignatureSource>,
    installer: ArchiveInstaller,
    synchronizer: ConfigSynchronizer,
    fallback_config_url: Option<String>,
    /// Held for the whole of `execute`; a second caller is turned away.
    cycle: Mutex<()>,
}

impl UpdateOrchestrator {
    pub fn new(layout: InstallLayout, client: Client, settings: &UpdaterSettings) -> Self {
        let downloader = Downloader::new(client.clone());
        let probe_timeout = Duration::from_secs(settings.http.probe_timeout_secs);
        Self {
            store: VersionStore::new(layout.version_file()),
            layout,
            signatures: Arc::new(SignatureFetcher::new(client, probe_timeout)),
            installer: ArchiveInstaller::new(
                settings.preserve_folders.clone(),
                settings.read_only_files.clone(),
            ),
            synchronizer: ConfigSynchronizer::new(downloader.clone()),
            downloader,
            fallback_config_url: settings.launcher_config_url.clone(),
            cycle: Mutex::new(()),
        }
    }

    pub fn with_signature_source(mut self, signatures: Arc<dyn SignatureSource>) -> Self {
        self.signatures = signatures;
        self
    }

    /// Where config backups are staged during a sync.
    pub fn with_config_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.synchronizer = ConfigSynchronizer::with_backup_dir(self.downloader.clone(), dir);
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub async fn plan(&self, config: &RemoteConfig) -> UpdatePlan {
        UpdatePlanner::new(&self.layout, &self.store, self.signatures.as_ref())
            .plan(config)
            .await
    }

    pub async fn execute(
        &self,
        config: &RemoteConfig,
        plan: &UpdatePlan,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> UpdaterResult<UpdateResult> {
        let _cycle = self
            .cycle
            .try_lock()
            .map_err(|_| UpdaterError::CycleInProgress)?;

        events.stage(CycleStage::Planned);

        if plan.mode == UpdateMode::None {
            info!("Client is up to date");
            events.stage(CycleStage::Done);
            return Ok(UpdateResult {
                mode: UpdateMode::None,
                updated_config: config.clone(),
                installed_version_raw: plan.local_version_raw.clone(),
                installed_version_normalized: plan.local_version_normalized.clone(),
                assets_signature: plan.local_assets_signature.clone(),
            });
        }

        match self.run_cycle(config, plan, events, cancel).await {
            Ok(result) => {
                events.stage(CycleStage::Done);
                Ok(result)
            }
            Err(e) => {
                error!("{} update failed: {}", plan.mode, e);
                events.stage(CycleStage::Failed);
                Err(e)
            }
        }
    }

    async fn run_cycle(
        &self,
        config: &RemoteConfig,
        plan: &UpdatePlan,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> UpdaterResult<UpdateResult> {
        let replace: Vec<String> = config
            .replace_folder_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let (url, archive_path, policy) = match plan.mode {
            UpdateMode::Full => {
                let url = config
                    .full_client_url()
                    .ok_or(UpdaterError::MissingDownloadUrl(UpdateMode::Full))?;
                events.status("Updating full client...");
                let policy = if replace.is_empty() {
                    ReplacePolicy::Keep
                } else {
                    ReplacePolicy::ReplaceAll(replace)
                };
                (url, self.layout.full_archive_path(config), policy)
            }
            UpdateMode::Assets => {
                let url = config
                    .assets_url()
                    .ok_or(UpdaterError::MissingDownloadUrl(UpdateMode::Assets))?;
                events.status("Downloading assets...");
                let policy = if replace.is_empty() {
                    ReplacePolicy::Keep
                } else {
                    ReplacePolicy::ReplaceIfInArchive(replace)
                };
                (url, self.layout.assets_archive_path(config), policy)
            }
            UpdateMode::None => return Err(UpdaterError::MissingDownloadUrl(UpdateMode::None)),
        };

        // ── Download ──
        events.stage(CycleStage::Downloading);
        info!("Starting {} update from {}", plan.mode, url);
        self.downloader
            .download(url, &archive_path, events, cancel)
            .await?;

        // ── Extract ──
        events.stage(CycleStage::Extracting);
        events.status("Extracting files...");
        let install_root = self.layout.install_root(config);
        let summary = self
            .installer
            .apply(&archive_path, &install_root, policy, events, cancel)
            .await?;
        info!(
            "Installed {} files, removed {} folders, locked {} files",
            summary.files_written,
            summary.folders_removed.len(),
            summary.read_only_marked
        );
        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            warn!("Cannot delete {:?}: {}", archive_path, e);
        }

        // ── Config sync ──
        events.stage(CycleStage::SyncingConfig);
        let refreshed = match config
            .config_refresh_url()
            .or(self.fallback_config_url.as_deref())
        {
            Some(config_url) => {
                events.status("Refreshing launcher configuration...");
                let outcome = self
                    .synchronizer
                    .sync(
                        config_url,
                        &self.layout.base_config_path(),
                        &self.layout.install_config_path(config),
                        config,
                        cancel,
                    )
                    .await;
                outcome.is_refreshed().then(|| outcome.into_config())
            }
            None => None,
        };

        // ── Persist ──
        events.stage(CycleStage::Persisting);
        let (version_raw, version_normalized) =
            resolve_installed_version(refreshed.as_ref(), config, plan);
        let updated_config = refreshed.unwrap_or_else(|| config.clone());

        let assets_signature = match &plan.remote_assets_signature {
            Some(signature) => Some(signature.clone()),
            None => match updated_config.assets_url() {
                Some(assets_url) => self.signatures.fetch_signature(assets_url).await,
                None => None,
            },
        };

        if version_normalized.is_empty() {
            warn!("No installed version could be resolved, version record left untouched");
        } else if let Err(e) = self
            .store
            .save_async(
                version_raw.clone(),
                version_normalized.clone(),
                assets_signature.clone(),
            )
            .await
        {
            error!("Cannot persist installed version: {}", e);
        } else {
            info!("Installed version {:?} ({})", version_raw, version_normalized);
        }

        Ok(UpdateResult {
            mode: plan.mode,
            updated_config,
            installed_version_raw: version_raw,
            installed_version_normalized: (!version_normalized.is_empty())
                .then_some(version_normalized),
            assets_signature,
        })
    }
}

/// Freshly synced config first, then the config the cycle ran with, then the
/// plan's own record of the remote version.
fn resolve_installed_version(
    refreshed: Option<&RemoteConfig>,
    config: &RemoteConfig,
    plan: &UpdatePlan,
) -> (Option<String>, String) {
    let candidates = [
        refreshed.and_then(RemoteConfig::declared_version),
        config.declared_version(),
        plan.remote_version_raw.as_deref(),
    ];
    for raw in candidates.into_iter().flatten() {
        let normalized = normalize(raw);
        if !normalized.is_empty() {
            return (Some(raw.to_string()), normalized);
        }
    }
    (None, plan.remote_version_normalized.clone())
}
