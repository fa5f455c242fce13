use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use crate::core::config::{InstallLayout, RemoteConfig, UpdaterSettings};
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::http::build_http_client;
use crate::core::update::UpdateOrchestrator;

/// Everything a shell needs to drive update cycles for one installation.
pub struct AppState {
    pub base_dir: PathBuf,
    pub settings: UpdaterSettings,
    pub http_client: Client,
    pub orchestrator: Arc<UpdateOrchestrator>,
}

impl AppState {
    /// Wire settings, transport and orchestrator together.
    ///
    /// `base_dir` overrides both the settings file and the default data
    /// directory.
    pub fn new(base_dir: Option<PathBuf>) -> UpdaterResult<Self> {
        let settings_dir = base_dir
            .clone()
            .unwrap_or_else(crate::core::config::default_base_dir);
        let settings = UpdaterSettings::load_or_default(&settings_dir);
        let base_dir = base_dir.unwrap_or_else(|| settings.resolve_base_dir());

        std::fs::create_dir_all(&base_dir).map_err(|e| UpdaterError::io(&base_dir, e))?;

        let http_client = build_http_client(&settings.http)?;
        let orchestrator = Arc::new(UpdateOrchestrator::new(
            InstallLayout::new(&base_dir),
            http_client.clone(),
            &settings,
        ));

        info!("Updater state ready at {:?}", base_dir);
        Ok(Self {
            base_dir,
            settings,
            http_client,
            orchestrator,
        })
    }

    pub fn layout(&self) -> &InstallLayout {
        self.orchestrator.layout()
    }

    /// The remote document, from an explicit URL or the configured default.
    pub async fn fetch_remote_config(&self, url: Option<&str>) -> UpdaterResult<RemoteConfig> {
        let url = url
            .or(self.settings.launcher_config_url.as_deref())
            .ok_or_else(|| UpdaterError::Other("No launcher config URL configured".into()))?;
        RemoteConfig::fetch(&self.http_client, url).await
    }

    /// The copy of the remote document cached in the base directory.
    pub async fn cached_remote_config(&self) -> UpdaterResult<RemoteConfig> {
        RemoteConfig::from_file(&self.layout().base_config_path()).await
    }

    pub fn save_settings(&self) -> UpdaterResult<()> {
        self.settings
            .save(&self.base_dir)
            .map_err(|e| UpdaterError::io(&self.base_dir, e))
    }
}
