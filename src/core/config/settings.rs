use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const APP_DIR_NAME: &str = "CanaryLauncher";
const SETTINGS_FILE: &str = "updater_settings.json";
const APP_USER_AGENT: &str = "CanaryLauncher-Updater/0.1.0";

/// Transport tuning for the shared HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    /// Maximum silence between two reads of a response body.
    pub read_timeout_secs: u64,
    /// Whole-request budget for HEAD / 0-byte range probes.
    pub probe_timeout_secs: u64,
    pub pool_idle_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: APP_USER_AGENT.to_string(),
            connect_timeout_secs: 15,
            read_timeout_secs: 60,
            probe_timeout_secs: 10,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 4,
        }
    }
}

/// Local updater settings, persisted as `updater_settings.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterSettings {
    /// Overrides the launcher base directory.
    pub base_dir: Option<PathBuf>,
    /// Used when the remote document carries no `newConfigUrl`.
    pub launcher_config_url: Option<String>,
    /// Top-level folders that are never overwritten once they exist.
    pub preserve_folders: Vec<String>,
    /// Files (relative to the install root) marked read-only after install.
    pub read_only_files: Vec<String>,
    pub http: HttpSettings,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            base_dir: None,
            launcher_config_url: None,
            preserve_folders: vec!["conf".into(), "characterdata".into()],
            read_only_files: vec![
                "cache/eventschedule.json".into(),
                "cache/boostedcreature.json".into(),
                "cache/onlinenumbers.json".into(),
            ],
            http: HttpSettings::default(),
        }
    }
}

impl UpdaterSettings {
    /// Load settings from `dir`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_or_default(dir: &Path) -> Self {
        let path = dir.join(SETTINGS_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring corrupt {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, dir: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(SETTINGS_FILE), json)
    }

    /// The base directory every install path hangs off.
    pub fn resolve_base_dir(&self) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.clone(),
            None => default_base_dir(),
        }
    }
}

pub fn default_base_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
