use std::path::{Path, PathBuf};

use super::remote::RemoteConfig;

const VERSION_FILE: &str = "client_version.txt";
const LAUNCHER_CONFIG_FILE: &str = "launcher_config.json";
const FULL_ARCHIVE_FILE: &str = "client_package.zip";
const ASSETS_ARCHIVE_FILE: &str = "assets.zip";

/// Where everything lives on disk, relative to the launcher base directory.
///
/// ```text
/// <base>/
///   client_version.txt
///   launcher_config.json
///   <clientFolder>/
///     bin/<clientExecutable>
///     launcher_config.json
/// ```
#[derive(Debug, Clone)]
pub struct InstallLayout {
    base_dir: PathBuf,
}

impl InstallLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn install_root(&self, config: &RemoteConfig) -> PathBuf {
        match config.client_folder.as_deref().map(str::trim) {
            Some(folder) if !folder.is_empty() => self.base_dir.join(folder),
            _ => self.base_dir.clone(),
        }
    }

    pub fn executable_path(&self, config: &RemoteConfig) -> Option<PathBuf> {
        let exe = config.client_executable.as_deref().map(str::trim)?;
        if exe.is_empty() {
            return None;
        }
        Some(self.install_root(config).join("bin").join(exe))
    }

    pub fn version_file(&self) -> PathBuf {
        self.base_dir.join(VERSION_FILE)
    }

    pub fn base_config_path(&self) -> PathBuf {
        self.base_dir.join(LAUNCHER_CONFIG_FILE)
    }

    pub fn install_config_path(&self, config: &RemoteConfig) -> PathBuf {
        self.install_root(config).join(LAUNCHER_CONFIG_FILE)
    }

    pub fn full_archive_path(&self, config: &RemoteConfig) -> PathBuf {
        self.install_root(config).join(FULL_ARCHIVE_FILE)
    }

    pub fn assets_archive_path(&self, config: &RemoteConfig) -> PathBuf {
        self.install_root(config).join(ASSETS_ARCHIVE_FILE)
    }
}
