// ─── Remote Config ───
// The document published next to the client builds. The updater only reads
// the fields below; everything else in the file is ignored.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::error::{UpdaterError, UpdaterResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceFolderName {
    #[serde(default)]
    pub name: String,
}

/// Remote-declared versions, URLs and install policy for one update cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteConfig {
    pub client_version: Option<String>,
    pub launcher_version: Option<String>,
    pub replace_folders: bool,
    pub replace_folder_name: Vec<ReplaceFolderName>,
    pub client_folder: Option<String>,
    pub new_client_url: Option<String>,
    pub assets_url: Option<String>,
    pub new_config_url: Option<String>,
    pub client_executable: Option<String>,
    pub client_priority: Option<String>,
}

impl RemoteConfig {
    pub fn from_json(json: &str) -> UpdaterResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn from_file(path: &Path) -> UpdaterResult<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| UpdaterError::io(path, e))?;
        Self::from_json(&json)
    }

    /// Fetch the document over HTTP using the shared client.
    pub async fn fetch(client: &reqwest::Client, url: &str) -> UpdaterResult<Self> {
        info!("Fetching remote config from {}", url);
        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    pub fn assets_url(&self) -> Option<&str> {
        non_empty(&self.assets_url)
    }

    pub fn full_client_url(&self) -> Option<&str> {
        non_empty(&self.new_client_url)
    }

    pub fn config_refresh_url(&self) -> Option<&str> {
        non_empty(&self.new_config_url)
    }

    pub fn declared_version(&self) -> Option<&str> {
        non_empty(&self.client_version)
    }

    /// Folder names to wipe before extraction, only when replacement is on.
    pub fn replace_folder_names(&self) -> Vec<&str> {
        if !self.replace_folders {
            return Vec::new();
        }
        self.replace_folder_name
            .iter()
            .map(|f| f.name.trim())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
