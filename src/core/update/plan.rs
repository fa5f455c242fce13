// ─── Update Planner ───
// Decides between a full reinstall, an assets patch, or nothing.
//
// Structured path: both sides have "major.minor[.build...]"
//   release line changed            -> Full
//   same line, build changed        -> Assets (needs an assets URL)
//   assets signature changed        -> Assets
// Fallback path: numeric comparison of the digits-only versions
//   remote newer                    -> Full
//   otherwise                       -> signature check (no downgrades)

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::core::config::{InstallLayout, RemoteConfig};
use crate::core::downloader::SignatureSource;
use crate::core::version::{compare, normalize, split_components, VersionRecord, VersionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    Full,
    Assets,
    None,
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateMode::Full => "full",
            UpdateMode::Assets => "assets",
            UpdateMode::None => "no",
        };
        f.write_str(name)
    }
}

/// Outcome of planning one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlan {
    pub mode: UpdateMode,
    pub remote_version_raw: Option<String>,
    pub remote_version_normalized: String,
    pub local_version_raw: Option<String>,
    pub local_version_normalized: Option<String>,
    pub local_assets_signature: Option<String>,
    pub remote_assets_signature: Option<String>,
    pub executable_exists: bool,
}

/// What is on disk right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalInstall {
    pub executable_exists: bool,
    pub record: Option<VersionRecord>,
}

/// Pure decision. `remote_signature` is whatever the probe of the assets URL
/// returned (or `None` when there is no assets URL or the probe failed).
pub fn decide(
    config: &RemoteConfig,
    local: &LocalInstall,
    remote_signature: Option<&str>,
) -> UpdatePlan {
    let remote_raw = config.declared_version();
    let remote_normalized = normalize(remote_raw.unwrap_or_default());

    let mut plan = UpdatePlan {
        mode: UpdateMode::Full,
        remote_version_raw: remote_raw.map(str::to_string),
        remote_version_normalized: remote_normalized,
        local_version_raw: local.record.as_ref().and_then(|r| r.version_raw.clone()),
        local_version_normalized: local.record.as_ref().map(|r| r.version_normalized.clone()),
        local_assets_signature: local.record.as_ref().and_then(|r| r.assets_signature.clone()),
        remote_assets_signature: remote_signature.map(str::to_string),
        executable_exists: local.executable_exists,
    };

    let Some(record) = local.record.as_ref().filter(|_| local.executable_exists) else {
        debug!(
            "Full install required (executable present: {}, record present: {})",
            local.executable_exists,
            local.record.is_some()
        );
        return plan;
    };

    let has_assets_url = config.assets_url().is_some();
    let signature_changed = has_assets_url
        && remote_signature
            .is_some_and(|remote| Some(remote) != record.assets_signature.as_deref());
    let assets_or_none = |changed: bool| {
        if changed {
            UpdateMode::Assets
        } else {
            UpdateMode::None
        }
    };

    let remote = split_components(remote_raw);
    let local_parts = split_components(record.version_raw.as_deref());

    plan.mode = if remote.has_base_version() && local_parts.has_base_version() {
        if remote.base_version != local_parts.base_version {
            debug!(
                "Release line changed {} -> {}",
                local_parts.base_version, remote.base_version
            );
            UpdateMode::Full
        } else if remote.has_timestamp()
            && local_parts.has_timestamp()
            && remote.timestamp != local_parts.timestamp
            && has_assets_url
        {
            debug!(
                "Build changed {} -> {} on line {}",
                local_parts.timestamp, remote.timestamp, remote.base_version
            );
            UpdateMode::Assets
        } else {
            assets_or_none(signature_changed)
        }
    } else {
        match compare(&plan.remote_version_normalized, &record.version_normalized) {
            std::cmp::Ordering::Greater => UpdateMode::Full,
            _ => assets_or_none(signature_changed),
        }
    };

    plan
}

/// Gathers local state and the remote signature, then calls [`decide`].
pub struct UpdatePlanner<'a> {
    layout: &'a InstallLayout,
    store: &'a VersionStore,
    signatures: &'a dyn SignatureSource,
}

impl<'a> UpdatePlanner<'a> {
    pub fn new(
        layout: &'a InstallLayout,
        store: &'a VersionStore,
        signatures: &'a dyn SignatureSource,
    ) -> Self {
        Self {
            layout,
            store,
            signatures,
        }
    }

    pub async fn local_install(&self, config: &RemoteConfig) -> LocalInstall {
        let executable_exists = match self.layout.executable_path(config) {
            Some(path) => tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            None => false,
        };
        LocalInstall {
            executable_exists,
            record: self.store.load_async().await,
        }
    }

    pub async fn plan(&self, config: &RemoteConfig) -> UpdatePlan {
        let local = self.local_install(config).await;

        // One probe per cycle, reused by both decision paths.
        let remote_signature = match config.assets_url() {
            Some(url) => self.signatures.fetch_signature(url).await,
            None => None,
        };

        let plan = decide(config, &local, remote_signature.as_deref());
        info!(
            "Update plan: {} (remote {:?}, local {:?}, signature {:?} -> {:?})",
            plan.mode,
            plan.remote_version_raw,
            plan.local_version_raw.as_ref().or(plan.local_version_normalized.as_ref()),
            plan.local_assets_signature,
            plan.remote_assets_signature
        );
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ASSETS_URL: &str = "https://cdn.example.com/assets.zip";

    fn remote(version: &str, assets: bool) -> RemoteConfig {
        RemoteConfig {
            client_version: Some(version.into()),
            new_client_url: Some("https://cdn.example.com/client.zip".into()),
            assets_url: assets.then(|| ASSETS_URL.to_string()),
            client_executable: Some("client.exe".into()),
            ..Default::default()
        }
    }

    fn installed(raw: Option<&str>, normalized: &str, signature: Option<&str>) -> LocalInstall {
        LocalInstall {
            executable_exists: true,
            record: Some(VersionRecord {
                version_raw: raw.map(str::to_string),
                version_normalized: normalized.to_string(),
                assets_signature: signature.map(str::to_string),
            }),
        }
    }

    #[test]
    fn no_record_means_full() {
        let local = LocalInstall {
            executable_exists: true,
            record: None,
        };
        let plan = decide(&remote("1.2.3000", true), &local, Some("\"sig\""));
        assert_eq!(plan.mode, UpdateMode::Full);
        assert_eq!(plan.remote_version_normalized, "123000");
        assert_eq!(plan.remote_assets_signature.as_deref(), Some("\"sig\""));
    }

    #[test]
    fn missing_executable_means_full() {
        let mut local = installed(Some("1.2.3000"), "123000", None);
        local.executable_exists = false;
        assert_eq!(decide(&remote("1.2.3000", false), &local, None).mode, UpdateMode::Full);
    }

    #[test]
    fn same_version_without_assets_url_is_none() {
        let local = installed(Some("13.40.5500"), "13405500", None);
        assert_eq!(decide(&remote("13.40.5500", false), &local, None).mode, UpdateMode::None);
    }

    #[test]
    fn build_bump_on_same_line_is_assets() {
        let local = installed(Some("13.40.5500"), "13405500", Some("\"a\""));
        let plan = decide(&remote("13.40.5600", true), &local, Some("\"a\""));
        assert_eq!(plan.mode, UpdateMode::Assets);
    }

    #[test]
    fn build_bump_without_assets_url_is_none() {
        let local = installed(Some("13.40.5500"), "13405500", None);
        assert_eq!(decide(&remote("13.40.5600", false), &local, None).mode, UpdateMode::None);
    }

    #[test]
    fn release_line_change_is_full_regardless_of_signature() {
        let local = installed(Some("13.40.5500"), "13405500", Some("\"a\""));
        let plan = decide(&remote("13.41.5500", true), &local, Some("\"a\""));
        assert_eq!(plan.mode, UpdateMode::Full);

        let plan = decide(&remote("12.40.5500", true), &local, Some("\"b\""));
        assert_eq!(plan.mode, UpdateMode::Full);
    }

    #[test]
    fn changed_signature_triggers_assets() {
        let local = installed(Some("13.40.5500"), "13405500", Some("\"a\""));
        assert_eq!(
            decide(&remote("13.40.5500", true), &local, Some("\"b\"")).mode,
            UpdateMode::Assets
        );
        assert_eq!(
            decide(&remote("13.40.5500", true), &local, Some("\"a\"")).mode,
            UpdateMode::None
        );
    }

    #[test]
    fn unknown_signature_never_forces_assets() {
        let local = installed(Some("13.40.5500"), "13405500", Some("\"a\""));
        assert_eq!(decide(&remote("13.40.5500", true), &local, None).mode, UpdateMode::None);
    }

    #[test]
    fn missing_local_signature_counts_as_changed() {
        let local = installed(Some("13.40.5500"), "13405500", None);
        assert_eq!(
            decide(&remote("13.40.5500", true), &local, Some("\"a\"")).mode,
            UpdateMode::Assets
        );
    }

    #[test]
    fn legacy_record_uses_numeric_fallback() {
        // No raw line on disk, so no structured comparison is possible.
        let local = installed(None, "9", None);
        assert_eq!(decide(&remote("10", false), &local, None).mode, UpdateMode::Full);

        let local = installed(None, "13405500", Some("\"a\""));
        assert_eq!(decide(&remote("13.40.5500", true), &local, Some("\"a\"")).mode, UpdateMode::None);
        assert_eq!(
            decide(&remote("13.40.5500", true), &local, Some("\"b\"")).mode,
            UpdateMode::Assets
        );
    }

    #[test]
    fn older_remote_is_not_a_downgrade() {
        let local = installed(None, "200", None);
        assert_eq!(decide(&remote("100", false), &local, None).mode, UpdateMode::None);
    }

    #[test]
    fn mode_display_reads_in_messages() {
        assert_eq!(UpdateMode::Full.to_string(), "full");
        assert_eq!(UpdateMode::Assets.to_string(), "assets");
    }

    // ── Planner with on-disk state ──────────────────────

    struct FixedSignature {
        value: Option<String>,
        calls: AtomicUsize,
    }

    impl FixedSignature {
        fn new(value: Option<&str>) -> Self {
            Self {
                value: value.map(str::to_string),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SignatureSource for FixedSignature {
        async fn fetch_signature(&self, _url: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.value.clone()
        }
    }

    fn install_client(layout: &InstallLayout, config: &RemoteConfig) {
        let exe = layout.executable_path(config).unwrap();
        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        std::fs::write(exe, b"MZ").unwrap();
    }

    #[tokio::test]
    async fn planner_probes_signature_once() {
        let dir = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(dir.path());
        let store = VersionStore::new(layout.version_file());
        let config = remote("13.40.5500", true);
        install_client(&layout, &config);
        store.save(Some("13.40.5500"), "13405500", Some("\"old\"")).unwrap();
        let signatures = FixedSignature::new(Some("\"new\""));

        let plan = UpdatePlanner::new(&layout, &store, &signatures).plan(&config).await;

        assert_eq!(plan.mode, UpdateMode::Assets);
        assert!(plan.executable_exists);
        assert_eq!(plan.local_assets_signature.as_deref(), Some("\"old\""));
        assert_eq!(signatures.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn planner_skips_probe_without_assets_url() {
        let dir = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(dir.path());
        let store = VersionStore::new(layout.version_file());
        let signatures = FixedSignature::new(Some("\"new\""));

        let plan = UpdatePlanner::new(&layout, &store, &signatures)
            .plan(&remote("1.2.3000", false))
            .await;

        assert_eq!(plan.mode, UpdateMode::Full);
        assert!(!plan.executable_exists);
        assert_eq!(signatures.calls.load(Ordering::SeqCst), 0);
    }
}
