// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use discplayer_mpd::ReconnectingClient;
use discplayer_sys::MountTable;
use discplayer_types::Device;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::MountError;
use super::loopback::{KernelBind, LoopbackStrategy};
use super::mpd::MpdStrategy;
use super::symlink::SymlinkStrategy;

const SUFFIX_LEN: usize = 5;

/// Makes a mounted device reachable from inside the library
#[async_trait]
pub trait MountStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the strategy can work from device properties alone when the
    /// device never shows up in the mount table
    fn tolerates_absence(&self) -> bool {
        false
    }

    /// Expose the device and return the absolute path inside the library
    ///
    /// Calling it again for a device that is already exposed returns the
    /// existing path.
    async fn validate(&self, device: &Device, mount_point: Option<&Path>) -> Result<PathBuf, MountError>;

    /// Undo [`MountStrategy::validate`] and return the path that was removed
    async fn clear(&self, device: &Device, mount_point: Option<&Path>) -> Result<PathBuf, MountError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// MPD's own `mount` command through the udisks neighbor plugin
    #[default]
    Mpd,
    Symlink,
    /// Bind mount under the library
    Loopback,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Mpd => write!(f, "mpd"),
            StrategyKind::Symlink => write!(f, "symlink"),
            StrategyKind::Loopback => write!(f, "loopback"),
        }
    }
}

/// Library root plus the folder USB drives are exposed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryLayout {
    pub root: PathBuf,
    pub usb_subfolder: PathBuf,
}

impl LibraryLayout {
    pub fn new(root: impl Into<PathBuf>, usb_subfolder: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            usb_subfolder: usb_subfolder.into(),
        }
    }

    pub fn usb_dir(&self) -> PathBuf {
        self.root.join(&self.usb_subfolder)
    }
}

/// Path under `dir` named after `source`, suffixed when the name is taken
pub fn generate_target(dir: &Path, source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "usb".to_string());
    let target = dir.join(&name);
    if !exists(&target) {
        return target;
    }

    loop {
        let suffix: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(SUFFIX_LEN)
            .map(char::from)
            .collect();
        let candidate = dir.join(format!("{name}-{suffix}"));
        if !exists(&candidate) {
            return candidate;
        }
    }
}

// Dead symlinks count as taken.
fn exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// Construct the configured strategy and run its startup housekeeping
pub async fn build_strategy(
    kind: StrategyKind,
    layout: LibraryLayout,
    table: MountTable,
    client: Arc<ReconnectingClient>,
) -> Result<Arc<dyn MountStrategy>, MountError> {
    let strategy: Arc<dyn MountStrategy> = match kind {
        StrategyKind::Symlink => {
            let strategy = SymlinkStrategy::new(layout, table);
            let kept = strategy.populate().await?;
            info!("Symlink strategy tracking {} existing link(s)", kept);
            Arc::new(strategy)
        }
        StrategyKind::Loopback => Arc::new(LoopbackStrategy::new(layout, Arc::new(KernelBind))),
        StrategyKind::Mpd => {
            let strategy = MpdStrategy::new(layout.root, client);
            let cleared = strategy.clear_stale().await?;
            if !cleared.is_empty() {
                info!("Cleared stale MPD mounts: {}", cleared.join(", "));
            }
            Arc::new(strategy)
        }
    };
    Ok(strategy)
}
