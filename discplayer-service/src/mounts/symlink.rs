// SPDX-License-Identifier: GPL-3.0-only

//! Symlinks from the library's USB folder to each drive's mount point

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use discplayer_sys::{MountTable, is_removable_node};
use discplayer_types::Device;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::error::MountError;
use super::strategy::{LibraryLayout, MountStrategy, generate_target};

pub struct SymlinkStrategy {
    layout: LibraryLayout,
    table: MountTable,
    /// device path -> link inside the USB folder
    links: RwLock<HashMap<String, PathBuf>>,
}

impl SymlinkStrategy {
    pub fn new(layout: LibraryLayout, table: MountTable) -> Self {
        Self {
            layout,
            table,
            links: RwLock::new(HashMap::new()),
        }
    }

    /// Adopt live links already in the USB folder and prune the rest
    ///
    /// A link is live when it points at a current mount point of a
    /// removable device. Entries that are not symlinks are left untouched.
    /// Returns the number of adopted links.
    pub async fn populate(&self) -> Result<usize, MountError> {
        let dir = self.layout.usb_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(MountError::io(dir, e)),
        };

        let mut links = self.links.write().await;
        while let Some(entry) = entries.next_entry().await.map_err(|e| MountError::io(&dir, e))? {
            let path = entry.path();
            let metadata = tokio::fs::symlink_metadata(&path)
                .await
                .map_err(|e| MountError::io(&path, e))?;
            if !metadata.file_type().is_symlink() {
                debug!("Skipping {}: not a symlink", path.display());
                continue;
            }

            let target = tokio::fs::read_link(&path)
                .await
                .map_err(|e| MountError::io(&path, e))?;
            let device = self
                .table
                .device_at(&target)?
                .filter(|device| is_removable_node(device, &target));

            match device {
                Some(device) => {
                    debug!(device = %device, link = %path.display(), "Adopted existing symlink");
                    links.insert(device, path);
                }
                None => {
                    info!("Pruning stale symlink {} -> {}", path.display(), target.display());
                    tokio::fs::remove_file(&path)
                        .await
                        .map_err(|e| MountError::io(&path, e))?;
                }
            }
        }
        Ok(links.len())
    }

    #[cfg(test)]
    pub async fn link_for(&self, device: &str) -> Option<PathBuf> {
        self.links.read().await.get(device).cloned()
    }
}

#[async_trait]
impl MountStrategy for SymlinkStrategy {
    fn name(&self) -> &'static str {
        "symlink"
    }

    async fn validate(&self, device: &Device, mount_point: Option<&Path>) -> Result<PathBuf, MountError> {
        let source = mount_point.ok_or_else(|| MountError::DeviceNotFound(device.path().to_string()))?;

        let mut links = self.links.write().await;
        if let Some(existing) = links.get(device.path()).cloned() {
            match check_symlink(&existing, source).await {
                Ok(()) => return Ok(existing),
                Err(e) => {
                    warn!(device = %device.path(), "Replacing invalid link: {}", e);
                    links.remove(device.path());
                }
            }
        }

        let dir = self.layout.usb_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| MountError::io(&dir, e))?;
        let target = generate_target(&dir, source);
        tokio::fs::symlink(source, &target)
            .await
            .map_err(|e| MountError::io(&target, e))?;

        info!(device = %device.path(), "Linked {} -> {}", target.display(), source.display());
        links.insert(device.path().to_string(), target.clone());
        Ok(target)
    }

    async fn clear(&self, device: &Device, mount_point: Option<&Path>) -> Result<PathBuf, MountError> {
        let mut links = self.links.write().await;
        let link = links
            .get(device.path())
            .cloned()
            .ok_or_else(|| MountError::UnknownDevice(device.path().to_string()))?;

        match mount_point {
            Some(source) => check_symlink(&link, source).await?,
            None => ensure_symlink(&link).await?,
        }

        tokio::fs::remove_file(&link)
            .await
            .map_err(|e| MountError::io(&link, e))?;
        links.remove(device.path());
        info!(device = %device.path(), "Removed link {}", link.display());
        Ok(link)
    }
}

async fn ensure_symlink(link: &Path) -> Result<(), MountError> {
    let metadata = tokio::fs::symlink_metadata(link)
        .await
        .map_err(|e| MountError::io(link, e))?;
    if !metadata.file_type().is_symlink() {
        return Err(MountError::NotASymlink(link.to_path_buf()));
    }
    Ok(())
}

/// `link` must be a symlink pointing at `expected`
async fn check_symlink(link: &Path, expected: &Path) -> Result<(), MountError> {
    ensure_symlink(link).await?;
    let actual = tokio::fs::read_link(link)
        .await
        .map_err(|e| MountError::io(link, e))?;
    // Path equality ignores trailing separators.
    if actual != expected {
        return Err(MountError::SymlinkMismatch {
            link: link.to_path_buf(),
            actual,
            expected: expected.to_path_buf(),
        });
    }
    Ok(())
}
