// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::path::PathBuf;

use discplayer_sys::{MountTable, is_removable_node};
use discplayer_types::MountRecord;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Last known mount point of each device
///
/// Consulted when a device already vanished from the mount table by the
/// time its removal is processed.
#[derive(Debug, Default)]
pub struct MountPointCache {
    entries: RwLock<HashMap<String, PathBuf>>,
}

impl MountPointCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with every removable mount currently in `table`
    pub async fn populate(&self, table: &MountTable) -> usize {
        let entries = match table.entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to populate mount point cache: {}", e);
                return 0;
            }
        };

        let mut map = self.entries.write().await;
        let mut seeded = 0;
        for entry in entries {
            if !is_removable_node(&entry.device, &entry.mount_point) {
                continue;
            }
            // First line wins, matching live lookups.
            if !map.contains_key(&entry.device) {
                debug!(device = %entry.device, mount_point = %entry.mount_point.display(), "Cached mount point");
                map.insert(entry.device, entry.mount_point);
                seeded += 1;
            }
        }
        seeded
    }

    pub async fn insert(&self, device: &str, mount_point: PathBuf) {
        self.entries.write().await.insert(device.to_string(), mount_point);
    }

    pub async fn get(&self, device: &str) -> Option<PathBuf> {
        self.entries.read().await.get(device).cloned()
    }

    pub async fn remove(&self, device: &str) -> Option<PathBuf> {
        self.entries.write().await.remove(device)
    }

    pub async fn records(&self) -> Vec<MountRecord> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(device, mount_point)| MountRecord::new(device.clone(), mount_point.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
