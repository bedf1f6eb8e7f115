// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A device-to-mount-point association held by the mount cache
///
/// Lives as long as the device is present; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MountRecord {
    /// Block device node (e.g., "/dev/sdb1")
    pub device_path: String,

    /// Where the device is mounted (e.g., "/media/MUSIC1")
    pub mount_point: PathBuf,
}

impl MountRecord {
    pub fn new(device_path: impl Into<String>, mount_point: impl Into<PathBuf>) -> Self {
        Self {
            device_path: device_path.into(),
            mount_point: mount_point.into(),
        }
    }
}
