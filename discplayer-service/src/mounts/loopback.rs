// SPDX-License-Identifier: GPL-3.0-only

//! Bind mounts of each drive into the library's USB folder

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use discplayer_sys::SysError;
use discplayer_types::Device;
use tokio::sync::Mutex;
use tracing::info;

use super::error::MountError;
use super::strategy::{LibraryLayout, MountStrategy, generate_target};

/// Kernel side of the loopback strategy
pub trait BindBackend: Send + Sync {
    fn bind(&self, source: &Path, target: &Path) -> Result<(), SysError>;
    fn unbind(&self, target: &Path) -> Result<(), SysError>;
}

/// Real bind mounts; needs CAP_SYS_ADMIN
pub struct KernelBind;

impl BindBackend for KernelBind {
    fn bind(&self, source: &Path, target: &Path) -> Result<(), SysError> {
        discplayer_sys::bind_mount(source, target)
    }

    fn unbind(&self, target: &Path) -> Result<(), SysError> {
        discplayer_sys::unbind(target)
    }
}

pub struct LoopbackStrategy {
    layout: LibraryLayout,
    backend: Arc<dyn BindBackend>,
    /// device path -> bind target
    sessions: Mutex<HashMap<String, PathBuf>>,
}

impl LoopbackStrategy {
    pub fn new(layout: LibraryLayout, backend: Arc<dyn BindBackend>) -> Self {
        Self {
            layout,
            backend,
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl MountStrategy for LoopbackStrategy {
    fn name(&self) -> &'static str {
        "loopback"
    }

    async fn validate(&self, device: &Device, mount_point: Option<&Path>) -> Result<PathBuf, MountError> {
        let source = mount_point
            .ok_or_else(|| MountError::DeviceNotFound(device.path().to_string()))?
            .to_path_buf();

        let mut sessions = self.sessions.lock().await;
        if let Some(target) = sessions.get(device.path()) {
            return Ok(target.clone());
        }

        let target = generate_target(&self.layout.usb_dir(), &source);
        let backend = self.backend.clone();
        let bind_target = target.clone();
        tokio::task::spawn_blocking(move || backend.bind(&source, &bind_target))
            .await
            .map_err(|e| SysError::OperationFailed(format!("bind task failed: {e}")))??;

        info!(device = %device.path(), "Bound {}", target.display());
        sessions.insert(device.path().to_string(), target.clone());
        Ok(target)
    }

    async fn clear(&self, device: &Device, _mount_point: Option<&Path>) -> Result<PathBuf, MountError> {
        let mut sessions = self.sessions.lock().await;
        let target = sessions
            .remove(device.path())
            .ok_or_else(|| MountError::UnknownDevice(device.path().to_string()))?;

        let backend = self.backend.clone();
        let unbind_target = target.clone();
        let result = tokio::task::spawn_blocking(move || backend.unbind(&unbind_target))
            .await
            .map_err(|e| SysError::OperationFailed(format!("unbind task failed: {e}")))?;
        if let Err(e) = result {
            // Keep the session so a later removal can retry.
            sessions.insert(device.path().to_string(), target);
            return Err(e.into());
        }

        info!(device = %device.path(), "Unbound {}", target.display());
        Ok(target)
    }
}
