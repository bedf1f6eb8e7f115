// SPDX-License-Identifier: GPL-3.0-only

//! Server-side mounts through MPD's udisks neighbor plugin
//!
//! MPD mounts the filesystem itself, so the device never has to appear in
//! the local mount table.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use discplayer_mpd::ReconnectingClient;
use discplayer_types::Device;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::MountError;
use super::strategy::MountStrategy;

pub struct MpdStrategy {
    root: PathBuf,
    client: Arc<ReconnectingClient>,
    mounted: Mutex<HashSet<String>>,
}

impl MpdStrategy {
    pub fn new(root: PathBuf, client: Arc<ReconnectingClient>) -> Self {
        Self {
            root,
            client,
            mounted: Mutex::new(HashSet::new()),
        }
    }

    /// Drop server mounts left behind by drives that are gone
    pub async fn clear_stale(&self) -> Result<Vec<String>, MountError> {
        Ok(self.client.clear_mounts().await?)
    }
}

/// Library name of a device: its label, or its UUID when unlabelled
fn mount_name(device: &Device) -> Result<(&str, &str), MountError> {
    let uuid = device
        .fs_uuid()
        .ok_or_else(|| MountError::MissingIdentity(device.path().to_string()))?;
    Ok((uuid, device.fs_label().unwrap_or(uuid)))
}

#[async_trait]
impl MountStrategy for MpdStrategy {
    fn name(&self) -> &'static str {
        "mpd"
    }

    fn tolerates_absence(&self) -> bool {
        true
    }

    async fn validate(&self, device: &Device, _mount_point: Option<&Path>) -> Result<PathBuf, MountError> {
        let (uuid, name) = mount_name(device)?;
        let mut mounted = self.mounted.lock().await;
        if !mounted.contains(name) {
            self.client.mount(uuid, name).await?;
            mounted.insert(name.to_string());
        } else {
            debug!(device = %device.path(), "{} already mounted by MPD", name);
        }
        Ok(self.root.join(name))
    }

    async fn clear(&self, device: &Device, _mount_point: Option<&Path>) -> Result<PathBuf, MountError> {
        let (_, name) = mount_name(device)?;
        self.client.unmount(name).await?;
        self.mounted.lock().await.remove(name);
        Ok(self.root.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use discplayer_mpd::testing::FakeConnector;
    use discplayer_mpd::{Frame, ReconnectSettings};
    use discplayer_types::DeviceKind;
    use discplayer_types::properties::{ID_FS_LABEL, ID_FS_UUID};
    use tokio_util::sync::CancellationToken;

    fn strategy(fake: &FakeConnector) -> MpdStrategy {
        let client = ReconnectingClient::new(
            Arc::new(fake.clone()),
            ReconnectSettings::default(),
            CancellationToken::new(),
        );
        MpdStrategy::new(PathBuf::from("/var/lib/mpd/music"), Arc::new(client))
    }

    fn usb(props: &[(&str, &str)]) -> Device {
        let properties: BTreeMap<String, String> = props
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Device::new(DeviceKind::Usb, "/dev/sdb1", "sdb1", properties)
    }

    #[tokio::test]
    async fn mounts_under_label_once() {
        let fake = FakeConnector::default();
        fake.respond(Ok(Frame::new().with("neighbor", "udisks://by-uuid-1234-ABCD")));
        let strategy = strategy(&fake);
        let device = usb(&[(ID_FS_UUID, "1234-ABCD"), (ID_FS_LABEL, "MUSIC1")]);

        let path = strategy.validate(&device, None).await.unwrap();
        assert_eq!(path, PathBuf::from("/var/lib/mpd/music/MUSIC1"));
        strategy.validate(&device, None).await.unwrap();
        assert_eq!(
            fake.calls(),
            vec!["listneighbors", "mount \"MUSIC1\" \"udisks://by-uuid-1234-ABCD\""]
        );

        assert_eq!(strategy.clear(&device, None).await.unwrap(), path);
        assert_eq!(fake.calls().last().map(String::as_str), Some("unmount \"MUSIC1\""));
    }

    #[tokio::test]
    async fn unlabelled_device_uses_uuid() {
        let fake = FakeConnector::default();
        fake.respond(Ok(Frame::new().with("neighbor", "udisks://by-uuid-77AA")));
        let strategy = strategy(&fake);

        let path = strategy.validate(&usb(&[(ID_FS_UUID, "77AA")]), None).await.unwrap();
        assert_eq!(path, PathBuf::from("/var/lib/mpd/music/77AA"));
    }

    #[tokio::test]
    async fn device_without_uuid_is_rejected() {
        let fake = FakeConnector::default();
        let strategy = strategy(&fake);
        let err = strategy.validate(&usb(&[(ID_FS_LABEL, "KEY")]), None).await.unwrap_err();
        assert!(matches!(err, MountError::MissingIdentity(_)));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_neighbor_surfaces_as_mpd_error() {
        let fake = FakeConnector::default();
        let strategy = strategy(&fake);
        let err = strategy
            .validate(&usb(&[(ID_FS_UUID, "1234-ABCD")]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MountError::Mpd(ref e) if e.is_not_found()));
    }
}
