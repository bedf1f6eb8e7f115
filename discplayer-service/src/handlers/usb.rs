// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use discplayer_contracts::{Handler, PlayerError};
use discplayer_mpd::ReconnectingClient;
use discplayer_types::{Device, DeviceKind};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::mounts::MountManager;

/// Exposes USB partitions in the library and plays them
pub struct UsbHandler {
    client: Arc<ReconnectingClient>,
    mounts: Arc<MountManager>,
}

impl UsbHandler {
    pub fn new(client: Arc<ReconnectingClient>, mounts: Arc<MountManager>) -> Self {
        Self { client, mounts }
    }
}

#[async_trait]
impl Handler for UsbHandler {
    fn name(&self) -> &str {
        "usb"
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Usb
    }

    async fn on_add(&self, device: &Device, cancel: &CancellationToken) -> Result<(), PlayerError> {
        if cancel.is_cancelled() {
            return Err(PlayerError::cancelled());
        }
        let rel_path = self.mounts.mount(device).await?;
        self.client.start_usb_playback(&rel_path).await?;
        Ok(())
    }

    /// Unmounts first: the cache still knows the mount point of a drive that
    /// was pulled, and the relative path is needed to clean the queue.
    async fn on_remove(&self, device: &Device, cancel: &CancellationToken) -> Result<(), PlayerError> {
        if cancel.is_cancelled() {
            return Err(PlayerError::cancelled());
        }
        let rel_path = self.mounts.unmount(device).await?;
        if let Err(e) = self.client.stop_playback(&rel_path).await {
            warn!(device = %device.path(), "Failed to clear {} from the queue", rel_path);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;

    use discplayer_contracts::PlayerErrorKind;
    use discplayer_mpd::testing::FakeConnector;
    use discplayer_mpd::{Frame, ReconnectSettings};
    use discplayer_sys::MountTable;
    use discplayer_types::properties::ID_FS_LABEL;

    use crate::mounts::symlink::SymlinkStrategy;
    use crate::mounts::{LibraryLayout, MountPointCache, MountSettings};

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: LibraryLayout,
        table: MountTable,
        source: std::path::PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let library = dir.path().join("library");
            let source = dir.path().join("media").join("MUSIC1");
            std::fs::create_dir_all(&library).unwrap();
            std::fs::create_dir_all(&source).unwrap();
            let table_path = dir.path().join("mounts");
            let mut file = std::fs::File::create(&table_path).unwrap();
            writeln!(file, "/dev/sdb1 {} vfat rw 0 0", source.display()).unwrap();
            Self {
                layout: LibraryLayout::new(library, ".usb"),
                table: MountTable::new(table_path),
                source,
                _dir: dir,
            }
        }

        fn handler(&self, fake: &FakeConnector) -> UsbHandler {
            let cancel = CancellationToken::new();
            let client = Arc::new(ReconnectingClient::new(
                Arc::new(fake.clone()),
                ReconnectSettings::default(),
                cancel.clone(),
            ));
            let strategy = Arc::new(SymlinkStrategy::new(self.layout.clone(), self.table.clone()));
            let mounts = Arc::new(MountManager::new(
                self.layout.root.clone(),
                self.table.clone(),
                Arc::new(MountPointCache::new()),
                strategy,
                MountSettings::default(),
                cancel,
            ));
            UsbHandler::new(client, mounts)
        }
    }

    fn music1() -> Device {
        let mut properties = BTreeMap::new();
        properties.insert(ID_FS_LABEL.to_string(), "MUSIC1".to_string());
        Device::new(DeviceKind::Usb, "/dev/sdb1", "sdb1", properties)
    }

    #[tokio::test]
    async fn insert_then_remove() {
        let fx = Fixture::new();
        let fake = FakeConnector::default();
        let handler = fx.handler(&fake);
        let link = fx.layout.usb_dir().join("MUSIC1");

        handler.on_add(&music1(), &CancellationToken::new()).await.unwrap();
        assert_eq!(std::fs::read_link(&link).unwrap(), fx.source);
        assert_eq!(
            fake.calls(),
            vec![
                "clear",
                "update \".usb/MUSIC1\"",
                "status",
                "add \".usb/MUSIC1\"",
                "play",
            ]
        );

        fake.respond(Ok(Frame::new().with("file", ".usb/MUSIC1/01.flac")))
            .ok()
            .respond(Ok(Frame::new()
                .with("file", ".usb/MUSIC1/01.flac")
                .with("file", ".usb/MUSIC1/02.flac")));
        handler.on_remove(&music1(), &CancellationToken::new()).await.unwrap();

        assert!(std::fs::symlink_metadata(&link).is_err());
        assert_eq!(
            fake.calls()[5..],
            ["currentsong", "stop", "playlistinfo", "delete \"0:2\""]
        );
    }

    #[tokio::test]
    async fn playback_failure_is_reported() {
        let fx = Fixture::new();
        let fake = FakeConnector::default();
        fake.ok()
            .respond(Err(discplayer_mpd::testing::ack(50, "update", "Malformed path")));
        let handler = fx.handler(&fake);

        let err = handler.on_add(&music1(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind, PlayerErrorKind::Playback);
    }

    #[tokio::test]
    async fn remove_of_unknown_device_fails_without_touching_mpd() {
        let fx = Fixture::new();
        let fake = FakeConnector::default();
        let handler = fx.handler(&fake);

        let err = handler.on_remove(&music1(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind, PlayerErrorKind::NotFound);
        assert!(fake.calls().is_empty());
    }
}
