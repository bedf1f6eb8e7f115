// SPDX-License-Identifier: GPL-3.0-only

//! Resolves device mount points and exposes them inside the library

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use discplayer_sys::MountTable;
use discplayer_types::Device;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cache::MountPointCache;
use super::error::MountError;
use super::strategy::MountStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountSettings {
    /// Pause between mount table scans while waiting for a device
    pub retry_interval: Duration,
    /// Give up waiting for a device after this long
    pub retry_timeout: Duration,
}

impl Default for MountSettings {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(300),
            retry_timeout: Duration::from_secs(3),
        }
    }
}

pub struct MountManager {
    library: PathBuf,
    table: MountTable,
    cache: Arc<MountPointCache>,
    strategy: Arc<dyn MountStrategy>,
    settings: MountSettings,
    cancel: CancellationToken,
}

impl MountManager {
    pub fn new(
        library: PathBuf,
        table: MountTable,
        cache: Arc<MountPointCache>,
        strategy: Arc<dyn MountStrategy>,
        settings: MountSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            library,
            table,
            cache,
            strategy,
            settings,
            cancel,
        }
    }

    pub fn library(&self) -> &Path {
        &self.library
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Make `device` reachable from the library and return its library-relative path
    pub async fn mount(&self, device: &Device) -> Result<String, MountError> {
        let mount_point = match self.wait_for_mount_point(device.path()).await {
            Ok(mount_point) => Some(mount_point),
            Err(MountError::DeviceNotFound(_)) if self.strategy.tolerates_absence() => {
                debug!(device = %device.path(), "Not in mount table, {} strategy continues without it", self.strategy.name());
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(mount_point) = &mount_point {
            self.cache.insert(device.path(), mount_point.clone()).await;
            if mount_point.starts_with(&self.library) {
                debug!(device = %device.path(), "Already inside the library at {}", mount_point.display());
                return self.relative(mount_point);
            }
        }

        let target = self.strategy.validate(device, mount_point.as_deref()).await?;
        let relative = self.relative(&target)?;
        info!(device = %device.path(), strategy = self.strategy.name(), "Mounted as {}", relative);
        Ok(relative)
    }

    /// Undo [`MountManager::mount`] and return the library-relative path that went away
    pub async fn unmount(&self, device: &Device) -> Result<String, MountError> {
        // Dropped first and whatever the outcome, so no failure below leaves a stale entry.
        let cached = self.cache.remove(device.path()).await;
        let live = match self.table.mount_point_of(device.path()) {
            Ok(live) => live,
            Err(e) => {
                warn!(device = %device.path(), "Mount table unreadable, using cached mount point: {}", e);
                None
            }
        };
        let mount_point = live.or(cached);

        if let Some(mount_point) = &mount_point
            && mount_point.starts_with(&self.library)
        {
            return self.relative(mount_point);
        }

        let target = self.strategy.clear(device, mount_point.as_deref()).await?;
        let relative = self.relative(&target)?;
        info!(device = %device.path(), strategy = self.strategy.name(), "Unmounted {}", relative);
        Ok(relative)
    }

    async fn wait_for_mount_point(&self, device: &str) -> Result<PathBuf, MountError> {
        let deadline = Instant::now() + self.settings.retry_timeout;
        loop {
            if let Some(mount_point) = self.table.mount_point_of(device)? {
                return Ok(mount_point);
            }
            if Instant::now() >= deadline {
                return Err(MountError::DeviceNotFound(device.to_string()));
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(MountError::Cancelled),
                _ = tokio::time::sleep_until((Instant::now() + self.settings.retry_interval).min(deadline)) => {}
            }
        }
    }

    fn relative(&self, path: &Path) -> Result<String, MountError> {
        match path.strip_prefix(&self.library) {
            Ok(relative) if !relative.as_os_str().is_empty() => Ok(relative.to_string_lossy().into_owned()),
            _ => Err(MountError::OutsideLibrary {
                path: path.to_path_buf(),
                library: self.library.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use discplayer_types::DeviceKind;

    use crate::mounts::strategy::LibraryLayout;
    use crate::mounts::symlink::SymlinkStrategy;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Validate(Option<PathBuf>),
        Clear(Option<PathBuf>),
    }

    /// Answers with `root/NAME` and records what it was asked
    struct FakeStrategy {
        root: PathBuf,
        tolerates_absence: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeStrategy {
        fn new(root: &Path) -> Self {
            Self {
                root: root.to_path_buf(),
                tolerates_absence: false,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MountStrategy for FakeStrategy {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn tolerates_absence(&self) -> bool {
            self.tolerates_absence
        }

        async fn validate(&self, _device: &Device, mount_point: Option<&Path>) -> Result<PathBuf, MountError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Validate(mount_point.map(Path::to_path_buf)));
            Ok(self.root.join("NAME"))
        }

        async fn clear(&self, _device: &Device, mount_point: Option<&Path>) -> Result<PathBuf, MountError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Clear(mount_point.map(Path::to_path_buf)));
            Ok(self.root.join("NAME"))
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        library: PathBuf,
        table_path: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let library = dir.path().join("library");
            std::fs::create_dir_all(&library).unwrap();
            let table_path = dir.path().join("mounts");
            std::fs::write(&table_path, "").unwrap();
            Self {
                library,
                table_path,
                dir,
            }
        }

        fn media(&self, name: &str) -> PathBuf {
            let path = self.dir.path().join("media").join(name);
            std::fs::create_dir_all(&path).unwrap();
            path
        }

        fn set_table(&self, lines: &[(&str, &Path)]) {
            let mut file = std::fs::File::create(&self.table_path).unwrap();
            for (device, mount_point) in lines {
                writeln!(file, "{} {} vfat rw 0 0", device, mount_point.display()).unwrap();
            }
        }

        fn manager(&self, strategy: Arc<dyn MountStrategy>) -> (MountManager, Arc<MountPointCache>) {
            let cache = Arc::new(MountPointCache::new());
            let manager = MountManager::new(
                self.library.clone(),
                MountTable::new(&self.table_path),
                cache.clone(),
                strategy,
                MountSettings::default(),
                CancellationToken::new(),
            );
            (manager, cache)
        }
    }

    fn usb(label: &str) -> Device {
        let mut properties = BTreeMap::new();
        properties.insert("ID_FS_LABEL".to_string(), label.to_string());
        Device::new(DeviceKind::Usb, "/dev/sdb1", "sdb1", properties)
    }

    #[tokio::test]
    async fn symlink_round_trip() {
        let fx = Fixture::new();
        let source = fx.media("MUSIC1");
        fx.set_table(&[("/dev/sdb1", &source)]);
        let layout = LibraryLayout::new(&fx.library, ".usb");
        let strategy = Arc::new(SymlinkStrategy::new(layout.clone(), MountTable::new(&fx.table_path)));
        let (manager, cache) = fx.manager(strategy);
        let device = usb("MUSIC1");

        assert_eq!(manager.mount(&device).await.unwrap(), ".usb/MUSIC1");
        assert_eq!(cache.get("/dev/sdb1").await, Some(source.clone()));
        let link = layout.usb_dir().join("MUSIC1");
        assert_eq!(std::fs::read_link(&link).unwrap(), source);

        assert_eq!(manager.mount(&device).await.unwrap(), ".usb/MUSIC1");
        assert_eq!(std::fs::read_dir(layout.usb_dir()).unwrap().count(), 1);

        assert_eq!(manager.unmount(&device).await.unwrap(), ".usb/MUSIC1");
        assert!(std::fs::symlink_metadata(&link).is_err());
        assert!(cache.is_empty().await);

        assert_eq!(manager.mount(&device).await.unwrap(), ".usb/MUSIC1");
    }

    #[tokio::test]
    async fn mount_point_inside_library_skips_strategy() {
        let fx = Fixture::new();
        let inside = fx.library.join("KEY");
        fx.set_table(&[("/dev/sdb1", &inside)]);
        let strategy = Arc::new(FakeStrategy::new(&fx.library));
        let (manager, _) = fx.manager(strategy.clone());

        assert_eq!(manager.mount(&usb("KEY")).await.unwrap(), "KEY");
        assert_eq!(manager.mount(&usb("KEY")).await.unwrap(), "KEY");
        assert_eq!(manager.unmount(&usb("KEY")).await.unwrap(), "KEY");
        assert!(strategy.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unmount_falls_back_to_cache() {
        let fx = Fixture::new();
        let source = fx.media("MUSIC1");
        fx.set_table(&[("/dev/sdb1", &source)]);
        let strategy = Arc::new(FakeStrategy::new(&fx.library));
        let (manager, cache) = fx.manager(strategy.clone());

        manager.mount(&usb("MUSIC1")).await.unwrap();
        // Device pulled before the removal is handled.
        fx.set_table(&[]);
        assert_eq!(manager.unmount(&usb("MUSIC1")).await.unwrap(), "NAME");

        assert_eq!(
            *strategy.calls.lock().unwrap(),
            vec![Call::Validate(Some(source.clone())), Call::Clear(Some(source))]
        );
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn unreadable_mount_table_still_drops_cache_entry() {
        let fx = Fixture::new();
        let source = fx.media("MUSIC1");
        let strategy = Arc::new(FakeStrategy::new(&fx.library));
        let cache = Arc::new(MountPointCache::new());
        cache.insert("/dev/sdb1", source.clone()).await;
        let manager = MountManager::new(
            fx.library.clone(),
            MountTable::new(fx.dir.path().join("no-such-mounts")),
            cache.clone(),
            strategy.clone(),
            MountSettings::default(),
            CancellationToken::new(),
        );

        assert_eq!(manager.unmount(&usb("MUSIC1")).await.unwrap(), "NAME");
        assert!(cache.is_empty().await);
        assert_eq!(*strategy.calls.lock().unwrap(), vec![Call::Clear(Some(source))]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_device_times_out() {
        let fx = Fixture::new();
        let strategy = Arc::new(FakeStrategy::new(&fx.library));
        let (manager, cache) = fx.manager(strategy.clone());

        let started = Instant::now();
        let err = manager.mount(&usb("GHOST")).await.unwrap_err();
        assert!(matches!(err, MountError::DeviceNotFound(_)));
        assert!(started.elapsed() >= MountSettings::default().retry_timeout);
        assert!(strategy.calls.lock().unwrap().is_empty());
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn tolerant_strategy_mounts_without_table_entry() {
        let fx = Fixture::new();
        let mut fake = FakeStrategy::new(&fx.library);
        fake.tolerates_absence = true;
        let strategy = Arc::new(fake);
        let (manager, _) = fx.manager(strategy.clone());

        assert_eq!(manager.mount(&usb("MUSIC1")).await.unwrap(), "NAME");
        assert_eq!(*strategy.calls.lock().unwrap(), vec![Call::Validate(None)]);
    }

    #[tokio::test]
    async fn device_appearing_late_is_found() {
        let fx = Fixture::new();
        let source = fx.media("LATE");
        let strategy = Arc::new(FakeStrategy::new(&fx.library));
        let (manager, _) = fx.manager(strategy.clone());

        let table_path = fx.table_path.clone();
        let late_source = source.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(400)).await;
            std::fs::write(&table_path, format!("/dev/sdb1 {} vfat rw 0 0\n", late_source.display())).unwrap();
        });

        manager.mount(&usb("LATE")).await.unwrap();
        writer.await.unwrap();
        assert_eq!(*strategy.calls.lock().unwrap(), vec![Call::Validate(Some(source))]);
    }

    #[tokio::test]
    async fn cancellation_interrupts_wait() {
        let fx = Fixture::new();
        let cancel = CancellationToken::new();
        let manager = MountManager::new(
            fx.library.clone(),
            MountTable::new(&fx.table_path),
            Arc::new(MountPointCache::new()),
            Arc::new(FakeStrategy::new(&fx.library)),
            MountSettings {
                retry_interval: Duration::from_secs(60),
                retry_timeout: Duration::from_secs(600),
            },
            cancel.clone(),
        );
        cancel.cancel();
        assert!(matches!(manager.mount(&usb("X")).await, Err(MountError::Cancelled)));
    }

    #[tokio::test]
    async fn target_outside_library_is_rejected() {
        let fx = Fixture::new();
        let source = fx.media("MUSIC1");
        fx.set_table(&[("/dev/sdb1", &source)]);
        let (manager, _) = fx.manager(Arc::new(FakeStrategy::new(Path::new("/elsewhere"))));

        let err = manager.mount(&usb("MUSIC1")).await.unwrap_err();
        assert!(matches!(err, MountError::OutsideLibrary { .. }));
    }
}
