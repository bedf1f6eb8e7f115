// SPDX-License-Identifier: GPL-3.0-only

//! Daemon wiring and lifecycle

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use discplayer_contracts::{Handler, Notifier};
use discplayer_mpd::{MpdConnector, ReconnectingClient};
use discplayer_sys::{MountTable, UdevSource, probe_device};
use discplayer_types::{DeviceEvent, DeviceKind, EventType};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cli::Cli;
use crate::config::Config;
use crate::cue::CommandCueGenerator;
use crate::detect::{DetectorError, EventDetector, classify};
use crate::dispatch::Dispatcher;
use crate::handlers::{DiscHandler, UsbHandler};
use crate::mounts::{LibraryLayout, MountManager, MountPointCache, StrategyKind, build_strategy};
use crate::notify::SoundNotifier;

const DETECTOR_RESTART_DELAY: Duration = Duration::from_secs(1);

pub struct Daemon {
    config: Config,
    client: Arc<ReconnectingClient>,
    cancel: CancellationToken,
}

impl Daemon {
    pub fn new(config: Config, cancel: CancellationToken) -> Self {
        let connector = MpdConnector::new(config.connection());
        info!("Using MPD at {} ({})", config.mpd.address, config.mpd.connection);
        let client = Arc::new(ReconnectingClient::new(
            Arc::new(connector),
            config.reconnect_settings(),
            cancel.clone(),
        ));
        Self {
            config,
            client,
            cancel,
        }
    }

    /// Ask MPD for its music directory when none was configured
    pub async fn resolve_library(&mut self) {
        if !self.config.library_is_default() {
            return;
        }
        match self.client.music_directory().await {
            Ok(dir) if PathBuf::from(&dir).is_absolute() => {
                if self.config.library.folder != PathBuf::from(&dir) {
                    info!("Using MPD music directory {}", dir);
                    self.config.library.folder = PathBuf::from(dir);
                }
            }
            Ok(dir) => warn!("Ignoring relative MPD music directory {}", dir),
            Err(e) => warn!(
                "Cannot read MPD music directory, keeping {}: {}",
                self.config.library.folder.display(),
                e
            ),
        }
    }

    fn disc_handler(&self) -> DiscHandler {
        let speed = Some(self.config.disc.speed).filter(|speed| *speed > 0);
        let handler = DiscHandler::new(self.client.clone(), speed);
        let Some(command) = &self.config.disc.cue_command else {
            return handler;
        };
        match CommandCueGenerator::new(command, self.config.cue_dir()) {
            Ok(cue) => handler.with_cue_generator(Arc::new(cue)),
            Err(e) => {
                warn!("Cue generation disabled: {}", e);
                handler
            }
        }
    }

    /// Run `--play`, `--stop` or `--uri` and return
    pub async fn run_one_shot(&self, cli: &Cli) -> Result<()> {
        if cli.play {
            let raw = probe_device(&cli.device).with_context(|| format!("cannot probe {}", cli.device))?;
            let device = match classify(&raw) {
                Some(DeviceEvent {
                    event_type: EventType::Added,
                    device,
                }) if device.kind() == DeviceKind::Disc => device,
                _ => bail!("no audio disc in {}", cli.device),
            };
            self.disc_handler().on_add(&device, &self.cancel).await?;
        } else if cli.stop {
            self.client.stop_disc_playback().await?;
            info!("Stopped disc playback");
        } else if let Some(uri) = &cli.uri {
            self.client.start_playback(uri).await?;
            info!("Playing {}", uri);
        }
        self.client.disconnect().await;
        Ok(())
    }

    /// Serve hotplug events until SIGINT or SIGTERM
    pub async fn run(self) -> Result<()> {
        tokio::spawn(cancel_on_signal(self.cancel.clone()));

        let notifier: Option<Arc<dyn Notifier>> = self.config.notifications.enabled.then(|| {
            Arc::new(SoundNotifier::new(
                &self.config.notifications.player,
                self.config.notifications.sounds.clone(),
            )) as Arc<dyn Notifier>
        });

        let mut dispatcher = Dispatcher::new(self.cancel.clone());
        if let Some(notifier) = &notifier {
            dispatcher = dispatcher.with_notifier(notifier.clone());
        }
        dispatcher.register(Arc::new(self.disc_handler()));
        match self.usb_handler().await {
            Ok(handler) => dispatcher.register(handler),
            Err(e) => error!("USB playback disabled: {:#}", e),
        }
        info!("{} handler(s) registered", dispatcher.handler_count());

        let (sink, events) = mpsc::channel(self.config.daemon.event_queue.max(1));
        let detector = tokio::spawn(supervise_detector(
            self.cancel.clone(),
            sink,
            self.config.daemon.event_queue,
        ));

        dispatcher.run(events, self.cancel.clone()).await;

        info!("Shutting down");
        dispatcher.shutdown(self.config.shutdown_grace()).await;
        if let Err(e) = detector.await {
            warn!("Detector task failed: {}", e);
        }
        self.client.disconnect().await;
        if let Some(notifier) = notifier {
            notifier.close().await;
        }
        info!("mpd-discplayer stopped");
        Ok(())
    }

    async fn usb_handler(&self) -> Result<Arc<dyn Handler>> {
        let kind = self.config.mount.strategy;
        // SAFETY: geteuid has no preconditions.
        if kind == StrategyKind::Loopback && unsafe { libc::geteuid() } != 0 {
            warn!("Loopback mounts need root or CAP_SYS_ADMIN");
        }

        let table = MountTable::new(&self.config.mount.mount_table);
        let cache = Arc::new(MountPointCache::new());
        cache.populate(&table).await;
        for record in cache.records().await {
            debug!(device = %record.device_path, "Already mounted at {}", record.mount_point.display());
        }
        info!("Tracking {} mounted USB partition(s)", cache.len().await);

        let layout = LibraryLayout::new(&self.config.library.folder, &self.config.library.usb_subfolder);
        let strategy = build_strategy(kind, layout, table.clone(), self.client.clone())
            .await
            .with_context(|| format!("cannot set up the {kind} mount strategy"))?;

        let mounts = MountManager::new(
            self.config.library.folder.clone(),
            table,
            cache,
            strategy,
            self.config.mount_settings(),
            self.cancel.clone(),
        );
        info!(
            "USB drives exposed under {} with the {} strategy",
            mounts.library().display(),
            mounts.strategy_name()
        );
        Ok(Arc::new(UsbHandler::new(self.client.clone(), Arc::new(mounts))))
    }
}

/// Keep a hotplug subscription open until cancelled, reopening it after failures
async fn supervise_detector(cancel: CancellationToken, sink: mpsc::Sender<DeviceEvent>, capacity: usize) {
    while !cancel.is_cancelled() {
        match UdevSource::open(&cancel, capacity).await {
            Ok(source) => match EventDetector::new(source).run(cancel.clone(), sink.clone()).await {
                Ok(()) | Err(DetectorError::SinkClosed) => break,
                Err(e) => warn!("{}, reopening", e),
            },
            Err(e) => error!("Cannot open hotplug monitor: {}", e),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(DETECTOR_RESTART_DELAY) => {}
        }
    }
}

async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
        _ = cancel.cancelled() => return,
    }
    cancel.cancel();
}
