// SPDX-License-Identifier: GPL-3.0-only

//! Audible feedback through an external sound player

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use discplayer_contracts::{NotificationEvent, Notifier, PlayerError, PlayerErrorKind};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use which::which;

/// Plays `<sounds>/<event>.wav` with the configured player
///
/// Without a usable player every event is only logged.
pub struct SoundNotifier {
    player: Option<PathBuf>,
    sounds: PathBuf,
    children: Mutex<Vec<Child>>,
}

impl SoundNotifier {
    pub fn new(player: &str, sounds: impl Into<PathBuf>) -> Self {
        let player = match which(player) {
            Ok(path) => {
                info!("Sound notifications through {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Sound player {} not found ({}), notifications are log-only", player, e);
                None
            }
        };
        Self {
            player,
            sounds: sounds.into(),
            children: Mutex::new(Vec::new()),
        }
    }

    pub fn sound_path(&self, event: NotificationEvent) -> PathBuf {
        self.sounds.join(format!("{}.wav", event.name()))
    }

    async fn spawn(&self, player: &Path, sound: &Path) -> Result<(), PlayerError> {
        let child = Command::new(player)
            .arg(sound)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PlayerError::new(
                    PlayerErrorKind::Unavailable,
                    format!("failed to start {}: {}", player.display(), e),
                )
            })?;

        let mut children = self.children.lock().await;
        children.retain_mut(|child| matches!(child.try_wait(), Ok(None)));
        children.push(child);
        Ok(())
    }
}

#[async_trait]
impl Notifier for SoundNotifier {
    async fn play(&self, event: NotificationEvent) -> Result<(), PlayerError> {
        let Some(player) = &self.player else {
            debug!("Notification: {}", event.name());
            return Ok(());
        };

        let sound = self.sound_path(event);
        if !sound.is_file() {
            return Err(PlayerError::new(
                PlayerErrorKind::NotFound,
                format!("sound file {} is missing", sound.display()),
            ));
        }
        self.spawn(player, &sound).await
    }

    async fn close(&self) {
        let mut children = self.children.lock().await;
        for child in children.iter_mut() {
            if let Err(e) = child.kill().await {
                debug!("Sound player already gone: {}", e);
            }
        }
        children.clear();
    }
}
