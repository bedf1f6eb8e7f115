// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;
use discplayer_contracts::{CueGenerator, Handler, PlayerError};
use discplayer_mpd::ReconnectingClient;
use discplayer_types::{Device, DeviceKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Plays audio CDs as they are inserted and clears them from the queue on eject
pub struct DiscHandler {
    client: Arc<ReconnectingClient>,
    /// Read speed applied on insert; `None` leaves the drive alone
    speed: Option<u32>,
    cue: Option<Arc<dyn CueGenerator>>,
}

impl DiscHandler {
    pub fn new(client: Arc<ReconnectingClient>, speed: Option<u32>) -> Self {
        Self {
            client,
            speed,
            cue: None,
        }
    }

    pub fn with_cue_generator(mut self, cue: Arc<dyn CueGenerator>) -> Self {
        self.cue = Some(cue);
        self
    }

    async fn apply_speed(&self, device: &Device) {
        let Some(speed) = self.speed else {
            return;
        };
        let path = device.path().to_string();
        let result = tokio::task::spawn_blocking(move || discplayer_sys::set_disc_speed(&path, speed)).await;
        match result {
            Ok(Ok(())) => debug!(device = %device.path(), "Disc speed set to {}x", speed),
            Ok(Err(e)) => warn!(device = %device.path(), "Failed to set disc speed: {}", e),
            Err(e) => warn!(device = %device.path(), "Disc speed task failed: {}", e),
        }
    }

    async fn cue_playlist(&self, device: &Device) -> Option<String> {
        let cue = self.cue.as_ref()?;
        match cue.generate(device.path()).await {
            Ok(path) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                info!(device = %device.path(), "No cue playlist: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Handler for DiscHandler {
    fn name(&self) -> &str {
        "disc"
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Disc
    }

    async fn on_add(&self, device: &Device, cancel: &CancellationToken) -> Result<(), PlayerError> {
        if cancel.is_cancelled() {
            return Err(PlayerError::cancelled());
        }
        self.apply_speed(device).await;

        let cue = self.cue_playlist(device).await;
        let tracks = device.audio_track_count().unwrap_or(0);
        self.client.start_disc_playback(cue, tracks).await?;
        Ok(())
    }

    async fn on_remove(&self, _device: &Device, cancel: &CancellationToken) -> Result<(), PlayerError> {
        if cancel.is_cancelled() {
            return Err(PlayerError::cancelled());
        }
        self.client.stop_disc_playback().await?;
        Ok(())
    }
}
