// SPDX-License-Identifier: GPL-3.0-only

use discplayer_contracts::NotificationSource;
use discplayer_types::DeviceEvent;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classifier::classify;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DetectorError {
    #[error("Hotplug notification source closed")]
    SourceClosed,

    #[error("Event consumer went away")]
    SinkClosed,
}

/// Owns the hotplug subscription and forwards classified events
pub struct EventDetector<S> {
    source: S,
}

impl<S: NotificationSource> EventDetector<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Forward events into `sink` until cancelled
    ///
    /// Delivery waits for queue space but gives up on cancellation. The sink
    /// is dropped on return, which closes the channel for the consumer.
    pub async fn run(
        mut self,
        cancel: CancellationToken,
        sink: mpsc::Sender<DeviceEvent>,
    ) -> Result<(), DetectorError> {
        info!("Event detector started");
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = self.source.next_notification() => next,
            };

            let raw = match next {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => {
                    warn!("Hotplug source error: {}", e);
                    continue;
                }
                None => return Err(DetectorError::SourceClosed),
            };

            let Some(event) = classify(&raw) else {
                continue;
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(device = %event.device.path(), "Dropping event at shutdown");
                    break;
                }
                sent = sink.send(event.clone()) => {
                    if sent.is_err() {
                        return Err(DetectorError::SinkClosed);
                    }
                }
            }
        }
        info!("Event detector stopped");
        Ok(())
    }
}
