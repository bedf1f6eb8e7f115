// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use discplayer_types::{Device, DeviceKind};

use crate::PlayerError;

/// Reacts to one kind of device being added or removed
///
/// Handlers hold no per-device state; the same handler may run
/// concurrently for different devices.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn kind(&self) -> DeviceKind;

    fn handles(&self, kind: DeviceKind) -> bool {
        self.kind() == kind
    }

    async fn on_add(&self, device: &Device, cancel: &CancellationToken) -> Result<(), PlayerError>;

    async fn on_remove(
        &self,
        device: &Device,
        cancel: &CancellationToken,
    ) -> Result<(), PlayerError>;
}
