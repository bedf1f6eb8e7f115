// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use discplayer_types::RawNotification;

use crate::PlayerError;

/// A subscription to kernel hotplug notifications
///
/// `next_notification` must be cancel-safe: dropping the future before it
/// completes loses no notification.
#[async_trait]
pub trait NotificationSource: Send {
    /// Next notification, an error for a transient bus failure, or `None`
    /// once the subscription has ended.
    async fn next_notification(&mut self) -> Option<Result<RawNotification, PlayerError>>;
}
