// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use async_trait::async_trait;

use crate::PlayerError;

/// Audible events the daemon can signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationEvent {
    Add,
    Remove,
    Error,
}

impl NotificationEvent {
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "in",
            Self::Remove => "out",
            Self::Error => "error",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn play(&self, event: NotificationEvent) -> Result<(), PlayerError>;

    async fn close(&self);
}

/// Produces a cue-sheet playlist for an inserted audio disc
#[async_trait]
pub trait CueGenerator: Send + Sync {
    async fn generate(&self, device_path: &str) -> Result<PathBuf, PlayerError>;
}
