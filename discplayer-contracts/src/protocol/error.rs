// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerErrorKind {
    InvalidInput,
    NotFound,
    Unavailable,
    Timeout,
    Cancelled,
    Mount,
    Playback,
    Internal,
}

impl PlayerErrorKind {
    /// Whether a later hotplug event for the same device may succeed
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Unavailable | Self::Timeout | Self::NotFound)
    }
}

/// Error crossing a handler or collaborator boundary
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct PlayerError {
    pub kind: PlayerErrorKind,
    pub message: String,
}

impl PlayerError {
    pub fn new(kind: PlayerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(PlayerErrorKind::Cancelled, "operation cancelled")
    }
}
