// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use discplayer_contracts::{PlayerError, PlayerErrorKind};
use discplayer_mpd::MpdError;
use discplayer_sys::SysError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MountError {
    #[error("Device {0} did not appear in the mount table in time")]
    DeviceNotFound(String),

    #[error("Device {0} is not tracked by the mount strategy")]
    UnknownDevice(String),

    #[error("Device {0} has no filesystem UUID")]
    MissingIdentity(String),

    #[error("{} lies outside the library {}", path.display(), library.display())]
    OutsideLibrary { path: PathBuf, library: PathBuf },

    #[error("{} is not a symlink", .0.display())]
    NotASymlink(PathBuf),

    #[error("Symlink {} points to {}, expected {}", link.display(), actual.display(), expected.display())]
    SymlinkMismatch {
        link: PathBuf,
        actual: PathBuf,
        expected: PathBuf,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Mount operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Sys(#[from] SysError),

    #[error(transparent)]
    Mpd(#[from] MpdError),
}

impl MountError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<MountError> for PlayerError {
    fn from(error: MountError) -> Self {
        let kind = match &error {
            MountError::DeviceNotFound(_) => PlayerErrorKind::Timeout,
            MountError::UnknownDevice(_) => PlayerErrorKind::NotFound,
            MountError::MissingIdentity(_) => PlayerErrorKind::InvalidInput,
            MountError::Cancelled => PlayerErrorKind::Cancelled,
            MountError::Mpd(e) => mpd_kind(e),
            _ => PlayerErrorKind::Mount,
        };
        PlayerError::new(kind, error.to_string())
    }
}

fn mpd_kind(error: &MpdError) -> PlayerErrorKind {
    match error {
        MpdError::ReconnectExhausted { .. } => PlayerErrorKind::Unavailable,
        MpdError::Cancelled => PlayerErrorKind::Cancelled,
        e if e.is_connection_error() => PlayerErrorKind::Unavailable,
        e if e.is_not_found() => PlayerErrorKind::NotFound,
        _ => PlayerErrorKind::Mount,
    }
}
