// SPDX-License-Identifier: GPL-3.0-only

use std::io;
use std::time::Duration;

use discplayer_contracts::{PlayerError, PlayerErrorKind};
use thiserror::Error;

/// ACK_ERROR_NO_EXIST
pub const ACK_NO_EXIST: u32 = 50;

#[derive(Error, Debug)]
pub enum MpdError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The server rejected a command
    #[error("MPD error {code} in `{command}`: {message}")]
    Ack {
        code: u32,
        command: String,
        message: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection closed by server")]
    Closed,

    #[error("Could not reach MPD within {window:?}: {last}")]
    ReconnectExhausted { window: Duration, last: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

impl MpdError {
    /// Whether the failure means the connection itself is unusable
    pub fn is_connection_error(&self) -> bool {
        match self {
            MpdError::Closed => true,
            MpdError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            MpdError::NotFound(_) => true,
            MpdError::Ack { code, .. } => *code == ACK_NO_EXIST,
            _ => false,
        }
    }
}

impl From<MpdError> for PlayerError {
    fn from(error: MpdError) -> Self {
        let kind = match &error {
            MpdError::Io(_) | MpdError::Closed | MpdError::ReconnectExhausted { .. } => {
                PlayerErrorKind::Unavailable
            }
            MpdError::Ack { .. } => PlayerErrorKind::Playback,
            MpdError::Protocol(_) => PlayerErrorKind::Internal,
            MpdError::Cancelled => PlayerErrorKind::Cancelled,
            MpdError::NotFound(_) => PlayerErrorKind::NotFound,
            MpdError::Timeout(_) => PlayerErrorKind::Timeout,
        };
        PlayerError::new(kind, error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MpdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_class_errors() {
        for kind in [
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::UnexpectedEof,
        ] {
            assert!(MpdError::Io(io::Error::from(kind)).is_connection_error());
        }
        assert!(MpdError::Closed.is_connection_error());
    }

    #[test]
    fn semantic_errors_are_not_connection_class() {
        let ack = MpdError::Ack {
            code: ACK_NO_EXIST,
            command: "add".to_string(),
            message: "No such directory".to_string(),
        };
        assert!(!ack.is_connection_error());
        assert!(ack.is_not_found());
        assert!(!MpdError::Io(io::Error::from(io::ErrorKind::PermissionDenied)).is_connection_error());
        assert!(!MpdError::Timeout("update".to_string()).is_connection_error());
    }

    #[test]
    fn converts_to_player_error_kind() {
        let error: PlayerError = MpdError::Closed.into();
        assert_eq!(error.kind, PlayerErrorKind::Unavailable);
        let error: PlayerError = MpdError::Cancelled.into();
        assert_eq!(error.kind, PlayerErrorKind::Cancelled);
    }
}
