// SPDX-License-Identifier: GPL-3.0-only

//! Music Player Daemon client
//!
//! A small line-protocol codec and dialer, plus [`ReconnectingClient`], which
//! keeps one serialized control connection alive across server restarts and
//! exposes the playback operations the device handlers need.

pub mod backoff;
pub mod client;
pub mod commands;
pub mod connection;
pub mod error;
pub mod playback;
pub mod protocol;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backoff::{ReconnectSettings, wait_time};
pub use client::ReconnectingClient;
pub use connection::{ConnectionConfig, ConnectionKind, Connector, MpdConnection, MpdConnector, Session};
pub use error::{MpdError, Result};
pub use playback::CDDA_PREFIX;
pub use protocol::{Command, Frame};
