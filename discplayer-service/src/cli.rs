// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use clap::Parser;
use discplayer_mpd::ConnectionKind;

use crate::mounts::StrategyKind;

/// Plays inserted audio CDs and USB drives through MPD
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "mpd-discplayer", version, about)]
pub struct Cli {
    /// Configuration file (default: user config dir, then /etc)
    #[arg(short, long, env = "MPD_DISCPLAYER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Start playback of the disc in --device and exit
    #[arg(long, conflicts_with_all = ["stop", "uri"])]
    pub play: bool,

    /// Stop disc playback and exit
    #[arg(long, conflicts_with = "uri")]
    pub stop: bool,

    /// Replace the queue with a library URI, play it and exit
    #[arg(long, value_name = "URI")]
    pub uri: Option<String>,

    /// Optical drive used by --play
    #[arg(long, default_value = "/dev/sr0")]
    pub device: String,

    /// MPD connection type
    #[arg(long, env = "MPD_DISCPLAYER_CONNECTION", value_enum)]
    pub connection: Option<CliConnection>,

    /// MPD address (host:port or socket path)
    #[arg(long, env = "MPD_DISCPLAYER_ADDRESS")]
    pub address: Option<String>,

    /// MPD library root
    #[arg(long, env = "MPD_DISCPLAYER_LIBRARY")]
    pub library: Option<PathBuf>,

    /// How USB drives are exposed to MPD
    #[arg(long, env = "MPD_DISCPLAYER_MOUNT_STRATEGY", value_enum)]
    pub strategy: Option<CliStrategy>,
}

impl Cli {
    /// Whether a one-shot action was requested instead of the daemon
    pub fn one_shot(&self) -> bool {
        self.play || self.stop || self.uri.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliConnection {
    Tcp,
    Unix,
}

impl From<CliConnection> for ConnectionKind {
    fn from(value: CliConnection) -> Self {
        match value {
            CliConnection::Tcp => ConnectionKind::Tcp,
            CliConnection::Unix => ConnectionKind::Unix,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliStrategy {
    Mpd,
    Symlink,
    Loopback,
}

impl From<CliStrategy> for StrategyKind {
    fn from(value: CliStrategy) -> Self {
        match value {
            CliStrategy::Mpd => StrategyKind::Mpd,
            CliStrategy::Symlink => StrategyKind::Symlink,
            CliStrategy::Loopback => StrategyKind::Loopback,
        }
    }
}
