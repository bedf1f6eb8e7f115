// SPDX-License-Identifier: GPL-3.0-only

//! Daemon configuration
//!
//! Read from TOML. Every field has a default, so an empty or missing file
//! yields a working setup against a local MPD. Command line flags and
//! `MPD_DISCPLAYER_*` variables override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use discplayer_mpd::{ConnectionConfig, ConnectionKind, ReconnectSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::cli::Cli;
use crate::mounts::{MountSettings, StrategyKind};

const APP_DIR: &str = "mpd-discplayer";
const CONFIG_FILE: &str = "config.toml";
const SYSTEM_CONFIG: &str = "/etc/mpd-discplayer/config.toml";

pub const DEFAULT_LIBRARY: &str = "/var/lib/mpd/music";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mpd: MpdConfig,
    pub library: LibraryConfig,
    pub mount: MountConfig,
    pub disc: DiscConfig,
    pub notifications: NotificationConfig,
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpdConfig {
    pub connection: ConnectionKind,
    pub address: String,
    pub password: Option<String>,
    pub reconnect_window_secs: u64,
    pub backoff_ceiling_secs: u64,
}

impl Default for MpdConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionKind::Tcp,
            address: "127.0.0.1:6600".to_string(),
            password: None,
            reconnect_window_secs: 30,
            backoff_ceiling_secs: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub folder: PathBuf,
    /// Where USB drives appear, relative to `folder`
    pub usb_subfolder: PathBuf,
    /// Where generated cue sheets go, relative to `folder`
    pub cue_subfolder: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from(DEFAULT_LIBRARY),
            usb_subfolder: PathBuf::from(".udisks"),
            cue_subfolder: PathBuf::from(".disc-cuer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    pub strategy: StrategyKind,
    pub mount_table: PathBuf,
    pub retry_interval_ms: u64,
    pub retry_timeout_ms: u64,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Mpd,
            mount_table: PathBuf::from(discplayer_sys::mount_table::PROC_MOUNTS),
            retry_interval_ms: 300,
            retry_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscConfig {
    /// Read speed applied on insertion; 0 leaves the drive alone
    pub speed: u32,
    /// External program that writes a cue sheet for a drive and prints its path
    pub cue_command: Option<String>,
}

impl Default for DiscConfig {
    fn default() -> Self {
        Self {
            speed: 12,
            cue_command: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub player: String,
    pub sounds: PathBuf,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            player: "paplay".to_string(),
            sounds: PathBuf::from("/usr/local/share/mpd-discplayer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub shutdown_grace_secs: u64,
    pub event_queue: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 5,
            event_queue: 32,
        }
    }
}

impl Config {
    /// Load `path`, or the first existing file of [`Config::search_paths`]
    ///
    /// An explicit path must exist. Without one, a missing file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let candidate = match path {
            Some(path) if !path.is_file() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::search_paths().into_iter().find(|p| p.is_file()),
        };

        let Some(path) = candidate else {
            debug!("No config file found, using defaults");
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join(APP_DIR).join(CONFIG_FILE));
        }
        paths.push(PathBuf::from(SYSTEM_CONFIG));
        paths
    }

    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(connection) = cli.connection {
            self.mpd.connection = connection.into();
        }
        if let Some(address) = &cli.address {
            self.mpd.address = address.clone();
        }
        if let Some(library) = &cli.library {
            self.library.folder = library.clone();
        }
        if let Some(strategy) = cli.strategy {
            self.mount.strategy = strategy.into();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mpd.address.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "mpd.address",
                reason: "must not be empty".to_string(),
            });
        }
        if self.mpd.reconnect_window_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "mpd.reconnect_window_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.library.folder.is_absolute() {
            return Err(ConfigError::Invalid {
                key: "library.folder",
                reason: format!("{} is not an absolute path", self.library.folder.display()),
            });
        }
        for (key, sub) in [
            ("library.usb_subfolder", &self.library.usb_subfolder),
            ("library.cue_subfolder", &self.library.cue_subfolder),
        ] {
            if sub.is_absolute() || sub.as_os_str().is_empty() {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("{} must be a non-empty relative path", sub.display()),
                });
            }
        }
        if self.mount.retry_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "mount.retry_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Whether the library folder should be asked from MPD instead
    pub fn library_is_default(&self) -> bool {
        self.library.folder == Path::new(DEFAULT_LIBRARY)
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            kind: self.mpd.connection,
            address: self.mpd.address.clone(),
            password: self.mpd.password.clone(),
        }
    }

    pub fn reconnect_settings(&self) -> ReconnectSettings {
        ReconnectSettings {
            window: Duration::from_secs(self.mpd.reconnect_window_secs),
            ceiling: Duration::from_secs(self.mpd.backoff_ceiling_secs.max(1)),
        }
    }

    pub fn mount_settings(&self) -> MountSettings {
        MountSettings {
            retry_interval: Duration::from_millis(self.mount.retry_interval_ms),
            retry_timeout: Duration::from_millis(self.mount.retry_timeout_ms),
        }
    }

    pub fn usb_dir(&self) -> PathBuf {
        self.library.folder.join(&self.library.usb_subfolder)
    }

    pub fn cue_dir(&self) -> PathBuf {
        self.library.folder.join(&self.library.cue_subfolder)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.daemon.shutdown_grace_secs)
    }
}
