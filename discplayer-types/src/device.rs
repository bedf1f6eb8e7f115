// SPDX-License-Identifier: GPL-3.0-only

//! Device and hotplug event models

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::properties;

/// Classification tag deciding which handler and mount logic applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Disc,
    Usb,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Disc => write!(f, "disc"),
            DeviceKind::Usb => write!(f, "usb"),
        }
    }
}

/// Hotplug event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// Media or device became available
    Added,

    /// Media or device went away (or removal was requested)
    Removed,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Added => write!(f, "add"),
            EventType::Removed => write!(f, "remove"),
        }
    }
}

/// One kernel hotplug notification, as read from the udev monitor
///
/// Owned and `Send`, so it can cross from the monitor thread into async code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawNotification {
    /// udev action ("add", "change", "remove", ...)
    pub action: String,

    /// Device node (e.g., "/dev/sr0"), absent for nodeless devices
    pub devnode: Option<String>,

    /// Kernel short name (e.g., "sdb1")
    pub sysname: String,

    /// udev property bag
    pub properties: BTreeMap<String, String>,
}

impl RawNotification {
    pub fn new(action: impl Into<String>, devnode: impl Into<String>, sysname: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            devnode: Some(devnode.into()),
            sysname: sysname.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Property value, with empty strings treated as absent
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// A validated optical drive or USB partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    kind: DeviceKind,
    path: String,
    sysname: String,
    properties: BTreeMap<String, String>,
}

impl Device {
    pub fn new(
        kind: DeviceKind,
        path: impl Into<String>,
        sysname: impl Into<String>,
        properties: BTreeMap<String, String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            sysname: sysname.into(),
            properties,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Block device node path (e.g., "/dev/sr0")
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn sysname(&self) -> &str {
        &self.sysname
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Property value, with empty strings treated as absent
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn fs_uuid(&self) -> Option<&str> {
        self.property(properties::ID_FS_UUID)
    }

    pub fn fs_label(&self) -> Option<&str> {
        self.property(properties::ID_FS_LABEL)
    }

    /// Number of audio tracks reported for the inserted disc
    pub fn audio_track_count(&self) -> Option<u32> {
        self.property(properties::ID_CDROM_MEDIA_TRACK_COUNT_AUDIO)
            .and_then(|count| count.trim().parse().ok())
    }

    pub fn eject_requested(&self) -> bool {
        self.property(properties::DISK_EJECT_REQUEST) == Some("1")
    }
}

/// A typed add/remove event, consumed exactly once by dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    pub event_type: EventType,
    pub device: Device,
}

impl DeviceEvent {
    pub fn new(event_type: EventType, device: Device) -> Self {
        Self { event_type, device }
    }
}
