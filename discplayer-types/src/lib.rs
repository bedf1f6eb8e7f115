// SPDX-License-Identifier: GPL-3.0-only

//! Canonical device and event models for mpd-discplayer
//!
//! These types travel through every layer of the daemon:
//!
//! - **discplayer-sys**: the udev monitor produces [`RawNotification`]s
//! - **discplayer-service**: the classifier turns them into [`DeviceEvent`]s,
//!   handlers and the mount manager consume the contained [`Device`]
//!
//! A [`Device`] is built once per notification and never mutated afterwards.

pub mod device;
pub mod mount;
pub mod properties;

pub use device::{Device, DeviceEvent, DeviceKind, EventType, RawNotification};
pub use mount::MountRecord;
