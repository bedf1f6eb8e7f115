// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for the disc player daemon
//!
//! This crate talks to the kernel directly rather than through the media
//! server:
//! - Mount table parsing (`/proc/mounts` format)
//! - Bind mounts for the loopback mount strategy
//! - CD-ROM read speed control
//! - udev netlink monitoring of the block subsystem
//!
//! Bind mounts and speed control need elevated privileges.

pub mod bind;
pub mod disc;
pub mod error;
pub mod hotplug;
pub mod mount_table;

pub use bind::{bind_mount, unbind};
pub use disc::set_disc_speed;
pub use error::{Result, SysError};
pub use hotplug::{UdevSource, probe_device};
pub use mount_table::{MountEntry, MountTable, is_removable_node};
