// SPDX-License-Identifier: GPL-3.0-only

//! Making USB partitions reachable from the MPD library
//!
//! [`MountManager`] resolves a device's mount point, hands it to the active
//! [`MountStrategy`](strategy::MountStrategy) and reports the result as a library-relative path.

pub mod cache;
pub mod error;
pub mod loopback;
pub mod manager;
pub mod mpd;
pub mod strategy;
pub mod symlink;

pub use cache::MountPointCache;
pub use manager::{MountManager, MountSettings};
pub use strategy::{LibraryLayout, StrategyKind, build_strategy};
