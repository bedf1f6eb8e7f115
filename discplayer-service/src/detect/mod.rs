// SPDX-License-Identifier: GPL-3.0-only

//! Hotplug notification filtering
//!
//! [`classify`] turns raw block-subsystem notifications into typed device
//! events; [`EventDetector`] drives it from a notification source.

pub mod classifier;
pub mod detector;

pub use classifier::classify;
pub use detector::{DetectorError, EventDetector};
