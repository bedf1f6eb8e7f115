// SPDX-License-Identifier: GPL-3.0-only

//! One handler per device kind

mod disc;
mod usb;

pub use disc::DiscHandler;
pub use usb::UsbHandler;
