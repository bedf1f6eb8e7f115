// SPDX-License-Identifier: GPL-3.0-only

pub mod protocol;
pub mod traits;

pub use protocol::{PlayerError, PlayerErrorKind};
pub use traits::{CueGenerator, Handler, NotificationEvent, NotificationSource, Notifier};
