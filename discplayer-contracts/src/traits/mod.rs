// SPDX-License-Identifier: GPL-3.0-only

pub mod collaborators;
pub mod handler;
pub mod source;

pub use collaborators::{CueGenerator, NotificationEvent, Notifier};
pub use handler::Handler;
pub use source::NotificationSource;
