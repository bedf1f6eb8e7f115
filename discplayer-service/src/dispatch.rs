// SPDX-License-Identifier: GPL-3.0-only

//! Routes device events to the handlers registered for their kind
//!
//! Each matching handler callback runs as its own task, so a slow mount on
//! one device never holds up events for another. Events are taken from the
//! queue in arrival order; callback completion order is not guaranteed.

use std::sync::Arc;
use std::time::Duration;

use discplayer_contracts::{Handler, NotificationEvent, Notifier, PlayerErrorKind};
use discplayer_types::{Device, DeviceEvent, EventType};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

pub struct Dispatcher {
    handlers: Vec<Arc<dyn Handler>>,
    notifier: Option<Arc<dyn Notifier>>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            handlers: Vec::new(),
            notifier: None,
            tracker: TaskTracker::new(),
            cancel,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn register(&mut self, handler: Arc<dyn Handler>) {
        info!("Registered {} handler for {} devices", handler.name(), handler.kind());
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Spawn one callback task per matching handler, returning how many
    pub fn dispatch(&self, event: DeviceEvent) -> usize {
        let kind = event.device.kind();
        let mut spawned = 0;
        for handler in self.handlers.iter().filter(|h| h.handles(kind)) {
            let handler = handler.clone();
            let notifier = self.notifier.clone();
            let device = event.device.clone();
            let cancel = self.cancel.clone();
            let event_type = event.event_type;
            self.tracker.spawn(async move {
                invoke(handler, event_type, device, notifier, cancel).await;
            });
            spawned += 1;
        }
        if spawned == 0 {
            debug!(device = %event.device.path(), %kind, "No handler registered");
        }
        spawned
    }

    /// Consume `events` until the channel closes or `cancel` fires
    pub async fn run(&self, mut events: mpsc::Receiver<DeviceEvent>, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Some(event) => {
                    self.dispatch(event);
                }
                None => break,
            }
        }
        debug!("Dispatch loop stopped");
    }

    /// Wait up to `grace` for in-flight callbacks; true when all finished
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!("Waiting up to {:?} for {} handler task(s)", grace, pending);
        }
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!("{} handler task(s) still running at shutdown", self.tracker.len());
                false
            }
        }
    }
}

async fn invoke(
    handler: Arc<dyn Handler>,
    event_type: EventType,
    device: Device,
    notifier: Option<Arc<dyn Notifier>>,
    cancel: CancellationToken,
) {
    let name = handler.name().to_string();
    let path = device.path().to_string();

    if let Some(notifier) = &notifier {
        let signal = match event_type {
            EventType::Added => NotificationEvent::Add,
            EventType::Removed => NotificationEvent::Remove,
        };
        if let Err(e) = notifier.play(signal).await {
            debug!("Notification {} failed: {}", signal.name(), e);
        }
    }

    debug!(handler = %name, action = %event_type, device = %path, "Invoking handler");
    let result = match event_type {
        EventType::Added => handler.on_add(&device, &cancel).await,
        EventType::Removed => handler.on_remove(&device, &cancel).await,
    };

    let Err(e) = result else {
        info!(handler = %name, action = %event_type, device = %path, "Handler finished");
        return;
    };

    match e.kind {
        PlayerErrorKind::Cancelled => {
            info!(handler = %name, action = %event_type, device = %path, "Handler cancelled");
            return;
        }
        kind if kind.is_transient() => {
            warn!(handler = %name, action = %event_type, device = %path, "Handler failed: {}", e);
        }
        _ => {
            error!(handler = %name, action = %event_type, device = %path, "Handler failed: {}", e);
        }
    }

    if let Some(notifier) = &notifier
        && let Err(e) = notifier.play(NotificationEvent::Error).await
    {
        debug!("Error notification failed: {}", e);
    }
}
