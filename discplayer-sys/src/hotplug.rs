// SPDX-License-Identifier: GPL-3.0-only

//! udev block-subsystem monitor
//!
//! The netlink socket is owned by a dedicated thread that polls it with a
//! short timeout and forwards every event as an owned [`RawNotification`]
//! over a bounded channel. The thread exits when the cancellation token
//! fires or the receiving side is dropped.

use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::thread::JoinHandle;

use async_trait::async_trait;
use discplayer_contracts::{NotificationSource, PlayerError, PlayerErrorKind};
use discplayer_types::RawNotification;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SysError};

const SUBSYSTEM: &str = "block";
const POLL_TIMEOUT_MS: libc::c_int = 250;
const SYSFS_BLOCK: &str = "/sys/class/block";

type Item = std::result::Result<RawNotification, PlayerError>;

pub struct UdevSource {
    receiver: mpsc::Receiver<Item>,
    stop: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl UdevSource {
    /// Open the monitor socket and start the reader thread
    ///
    /// Fails if the socket cannot be created (no permission, no netlink).
    pub async fn open(cancel: &CancellationToken, capacity: usize) -> Result<Self> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (ready_tx, ready_rx) = oneshot::channel();
        let stop = cancel.child_token();
        let thread_stop = stop.clone();

        let thread = std::thread::Builder::new()
            .name("udev-monitor".to_string())
            .spawn(move || pump(sender, thread_stop, ready_tx))?;

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                return Err(SysError::Udev("monitor thread exited during setup".to_string()));
            }
        }

        info!("Listening for {} subsystem events", SUBSYSTEM);
        Ok(Self {
            receiver,
            stop,
            thread: Some(thread),
        })
    }
}

impl Drop for UdevSource {
    fn drop(&mut self) {
        self.stop.cancel();
        self.receiver.close();
        if let Some(thread) = self.thread.take() {
            // The thread notices within one poll interval; keep that wait
            // off the async workers.
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn_blocking(move || {
                        let _ = thread.join();
                    });
                }
                Err(_) => {
                    let _ = thread.join();
                }
            }
        }
    }
}

#[async_trait]
impl NotificationSource for UdevSource {
    async fn next_notification(&mut self) -> Option<Item> {
        self.receiver.recv().await
    }
}

fn open_socket() -> Result<udev::MonitorSocket> {
    let socket = udev::MonitorBuilder::new()
        .and_then(|builder| builder.match_subsystem(SUBSYSTEM))
        .and_then(|builder| builder.listen())
        .map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => SysError::PermissionDenied(format!("udev monitor: {e}")),
            _ => SysError::Udev(e.to_string()),
        })?;
    Ok(socket)
}

fn pump(sender: mpsc::Sender<Item>, stop: CancellationToken, ready: oneshot::Sender<Result<()>>) {
    let socket = match open_socket() {
        Ok(socket) => {
            let _ = ready.send(Ok(()));
            socket
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let fd = socket.as_raw_fd();
    while !stop.is_cancelled() {
        let mut fds = [libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        }];
        // SAFETY: `fds` is a valid one-element array for the whole call.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), 1, POLL_TIMEOUT_MS) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            warn!("udev monitor poll failed: {}", err);
            let item = Err(PlayerError::new(PlayerErrorKind::Unavailable, err.to_string()));
            if sender.blocking_send(item).is_err() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(POLL_TIMEOUT_MS as u64));
            continue;
        }
        if rc == 0 {
            continue;
        }

        for event in socket.iter() {
            let notification = to_notification(&event.device(), action_name(event.event_type()));
            debug!(
                action = %notification.action,
                sysname = %notification.sysname,
                "udev event"
            );
            if sender.blocking_send(Ok(notification)).is_err() {
                debug!("Notification receiver dropped, stopping udev monitor");
                return;
            }
        }
    }
    debug!("udev monitor thread stopped");
}

fn action_name(event_type: udev::EventType) -> &'static str {
    match event_type {
        udev::EventType::Add => "add",
        udev::EventType::Change => "change",
        udev::EventType::Remove => "remove",
        udev::EventType::Bind => "bind",
        udev::EventType::Unbind => "unbind",
        _ => "unknown",
    }
}

fn to_notification(device: &udev::Device, action: &str) -> RawNotification {
    let properties = device
        .properties()
        .map(|entry| {
            (
                entry.name().to_string_lossy().into_owned(),
                entry.value().to_string_lossy().into_owned(),
            )
        })
        .collect();

    RawNotification {
        action: action.to_string(),
        devnode: device.devnode().map(|node| node.to_string_lossy().into_owned()),
        sysname: device.sysname().to_string_lossy().into_owned(),
        properties,
    }
}

/// Read the current udev state of a device node as a synthetic "change"
///
/// Used for one-shot CLI actions on a drive that is already present.
pub fn probe_device(devnode: &str) -> Result<RawNotification> {
    let name = Path::new(devnode)
        .file_name()
        .ok_or_else(|| SysError::DeviceNotFound(devnode.to_string()))?;
    let device = udev::Device::from_syspath(&Path::new(SYSFS_BLOCK).join(name)).map_err(|e| {
        match e.kind() {
            io::ErrorKind::NotFound => SysError::DeviceNotFound(devnode.to_string()),
            _ => SysError::Udev(e.to_string()),
        }
    })?;
    let mut notification = to_notification(&device, "change");
    if notification.devnode.is_none() {
        notification.devnode = Some(devnode.to_string());
    }
    Ok(notification)
}
