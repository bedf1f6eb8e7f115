// SPDX-License-Identifier: GPL-3.0-only

//! Optical drive control

use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;

use tracing::{debug, warn};

use crate::error::{Result, SysError};

/// CDROM_SET_SPEED from linux/cdrom.h
const CDROM_SET_SPEED: libc::c_ulong = 0x5322;

/// Limit the drive's read speed to cut spindle noise during playback
///
/// Blocking; call from `spawn_blocking` in async code. A speed of 0 asks the
/// drive to pick its own maximum.
pub fn set_disc_speed(device: &str, speed: u32) -> Result<()> {
    let speed = libc::c_int::try_from(speed)
        .map_err(|_| SysError::OperationFailed(format!("disc speed {speed} out of range")))?;

    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(device)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SysError::DeviceNotFound(device.to_string()),
            std::io::ErrorKind::PermissionDenied => SysError::PermissionDenied(device.to_string()),
            _ => SysError::Io(e),
        })?;

    // SAFETY: the fd is owned by `file` for the duration of the call and
    // CDROM_SET_SPEED takes its argument by value.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), CDROM_SET_SPEED as _, speed) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        warn!("CDROM_SET_SPEED failed on {}: {}", device, err);
        return Err(SysError::Io(err));
    }

    debug!("Set {} read speed to {}x", device, speed);
    Ok(())
}
