// SPDX-License-Identifier: GPL-3.0-only

//! Bind mounts used by the loopback mount strategy

use std::path::Path;

use nix::mount::{MntFlags, MsFlags, mount, umount2};
use tracing::{debug, info};

use crate::error::{Result, SysError};

/// Bind `source` onto `target`, creating the target directory first
pub fn bind_mount(source: &Path, target: &Path) -> Result<()> {
    if !source.is_dir() {
        return Err(SysError::DeviceNotFound(format!(
            "bind source {} is not a directory",
            source.display()
        )));
    }
    std::fs::create_dir_all(target)?;

    debug!("Binding {} onto {}", source.display(), target.display());
    mount(Some(source), target, None::<&str>, MsFlags::MS_BIND, None::<&str>).map_err(|err| {
        if err == nix::Error::EPERM {
            SysError::PermissionDenied(format!("bind mount onto {} requires CAP_SYS_ADMIN", target.display()))
        } else {
            SysError::Mount {
                target: target.to_path_buf(),
                source: err,
            }
        }
    })?;

    info!("Bind mounted {} at {}", source.display(), target.display());
    Ok(())
}

/// Lazily detach a bind mount and remove its now-empty directory
pub fn unbind(target: &Path) -> Result<()> {
    match umount2(target, MntFlags::MNT_DETACH) {
        Ok(()) => {}
        // Already gone
        Err(nix::Error::EINVAL) | Err(nix::Error::ENOENT) => {
            debug!("{} was not mounted", target.display());
        }
        Err(source) => {
            return Err(SysError::Mount {
                target: target.to_path_buf(),
                source,
            });
        }
    }

    match std::fs::remove_dir(target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_rejects_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let result = bind_mount(&dir.path().join("absent"), &dir.path().join("target"));
        assert!(matches!(result, Err(SysError::DeviceNotFound(_))));
        assert!(!dir.path().join("target").exists());
    }

    #[test]
    fn unbind_of_plain_missing_path_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        assert!(unbind(&dir.path().join("never-mounted")).is_ok());
    }
}
