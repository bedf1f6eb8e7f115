// SPDX-License-Identifier: GPL-3.0-only

//! Mount table reader
//!
//! Reads the kernel mount table (`/proc/mounts` or any file in the same
//! format). Every call re-reads the file; nothing is cached here.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, SysError};

pub const PROC_MOUNTS: &str = "/proc/mounts";

const NON_REMOVABLE_MOUNTS: [&str; 3] = ["/", "/home", "/var"];
const NON_REMOVABLE_PREFIXES: [&str; 4] = ["/var/lib/docker", "/boot", "/proc", "/dev"];

/// First two fields of a mount table line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MountTable {
    path: PathBuf,
}

impl Default for MountTable {
    fn default() -> Self {
        Self::proc()
    }
}

impl MountTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The live kernel mount table
    pub fn proc() -> Self {
        Self::new(PROC_MOUNTS)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Result<Vec<MountEntry>> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SysError::MountTable {
            path: self.path.clone(),
            source,
        })?;
        Ok(parse_mount_table(&content))
    }

    /// Mount point of `device`, taking the first matching line
    pub fn mount_point_of(&self, device: &str) -> Result<Option<PathBuf>> {
        let found = self
            .entries()?
            .into_iter()
            .find(|entry| entry.device == device)
            .map(|entry| entry.mount_point);
        debug!("Mount table lookup for {}: {:?}", device, found);
        Ok(found)
    }

    /// Device mounted at `mount_point`
    pub fn device_at(&self, mount_point: &Path) -> Result<Option<String>> {
        let wanted = trim_trailing_slash(mount_point);
        Ok(self
            .entries()?
            .into_iter()
            .find(|entry| trim_trailing_slash(&entry.mount_point) == wanted)
            .map(|entry| entry.device))
    }
}

/// Parse mount table text, skipping malformed lines
pub fn parse_mount_table(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            Some(MountEntry {
                device: unescape(device),
                mount_point: PathBuf::from(unescape(mount_point)),
            })
        })
        .collect()
}

/// Whether a mount looks like a removable USB disk rather than a system mount
pub fn is_removable_node(device: &str, mount_point: &Path) -> bool {
    if !device.starts_with("/dev") {
        return false;
    }
    let is_sd = Path::new(device)
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("sd"));
    if !is_sd {
        return false;
    }

    let mount_point = trim_trailing_slash(mount_point);
    if NON_REMOVABLE_MOUNTS.contains(&mount_point) {
        return false;
    }
    !NON_REMOVABLE_PREFIXES
        .iter()
        .any(|prefix| Path::new(mount_point).starts_with(prefix))
}

fn trim_trailing_slash(path: &Path) -> &str {
    let raw = path.to_str().unwrap_or_default();
    if raw.len() > 1 {
        raw.trim_end_matches('/')
    } else {
        raw
    }
}

/// Decode the kernel's octal escapes (`\040` for space and friends)
fn unescape(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }

    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits.iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
