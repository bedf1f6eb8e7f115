// SPDX-License-Identifier: GPL-3.0-only

//! Cue playlists produced by an external command
//!
//! The command receives the drive's device node as its last argument and
//! prints the path of the generated cue file as the last line of its output.
//! Relative paths are taken relative to the cue folder.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use discplayer_contracts::{CueGenerator, PlayerError, PlayerErrorKind};
use tokio::process::Command;
use tracing::debug;
use which::which;

pub struct CommandCueGenerator {
    program: PathBuf,
    args: Vec<String>,
    cue_dir: PathBuf,
}

impl CommandCueGenerator {
    /// `command` is split on whitespace; the first word is looked up in `PATH`
    pub fn new(command: &str, cue_dir: impl Into<PathBuf>) -> Result<Self, PlayerError> {
        let mut words = command.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| PlayerError::new(PlayerErrorKind::InvalidInput, "empty cue command"))?;
        let program = which(name).map_err(|e| {
            PlayerError::new(PlayerErrorKind::NotFound, format!("cue command {name}: {e}"))
        })?;
        Ok(Self {
            program,
            args: words.map(str::to_string).collect(),
            cue_dir: cue_dir.into(),
        })
    }

    fn resolve(&self, printed: &str) -> PathBuf {
        let path = Path::new(printed);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cue_dir.join(path)
        }
    }
}

#[async_trait]
impl CueGenerator for CommandCueGenerator {
    async fn generate(&self, device_path: &str) -> Result<PathBuf, PlayerError> {
        debug!("Generating cue for {} with {}", device_path, self.program.display());
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(device_path)
            .env("DISC_CUE_DIR", &self.cue_dir)
            .output()
            .await
            .map_err(|e| {
                PlayerError::new(
                    PlayerErrorKind::Unavailable,
                    format!("failed to run {}: {}", self.program.display(), e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlayerError::new(
                PlayerErrorKind::NotFound,
                format!("cue command failed ({}): {}", output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let printed = stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .ok_or_else(|| PlayerError::new(PlayerErrorKind::NotFound, "cue command printed no path"))?;

        let path = self.resolve(printed);
        if !path.is_file() {
            return Err(PlayerError::new(
                PlayerErrorKind::NotFound,
                format!("cue file {} does not exist", path.display()),
            ));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("make-cue");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn relative_output_resolves_in_cue_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("disc.cue"), "FILE").unwrap();
        let program = script(dir.path(), "echo working on \"$1\"\necho disc.cue");
        let generator = CommandCueGenerator::new(program.to_str().unwrap(), dir.path()).unwrap();

        let path = generator.generate("/dev/sr0").await.unwrap();
        assert_eq!(path, dir.path().join("disc.cue"));
    }

    #[tokio::test]
    async fn failing_command_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "echo 'no disc id' >&2\nexit 3");
        let generator = CommandCueGenerator::new(program.to_str().unwrap(), dir.path()).unwrap();

        let err = generator.generate("/dev/sr0").await.unwrap_err();
        assert_eq!(err.kind, PlayerErrorKind::NotFound);
        assert!(err.message.contains("no disc id"));
    }

    #[tokio::test]
    async fn missing_cue_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "echo /nonexistent/disc.cue");
        let generator = CommandCueGenerator::new(program.to_str().unwrap(), dir.path()).unwrap();
        assert!(generator.generate("/dev/sr0").await.is_err());
    }

    #[test]
    fn empty_or_unknown_command_is_rejected() {
        assert_eq!(
            CommandCueGenerator::new("  ", "/tmp").err().map(|e| e.kind),
            Some(PlayerErrorKind::InvalidInput)
        );
        assert_eq!(
            CommandCueGenerator::new("no-such-cuer-xyz", "/tmp").err().map(|e| e.kind),
            Some(PlayerErrorKind::NotFound)
        );
    }
}
