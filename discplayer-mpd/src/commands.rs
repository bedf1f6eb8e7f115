// SPDX-License-Identifier: GPL-3.0-only

//! Typed wrappers for the MPD commands the daemon uses
//!
//! Each function performs exactly one request on the given session.

use crate::connection::Session;
use crate::error::{MpdError, Result};
use crate::protocol::{Command, Frame};

pub async fn clear<S: Session + ?Sized>(session: &mut S) -> Result<()> {
    session.request(&Command::new("clear")).await.map(drop)
}

pub async fn add<S: Session + ?Sized>(session: &mut S, uri: &str) -> Result<()> {
    session.request(&Command::new("add").arg(uri)).await.map(drop)
}

pub async fn load<S: Session + ?Sized>(session: &mut S, playlist: &str) -> Result<()> {
    session.request(&Command::new("load").arg(playlist)).await.map(drop)
}

/// Start playing, at `position` if given
pub async fn play<S: Session + ?Sized>(session: &mut S, position: Option<u32>) -> Result<()> {
    let command = match position {
        Some(position) => Command::new("play").arg(position),
        None => Command::new("play"),
    };
    session.request(&command).await.map(drop)
}

pub async fn stop<S: Session + ?Sized>(session: &mut S) -> Result<()> {
    session.request(&Command::new("stop")).await.map(drop)
}

/// Delete queue positions `start..end`
pub async fn delete_range<S: Session + ?Sized>(session: &mut S, start: usize, end: usize) -> Result<()> {
    session
        .request(&Command::new("delete").arg(format!("{start}:{end}")))
        .await
        .map(drop)
}

/// Current song attributes; empty when nothing is queued for playback
pub async fn current_song<S: Session + ?Sized>(session: &mut S) -> Result<Frame> {
    session.request(&Command::new("currentsong")).await
}

pub async fn playlist_info<S: Session + ?Sized>(session: &mut S) -> Result<Vec<Frame>> {
    let frame = session.request(&Command::new("playlistinfo")).await?;
    Ok(frame.split_on("file"))
}

pub async fn status<S: Session + ?Sized>(session: &mut S) -> Result<Frame> {
    session.request(&Command::new("status")).await
}

/// Queue a database update, returning the job id
pub async fn update<S: Session + ?Sized>(session: &mut S, path: Option<&str>) -> Result<Option<u32>> {
    let command = match path {
        Some(path) => Command::new("update").arg(path),
        None => Command::new("update"),
    };
    let frame = session.request(&command).await?;
    Ok(frame.get("updating_db").and_then(|id| id.parse().ok()))
}

/// Server-side `music_directory`; only answered on local connections
pub async fn music_directory<S: Session + ?Sized>(session: &mut S) -> Result<String> {
    let frame = session.request(&Command::new("config")).await?;
    frame
        .get("music_directory")
        .map(str::to_string)
        .ok_or_else(|| MpdError::NotFound("music_directory not in server config".to_string()))
}

/// `(mount, storage)` pairs; the root mount has an empty mount path
pub async fn list_mounts<S: Session + ?Sized>(session: &mut S) -> Result<Vec<(String, String)>> {
    let frame = session.request(&Command::new("listmounts")).await?;
    Ok(frame
        .split_on("mount")
        .into_iter()
        .map(|record| {
            (
                record.get("mount").unwrap_or_default().to_string(),
                record.get("storage").unwrap_or_default().to_string(),
            )
        })
        .collect())
}

/// Neighbor storage URIs (e.g., `udisks://by-uuid-XXXX`)
pub async fn list_neighbors<S: Session + ?Sized>(session: &mut S) -> Result<Vec<String>> {
    let frame = session.request(&Command::new("listneighbors")).await?;
    Ok(frame
        .split_on("neighbor")
        .into_iter()
        .filter_map(|record| record.get("neighbor").map(str::to_string))
        .collect())
}

/// Mount `storage_uri` at library path `name`
pub async fn mount<S: Session + ?Sized>(session: &mut S, name: &str, storage_uri: &str) -> Result<()> {
    session
        .request(&Command::new("mount").arg(name).arg(storage_uri))
        .await
        .map(drop)
}

pub async fn unmount<S: Session + ?Sized>(session: &mut S, name: &str) -> Result<()> {
    session.request(&Command::new("unmount").arg(name)).await.map(drop)
}
