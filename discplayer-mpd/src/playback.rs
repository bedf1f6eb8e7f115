// SPDX-License-Identifier: GPL-3.0-only

//! Queue and storage operations used by the device handlers
//!
//! Every operation is one `execute` call, so its command sequence runs
//! uninterrupted by other handlers.

use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::ReconnectingClient;
use crate::commands;
use crate::connection::Session;
use crate::error::{MpdError, Result};
use crate::protocol::Frame;

/// URI scheme of audio CD tracks
pub const CDDA_PREFIX: &str = "cdda://";

const DB_UPDATE_POLL: Duration = Duration::from_millis(500);
const DB_UPDATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Neighbor URI of a filesystem as reported by the udisks neighbor plugin
pub fn udisks_neighbor(uuid: &str) -> String {
    format!("udisks://by-uuid-{uuid}")
}

impl ReconnectingClient {
    /// Replace the queue with the inserted disc and play it
    ///
    /// A cue playlist is preferred when one was generated; if it is absent
    /// or MPD refuses it, the tracks are queued one by one.
    pub async fn start_disc_playback(&self, cue_playlist: Option<String>, track_count: u32) -> Result<()> {
        self.execute(move |session| {
            let cue_playlist = cue_playlist.clone();
            async move {
                commands::clear(session).await?;
                let loaded = match cue_playlist {
                    Some(playlist) => load_cue(session, &playlist).await?,
                    None => false,
                };
                if !loaded {
                    add_cdda_tracks(session, track_count).await?;
                }
                commands::play(session, None).await
            }
            .boxed()
        })
        .await?;
        info!("Started disc playback");
        Ok(())
    }

    /// Rescan `rel_path` in the library, then replace the queue with it and play
    pub async fn start_usb_playback(&self, rel_path: &str) -> Result<()> {
        let path = rel_path.to_string();
        let cancel = self.cancel_token().clone();
        self.execute(move |session| {
            let path = path.clone();
            let cancel = cancel.clone();
            async move {
                commands::clear(session).await?;
                tokio::select! {
                    _ = cancel.cancelled() => return Err(MpdError::Cancelled),
                    updated = update_and_wait(session, &path) => updated?,
                }
                debug!("Adding {} to queue", path);
                commands::add(session, &path).await?;
                commands::play(session, None).await
            }
            .boxed()
        })
        .await?;
        info!("Started playback of {}", rel_path);
        Ok(())
    }

    /// Replace the queue with `uri` and play it
    pub async fn start_playback(&self, uri: &str) -> Result<()> {
        let uri = uri.to_string();
        self.execute(move |session| {
            let uri = uri.clone();
            async move {
                commands::clear(session).await?;
                commands::add(session, &uri).await?;
                commands::play(session, None).await
            }
            .boxed()
        })
        .await
    }

    /// Stop if the current song lives under `prefix`, then drop its entries from the queue
    pub async fn stop_playback(&self, prefix: &str) -> Result<()> {
        let prefix = prefix.to_string();
        self.execute(move |session| {
            let prefix = prefix.clone();
            async move {
                if is_path_playing(session, &prefix).await? {
                    commands::stop(session).await?;
                    debug!("Stopped playback of {}", prefix);
                }
                delete_from_queue(session, &prefix).await
            }
            .boxed()
        })
        .await
    }

    pub async fn stop_disc_playback(&self) -> Result<()> {
        self.stop_playback(CDDA_PREFIX).await
    }

    /// Mount the neighbor with `uuid` at library path `label`
    pub async fn mount(&self, uuid: &str, label: &str) -> Result<()> {
        let neighbor = udisks_neighbor(uuid);
        let label = label.to_string();
        self.execute(move |session| {
            let neighbor = neighbor.clone();
            let label = label.clone();
            async move {
                let neighbors = commands::list_neighbors(session).await?;
                if !neighbors.contains(&neighbor) {
                    return Err(MpdError::NotFound(format!(
                        "{neighbor} not in MPD neighbors (is the udisks neighbor plugin enabled?)"
                    )));
                }
                commands::mount(session, &label, &neighbor).await?;
                info!("MPD mounted {} at {}", neighbor, label);
                Ok(())
            }
            .boxed()
        })
        .await
    }

    pub async fn unmount(&self, label: &str) -> Result<()> {
        let label = label.to_string();
        self.execute(move |session| {
            let label = label.clone();
            async move { commands::unmount(session, &label).await }.boxed()
        })
        .await
    }

    /// Unmount every server-side mount whose storage is no longer a neighbor
    ///
    /// Returns the unmounted names. Individual failures are collected and
    /// reported together after all mounts were tried.
    pub async fn clear_mounts(&self) -> Result<Vec<String>> {
        self.execute(|session| {
            async move {
                let mounts = commands::list_mounts(session).await?;
                let neighbors = match commands::list_neighbors(session).await {
                    Ok(neighbors) => neighbors,
                    Err(e) if e.is_connection_error() => return Err(e),
                    Err(e) => {
                        warn!("Cannot list MPD neighbors: {}", e);
                        Vec::new()
                    }
                };

                let mut cleared = Vec::new();
                let mut failures = Vec::new();
                for (name, storage) in mounts {
                    if name.is_empty() || neighbors.contains(&storage) {
                        continue;
                    }
                    match commands::unmount(session, &name).await {
                        Ok(()) => cleared.push(name),
                        Err(e) if e.is_connection_error() => return Err(e),
                        Err(e) => failures.push(format!("{name}: {e}")),
                    }
                }

                if failures.is_empty() {
                    Ok(cleared)
                } else {
                    Err(MpdError::Protocol(format!(
                        "failed to clear {} mount(s): {}",
                        failures.len(),
                        failures.join("; ")
                    )))
                }
            }
            .boxed()
        })
        .await
    }

    pub async fn music_directory(&self) -> Result<String> {
        self.execute(|session| async move { commands::music_directory(session).await }.boxed())
            .await
    }
}

/// Returns false when MPD refused the playlist
async fn load_cue(session: &mut dyn Session, playlist: &str) -> Result<bool> {
    match commands::load(session, playlist).await {
        Ok(()) => {
            info!("Loaded cue playlist {}", playlist);
            Ok(true)
        }
        Err(e) if e.is_connection_error() => Err(e),
        Err(e) => {
            warn!("Cue playlist {} rejected, queueing tracks instead: {}", playlist, e);
            Ok(false)
        }
    }
}

async fn add_cdda_tracks(session: &mut dyn Session, track_count: u32) -> Result<()> {
    if track_count == 0 {
        return Err(MpdError::NotFound("disc has no audio tracks".to_string()));
    }
    for track in 1..=track_count {
        commands::add(session, &format!("{CDDA_PREFIX}/{track}")).await?;
    }
    debug!("Queued {} disc tracks", track_count);
    Ok(())
}

async fn update_and_wait(session: &mut dyn Session, path: &str) -> Result<()> {
    commands::update(session, Some(path)).await?;
    let deadline = Instant::now() + DB_UPDATE_TIMEOUT;
    loop {
        let updating = match commands::status(session).await {
            Ok(status) => status.contains("updating_db"),
            Err(e) if e.is_connection_error() => return Err(e),
            Err(_) => true,
        };
        if !updating {
            debug!("Database update of {} finished", path);
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(MpdError::Timeout(format!(
                "database update of {path} still running after {DB_UPDATE_TIMEOUT:?}"
            )));
        }
        tokio::time::sleep(DB_UPDATE_POLL).await;
    }
}

/// True when the current song is under `prefix`, or when it cannot be told
async fn is_path_playing(session: &mut dyn Session, prefix: &str) -> Result<bool> {
    match commands::current_song(session).await {
        Ok(song) if song.is_empty() => Ok(true),
        Ok(song) => Ok(song.get("file").is_some_and(|file| file.starts_with(prefix))),
        Err(e) if e.is_connection_error() => Err(e),
        Err(_) => Ok(true),
    }
}

async fn delete_from_queue(session: &mut dyn Session, prefix: &str) -> Result<()> {
    let queue = commands::playlist_info(session).await?;
    for (start, end) in matching_ranges(&queue, prefix) {
        commands::delete_range(session, start, end).await?;
        debug!("Deleted queue positions {}..{}", start, end);
    }
    Ok(())
}

/// Contiguous `start..end` runs of entries under `prefix`, last run first
fn matching_ranges(queue: &[Frame], prefix: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut run_end: Option<usize> = None;
    for index in (0..queue.len()).rev() {
        let matches = queue[index]
            .get("file")
            .is_some_and(|file| file.starts_with(prefix));
        match (matches, run_end) {
            (true, None) => run_end = Some(index + 1),
            (false, Some(end)) => {
                ranges.push((index + 1, end));
                run_end = None;
            }
            _ => {}
        }
    }
    if let Some(end) = run_end {
        ranges.push((0, end));
    }
    ranges
}
