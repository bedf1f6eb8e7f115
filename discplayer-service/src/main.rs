// SPDX-License-Identifier: GPL-3.0-only

//! mpd-discplayer - starts MPD playback when an audio CD or USB drive is plugged in
//!
//! Listens to udev block events, classifies them, and hands each disc or
//! USB partition to its handler. USB partitions are first made reachable
//! from the MPD library by the configured mount strategy.

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod config;
mod cue;
mod daemon;
mod detect;
mod dispatch;
mod handlers;
mod mounts;
mod notify;

use cli::Cli;
use config::Config;
use daemon::Daemon;

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("mpd_discplayer=info,discplayer_mpd=info,discplayer_sys=info,warn")
        }))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_overrides(&cli);
    config.validate()?;

    tracing::info!("Starting mpd-discplayer v{}", env!("CARGO_PKG_VERSION"));

    let mut daemon = Daemon::new(config, CancellationToken::new());
    daemon.resolve_library().await;
    if cli.one_shot() {
        return daemon.run_one_shot(&cli).await;
    }
    daemon.run().await
}
