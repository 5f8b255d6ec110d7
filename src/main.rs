//! Cragmoor - headless runner
//!
//! Loads a map from an asset directory and drives the map manager for a
//! number of frames, logging every game event.
//!
//! ```text
//! cragmoor <asset-root> [start-map] [frames]
//! ```
//!
//! `<asset-root>/cragmoor.json`, when present, overrides the manager
//! configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use cragmoor_game::{DirSource, GameEvent, ManagerConfig, MapManager};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CONFIG_FILE: &str = "cragmoor.json";
const DEFAULT_FRAMES: u32 = 600;

fn load_config(root: &Path) -> anyhow::Result<ManagerConfig> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(ManagerConfig::default());
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(root) = args.next().map(PathBuf::from) else {
        bail!("usage: cragmoor <asset-root> [start-map] [frames]");
    };
    let config = load_config(&root)?;
    let start_map = args
        .next()
        .or_else(|| config.start_map.clone())
        .context("no start map given and none configured")?;
    let frames = match args.next() {
        Some(frames) => frames.parse().context("frames must be a number")?,
        None => DEFAULT_FRAMES,
    };

    info!(root = %root.display(), map = %start_map, frames, "starting");
    let dt = config.delta_time();
    let mut manager = MapManager::new(config, Arc::new(DirSource::new(root)));
    manager.load_map_blocking(&start_map)?;

    for frame in 0..frames {
        if let Err(err) = manager.update(dt) {
            warn!(frame, error = %err, "map load failed");
        }
        for event in manager.drain_events() {
            match event {
                GameEvent::MapLoaded { map } => info!(frame, %map, "map loaded"),
                GameEvent::Message(text) => info!(frame, %text, "message"),
                other => info!(frame, event = ?other, "event"),
            }
        }
    }

    if let Some(player) = manager.player_actor() {
        info!(
            map = manager.map().map(|m| m.id()).unwrap_or("-"),
            items = player.inventory().len(),
            "finished"
        );
    }
    Ok(())
}
