//! Map manager configuration.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Tunables for the map manager and the physics world it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Gravity (meters/second²).
    pub gravity: Vec2,

    /// Map pixels per physics meter.
    pub pixels_per_meter: f32,

    /// Frame rate the manager is expected to be driven at (ticks per second).
    pub tick_rate: u32,

    /// Name given to the player when it is first created.
    pub player_name: String,

    /// Map loaded on start-up.
    pub start_map: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.8),
            pixels_per_meter: 100.0,
            tick_rate: 60,
            player_name: "Player".to_string(),
            start_map: None,
        }
    }
}

impl ManagerConfig {
    /// Time step per tick in seconds.
    pub fn delta_time(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}
