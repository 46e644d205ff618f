use std::time::{Duration, Instant};

use crate::config::{BotConfig, NavigationConfig};
use crate::snapshot::{PlayerState, WorldSnapshot};
use crate::types::WorldPos;

/// Unit-resolution grid small enough for exhaustive searches in tests.
pub(crate) fn nav_config() -> NavigationConfig {
    NavigationConfig {
        grid_resolution: 1.0,
        grid_width: 60,
        grid_height: 60,
        visit_radius: 2.0,
        max_expansions: 100_000,
        search_budget_ms: 1000,
        ..NavigationConfig::default()
    }
}

pub(crate) fn bot_config() -> BotConfig {
    BotConfig { navigation: nav_config(), ..BotConfig::default() }
}

pub(crate) fn snapshot_at(x: f32, y: f32) -> WorldSnapshot {
    WorldSnapshot::new(PlayerState::new(WorldPos::flat(x, y)))
}

pub(crate) fn at_ms(t0: Instant, ms: u64) -> Instant {
    t0 + Duration::from_millis(ms)
}
