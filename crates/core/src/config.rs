//! Agent configuration, named presets and validation.
//! Every numeric threshold the core uses has its default here.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::combat::{AbilityDescriptor, UsageCondition};
use crate::error::ConfigError;
use crate::snapshot::ItemRarity;
use crate::types::TacticsMode;

pub const PRESET_NAMES: [&str; 5] = ["aggressive", "safe", "balanced", "seasonal", "boss"];

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub tick_interval_ms: u64,
    pub error_backoff_ms: u64,
    pub entity_staleness_ms: u64,
    pub log_level: String,
    pub combat: CombatConfig,
    pub navigation: NavigationConfig,
    pub loot: LootConfig,
    pub abilities: Vec<AbilityDescriptor>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            error_backoff_ms: 5000,
            entity_staleness_ms: 2000,
            log_level: "info".to_string(),
            combat: CombatConfig::default(),
            navigation: NavigationConfig::default(),
            loot: LootConfig::default(),
            abilities: default_abilities(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub engagement_range: f32,
    /// A current target is kept while it stays inside this range.
    pub leash_range: f32,
    pub retreat_health: f32,
    pub heal_health: f32,
    pub kite_distance: f32,
    pub tactics: TacticsMode,
    pub retarget_interval_ms: u64,
    pub boss_threshold_bonus: f32,
    pub retreat_step: f32,
    pub max_engagement_ms: u64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            engagement_range: 25.0,
            leash_range: 40.0,
            retreat_health: 0.3,
            heal_health: 0.5,
            kite_distance: 15.0,
            tactics: TacticsMode::Balanced,
            retarget_interval_ms: 1500,
            boss_threshold_bonus: 0.1,
            retreat_step: 10.0,
            max_engagement_ms: 30_000,
        }
    }
}

impl CombatConfig {
    pub fn retarget_interval(&self) -> Duration {
        Duration::from_millis(self.retarget_interval_ms)
    }

    pub fn max_engagement(&self) -> Duration {
        Duration::from_millis(self.max_engagement_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// World units per grid cell.
    pub grid_resolution: f32,
    pub grid_width: u32,
    pub grid_height: u32,
    pub arrival_tolerance: f32,
    pub deviation_tolerance: f32,
    /// World-unit radius marked visited around the player each tick.
    pub visit_radius: f32,
    pub stuck_threshold: f32,
    pub stuck_window_ms: u64,
    pub stuck_patience_ms: u64,
    pub recovery_attempts: u32,
    pub recovery_step: f32,
    pub recovery_maneuver_ms: u64,
    pub max_expansions: usize,
    pub search_budget_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            grid_resolution: 2.0,
            grid_width: 200,
            grid_height: 200,
            arrival_tolerance: 1.5,
            deviation_tolerance: 8.0,
            visit_radius: 5.0,
            stuck_threshold: 1.0,
            stuck_window_ms: 1000,
            stuck_patience_ms: 2000,
            recovery_attempts: 3,
            recovery_step: 3.0,
            recovery_maneuver_ms: 600,
            max_expansions: 20_000,
            search_budget_ms: 20,
        }
    }
}

impl NavigationConfig {
    pub fn stuck_window(&self) -> Duration {
        Duration::from_millis(self.stuck_window_ms)
    }

    pub fn stuck_patience(&self) -> Duration {
        Duration::from_millis(self.stuck_patience_ms)
    }

    pub fn recovery_maneuver(&self) -> Duration {
        Duration::from_millis(self.recovery_maneuver_ms)
    }

    pub fn search_budget(&self) -> Duration {
        Duration::from_millis(self.search_budget_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootConfig {
    pub pickup_range: f32,
    pub min_rarity: ItemRarity,
    /// Seasonal items bypass the rarity floor.
    pub seasonal_loot: bool,
}

impl Default for LootConfig {
    fn default() -> Self {
        Self { pickup_range: 10.0, min_rarity: ItemRarity::Magic, seasonal_loot: false }
    }
}

pub fn default_abilities() -> Vec<AbilityDescriptor> {
    vec![
        AbilityDescriptor::offensive("basic_attack", "F1", 500, 4.0).with_priority(1),
        AbilityDescriptor::offensive("power_strike", "F2", 4000, 4.0)
            .with_priority(5)
            .with_mana_cost(15.0),
        AbilityDescriptor::offensive("arcane_bolt", "F3", 2500, 18.0)
            .with_priority(3)
            .with_mana_cost(10.0),
        AbilityDescriptor::defensive("healing_surge", "F4", 12_000)
            .with_priority(8)
            .with_mana_cost(20.0)
            .with_condition(UsageCondition::HealthBelow(0.6)),
        AbilityDescriptor::mobility("dash", "F5", 6000).with_priority(2).with_mana_cost(5.0),
    ]
}

impl BotConfig {
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        match name {
            "balanced" => {}
            "aggressive" => {
                config.combat.tactics = TacticsMode::Aggressive;
                config.combat.engagement_range = 30.0;
                config.combat.retreat_health = 0.2;
            }
            "safe" => {
                config.combat.tactics = TacticsMode::Defensive;
                config.combat.engagement_range = 20.0;
                config.combat.retreat_health = 0.5;
                config.combat.heal_health = 0.6;
            }
            "seasonal" => {
                config.loot.seasonal_loot = true;
            }
            "boss" => {
                config.combat.tactics = TacticsMode::BossOnly;
                config.combat.engagement_range = 35.0;
                config.combat.retreat_health = 0.4;
            }
            other => return Err(ConfigError::UnknownPreset(other.to_string())),
        }
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn entity_staleness(&self) -> Duration {
        Duration::from_millis(self.entity_staleness_ms)
    }

    /// Every problem found, in field order.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut problems = Vec::new();
        let combat = &self.combat;
        let nav = &self.navigation;

        for (field, value) in [
            ("tick_interval_ms", self.tick_interval_ms),
            ("error_backoff_ms", self.error_backoff_ms),
            ("combat.retarget_interval_ms", combat.retarget_interval_ms),
            ("combat.max_engagement_ms", combat.max_engagement_ms),
            ("navigation.stuck_window_ms", nav.stuck_window_ms),
            ("navigation.stuck_patience_ms", nav.stuck_patience_ms),
            ("navigation.recovery_maneuver_ms", nav.recovery_maneuver_ms),
            ("navigation.search_budget_ms", nav.search_budget_ms),
            ("navigation.grid_width", u64::from(nav.grid_width)),
            ("navigation.grid_height", u64::from(nav.grid_height)),
            ("navigation.max_expansions", nav.max_expansions as u64),
        ] {
            if value == 0 {
                problems.push(ConfigError::ZeroValue { field });
            }
        }

        check_range(&mut problems, "combat.engagement_range", combat.engagement_range, 1.0, 100.0);
        check_range(&mut problems, "combat.leash_range", combat.leash_range, 1.0, 200.0);
        check_range(&mut problems, "combat.retreat_health", combat.retreat_health, 0.0, 1.0);
        check_range(&mut problems, "combat.heal_health", combat.heal_health, 0.0, 1.0);
        check_range(&mut problems, "combat.kite_distance", combat.kite_distance, 0.0, 100.0);
        check_range(
            &mut problems,
            "combat.boss_threshold_bonus",
            combat.boss_threshold_bonus,
            0.0,
            0.5,
        );
        check_range(&mut problems, "combat.retreat_step", combat.retreat_step, 0.1, 100.0);
        check_range(&mut problems, "navigation.grid_resolution", nav.grid_resolution, 0.1, 50.0);
        check_range(
            &mut problems,
            "navigation.arrival_tolerance",
            nav.arrival_tolerance,
            0.01,
            50.0,
        );
        check_range(
            &mut problems,
            "navigation.deviation_tolerance",
            nav.deviation_tolerance,
            0.01,
            500.0,
        );
        // Frontier cells must lie outside the arrival tolerance or exploration never moves.
        check_range(
            &mut problems,
            "navigation.visit_radius",
            nav.visit_radius,
            nav.arrival_tolerance,
            500.0,
        );
        check_range(&mut problems, "navigation.stuck_threshold", nav.stuck_threshold, 0.0, 50.0);
        check_range(&mut problems, "navigation.recovery_step", nav.recovery_step, 0.1, 50.0);
        check_range(&mut problems, "loot.pickup_range", self.loot.pickup_range, 0.0, 100.0);

        if combat.retreat_health > combat.heal_health {
            problems.push(ConfigError::ThresholdOrder {
                retreat: combat.retreat_health,
                heal: combat.heal_health,
            });
        }
        if combat.leash_range < combat.engagement_range {
            problems.push(ConfigError::LeashShorterThanEngagement {
                leash: combat.leash_range,
                engagement: combat.engagement_range,
            });
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            problems.push(ConfigError::UnknownLogLevel(self.log_level.clone()));
        }

        let mut seen = BTreeSet::new();
        for ability in &self.abilities {
            if !seen.insert(ability.name.as_str()) {
                problems.push(ConfigError::DuplicateAbility(ability.name.clone()));
            }
            if ability.binding.trim().is_empty() {
                problems.push(ConfigError::EmptyBinding(ability.name.clone()));
            }
        }
        problems
    }

    /// First validation problem, if any.
    pub fn check(&self) -> Result<(), ConfigError> {
        match self.validate().into_iter().next() {
            Some(problem) => Err(problem),
            None => Ok(()),
        }
    }
}

fn check_range(problems: &mut Vec<ConfigError>, field: &'static str, value: f32, min: f32, max: f32) {
    if !(min..=max).contains(&value) {
        problems.push(ConfigError::OutOfRange {
            field,
            value: f64::from(value),
            min: f64::from(min),
            max: f64::from(max),
        });
    }
}
