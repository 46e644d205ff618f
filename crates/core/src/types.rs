use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifier the world-state provider assigns to an observed entity.
/// Stable for as long as the entity stays alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPos {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn flat(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Planar distance; height is ignored for every range check.
    pub fn distance_2d(self, other: WorldPos) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self { x: self.x + dx, y: self.y + dy, z: self.z }
    }

    pub fn step_toward(self, target: WorldPos, max_step: f32) -> Self {
        let dist = self.distance_2d(target);
        if dist <= max_step || dist <= f32::EPSILON {
            return WorldPos { z: self.z, ..target };
        }
        let scale = max_step / dist;
        self.offset((target.x - self.x) * scale, (target.y - self.y) * scale)
    }

    /// Point `step` units away from `threat`, along the line through both.
    /// Coincident points flee along +x.
    pub fn step_away(self, threat: WorldPos, step: f32) -> Self {
        let dist = self.distance_2d(threat);
        if dist <= f32::EPSILON {
            return self.offset(step, 0.0);
        }
        let scale = step / dist;
        self.offset((self.x - threat.x) * scale, (self.y - threat.y) * scale)
    }
}

/// Exploration-grid coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cell {
    pub y: i32,
    pub x: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BotState {
    #[default]
    Idle,
    Farming,
    Combat,
    Looting,
    Navigating,
    BossFight,
    SeasonalActivity,
    Error,
}

impl BotState {
    pub fn as_str(self) -> &'static str {
        match self {
            BotState::Idle => "idle",
            BotState::Farming => "farming",
            BotState::Combat => "combat",
            BotState::Looting => "looting",
            BotState::Navigating => "navigating",
            BotState::BossFight => "boss_fight",
            BotState::SeasonalActivity => "seasonal_activity",
            BotState::Error => "error",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NavState {
    #[default]
    Idle,
    Pathfinding,
    Moving,
    Exploring,
    Stuck,
    GoalReached,
}

impl NavState {
    pub fn as_str(self) -> &'static str {
        match self {
            NavState::Idle => "idle",
            NavState::Pathfinding => "pathfinding",
            NavState::Moving => "moving",
            NavState::Exploring => "exploring",
            NavState::Stuck => "stuck",
            NavState::GoalReached => "goal_reached",
        }
    }
}

/// Coarse navigation status published to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavStatus {
    Idle,
    Active,
    Reached,
    Stuck,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CombatState {
    #[default]
    Idle,
    Engaging,
    Fighting,
    Retreating,
    Healing,
    Kiting,
    BossFight,
}

impl CombatState {
    pub fn as_str(self) -> &'static str {
        match self {
            CombatState::Idle => "idle",
            CombatState::Engaging => "engaging",
            CombatState::Fighting => "fighting",
            CombatState::Retreating => "retreating",
            CombatState::Healing => "healing",
            CombatState::Kiting => "kiting",
            CombatState::BossFight => "boss_fight",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TacticsMode {
    Aggressive,
    Defensive,
    #[default]
    Balanced,
    BossOnly,
    Kiting,
}

impl TacticsMode {
    /// Multiplier applied to the configured retreat and heal thresholds.
    pub fn threshold_scale(self) -> f32 {
        match self {
            TacticsMode::Aggressive => 0.5,
            TacticsMode::Defensive => 1.25,
            TacticsMode::Balanced | TacticsMode::BossOnly | TacticsMode::Kiting => 1.0,
        }
    }
}

/// Monotone run counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub monsters_killed: u64,
    pub bosses_killed: u64,
    pub items_looted: u64,
    pub maps_cleared: u64,
    pub deaths: u64,
    pub runtime_ms: u64,
}

impl Statistics {
    pub fn runtime(&self) -> Duration {
        Duration::from_millis(self.runtime_ms)
    }
}

/// Point-in-time view of the agent published to observers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub tick: u64,
    pub bot_state: BotState,
    pub combat_state: CombatState,
    pub navigation_state: NavState,
    pub tactics: TacticsMode,
    pub exploration_progress: f32,
    pub statistics: Statistics,
}
