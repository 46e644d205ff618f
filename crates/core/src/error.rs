//! Error taxonomy for the decision core.
//! Nothing here is fatal to the control loop; callers decide whether to skip, retry or abandon.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The link to the game process is gone; the controller enters its error state.
    #[error("world-state link lost: {0}")]
    LinkLost(String),
    /// A single read failed; the tick is skipped.
    #[error("transient world-state read failure: {0}")]
    Transient(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorError {
    #[error("actuator not ready")]
    NotReady,
    #[error("actuator rejected command: {0}")]
    Rejected(String),
    #[error("actuator link lost: {0}")]
    LinkLost(String),
}

impl ActuatorError {
    pub fn is_link_loss(&self) -> bool {
        matches!(self, ActuatorError::LinkLost(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SearchFailure {
    #[error("goal is unreachable")]
    Unreachable,
    #[error("goal lies outside the exploration grid")]
    OutOfBounds,
    #[error("search expanded {expanded} nodes without reaching the goal")]
    ExpansionBudget { expanded: usize },
    #[error("search exceeded its time budget")]
    TimeBudget,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("no route: {0}")]
    NoRoute(#[from] SearchFailure),
    #[error("stuck after {attempts} recovery attempts")]
    StuckExhausted { attempts: u32 },
    #[error("no reachable frontier remains")]
    NoFrontier,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange { field: &'static str, value: f64, min: f64, max: f64 },
    #[error("retreat threshold {retreat} must not exceed heal threshold {heal}")]
    ThresholdOrder { retreat: f32, heal: f32 },
    #[error("leash range {leash} must be at least the engagement range {engagement}")]
    LeashShorterThanEngagement { leash: f32, engagement: f32 },
    #[error("{field} must be non-zero")]
    ZeroValue { field: &'static str },
    #[error("ability `{0}` is registered more than once")]
    DuplicateAbility(String),
    #[error("ability `{0}` has no key binding")]
    EmptyBinding(String),
    #[error("unknown log level `{0}`")]
    UnknownLogLevel(String),
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
}
