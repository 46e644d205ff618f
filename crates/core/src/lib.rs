pub mod combat;
pub mod config;
pub mod controller;
pub mod error;
pub mod loot;
pub mod navigation;
pub mod ports;
pub mod sim;
pub mod snapshot;
pub mod types;

#[cfg(test)]
mod test_support;

pub use combat::{AbilityDescriptor, CombatEngine, CombatStats, UsageCondition};
pub use config::{BotConfig, CombatConfig, LootConfig, NavigationConfig, PRESET_NAMES};
pub use controller::{BotController, Delegation, TickReport};
pub use error::{ActuatorError, ConfigError, NavigationError, ProviderError, SearchFailure};
pub use loot::RarityLootFilter;
pub use navigation::{ExplorationMap, NavigationEngine, Route};
pub use ports::{Actuator, LootSelector, WorldProvider};
pub use snapshot::{Entity, EntityKind, EntityPayload, MapStatus, PlayerState, WorldSnapshot};
pub use types::*;
