//! Collaborator boundaries: observation in, actuation out, loot choice on the side.

use crate::error::{ActuatorError, ProviderError};
use crate::snapshot::{Entity, PlayerState, WorldSnapshot};
use crate::types::{EntityId, WorldPos};

pub trait WorldProvider {
    fn is_linked(&self) -> bool;

    /// Attempt to re-establish the link. Returns whether the link is now up.
    fn reacquire(&mut self) -> bool;

    fn snapshot(&mut self) -> Result<WorldSnapshot, ProviderError>;
}

/// Fire-and-forget command sink. Commands are requests; completion is observed
/// through later snapshots.
pub trait Actuator {
    fn is_linked(&self) -> bool;

    fn reacquire(&mut self) -> bool;

    fn move_toward(&mut self, target: WorldPos) -> Result<(), ActuatorError>;

    fn use_ability(&mut self, binding: &str, target: Option<WorldPos>) -> Result<(), ActuatorError>;

    fn pickup_item_at(&mut self, position: WorldPos) -> Result<(), ActuatorError>;

    fn interact_at(&mut self, position: WorldPos) -> Result<(), ActuatorError> {
        self.pickup_item_at(position)
    }
}

pub trait LootSelector {
    /// Ids from `candidates` worth picking up, highest priority first.
    fn select(&mut self, player: &PlayerState, candidates: &[&Entity]) -> Vec<EntityId>;
}
