//! Per-tick work of the active state.

use crate::error::ActuatorError;
use crate::types::NavStatus;

use super::*;

impl<P: WorldProvider, A: Actuator, L: LootSelector> BotController<P, A, L> {
    /// Runs the active state's action. Only link loss comes back as an error.
    pub(super) fn act(
        &mut self,
        snapshot: &WorldSnapshot,
        now: Instant,
    ) -> Result<Delegation, ActuatorError> {
        match self.state {
            BotState::Combat | BotState::BossFight => {
                self.combat.tick(snapshot, &mut self.actuator, now)?;
                Ok(Delegation::Combat)
            }
            BotState::Navigating => {
                self.navigate(snapshot, now)?;
                Ok(Delegation::Navigation)
            }
            BotState::Looting => {
                if !self.loot_done {
                    self.loot_pass(snapshot)?;
                }
                Ok(Delegation::None)
            }
            BotState::Farming | BotState::SeasonalActivity | BotState::Idle | BotState::Error => {
                Ok(Delegation::None)
            }
        }
    }

    fn navigate(&mut self, snapshot: &WorldSnapshot, now: Instant) -> Result<(), ActuatorError> {
        let status = self.navigation.tick(snapshot, &mut self.actuator, now)?;
        let Some(goal) = self.seasonal_goal else {
            return Ok(());
        };
        match status {
            NavStatus::Reached => {
                self.seasonal_goal = None;
                self.map.handled_seasonal.insert(goal.id);
                match self.actuator.interact_at(goal.position) {
                    Ok(()) => info!(object = goal.id.0, "seasonal object activated"),
                    Err(err) if err.is_link_loss() => return Err(err),
                    Err(err) => warn!(object = goal.id.0, %err, "seasonal interaction refused"),
                }
            }
            NavStatus::Idle => {
                debug!(object = goal.id.0, "seasonal goal abandoned");
                self.seasonal_goal = None;
                self.map.handled_seasonal.insert(goal.id);
            }
            NavStatus::Active | NavStatus::Stuck => {}
        }
        Ok(())
    }

    /// Single pickup pass over fresh nearby items. Every considered item is marked
    /// attempted, so rejected and refused items do not pull the agent back into looting.
    fn loot_pass(&mut self, snapshot: &WorldSnapshot) -> Result<(), ActuatorError> {
        self.loot_done = true;
        let candidates: Vec<&Entity> = snapshot
            .lootables_within(self.config.loot.pickup_range)
            .filter(|item| !self.map.attempted_loot.contains(&item.id))
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }
        self.map.attempted_loot.extend(candidates.iter().map(|item| item.id));

        let picks = self.loot.select(&snapshot.player, &candidates);
        debug!(candidates = candidates.len(), picks = picks.len(), "loot pass");
        for id in picks {
            let Some(item) = snapshot.entity(id) else {
                continue;
            };
            match self.actuator.pickup_item_at(item.position) {
                Ok(()) => {
                    self.items_looted += 1;
                    debug!(item = id.0, rarity = ?item.rarity(), "pickup requested");
                }
                Err(err) if err.is_link_loss() => return Err(err),
                Err(err) => warn!(item = id.0, %err, "pickup refused"),
            }
        }
        Ok(())
    }
}
