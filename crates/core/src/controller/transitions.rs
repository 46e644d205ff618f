//! Transition rules: at most one state change per tick, first matching rule wins.

use super::*;

impl<P: WorldProvider, A: Actuator, L: LootSelector> BotController<P, A, L> {
    pub(super) fn next_state(&mut self, snapshot: &WorldSnapshot) -> Option<BotState> {
        match self.state {
            BotState::Farming => self.from_farming(snapshot),
            BotState::Combat => self.combat.is_idle().then_some(BotState::Farming),
            BotState::BossFight => self.from_boss_fight(),
            BotState::Looting => self.loot_done.then_some(BotState::Farming),
            BotState::Navigating => self.from_navigating(snapshot),
            BotState::SeasonalActivity => Some(self.from_seasonal(snapshot)),
            BotState::Idle | BotState::Error => None,
        }
    }

    pub(super) fn enter(&mut self, next: BotState, now: Instant) {
        info!(from = self.state.as_str(), to = next.as_str(), "state transition");
        match next {
            BotState::Combat => self.combat.start(now),
            BotState::BossFight => self.combat.start_boss_fight(now),
            BotState::Looting => self.loot_done = false,
            _ => {}
        }
        self.state = next;
    }

    /// The boss is down or gone; any adds still engaged are finished as ordinary combat.
    fn from_boss_fight(&self) -> Option<BotState> {
        if self.combat.is_boss_engaged() {
            None
        } else if self.combat.is_idle() {
            Some(BotState::Farming)
        } else {
            Some(BotState::Combat)
        }
    }

    fn from_farming(&mut self, snapshot: &WorldSnapshot) -> Option<BotState> {
        if let Some(hostile) = self.hostile_in_range(snapshot) {
            let boss_near = snapshot
                .hostiles_within(self.config.combat.engagement_range)
                .any(Entity::is_boss);
            debug!(target = hostile.id.0, boss_near, "hostile in range");
            return Some(if boss_near { BotState::BossFight } else { BotState::Combat });
        }

        let fresh_loot = snapshot
            .lootables_within(self.config.loot.pickup_range)
            .any(|item| !self.map.attempted_loot.contains(&item.id));
        if fresh_loot {
            return Some(BotState::Looting);
        }

        if self.pending_seasonal(snapshot).next().is_some() {
            return Some(BotState::SeasonalActivity);
        }

        if self.navigation.is_active() {
            return Some(BotState::Navigating);
        }
        match self.navigation.explore(snapshot.player.position) {
            Ok(frontier) => {
                debug!(y = frontier.y, x = frontier.x, "exploring");
                Some(BotState::Navigating)
            }
            Err(err) => {
                debug!(%err, "nothing to explore; staying put");
                None
            }
        }
    }

    fn from_navigating(&mut self, snapshot: &WorldSnapshot) -> Option<BotState> {
        if let Some(hostile) = self.hostile_in_range(snapshot) {
            debug!(target = hostile.id.0, "hostile interrupts navigation");
            return Some(BotState::Farming);
        }
        if self.navigation.is_active() {
            return None;
        }
        if let Some(err) = self.navigation.take_failure() {
            debug!(%err, "navigation ended without reaching its goal");
        }
        Some(BotState::Farming)
    }

    fn from_seasonal(&mut self, snapshot: &WorldSnapshot) -> BotState {
        let player = snapshot.player.position;
        let nearest = self
            .pending_seasonal(snapshot)
            .min_by(|a, b| {
                snapshot.distance_to(a).total_cmp(&snapshot.distance_to(b)).then(a.id.cmp(&b.id))
            })
            .map(|object| SeasonalGoal { id: object.id, position: object.position });
        let Some(goal) = nearest else {
            return BotState::Farming;
        };
        match self.navigation.navigate_to(player, goal.position) {
            Ok(()) => {
                debug!(object = goal.id.0, "heading to seasonal object");
                self.seasonal_goal = Some(goal);
                BotState::Navigating
            }
            Err(err) => {
                warn!(object = goal.id.0, %err, "seasonal object unreachable; skipping");
                self.map.handled_seasonal.insert(goal.id);
                BotState::Farming
            }
        }
    }

    pub(super) fn pending_seasonal<'a>(
        &'a self,
        snapshot: &'a WorldSnapshot,
    ) -> impl Iterator<Item = &'a Entity> + 'a {
        snapshot
            .seasonal_objects()
            .filter(move |object| !self.map.handled_seasonal.contains(&object.id))
    }
}
