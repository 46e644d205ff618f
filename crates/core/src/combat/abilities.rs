//! Ability registry and cooldown bookkeeping.
//! This module exists so usability (cooldown, range, mana, condition) is decided in one place.
//! It does not own which ability role the combat engine asks for on a given tick.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap, new_key_type};

use crate::snapshot::{Entity, PlayerState};

new_key_type! {
    pub struct AbilityId;
}

/// Extra usability predicate attached to an ability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UsageCondition {
    #[default]
    Always,
    HealthBelow(f32),
    HealthAbove(f32),
    ManaAbove(f32),
    TargetIsElite,
    TargetHealthBelow(f32),
}

impl UsageCondition {
    pub fn holds(self, player: &PlayerState, target: Option<&Entity>) -> bool {
        match self {
            UsageCondition::Always => true,
            UsageCondition::HealthBelow(limit) => player.health_fraction() < limit,
            UsageCondition::HealthAbove(limit) => player.health_fraction() > limit,
            UsageCondition::ManaAbove(limit) => player.mana_fraction() > limit,
            UsageCondition::TargetIsElite => {
                target.is_some_and(|entity| entity.is_elite() || entity.is_boss())
            }
            UsageCondition::TargetHealthBelow(limit) => target.is_some_and(|entity| {
                entity.max_health > 0.0 && entity.health / entity.max_health < limit
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityDescriptor {
    pub name: String,
    pub binding: String,
    pub cooldown_ms: u64,
    /// Zero means self-cast.
    pub range: f32,
    pub mana_cost: f32,
    pub offensive: bool,
    pub defensive: bool,
    pub mobility: bool,
    /// Higher fires first.
    pub priority: i32,
    pub condition: UsageCondition,
}

impl Default for AbilityDescriptor {
    fn default() -> Self {
        Self {
            name: String::new(),
            binding: String::new(),
            cooldown_ms: 1000,
            range: 0.0,
            mana_cost: 0.0,
            offensive: false,
            defensive: false,
            mobility: false,
            priority: 0,
            condition: UsageCondition::Always,
        }
    }
}

impl AbilityDescriptor {
    pub fn offensive(name: &str, binding: &str, cooldown_ms: u64, range: f32) -> Self {
        Self {
            name: name.to_string(),
            binding: binding.to_string(),
            cooldown_ms,
            range,
            offensive: true,
            ..Self::default()
        }
    }

    pub fn defensive(name: &str, binding: &str, cooldown_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            binding: binding.to_string(),
            cooldown_ms,
            defensive: true,
            ..Self::default()
        }
    }

    pub fn mobility(name: &str, binding: &str, cooldown_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            binding: binding.to_string(),
            cooldown_ms,
            mobility: true,
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_mana_cost(mut self, mana_cost: f32) -> Self {
        self.mana_cost = mana_cost;
        self
    }

    pub fn with_condition(mut self, condition: UsageCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    fn has_role(&self, role: AbilityRole) -> bool {
        match role {
            AbilityRole::Offensive => self.offensive,
            AbilityRole::Defensive => self.defensive,
            AbilityRole::Mobility => self.mobility,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbilityRole {
    Offensive,
    Defensive,
    Mobility,
}

pub struct AbilityBook {
    abilities: SlotMap<AbilityId, AbilityDescriptor>,
    // Priority descending, registration order within equal priority.
    order: Vec<AbilityId>,
    last_used: SecondaryMap<AbilityId, Instant>,
}

impl AbilityBook {
    pub fn new(descriptors: impl IntoIterator<Item = AbilityDescriptor>) -> Self {
        let mut abilities = SlotMap::with_key();
        let mut order = Vec::new();
        for descriptor in descriptors {
            order.push(abilities.insert(descriptor));
        }
        order.sort_by(|a, b| abilities[*b].priority.cmp(&abilities[*a].priority));
        Self { abilities, order, last_used: SecondaryMap::new() }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: AbilityId) -> Option<&AbilityDescriptor> {
        self.abilities.get(id)
    }

    pub fn find(&self, name: &str) -> Option<AbilityId> {
        self.order.iter().copied().find(|id| self.abilities[*id].name == name)
    }

    /// Longest range among ranged abilities of `role`.
    pub fn max_range(&self, role: AbilityRole) -> Option<f32> {
        self.abilities
            .values()
            .filter(|ability| ability.has_role(role) && ability.range > 0.0)
            .map(|ability| ability.range)
            .max_by(f32::total_cmp)
    }

    /// Shortest range among ranged abilities of `role` that are off cooldown and affordable.
    pub fn shortest_ready_range(&self, role: AbilityRole, player: &PlayerState, now: Instant) -> Option<f32> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.is_ready(*id, now))
            .map(|id| &self.abilities[id])
            .filter(|ability| {
                ability.has_role(role) && ability.range > 0.0 && player.mana >= ability.mana_cost
            })
            .map(|ability| ability.range)
            .min_by(f32::total_cmp)
    }

    pub fn last_used(&self, id: AbilityId) -> Option<Instant> {
        self.last_used.get(id).copied()
    }

    pub fn remaining_cooldown(&self, id: AbilityId, now: Instant) -> Duration {
        match (self.abilities.get(id), self.last_used.get(id)) {
            (Some(ability), Some(last)) => {
                ability.cooldown().saturating_sub(now.saturating_duration_since(*last))
            }
            _ => Duration::ZERO,
        }
    }

    pub fn is_ready(&self, id: AbilityId, now: Instant) -> bool {
        self.abilities.contains_key(id) && self.remaining_cooldown(id, now).is_zero()
    }

    /// Abilities of `role` usable right now, best first.
    pub fn usable(
        &self,
        role: AbilityRole,
        player: &PlayerState,
        target: Option<&Entity>,
        now: Instant,
    ) -> Vec<AbilityId> {
        self.order
            .iter()
            .copied()
            .filter(|id| {
                let ability = &self.abilities[*id];
                ability.has_role(role)
                    && self.is_ready(*id, now)
                    && player.mana >= ability.mana_cost
                    && in_range(ability, role, player, target)
                    && ability.condition.holds(player, target)
            })
            .collect()
    }

    pub fn record_use(&mut self, id: AbilityId, now: Instant) {
        if self.abilities.contains_key(id) {
            self.last_used.insert(id, now);
        }
    }

    pub fn reset_cooldowns(&mut self) {
        self.last_used.clear();
    }
}

fn in_range(
    ability: &AbilityDescriptor,
    role: AbilityRole,
    player: &PlayerState,
    target: Option<&Entity>,
) -> bool {
    if role != AbilityRole::Offensive || ability.range <= 0.0 {
        return true;
    }
    target.is_some_and(|entity| player.position.distance_2d(entity.position) <= ability.range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorldPos;

    fn player() -> PlayerState {
        PlayerState::new(WorldPos::default())
    }

    #[test]
    fn abilities_are_ordered_by_priority_then_registration() {
        let book = AbilityBook::new([
            AbilityDescriptor::offensive("jab", "F1", 100, 5.0).with_priority(1),
            AbilityDescriptor::offensive("smash", "F2", 100, 5.0).with_priority(4),
            AbilityDescriptor::offensive("kick", "F3", 100, 5.0).with_priority(1),
        ]);
        let target = Entity::monster(1, WorldPos::flat(2.0, 0.0));
        let names: Vec<_> = book
            .usable(AbilityRole::Offensive, &player(), Some(&target), Instant::now())
            .into_iter()
            .map(|id| book.get(id).expect("registered").name.clone())
            .collect();
        assert_eq!(names, vec!["smash", "jab", "kick"]);
    }

    #[test]
    fn ability_is_unavailable_until_cooldown_elapses() {
        let mut book = AbilityBook::new([AbilityDescriptor::offensive("jab", "F1", 1000, 5.0)]);
        let id = book.find("jab").expect("registered");
        let t0 = Instant::now();
        assert!(book.is_ready(id, t0));
        book.record_use(id, t0);
        assert!(!book.is_ready(id, t0 + Duration::from_millis(999)));
        assert_eq!(book.remaining_cooldown(id, t0 + Duration::from_millis(400)), Duration::from_millis(600));
        assert!(book.is_ready(id, t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn shortest_ready_range_skips_cooling_and_unaffordable_abilities() {
        let mut book = AbilityBook::new([
            AbilityDescriptor::offensive("jab", "F1", 1000, 2.0),
            AbilityDescriptor::offensive("bolt", "F2", 1000, 12.0).with_mana_cost(30.0),
            AbilityDescriptor::offensive("spear", "F3", 1000, 6.0),
        ]);
        let t0 = Instant::now();
        let mut caster = player();
        assert_eq!(book.shortest_ready_range(AbilityRole::Offensive, &caster, t0), Some(2.0));

        book.record_use(book.find("jab").expect("registered"), t0);
        assert_eq!(book.shortest_ready_range(AbilityRole::Offensive, &caster, t0), Some(6.0));

        book.record_use(book.find("spear").expect("registered"), t0);
        caster.mana = 10.0;
        assert_eq!(book.shortest_ready_range(AbilityRole::Offensive, &caster, t0), None);
    }

    #[test]
    fn offensive_range_and_mana_gate_usability() {
        let book = AbilityBook::new([
            AbilityDescriptor::offensive("bolt", "F3", 100, 10.0).with_mana_cost(30.0),
            AbilityDescriptor::offensive("nova", "F4", 100, 0.0),
        ]);
        let far = Entity::monster(1, WorldPos::flat(15.0, 0.0));
        let near = Entity::monster(2, WorldPos::flat(5.0, 0.0));
        let now = Instant::now();
        let mut caster = player();

        let far_usable = book.usable(AbilityRole::Offensive, &caster, Some(&far), now);
        assert_eq!(far_usable, vec![book.find("nova").expect("registered")]);

        caster.mana = 10.0;
        let starved = book.usable(AbilityRole::Offensive, &caster, Some(&near), now);
        assert_eq!(starved, vec![book.find("nova").expect("registered")]);
    }

    #[test]
    fn conditions_consult_player_and_target() {
        let mut hurt = player();
        hurt.health = 40.0;
        assert!(UsageCondition::HealthBelow(0.5).holds(&hurt, None));
        assert!(!UsageCondition::HealthBelow(0.5).holds(&player(), None));
        let elite = Entity::monster(1, WorldPos::default()).elite();
        assert!(UsageCondition::TargetIsElite.holds(&hurt, Some(&elite)));
        assert!(!UsageCondition::TargetIsElite.holds(&hurt, None));
    }
}
