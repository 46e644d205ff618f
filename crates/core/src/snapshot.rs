//! Per-tick world observation handed to the decision core.
//! This module exists so every subsystem reads the same immutable view of one tick.
//! It does not own how observations are gathered or refreshed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{EntityId, WorldPos};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub position: WorldPos,
    pub heading: f32,
    pub health: f32,
    pub max_health: f32,
    pub mana: f32,
    pub max_mana: f32,
    pub level: u32,
    pub alive: bool,
    pub in_combat: bool,
}

impl PlayerState {
    /// Full-health, full-mana level 1 player.
    pub fn new(position: WorldPos) -> Self {
        Self {
            position,
            heading: 0.0,
            health: 100.0,
            max_health: 100.0,
            mana: 100.0,
            max_mana: 100.0,
            level: 1,
            alive: true,
            in_combat: false,
        }
    }

    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 { 0.0 } else { (self.health / self.max_health).clamp(0.0, 1.0) }
    }

    pub fn mana_fraction(&self) -> f32 {
        if self.max_mana <= 0.0 { 0.0 } else { (self.mana / self.max_mana).clamp(0.0, 1.0) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Monster,
    Boss,
    Npc,
    Item,
    Chest,
    Portal,
    Waypoint,
    SeasonalObject,
    Unknown,
}

impl EntityKind {
    pub fn is_hostile(self) -> bool {
        matches!(self, EntityKind::Monster | EntityKind::Boss)
    }

    /// Kinds whose footprint is projected onto the exploration grid as an obstacle.
    pub fn blocks_movement(self) -> bool {
        matches!(self, EntityKind::Npc | EntityKind::Unknown)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemRarity {
    Normal,
    Magic,
    Rare,
    Legendary,
    Unique,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Weapon,
    Armor,
    Accessory,
    Currency,
    Material,
    Seasonal,
    Other,
}

/// Kind-specific entity data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum EntityPayload {
    #[default]
    None,
    Monster {
        elite: bool,
        attack_range: f32,
        speed: f32,
    },
    Item {
        rarity: ItemRarity,
        category: ItemCategory,
    },
    Seasonal {
        event: String,
        interactable: bool,
        interaction_range: f32,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: WorldPos,
    pub health: f32,
    pub max_health: f32,
    pub alive: bool,
    pub targetable: bool,
    pub level: u32,
    /// Time since the provider last observed this entity.
    pub age: Duration,
    pub payload: EntityPayload,
}

impl Entity {
    pub fn new(id: u64, kind: EntityKind, position: WorldPos) -> Self {
        Self {
            id: EntityId(id),
            kind,
            position,
            health: 1.0,
            max_health: 1.0,
            alive: true,
            targetable: false,
            level: 1,
            age: Duration::ZERO,
            payload: EntityPayload::None,
        }
    }

    pub fn monster(id: u64, position: WorldPos) -> Self {
        Self {
            health: 100.0,
            max_health: 100.0,
            targetable: true,
            payload: EntityPayload::Monster { elite: false, attack_range: 2.0, speed: 4.0 },
            ..Self::new(id, EntityKind::Monster, position)
        }
    }

    pub fn boss(id: u64, position: WorldPos) -> Self {
        Self {
            health: 1000.0,
            max_health: 1000.0,
            targetable: true,
            payload: EntityPayload::Monster { elite: false, attack_range: 4.0, speed: 3.0 },
            ..Self::new(id, EntityKind::Boss, position)
        }
    }

    pub fn item(id: u64, position: WorldPos, rarity: ItemRarity) -> Self {
        Self {
            payload: EntityPayload::Item { rarity, category: ItemCategory::Other },
            ..Self::new(id, EntityKind::Item, position)
        }
    }

    pub fn seasonal(id: u64, position: WorldPos, event: &str) -> Self {
        Self {
            payload: EntityPayload::Seasonal {
                event: event.to_string(),
                interactable: true,
                interaction_range: 3.0,
            },
            ..Self::new(id, EntityKind::SeasonalObject, position)
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_health(mut self, health: f32, max_health: f32) -> Self {
        self.health = health;
        self.max_health = max_health;
        self
    }

    pub fn with_age(mut self, age: Duration) -> Self {
        self.age = age;
        self
    }

    pub fn with_category(mut self, new_category: ItemCategory) -> Self {
        if let EntityPayload::Item { category, .. } = &mut self.payload {
            *category = new_category;
        }
        self
    }

    pub fn elite(mut self) -> Self {
        if let EntityPayload::Monster { elite, .. } = &mut self.payload {
            *elite = true;
        }
        self
    }

    pub fn dead(mut self) -> Self {
        self.health = 0.0;
        self.alive = false;
        self
    }

    pub fn is_elite(&self) -> bool {
        matches!(self.payload, EntityPayload::Monster { elite: true, .. })
    }

    pub fn is_boss(&self) -> bool {
        self.kind == EntityKind::Boss
    }

    /// Alive, targetable hostile.
    pub fn is_valid_target(&self) -> bool {
        self.kind.is_hostile() && self.alive && self.targetable && self.health > 0.0
    }

    pub fn is_lootable(&self) -> bool {
        self.kind == EntityKind::Item && self.alive
    }

    pub fn is_interactable_seasonal(&self) -> bool {
        self.kind == EntityKind::SeasonalObject
            && matches!(self.payload, EntityPayload::Seasonal { interactable: true, .. })
    }

    pub fn rarity(&self) -> Option<ItemRarity> {
        match self.payload {
            EntityPayload::Item { rarity, .. } => Some(rarity),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<ItemCategory> {
        match self.payload {
            EntityPayload::Item { category, .. } => Some(category),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapStatus {
    pub name: String,
    pub tier: u32,
    pub completed: bool,
    pub has_boss: bool,
    pub boss_defeated: bool,
}

impl MapStatus {
    pub fn named(name: &str) -> Self {
        Self { name: name.to_string(), ..Self::default() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonStatus {
    pub active: bool,
    pub kind: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub player: PlayerState,
    pub entities: Vec<Entity>,
    pub map: MapStatus,
    pub season: SeasonStatus,
}

impl WorldSnapshot {
    pub fn new(player: PlayerState) -> Self {
        Self {
            player,
            entities: Vec::new(),
            map: MapStatus::named("default"),
            season: SeasonStatus::default(),
        }
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn with_map(mut self, map: MapStatus) -> Self {
        self.map = map;
        self
    }

    pub fn with_season(mut self, kind: &str) -> Self {
        self.season = SeasonStatus { active: true, kind: Some(kind.to_string()) };
        self
    }

    /// Drops entities not observed within `window`.
    pub fn retain_observed(&mut self, window: Duration) {
        self.entities.retain(|entity| entity.age <= window);
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn distance_to(&self, entity: &Entity) -> f32 {
        self.player.position.distance_2d(entity.position)
    }

    pub fn hostiles_within(&self, range: f32) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(move |entity| entity.is_valid_target() && self.distance_to(entity) <= range)
    }

    /// Nearest valid hostile within `range`; ties go to the lower id.
    pub fn nearest_hostile(&self, range: f32, bosses_and_elites_only: bool) -> Option<&Entity> {
        self.nearest_hostile_matching(range, |entity| {
            !bosses_and_elites_only || entity.is_boss() || entity.is_elite()
        })
    }

    /// Nearest hostile within `range` accepted by `keep`; ties go to the lower id.
    pub fn nearest_hostile_matching(
        &self,
        range: f32,
        keep: impl Fn(&Entity) -> bool,
    ) -> Option<&Entity> {
        self.hostiles_within(range)
            .filter(|entity| keep(entity))
            .min_by(|a, b| {
                self.distance_to(a).total_cmp(&self.distance_to(b)).then(a.id.cmp(&b.id))
            })
    }

    pub fn lootables_within(&self, range: f32) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(move |entity| entity.is_lootable() && self.distance_to(entity) <= range)
    }

    /// Interactable seasonal objects; empty while no seasonal event is active.
    pub fn seasonal_objects(&self) -> impl Iterator<Item = &Entity> {
        let active = self.season.active;
        self.entities.iter().filter(move |entity| active && entity.is_interactable_seasonal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_entities_are_dropped() {
        let mut snapshot = WorldSnapshot::new(PlayerState::new(WorldPos::default()))
            .with_entity(Entity::monster(1, WorldPos::flat(5.0, 0.0)))
            .with_entity(
                Entity::monster(2, WorldPos::flat(6.0, 0.0)).with_age(Duration::from_secs(5)),
            );
        snapshot.retain_observed(Duration::from_secs(2));
        let ids: Vec<_> = snapshot.entities.iter().map(|entity| entity.id).collect();
        assert_eq!(ids, vec![EntityId(1)]);
    }

    #[test]
    fn nearest_hostile_skips_dead_and_untargetable() {
        let mut ghost = Entity::monster(3, WorldPos::flat(1.0, 0.0));
        ghost.targetable = false;
        let snapshot = WorldSnapshot::new(PlayerState::new(WorldPos::default()))
            .with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0)).dead())
            .with_entity(ghost)
            .with_entity(Entity::monster(2, WorldPos::flat(8.0, 0.0)));
        let nearest = snapshot.nearest_hostile(25.0, false).expect("live hostile in range");
        assert_eq!(nearest.id, EntityId(2));
        assert!(snapshot.nearest_hostile(25.0, true).is_none(), "no boss or elite present");
    }

    #[test]
    fn seasonal_objects_require_an_active_season() {
        let base = WorldSnapshot::new(PlayerState::new(WorldPos::default()))
            .with_entity(Entity::seasonal(7, WorldPos::flat(4.0, 4.0), "harvest"));
        assert_eq!(base.seasonal_objects().count(), 0);
        let active = base.with_season("harvest");
        assert_eq!(active.seasonal_objects().count(), 1);
    }

    #[test]
    fn health_fraction_is_clamped() {
        let mut player = PlayerState::new(WorldPos::default());
        player.health = 150.0;
        assert_eq!(player.health_fraction(), 1.0);
        player.max_health = 0.0;
        assert_eq!(player.health_fraction(), 0.0);
    }
}
