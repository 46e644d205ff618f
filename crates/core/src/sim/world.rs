//! Small seeded world that reacts to actuator commands.
//! This module exists so the whole agent can be exercised end to end without a game process.
//! It does not model the real game's rules beyond what the decision core observes.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use rand_chacha::{
    ChaCha8Rng,
    rand_core::{Rng, SeedableRng},
};

use super::*;
use crate::combat::AbilityDescriptor;
use crate::snapshot::{EntityKind, ItemRarity, MapStatus, PlayerState, SeasonStatus};

const AGGRO_RANGE: f32 = 15.0;
const MONSTER_DPS: f32 = 6.0;
const BOSS_DPS: f32 = 15.0;
const ABILITY_DAMAGE: f32 = 35.0;
const HIT_RADIUS: f32 = 2.5;
const HEAL_FRACTION: f32 = 0.35;
const DASH_DISTANCE: f32 = 6.0;
const PICKUP_REACH: f32 = 12.0;
const CORPSE_TICKS: u32 = 5;
const RESPAWN_TICKS: u32 = 40;
const NEXT_MAP_TICKS: u32 = 60;
const SPAWN_CLEARANCE: f32 = 6.0;

#[derive(Clone, Debug)]
pub struct SimSettings {
    pub seed: u64,
    pub tick: Duration,
    pub monsters: usize,
    pub items: usize,
    pub walls: usize,
    pub boss: bool,
    pub season: bool,
    /// World units per second.
    pub player_speed: f32,
    pub half_extent: f32,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            tick: Duration::from_millis(50),
            monsters: 6,
            items: 5,
            walls: 4,
            boss: true,
            season: false,
            player_speed: 8.0,
            half_extent: 40.0,
        }
    }
}

/// Counters describing what happened inside the world, independent of what the agent believes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimCounters {
    pub steps: u64,
    pub kills: u64,
    pub pickups: u64,
    pub interactions: u64,
    pub deaths: u64,
    pub maps_completed: u64,
}

struct WorldState {
    rng: ChaCha8Rng,
    settings: SimSettings,
    abilities: Vec<AbilityDescriptor>,
    player: PlayerState,
    spawn: WorldPos,
    entities: Vec<Entity>,
    corpses: BTreeMap<EntityId, u32>,
    walls: BTreeSet<(i32, i32)>,
    move_target: Option<WorldPos>,
    map: MapStatus,
    season: SeasonStatus,
    map_index: u32,
    next_id: u64,
    linked: bool,
    respawn_in: Option<u32>,
    completed_for: u32,
    counters: SimCounters,
}

/// Shared handle over one simulated world. Provider and actuator handles
/// observe and mutate the same state.
#[derive(Clone)]
pub struct SimWorld {
    state: Rc<RefCell<WorldState>>,
}

impl SimWorld {
    pub fn new(settings: SimSettings, abilities: Vec<AbilityDescriptor>) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(settings.seed);
        let spawn = WorldPos::flat(0.0, 0.0);
        let mut state = WorldState {
            rng,
            player: PlayerState::new(spawn),
            spawn,
            entities: Vec::new(),
            corpses: BTreeMap::new(),
            walls: BTreeSet::new(),
            move_target: None,
            map: MapStatus::default(),
            season: SeasonStatus::default(),
            map_index: 0,
            next_id: 1,
            linked: true,
            respawn_in: None,
            completed_for: 0,
            counters: SimCounters::default(),
            settings,
            abilities,
        };
        state.generate_map();
        Self { state: Rc::new(RefCell::new(state)) }
    }

    pub fn provider(&self) -> SimProvider {
        SimProvider { state: Rc::clone(&self.state) }
    }

    pub fn actuator(&self) -> SimActuator {
        SimActuator { state: Rc::clone(&self.state) }
    }

    pub fn set_linked(&self, linked: bool) {
        self.state.borrow_mut().linked = linked;
    }

    /// Drops the player to zero health; they respawn after a short delay.
    pub fn kill_player(&self) {
        let mut state = self.state.borrow_mut();
        state.player.health = 0.0;
    }

    pub fn add_wall(&self, x: i32, y: i32) {
        self.state.borrow_mut().walls.insert((x, y));
    }

    pub fn player(&self) -> PlayerState {
        self.state.borrow().player.clone()
    }

    pub fn map_name(&self) -> String {
        self.state.borrow().map.name.clone()
    }

    pub fn counters(&self) -> SimCounters {
        self.state.borrow().counters
    }

    pub fn living_hostiles(&self) -> usize {
        self.state.borrow().entities.iter().filter(|entity| entity.is_valid_target()).count()
    }
}

pub struct SimProvider {
    state: Rc<RefCell<WorldState>>,
}

pub struct SimActuator {
    state: Rc<RefCell<WorldState>>,
}

impl WorldProvider for SimProvider {
    fn is_linked(&self) -> bool {
        self.state.borrow().linked
    }

    fn reacquire(&mut self) -> bool {
        let mut state = self.state.borrow_mut();
        state.linked = true;
        true
    }

    /// Each read advances the world by one tick.
    fn snapshot(&mut self) -> Result<WorldSnapshot, ProviderError> {
        let mut state = self.state.borrow_mut();
        if !state.linked {
            return Err(ProviderError::LinkLost("simulated process detached".to_string()));
        }
        state.step();
        Ok(state.snapshot())
    }
}

impl Actuator for SimActuator {
    fn is_linked(&self) -> bool {
        self.state.borrow().linked
    }

    fn reacquire(&mut self) -> bool {
        let mut state = self.state.borrow_mut();
        state.linked = true;
        true
    }

    fn move_toward(&mut self, target: WorldPos) -> Result<(), ActuatorError> {
        let mut state = self.state.borrow_mut();
        state.ensure_ready()?;
        state.move_target = Some(target);
        Ok(())
    }

    fn use_ability(&mut self, binding: &str, target: Option<WorldPos>) -> Result<(), ActuatorError> {
        let mut state = self.state.borrow_mut();
        state.ensure_ready()?;
        state.use_ability(binding, target)
    }

    fn pickup_item_at(&mut self, position: WorldPos) -> Result<(), ActuatorError> {
        let mut state = self.state.borrow_mut();
        state.ensure_ready()?;
        state.pickup(position)
    }

    fn interact_at(&mut self, position: WorldPos) -> Result<(), ActuatorError> {
        let mut state = self.state.borrow_mut();
        state.ensure_ready()?;
        state.interact(position)
    }
}

impl WorldState {
    fn dt(&self) -> f32 {
        self.settings.tick.as_secs_f32()
    }

    fn unit(&mut self) -> f32 {
        (self.rng.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    fn below(&mut self, n: usize) -> usize {
        (self.rng.next_u64() % n.max(1) as u64) as usize
    }

    fn ensure_ready(&self) -> Result<(), ActuatorError> {
        if !self.linked {
            return Err(ActuatorError::LinkLost("simulated process detached".to_string()));
        }
        if !self.player.alive {
            return Err(ActuatorError::NotReady);
        }
        Ok(())
    }

    fn is_wall(&self, pos: WorldPos) -> bool {
        self.walls.contains(&(pos.x.floor() as i32, pos.y.floor() as i32))
            || pos.x.abs() > self.settings.half_extent
            || pos.y.abs() > self.settings.half_extent
    }

    fn random_open_position(&mut self) -> WorldPos {
        let extent = self.settings.half_extent - 2.0;
        let mut candidate = self.spawn;
        for _ in 0..64 {
            let x = (self.unit() * 2.0 - 1.0) * extent;
            let y = (self.unit() * 2.0 - 1.0) * extent;
            candidate = WorldPos::flat(x, y);
            if !self.is_wall(candidate) && candidate.distance_2d(self.spawn) >= SPAWN_CLEARANCE {
                break;
            }
        }
        candidate
    }

    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn generate_map(&mut self) {
        self.map_index += 1;
        self.map = MapStatus {
            name: format!("sim-{}-{}", self.settings.seed, self.map_index),
            tier: self.map_index,
            completed: false,
            has_boss: self.settings.boss,
            boss_defeated: false,
        };
        self.season = if self.settings.season {
            SeasonStatus { active: true, kind: Some("harvest".to_string()) }
        } else {
            SeasonStatus::default()
        };
        self.entities.clear();
        self.corpses.clear();
        self.walls.clear();
        self.player.position = self.spawn;
        self.move_target = None;
        self.completed_for = 0;

        for _ in 0..self.settings.walls {
            let start = self.random_open_position();
            let horizontal = self.below(2) == 0;
            let len = 4 + self.below(7) as i32;
            for i in 0..len {
                let (x, y) = if horizontal {
                    (start.x.floor() as i32 + i, start.y.floor() as i32)
                } else {
                    (start.x.floor() as i32, start.y.floor() as i32 + i)
                };
                let cell_center = WorldPos::flat(x as f32 + 0.5, y as f32 + 0.5);
                if cell_center.distance_2d(self.spawn) > SPAWN_CLEARANCE {
                    self.walls.insert((x, y));
                }
            }
        }
        for _ in 0..self.settings.monsters {
            let id = self.take_id();
            let pos = self.random_open_position();
            let level = 1 + self.below(4) as u32;
            let mut monster = Entity::monster(id, pos).with_level(level);
            if self.below(5) == 0 {
                monster = monster.elite().with_health(180.0, 180.0);
            }
            self.entities.push(monster);
        }
        if self.settings.boss {
            let id = self.take_id();
            let pos = self.random_open_position();
            self.entities.push(Entity::boss(id, pos).with_health(400.0, 400.0).with_level(5));
        }
        const RARITIES: [ItemRarity; 5] = [
            ItemRarity::Normal,
            ItemRarity::Magic,
            ItemRarity::Rare,
            ItemRarity::Legendary,
            ItemRarity::Unique,
        ];
        for _ in 0..self.settings.items {
            let id = self.take_id();
            let pos = self.random_open_position();
            let rarity = RARITIES[self.below(RARITIES.len())];
            self.entities.push(Entity::item(id, pos, rarity));
        }
        if self.settings.season {
            for _ in 0..2 {
                let id = self.take_id();
                let pos = self.random_open_position();
                self.entities.push(Entity::seasonal(id, pos, "harvest"));
            }
        }
    }

    fn step(&mut self) {
        self.counters.steps += 1;
        let dt = self.dt();

        if let Some(remaining) = self.respawn_in {
            if remaining == 0 {
                self.respawn_in = None;
                self.player = PlayerState::new(self.spawn);
            } else {
                self.respawn_in = Some(remaining - 1);
            }
            return;
        }

        if let Some(target) = self.move_target.take() {
            let next = self.player.position.step_toward(target, self.settings.player_speed * dt);
            if !self.is_wall(next) {
                self.player.position = next;
            }
        }

        let player_pos = self.player.position;
        let mut incoming = 0.0;
        for entity in &mut self.entities {
            if !entity.is_valid_target() {
                continue;
            }
            let EntityPayload::Monster { attack_range, speed, .. } = entity.payload else {
                continue;
            };
            let dist = entity.position.distance_2d(player_pos);
            if dist > AGGRO_RANGE {
                continue;
            }
            if dist > attack_range {
                entity.position = entity.position.step_toward(player_pos, speed * dt);
            } else {
                let dps = if entity.kind == EntityKind::Boss { BOSS_DPS } else { MONSTER_DPS };
                incoming += dps * dt;
            }
        }
        self.player.in_combat = incoming > 0.0;
        self.player.health -= incoming;
        if self.player.health <= 0.0 {
            self.player.health = 0.0;
            self.player.alive = false;
            self.counters.deaths += 1;
            self.respawn_in = Some(RESPAWN_TICKS);
        } else {
            self.player.mana = (self.player.mana + 5.0 * dt).min(self.player.max_mana);
            if !self.player.in_combat {
                self.player.health = (self.player.health + 4.0 * dt).min(self.player.max_health);
            }
        }

        let mut expired = Vec::new();
        for (id, ticks) in &mut self.corpses {
            *ticks = ticks.saturating_sub(1);
            if *ticks == 0 {
                expired.push(*id);
            }
        }
        for id in expired {
            self.corpses.remove(&id);
            self.entities.retain(|entity| entity.id != id);
        }

        let hostiles_left = self.entities.iter().any(Entity::is_valid_target);
        if !hostiles_left && !self.map.completed {
            self.map.completed = true;
            self.map.boss_defeated = self.map.has_boss;
            self.counters.maps_completed += 1;
        }
        if self.map.completed {
            self.completed_for += 1;
            if self.completed_for >= NEXT_MAP_TICKS {
                self.generate_map();
            }
        }
    }

    fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            player: self.player.clone(),
            entities: self.entities.clone(),
            map: self.map.clone(),
            season: self.season.clone(),
        }
    }

    fn use_ability(&mut self, binding: &str, target: Option<WorldPos>) -> Result<(), ActuatorError> {
        let Some(ability) = self.abilities.iter().find(|ability| ability.binding == binding).cloned()
        else {
            return Err(ActuatorError::Rejected(format!("unbound key {binding}")));
        };
        if self.player.mana < ability.mana_cost {
            return Err(ActuatorError::Rejected(format!("{} needs mana", ability.name)));
        }
        self.player.mana -= ability.mana_cost;
        let player_pos = self.player.position;

        if ability.offensive {
            let aim = target.unwrap_or(player_pos);
            let reach = if ability.range > 0.0 { ability.range + 1.0 } else { 4.0 };
            let victim = self
                .entities
                .iter_mut()
                .filter(|entity| entity.is_valid_target())
                .filter(|entity| entity.position.distance_2d(player_pos) <= reach)
                .filter(|entity| entity.position.distance_2d(aim) <= HIT_RADIUS)
                .min_by(|a, b| a.position.distance_2d(aim).total_cmp(&b.position.distance_2d(aim)));
            if let Some(victim) = victim {
                victim.health -= ABILITY_DAMAGE;
                if victim.health <= 0.0 {
                    victim.health = 0.0;
                    victim.alive = false;
                    let id = victim.id;
                    self.corpses.insert(id, CORPSE_TICKS);
                    self.counters.kills += 1;
                }
            }
        }
        if ability.defensive {
            let heal = self.player.max_health * HEAL_FRACTION;
            self.player.health = (self.player.health + heal).min(self.player.max_health);
        }
        if ability.mobility
            && let Some(target) = target
        {
            let dest = player_pos.step_toward(target, DASH_DISTANCE);
            if !self.is_wall(dest) {
                self.player.position = dest;
            }
        }
        Ok(())
    }

    fn pickup(&mut self, position: WorldPos) -> Result<(), ActuatorError> {
        let player_pos = self.player.position;
        let Some(idx) = self.entities.iter().position(|entity| {
            entity.is_lootable()
                && entity.position.distance_2d(position) <= 1.0
                && entity.position.distance_2d(player_pos) <= PICKUP_REACH
        }) else {
            return Err(ActuatorError::Rejected("nothing to pick up there".to_string()));
        };
        self.entities.remove(idx);
        self.counters.pickups += 1;
        Ok(())
    }

    fn interact(&mut self, position: WorldPos) -> Result<(), ActuatorError> {
        let player_pos = self.player.position;
        let object = self.entities.iter_mut().find(|entity| {
            entity.is_interactable_seasonal() && entity.position.distance_2d(position) <= 1.0
        });
        let Some(object) = object else {
            return Err(ActuatorError::Rejected("nothing to interact with".to_string()));
        };
        let EntityPayload::Seasonal { interactable, interaction_range, .. } = &mut object.payload
        else {
            return Err(ActuatorError::Rejected("not a seasonal object".to_string()));
        };
        if object.position.distance_2d(player_pos) > *interaction_range + 2.0 {
            return Err(ActuatorError::Rejected("too far to interact".to_string()));
        }
        *interactable = false;
        self.counters.interactions += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_abilities;

    fn quiet_world(seed: u64) -> SimWorld {
        SimWorld::new(
            SimSettings { seed, monsters: 0, items: 0, walls: 0, boss: false, ..SimSettings::default() },
            default_abilities(),
        )
    }

    #[test]
    fn same_seed_generates_the_same_world() {
        let a = SimWorld::new(SimSettings::default(), default_abilities());
        let b = SimWorld::new(SimSettings::default(), default_abilities());
        let snap_a = a.provider().snapshot().expect("linked");
        let snap_b = b.provider().snapshot().expect("linked");
        assert_eq!(snap_a, snap_b);
    }

    #[test]
    fn movement_is_capped_by_speed_and_blocked_by_walls() {
        let world = quiet_world(1);
        let mut provider = world.provider();
        let mut actuator = world.actuator();
        actuator.move_toward(WorldPos::flat(10.0, 0.0)).expect("linked");
        let snap = provider.snapshot().expect("linked");
        assert!((snap.player.position.x - 0.4).abs() < 1e-4, "8 units/s for 50 ms");

        world.add_wall(0, 0);
        actuator.move_toward(WorldPos::flat(10.0, 0.0)).expect("linked");
        let blocked = provider.snapshot().expect("linked");
        assert_eq!(blocked.player.position, snap.player.position);
    }

    #[test]
    fn detached_world_reports_link_loss_until_reacquired() {
        let world = quiet_world(2);
        let mut provider = world.provider();
        world.set_linked(false);
        assert!(matches!(provider.snapshot(), Err(ProviderError::LinkLost(_))));
        assert!(provider.reacquire());
        assert!(provider.snapshot().is_ok());
    }

    #[test]
    fn dead_player_respawns_at_spawn() {
        let world = quiet_world(3);
        let mut provider = world.provider();
        world.kill_player();
        let snap = provider.snapshot().expect("linked");
        assert!(!snap.player.alive);
        let mut revived = snap;
        for _ in 0..=RESPAWN_TICKS {
            revived = provider.snapshot().expect("linked");
        }
        assert!(revived.player.alive);
        assert_eq!(revived.player.health_fraction(), 1.0);
        assert_eq!(world.counters().deaths, 1);
    }
}
