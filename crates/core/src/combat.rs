//! Tactical combat state machine.
//! This module exists to pick a target, decide posture (fight, retreat, heal, kite) and fire abilities.
//! It does not own when combat starts; the controller engages it and reads its state.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::CombatConfig;
use crate::error::ActuatorError;
use crate::ports::Actuator;
use crate::snapshot::{Entity, WorldSnapshot};
use crate::types::{CombatState, EntityId, TacticsMode, WorldPos};

mod abilities;
mod targeting;

pub use abilities::{AbilityBook, AbilityDescriptor, AbilityId, AbilityRole, UsageCondition};
pub use targeting::TargetScore;

use targeting::{TargetingParams, rank_targets};

const THRESHOLD_CAP: f32 = 0.95;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CombatStats {
    pub monsters_killed: u64,
    pub bosses_killed: u64,
    pub total_combat_time: Duration,
    total_kill_time: Duration,
}

impl CombatStats {
    pub fn average_kill_time(&self) -> Option<Duration> {
        let kills = u32::try_from(self.monsters_killed).ok().filter(|kills| *kills > 0)?;
        Some(self.total_kill_time / kills)
    }
}

pub struct CombatEngine {
    config: CombatConfig,
    abilities: AbilityBook,
    state: CombatState,
    boss_mode: bool,
    target: Option<EntityId>,
    target_was_boss: bool,
    target_since: Option<Instant>,
    last_selection: Option<Instant>,
    ignored: BTreeSet<EntityId>,
    engaged_at: Option<Instant>,
    stats: CombatStats,
}

impl CombatEngine {
    pub fn new(config: &CombatConfig, abilities: impl IntoIterator<Item = AbilityDescriptor>) -> Self {
        Self {
            config: config.clone(),
            abilities: AbilityBook::new(abilities),
            state: CombatState::Idle,
            boss_mode: false,
            target: None,
            target_was_boss: false,
            target_since: None,
            last_selection: None,
            ignored: BTreeSet::new(),
            engaged_at: None,
            stats: CombatStats::default(),
        }
    }

    pub fn state(&self) -> CombatState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == CombatState::Idle
    }

    pub fn is_boss_engaged(&self) -> bool {
        self.boss_mode && self.state != CombatState::Idle
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Whether `id` was given up on after a timed-out engagement.
    pub fn is_ignored(&self, id: EntityId) -> bool {
        self.ignored.contains(&id)
    }

    /// Forgets timed-out targets; entity ids are only meaningful within one map.
    pub fn clear_ignored(&mut self) {
        self.ignored.clear();
    }

    pub fn tactics(&self) -> TacticsMode {
        self.config.tactics
    }

    pub fn abilities(&self) -> &AbilityBook {
        &self.abilities
    }

    pub fn stats(&self) -> CombatStats {
        self.stats
    }

    /// Retreat and heal thresholds after tactics scaling and the boss bonus.
    pub fn effective_thresholds(&self) -> (f32, f32) {
        let scale = self.config.tactics.threshold_scale();
        let bonus = if self.boss_mode { self.config.boss_threshold_bonus } else { 0.0 };
        let retreat = (self.config.retreat_health * scale + bonus).min(THRESHOLD_CAP);
        let heal = (self.config.heal_health * scale + bonus).min(THRESHOLD_CAP);
        (retreat, heal)
    }

    pub fn start(&mut self, now: Instant) {
        if self.state == CombatState::Idle {
            self.state = CombatState::Engaging;
            self.engaged_at = Some(now);
        }
    }

    pub fn start_boss_fight(&mut self, now: Instant) {
        self.start(now);
        self.boss_mode = true;
        self.state = CombatState::BossFight;
    }

    /// Ends the engagement. Cooldowns and timed-out targets are kept across engagements.
    pub fn stop(&mut self, now: Instant) {
        if let Some(since) = self.engaged_at.take() {
            self.stats.total_combat_time += now.saturating_duration_since(since);
        }
        self.state = CombatState::Idle;
        self.boss_mode = false;
        self.target = None;
        self.target_was_boss = false;
        self.target_since = None;
        self.last_selection = None;
    }

    pub fn tick(
        &mut self,
        snapshot: &WorldSnapshot,
        actuator: &mut impl Actuator,
        now: Instant,
    ) -> Result<CombatState, ActuatorError> {
        if self.state == CombatState::Idle {
            return Ok(self.state);
        }
        self.refresh_target(snapshot, now);

        let health = snapshot.player.health_fraction();
        let (retreat_at, heal_at) = self.effective_thresholds();
        let recovering = self.state == CombatState::Retreating && health < heal_at;
        if health <= retreat_at || recovering {
            if let Some(threat) = self.threat(snapshot) {
                if self.state != CombatState::Retreating {
                    warn!(health, threshold = retreat_at, "health low; retreating");
                }
                self.state = CombatState::Retreating;
                self.try_heal(snapshot, actuator, now)?;
                self.retreat(snapshot, threat, actuator, now)?;
                return Ok(self.state);
            }
            if self.state == CombatState::Retreating {
                debug!(health, "nothing left to flee from; retreat released");
                self.state = self.engaged_state();
            }
        }

        let healed = health <= heal_at && self.try_heal(snapshot, actuator, now)?;

        let Some(target) = self.target.and_then(|id| snapshot.entity(id)) else {
            if healed {
                self.state = CombatState::Healing;
            } else {
                debug!("no target left; combat idle");
                self.stop(now);
            }
            return Ok(self.state);
        };

        let distance = snapshot.distance_to(target);
        if self.config.tactics == TacticsMode::Kiting && distance < self.config.kite_distance {
            self.state = CombatState::Kiting;
            let away = snapshot.player.position.step_away(target.position, self.config.retreat_step);
            self.fire_offensive(snapshot, target, actuator, now)?;
            issue(actuator.move_toward(away))?;
            return Ok(self.state);
        }

        let fired = self.fire_offensive(snapshot, target, actuator, now)?;
        if fired || self.holds_position(snapshot, distance, now) {
            self.state = self.engaged_state();
        } else {
            self.state = CombatState::Engaging;
            issue(actuator.move_toward(target.position))?;
        }
        if healed {
            self.state = CombatState::Healing;
        }
        Ok(self.state)
    }

    fn refresh_target(&mut self, snapshot: &WorldSnapshot, now: Instant) {
        if let Some(id) = self.target {
            let drop_reason = match snapshot.entity(id) {
                None => Some("target lost"),
                Some(entity) if !entity.alive || entity.health <= 0.0 => {
                    self.record_kill(entity, now);
                    Some("target killed")
                }
                Some(entity) if !entity.targetable => Some("target untargetable"),
                Some(entity) if snapshot.distance_to(entity) > self.config.leash_range => {
                    Some("target beyond leash")
                }
                Some(entity)
                    if !self.boss_mode
                        && !entity.is_boss()
                        && self.target_since.is_some_and(|since| {
                            now.saturating_duration_since(since) > self.config.max_engagement()
                        }) =>
                {
                    self.ignored.insert(id);
                    Some("engagement timed out")
                }
                Some(_) => None,
            };
            if let Some(reason) = drop_reason {
                debug!(target = id.0, reason, "dropping target");
                self.target = None;
                self.target_since = None;
            }
        }

        let interval_elapsed = self
            .last_selection
            .is_none_or(|at| now.saturating_duration_since(at) >= self.config.retarget_interval());
        let locked = self.boss_mode && self.target_was_boss && self.target.is_some();
        if self.target.is_some() && (locked || !interval_elapsed) {
            return;
        }

        let params = TargetingParams {
            engagement_range: self.config.engagement_range,
            leash_range: self.config.leash_range,
            tactics: self.config.tactics,
            boss_mode: self.boss_mode,
        };
        let best = rank_targets(snapshot, self.target, &self.ignored, params).first().map(|s| s.id);
        self.last_selection = Some(now);
        if best != self.target {
            if let Some(id) = best {
                debug!(target = id.0, previous = ?self.target.map(|t| t.0), "target selected");
            }
            self.target = best;
            self.target_since = best.map(|_| now);
            self.target_was_boss =
                best.and_then(|id| snapshot.entity(id)).is_some_and(Entity::is_boss);
        }
    }

    fn engaged_state(&self) -> CombatState {
        if self.boss_mode { CombatState::BossFight } else { CombatState::Fighting }
    }

    fn record_kill(&mut self, entity: &Entity, now: Instant) {
        self.stats.monsters_killed += 1;
        if entity.is_boss() {
            self.stats.bosses_killed += 1;
            info!(target = entity.id.0, "boss killed");
            if self.boss_mode {
                debug!("boss down; remaining hostiles are fought normally");
                self.boss_mode = false;
                self.target_was_boss = false;
                if self.state == CombatState::BossFight {
                    self.state = CombatState::Fighting;
                }
            }
        } else {
            debug!(target = entity.id.0, "monster killed");
        }
        if let Some(since) = self.target_since {
            self.stats.total_kill_time += now.saturating_duration_since(since);
        }
    }

    /// Waiting is only worth it when no ready ability would be brought into range by closing in.
    fn holds_position(&self, snapshot: &WorldSnapshot, distance: f32, now: Instant) -> bool {
        let in_reach = self
            .abilities
            .max_range(AbilityRole::Offensive)
            .is_some_and(|range| distance <= range);
        let ready_needs_closer = self
            .abilities
            .shortest_ready_range(AbilityRole::Offensive, &snapshot.player, now)
            .is_some_and(|range| distance > range);
        in_reach && !ready_needs_closer
    }

    /// Fires the best usable offensive ability. Returns whether one was accepted.
    fn fire_offensive(
        &mut self,
        snapshot: &WorldSnapshot,
        target: &Entity,
        actuator: &mut impl Actuator,
        now: Instant,
    ) -> Result<bool, ActuatorError> {
        let candidates =
            self.abilities.usable(AbilityRole::Offensive, &snapshot.player, Some(target), now);
        self.fire_first(candidates, Some(target.position), actuator, now)
    }

    /// Uses a defensive ability if one is usable. Returns whether one was accepted.
    fn try_heal(
        &mut self,
        snapshot: &WorldSnapshot,
        actuator: &mut impl Actuator,
        now: Instant,
    ) -> Result<bool, ActuatorError> {
        let target = self.target.and_then(|id| snapshot.entity(id));
        let candidates = self.abilities.usable(AbilityRole::Defensive, &snapshot.player, target, now);
        self.fire_first(candidates, None, actuator, now)
    }

    /// What to back away from: the live target, else the nearest hostile in engagement range.
    fn threat(&self, snapshot: &WorldSnapshot) -> Option<WorldPos> {
        self.target
            .and_then(|id| snapshot.entity(id))
            .filter(|entity| entity.is_valid_target())
            .or_else(|| snapshot.nearest_hostile(self.config.engagement_range, false))
            .map(|entity| entity.position)
    }

    fn retreat(
        &mut self,
        snapshot: &WorldSnapshot,
        threat: WorldPos,
        actuator: &mut impl Actuator,
        now: Instant,
    ) -> Result<(), ActuatorError> {
        let away = snapshot.player.position.step_away(threat, self.config.retreat_step);
        let mobility = self.abilities.usable(AbilityRole::Mobility, &snapshot.player, None, now);
        self.fire_first(mobility, Some(away), actuator, now)?;
        issue(actuator.move_toward(away))
    }

    fn fire_first(
        &mut self,
        candidates: Vec<AbilityId>,
        aim: Option<WorldPos>,
        actuator: &mut impl Actuator,
        now: Instant,
    ) -> Result<bool, ActuatorError> {
        for id in candidates {
            let Some(ability) = self.abilities.get(id) else {
                continue;
            };
            let aim = if ability.range > 0.0 || ability.mobility { aim } else { None };
            match actuator.use_ability(&ability.binding, aim) {
                Ok(()) => {
                    debug!(ability = %ability.name, "ability used");
                    self.abilities.record_use(id, now);
                    return Ok(true);
                }
                Err(err) if err.is_link_loss() => return Err(err),
                Err(err) => {
                    debug!(ability = %ability.name, %err, "ability not accepted; trying next");
                }
            }
        }
        Ok(false)
    }
}

/// Non-fatal actuator refusals are dropped; link loss propagates.
fn issue(result: Result<(), ActuatorError>) -> Result<(), ActuatorError> {
    match result {
        Err(err) if err.is_link_loss() => Err(err),
        Err(err) => {
            debug!(%err, "command skipped this tick");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

#[cfg(test)]
mod tests;
