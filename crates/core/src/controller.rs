//! Top-level control loop state machine.
//! This module exists to arbitrate, once per tick, between fighting, looting, moving and recovering.
//! It does not own pacing; the runner decides when `tick` is called.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::combat::CombatEngine;
use crate::config::BotConfig;
use crate::error::{ConfigError, ProviderError};
use crate::navigation::NavigationEngine;
use crate::ports::{Actuator, LootSelector, WorldProvider};
use crate::snapshot::{Entity, WorldSnapshot};
use crate::types::{BotState, EntityId, Statistics, StatusSnapshot, TacticsMode, WorldPos};

mod activities;
mod transitions;

/// Which engine, if any, was ticked this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Delegation {
    #[default]
    None,
    Combat,
    Navigation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub state: BotState,
    pub delegated: Delegation,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct SeasonalGoal {
    id: EntityId,
    position: WorldPos,
}

/// Per-map bookkeeping, reset whenever the map name changes.
#[derive(Clone, Debug, Default)]
struct MapProgress {
    name: Option<String>,
    completed: bool,
    attempted_loot: BTreeSet<EntityId>,
    handled_seasonal: BTreeSet<EntityId>,
}

pub struct BotController<P, A, L> {
    config: BotConfig,
    provider: P,
    actuator: A,
    loot: L,
    state: BotState,
    running: bool,
    combat: CombatEngine,
    navigation: NavigationEngine,
    tick_count: u64,
    items_looted: u64,
    maps_cleared: u64,
    deaths: u64,
    runtime: Duration,
    last_tick_at: Option<Instant>,
    retry_at: Option<Instant>,
    player_alive: bool,
    map: MapProgress,
    seasonal_goal: Option<SeasonalGoal>,
    loot_done: bool,
}

impl<P: WorldProvider, A: Actuator, L: LootSelector> BotController<P, A, L> {
    /// Builds a controller in `Idle`. The configuration is validated first.
    pub fn new(config: BotConfig, provider: P, actuator: A, loot: L) -> Result<Self, ConfigError> {
        config.check()?;
        Ok(Self {
            combat: CombatEngine::new(&config.combat, config.abilities.clone()),
            navigation: NavigationEngine::new(&config.navigation),
            config,
            provider,
            actuator,
            loot,
            state: BotState::Idle,
            running: false,
            tick_count: 0,
            items_looted: 0,
            maps_cleared: 0,
            deaths: 0,
            runtime: Duration::ZERO,
            last_tick_at: None,
            retry_at: None,
            player_alive: true,
            map: MapProgress::default(),
            seasonal_goal: None,
            loot_done: false,
        })
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn combat(&self) -> &CombatEngine {
        &self.combat
    }

    pub fn navigation(&self) -> &NavigationEngine {
        &self.navigation
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        info!("agent started");
        self.running = true;
        self.retry_at = None;
        self.last_tick_at = None;
        self.set_state(BotState::Farming);
    }

    /// Suspends decision making; the run and its statistics stay alive.
    pub fn pause(&mut self) {
        if !self.running || self.state == BotState::Idle {
            return;
        }
        info!("agent paused");
        let now = self.last_tick_at.unwrap_or_else(Instant::now);
        self.combat.stop(now);
        self.last_tick_at = None;
        self.set_state(BotState::Idle);
    }

    pub fn resume(&mut self) {
        if self.running && self.state == BotState::Idle {
            info!("agent resumed");
            self.set_state(BotState::Farming);
        }
    }

    /// Ends the run. Both engines are reset; counters are kept for reporting.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        info!("agent stopped");
        let now = self.last_tick_at.unwrap_or_else(Instant::now);
        self.combat.stop(now);
        self.combat.clear_ignored();
        self.navigation = NavigationEngine::new(&self.config.navigation);
        self.map = MapProgress::default();
        self.seasonal_goal = None;
        self.running = false;
        self.retry_at = None;
        self.last_tick_at = None;
        self.set_state(BotState::Idle);
    }

    pub fn tick(&mut self, now: Instant) -> TickReport {
        if !self.running || self.state == BotState::Idle {
            return self.report(Delegation::None);
        }
        self.tick_count += 1;
        if let Some(prev) = self.last_tick_at {
            self.runtime += now.saturating_duration_since(prev);
        }
        self.last_tick_at = Some(now);

        if self.state == BotState::Error && !self.try_recover(now) {
            return self.report(Delegation::None);
        }

        if !self.provider.is_linked() || !self.actuator.is_linked() {
            self.fail(now, "link not established");
            return self.report(Delegation::None);
        }

        let mut snapshot = match self.provider.snapshot() {
            Ok(snapshot) => snapshot,
            Err(ProviderError::Transient(reason)) => {
                debug!(%reason, "snapshot unavailable; skipping tick");
                return self.report(Delegation::None);
            }
            Err(err @ ProviderError::LinkLost(_)) => {
                self.fail(now, &err.to_string());
                return self.report(Delegation::None);
            }
        };
        snapshot.retain_observed(self.config.entity_staleness());
        self.observe(&snapshot);

        if !snapshot.player.alive {
            self.wait_for_respawn(now);
            return self.report(Delegation::None);
        }
        if !self.player_alive {
            info!("player alive again");
            self.player_alive = true;
        }

        if let Some(next) = self.next_state(&snapshot) {
            self.enter(next, now);
        }

        match self.act(&snapshot, now) {
            Ok(delegated) => self.report(delegated),
            Err(err) => {
                self.fail(now, &err.to_string());
                self.report(Delegation::None)
            }
        }
    }

    pub fn statistics(&self) -> Statistics {
        let combat = self.combat.stats();
        Statistics {
            monsters_killed: combat.monsters_killed,
            bosses_killed: combat.bosses_killed,
            items_looted: self.items_looted,
            maps_cleared: self.maps_cleared,
            deaths: self.deaths,
            runtime_ms: u64::try_from(self.runtime.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            tick: self.tick_count,
            bot_state: self.state,
            combat_state: self.combat.state(),
            navigation_state: self.navigation.state(),
            tactics: self.combat.tactics(),
            exploration_progress: self.navigation.exploration_progress(),
            statistics: self.statistics(),
        }
    }

    fn report(&self, delegated: Delegation) -> TickReport {
        TickReport { tick: self.tick_count, state: self.state, delegated }
    }

    fn set_state(&mut self, next: BotState) {
        if self.state != next {
            debug!(from = self.state.as_str(), to = next.as_str(), "state changed");
            self.state = next;
        }
    }

    /// Enters `Error` and schedules a reacquire attempt.
    fn fail(&mut self, now: Instant, reason: &str) {
        if self.state != BotState::Error {
            error!(%reason, "link lost; entering error state");
        }
        self.combat.stop(now);
        self.navigation.stop();
        self.seasonal_goal = None;
        self.retry_at = Some(now + self.config.error_backoff());
        self.set_state(BotState::Error);
    }

    /// Returns whether the links are back and the tick may proceed.
    fn try_recover(&mut self, now: Instant) -> bool {
        if self.retry_at.is_some_and(|at| now < at) {
            return false;
        }
        let provider_up = self.provider.reacquire();
        let actuator_up = self.actuator.reacquire();
        if provider_up && actuator_up {
            info!("links reacquired; resuming");
            self.retry_at = None;
            self.set_state(BotState::Farming);
            true
        } else {
            warn!(provider_up, actuator_up, "reacquire failed; retrying after backoff");
            self.retry_at = Some(now + self.config.error_backoff());
            false
        }
    }

    /// Map bookkeeping that runs every tick regardless of state.
    fn observe(&mut self, snapshot: &WorldSnapshot) {
        if self.map.name.as_deref() != Some(snapshot.map.name.as_str()) {
            if let Some(previous) = &self.map.name {
                info!(from = %previous, to = %snapshot.map.name, "entered new map");
            }
            self.map = MapProgress {
                name: Some(snapshot.map.name.clone()),
                completed: snapshot.map.completed,
                ..MapProgress::default()
            };
            self.combat.clear_ignored();
            self.seasonal_goal = None;
        } else if snapshot.map.completed && !self.map.completed {
            self.map.completed = true;
            self.maps_cleared += 1;
            info!(map = %snapshot.map.name, cleared = self.maps_cleared, "map cleared");
        }
        self.navigation.observe(snapshot);
    }

    fn wait_for_respawn(&mut self, now: Instant) {
        if self.player_alive {
            self.player_alive = false;
            self.deaths += 1;
            warn!(deaths = self.deaths, "player died; waiting for respawn");
        }
        if !self.combat.is_idle() {
            self.combat.stop(now);
        }
        self.navigation.stop();
        self.seasonal_goal = None;
        if !matches!(self.state, BotState::Idle | BotState::Error) {
            self.set_state(BotState::Farming);
        }
    }

    /// Nearest hostile worth engaging; targets that already timed out on this map are skipped.
    fn hostile_in_range<'a>(&self, snapshot: &'a WorldSnapshot) -> Option<&'a Entity> {
        let bosses_and_elites_only = self.config.combat.tactics == TacticsMode::BossOnly;
        snapshot.nearest_hostile_matching(self.config.combat.engagement_range, |entity| {
            (!bosses_and_elites_only || entity.is_boss() || entity.is_elite())
                && !self.combat.is_ignored(entity.id)
        })
    }
}
