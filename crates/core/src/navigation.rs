//! Goal navigation, frontier exploration and stuck recovery.
//! This module exists to turn "go there" or "explore" into a stream of movement commands.
//! It does not own when navigation runs; the controller ticks it only while delegating.

use std::collections::BTreeSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::NavigationConfig;
use crate::error::{ActuatorError, NavigationError, SearchFailure};
use crate::ports::Actuator;
use crate::snapshot::WorldSnapshot;
use crate::types::{Cell, NavState, NavStatus, WorldPos};

mod frontier;
mod grid;
mod pathfinding;
mod route;
mod stuck;

pub use grid::{CellState, ExplorationMap};
pub use pathfinding::{SearchLimits, find_path};
pub use route::Route;
pub use stuck::Maneuver;

pub(crate) use grid::neighbors;
use frontier::nearest_frontier;
use stuck::{Recovery, StuckTracker, sidestep_target};

const SAME_GOAL_EPSILON: f32 = 0.1;
// Frontier candidates tried per explore call before giving up for this tick.
const MAX_FRONTIER_ATTEMPTS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Goal {
    position: WorldPos,
    frontier: Option<Cell>,
}

pub struct NavigationEngine {
    config: NavigationConfig,
    limits: SearchLimits,
    state: NavState,
    map: Option<ExplorationMap>,
    map_name: Option<String>,
    goal: Option<Goal>,
    route: Option<Route>,
    stuck: StuckTracker,
    recovery: Option<Recovery>,
    attempts: u32,
    abandoned: BTreeSet<Cell>,
    last_failure: Option<NavigationError>,
}

impl NavigationEngine {
    pub fn new(config: &NavigationConfig) -> Self {
        Self {
            config: config.clone(),
            limits: SearchLimits::from_config(config),
            state: NavState::Idle,
            map: None,
            map_name: None,
            goal: None,
            route: None,
            stuck: StuckTracker::new(config),
            recovery: None,
            attempts: 0,
            abandoned: BTreeSet::new(),
            last_failure: None,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn status(&self) -> NavStatus {
        match self.state {
            NavState::Idle => NavStatus::Idle,
            NavState::Pathfinding | NavState::Moving | NavState::Exploring => NavStatus::Active,
            NavState::GoalReached => NavStatus::Reached,
            NavState::Stuck => NavStatus::Stuck,
        }
    }

    /// A route is being followed or recovered.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            NavState::Pathfinding | NavState::Moving | NavState::Exploring | NavState::Stuck
        )
    }

    pub fn is_exploring(&self) -> bool {
        self.goal.is_some_and(|goal| goal.frontier.is_some())
    }

    pub fn goal(&self) -> Option<WorldPos> {
        self.goal.map(|goal| goal.position)
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn map(&self) -> Option<&ExplorationMap> {
        self.map.as_ref()
    }

    pub fn exploration_progress(&self) -> f32 {
        self.map.as_ref().map_or(0.0, ExplorationMap::progress)
    }

    pub fn recovery_attempts(&self) -> u32 {
        self.attempts
    }

    /// Failure reported by the last tick that abandoned a goal, cleared on read.
    pub fn take_failure(&mut self) -> Option<NavigationError> {
        self.last_failure.take()
    }

    /// Folds the tick's observation into the exploration grid. Runs every tick,
    /// whether or not navigation is delegated to.
    pub fn observe(&mut self, snapshot: &WorldSnapshot) {
        if self.map_name.as_deref() != Some(snapshot.map.name.as_str()) {
            if self.map_name.is_some() {
                info!(map = %snapshot.map.name, "map changed; exploration grid reset");
            }
            self.map_name = Some(snapshot.map.name.clone());
            self.map = None;
            self.abandoned.clear();
            self.stop();
        }
        let player = snapshot.player.position;
        let map = ensure_map(&mut self.map, &self.config, player);
        let here = map.cell_of(player);
        map.mark_walkable(here);
        map.mark_visited_radius(player, self.config.visit_radius);
        map.set_obstacles(
            snapshot
                .entities
                .iter()
                .filter(|entity| entity.kind.blocks_movement() && entity.alive)
                .map(|entity| entity.position),
        );
    }

    /// Plans a route to `goal`. A repeated request for the current goal keeps the existing route.
    pub fn navigate_to(&mut self, from: WorldPos, goal: WorldPos) -> Result<(), NavigationError> {
        if let Some(current) = self.goal
            && current.frontier.is_none()
            && current.position.distance_2d(goal) <= SAME_GOAL_EPSILON
            && self.route.is_some()
            && self.is_active()
        {
            return Ok(());
        }
        self.attempts = 0;
        self.recovery = None;
        self.plan(from, Goal { position: goal, frontier: None }, self.limits)
    }

    /// Picks the nearest reachable frontier and starts moving toward it.
    ///
    /// All candidates tried in one call share a single search time budget. A candidate whose
    /// search ran out of time is not abandoned; the next call may reach it.
    pub fn explore(&mut self, from: WorldPos) -> Result<Cell, NavigationError> {
        self.attempts = 0;
        self.recovery = None;
        let started = Instant::now();
        for _ in 0..MAX_FRONTIER_ATTEMPTS {
            let remaining = self.limits.time_budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            let map = ensure_map(&mut self.map, &self.config, from);
            let start = map.cell_of(from);
            let Some(target) = nearest_frontier(map, start, &self.abandoned) else {
                self.state = NavState::Idle;
                return Err(NavigationError::NoFrontier);
            };
            let position = map.center_of(target);
            let limits = SearchLimits { time_budget: remaining, ..self.limits };
            match self.plan(from, Goal { position, frontier: Some(target) }, limits) {
                Ok(()) => {
                    debug!(y = target.y, x = target.x, "exploring toward frontier");
                    return Ok(target);
                }
                Err(NavigationError::NoRoute(SearchFailure::TimeBudget)) => break,
                Err(err) => {
                    debug!(y = target.y, x = target.x, %err, "frontier abandoned");
                    self.abandoned.insert(target);
                }
            }
        }
        debug!("frontier search budget spent for this call");
        self.state = NavState::Idle;
        Err(NavigationError::NoRoute(SearchFailure::TimeBudget))
    }

    /// Drops the goal and route. The exploration grid is kept.
    pub fn stop(&mut self) {
        self.state = NavState::Idle;
        self.goal = None;
        self.route = None;
        self.recovery = None;
        self.attempts = 0;
        self.stuck.reset();
    }

    fn plan(&mut self, from: WorldPos, goal: Goal, limits: SearchLimits) -> Result<(), NavigationError> {
        self.state = NavState::Pathfinding;
        let map = ensure_map(&mut self.map, &self.config, from);
        let start = map.cell_of(from);
        let target = goal.frontier.unwrap_or_else(|| map.cell_of(goal.position));
        match find_path(map, start, target, limits) {
            Ok(cells) => {
                let route = Route::from_cells(map, from, start, &cells, goal.position);
                self.route = Some(route);
                self.goal = Some(goal);
                self.state = if goal.frontier.is_some() { NavState::Exploring } else { NavState::Moving };
                self.stuck.reset();
                Ok(())
            }
            Err(failure) => {
                self.state = NavState::Idle;
                self.goal = None;
                self.route = None;
                Err(NavigationError::NoRoute(failure))
            }
        }
    }

    /// Advances the current navigation by one tick. Only link loss is returned as an error;
    /// search and stuck failures abandon the goal and surface through [`Self::take_failure`].
    pub fn tick(
        &mut self,
        snapshot: &WorldSnapshot,
        actuator: &mut impl Actuator,
        now: Instant,
    ) -> Result<NavStatus, ActuatorError> {
        // A gap longer than the window means navigation was suspended; old samples are meaningless.
        if self
            .stuck
            .last_sample_at()
            .is_some_and(|at| now.saturating_duration_since(at) > self.config.stuck_window())
        {
            self.stuck.reset();
        }
        match self.state {
            NavState::Moving | NavState::Exploring => self.follow_route(snapshot, actuator, now)?,
            NavState::Stuck => self.recover(snapshot, actuator, now)?,
            NavState::Idle | NavState::Pathfinding | NavState::GoalReached => {}
        }
        Ok(self.status())
    }

    fn follow_route(
        &mut self,
        snapshot: &WorldSnapshot,
        actuator: &mut impl Actuator,
        now: Instant,
    ) -> Result<(), ActuatorError> {
        let pos = snapshot.player.position;

        let frontier_resolved = match (self.goal.and_then(|goal| goal.frontier), self.map.as_ref()) {
            (Some(frontier), Some(map)) => !map.is_frontier(frontier),
            _ => false,
        };
        if frontier_resolved {
            debug!("frontier resolved before arrival");
            self.finish();
            return Ok(());
        }

        let tolerance = self.config.arrival_tolerance;
        let Some(route) = self.route.as_mut() else {
            self.state = NavState::Idle;
            return Ok(());
        };
        let mut consumed = false;
        while let Some(waypoint) = route.next_waypoint()
            && waypoint.distance_2d(pos) <= tolerance
        {
            route.advance();
            consumed = true;
        }
        if consumed {
            self.attempts = 0;
        }
        if route.is_finished() {
            self.finish();
            return Ok(());
        }

        if route.deviation(pos) > self.config.deviation_tolerance {
            debug!(deviation = route.deviation(pos), "off route; replanning");
            if !self.replan(pos) {
                return Ok(());
            }
        }

        if self.stuck.record(now, pos) {
            return self.enter_stuck(snapshot, actuator, now);
        }

        match self.route.as_ref().and_then(Route::next_waypoint) {
            Some(waypoint) => issue_move(actuator, waypoint),
            None => Ok(()),
        }
    }

    fn finish(&mut self) {
        self.state = NavState::GoalReached;
        self.route = None;
        self.recovery = None;
        self.attempts = 0;
        self.stuck.reset();
    }

    /// Replans toward the current goal; on failure the goal is abandoned.
    fn replan(&mut self, pos: WorldPos) -> bool {
        let Some(goal) = self.goal else {
            self.state = NavState::Idle;
            return false;
        };
        match self.plan(pos, goal, self.limits) {
            Ok(()) => true,
            Err(err) => {
                self.abandon(goal, err);
                false
            }
        }
    }

    fn abandon(&mut self, goal: Goal, err: NavigationError) {
        warn!(%err, x = goal.position.x, y = goal.position.y, "navigation goal abandoned");
        if let Some(frontier) = goal.frontier {
            self.abandoned.insert(frontier);
        }
        self.stop();
        self.last_failure = Some(err);
    }

    fn enter_stuck(
        &mut self,
        snapshot: &WorldSnapshot,
        actuator: &mut impl Actuator,
        now: Instant,
    ) -> Result<(), ActuatorError> {
        let pos = snapshot.player.position;
        let resume = self.state;
        let Some(goal) = self.goal else {
            self.stop();
            return Ok(());
        };
        let blocking = self.route.as_ref().and_then(Route::next_waypoint).unwrap_or(goal.position);

        if self.attempts >= self.config.recovery_attempts {
            if let Some(map) = self.map.as_mut() {
                let cell = map.cell_of(blocking);
                map.mark_blocked(cell);
            }
            let attempts = self.attempts;
            self.abandon(goal, NavigationError::StuckExhausted { attempts });
            return Ok(());
        }

        self.attempts += 1;
        let maneuver = Maneuver::for_attempt(self.attempts);
        warn!(attempt = self.attempts, ?maneuver, "navigation stuck; recovering");
        self.stuck.reset();

        if maneuver == Maneuver::Repath {
            if self.replan(pos) {
                let next = self.route.as_ref().and_then(Route::next_waypoint);
                if let Some(waypoint) = next {
                    return issue_move(actuator, waypoint);
                }
            }
            return Ok(());
        }

        let step = self.config.recovery_step;
        let target = sidestep_target(pos, blocking, step, maneuver == Maneuver::SidestepLeft);
        self.recovery = Some(Recovery {
            maneuver,
            target,
            until: now + self.config.recovery_maneuver(),
            resume,
        });
        self.state = NavState::Stuck;
        issue_move(actuator, target)
    }

    fn recover(
        &mut self,
        snapshot: &WorldSnapshot,
        actuator: &mut impl Actuator,
        now: Instant,
    ) -> Result<(), ActuatorError> {
        let Some(recovery) = self.recovery else {
            self.state = if self.is_exploring() { NavState::Exploring } else { NavState::Moving };
            return self.follow_route(snapshot, actuator, now);
        };
        if now >= recovery.until {
            debug!(maneuver = ?recovery.maneuver, "recovery maneuver finished; resuming route");
            self.recovery = None;
            self.state = recovery.resume;
            self.stuck.reset();
            return self.follow_route(snapshot, actuator, now);
        }
        issue_move(actuator, recovery.target)
    }
}

fn issue_move(actuator: &mut impl Actuator, target: WorldPos) -> Result<(), ActuatorError> {
    match actuator.move_toward(target) {
        Ok(()) => Ok(()),
        Err(err) if err.is_link_loss() => Err(err),
        Err(err) => {
            debug!(%err, "move command skipped this tick");
            Ok(())
        }
    }
}

fn ensure_map<'a>(
    map: &'a mut Option<ExplorationMap>,
    config: &NavigationConfig,
    anchor: WorldPos,
) -> &'a mut ExplorationMap {
    map.get_or_insert_with(|| {
        ExplorationMap::new(config.grid_width, config.grid_height, config.grid_resolution, anchor)
    })
}

#[cfg(test)]
mod tests;
