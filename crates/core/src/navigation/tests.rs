use std::time::Duration;

use super::*;
use crate::error::SearchFailure;
use crate::sim::{Command, RecordingActuator};
use crate::snapshot::{Entity, EntityKind, MapStatus};
use crate::test_support::{at_ms, nav_config, snapshot_at};

fn engine_at(x: f32, y: f32) -> NavigationEngine {
    let mut nav = NavigationEngine::new(&nav_config());
    nav.observe(&snapshot_at(x, y));
    nav
}

#[test]
fn route_is_followed_until_the_goal_is_reached() {
    let mut nav = engine_at(0.5, 0.5);
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    let goal = WorldPos::flat(10.5, 0.5);

    nav.navigate_to(WorldPos::flat(0.5, 0.5), goal).expect("open grid");
    assert_eq!(nav.state(), NavState::Moving);
    assert_eq!(nav.route().and_then(Route::goal), Some(goal));

    let status = nav.tick(&snapshot_at(0.5, 0.5), &mut actuator, t0).expect("linked");
    assert_eq!(status, NavStatus::Active);
    assert_eq!(actuator.commands(), &[Command::Move(goal)]);

    let status = nav.tick(&snapshot_at(10.0, 0.5), &mut actuator, at_ms(t0, 50)).expect("linked");
    assert_eq!(status, NavStatus::Reached);
    assert_eq!(nav.state(), NavState::GoalReached);
    assert!(nav.route().is_none());
}

#[test]
fn repeated_request_for_the_same_goal_keeps_the_route() {
    let mut nav = engine_at(0.5, 0.5);
    let goal = WorldPos::flat(10.5, 0.5);
    nav.navigate_to(WorldPos::flat(0.5, 0.5), goal).expect("open grid");
    let before = nav.route().cloned();

    nav.navigate_to(WorldPos::flat(3.5, 0.5), WorldPos::flat(10.55, 0.5)).expect("no-op");
    assert_eq!(nav.route().cloned(), before, "route must not be replanned");
}

#[test]
fn goal_outside_the_grid_fails_without_leaving_a_route() {
    let mut nav = engine_at(0.5, 0.5);
    let err = nav
        .navigate_to(WorldPos::flat(0.5, 0.5), WorldPos::flat(100.5, 0.5))
        .expect_err("outside the 60x60 grid");
    assert_eq!(err, NavigationError::NoRoute(SearchFailure::OutOfBounds));
    assert_eq!(nav.state(), NavState::Idle);
    assert!(nav.route().is_none());
    assert!(nav.goal().is_none());
}

#[test]
fn stationary_agent_cycles_recovery_maneuvers_then_abandons() {
    let mut nav = engine_at(0.5, 0.5);
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    let goal = WorldPos::flat(20.5, 0.5);
    nav.navigate_to(WorldPos::flat(0.5, 0.5), goal).expect("open grid");

    let stalled = snapshot_at(0.5, 0.5);
    let mut first_stuck = None;
    let mut abandoned_at = None;
    for step in 0..=200u64 {
        nav.tick(&stalled, &mut actuator, at_ms(t0, step * 50)).expect("linked");
        if nav.state() == NavState::Stuck && first_stuck.is_none() {
            first_stuck = Some(step * 50);
        }
        if nav.state() == NavState::Idle {
            abandoned_at = Some(step * 50);
            break;
        }
    }

    assert_eq!(first_stuck, Some(2000));
    // Sidestep left at 2000, right at 4600, repath at 7200, give up at 9250.
    assert_eq!(abandoned_at, Some(9250));
    assert_eq!(nav.take_failure(), Some(NavigationError::StuckExhausted { attempts: 3 }));
    assert_eq!(nav.take_failure(), None, "failure is reported once");

    let moves = actuator.moves();
    assert!(moves.contains(&WorldPos::flat(0.5, 3.5)), "left sidestep issued");
    assert!(moves.contains(&WorldPos::flat(0.5, -2.5)), "right sidestep issued");

    let map = nav.map().expect("map built on observe");
    assert_eq!(map.state(map.cell_of(goal)), CellState::Blocked);
}

#[test]
fn waypoint_progress_resets_recovery_attempts() {
    let mut nav = engine_at(0.5, 0.5);
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    // Not a pure straight or diagonal line, so the route has a turning point.
    nav.navigate_to(WorldPos::flat(0.5, 0.5), WorldPos::flat(10.5, 20.5)).expect("open grid");

    let mut step = 0;
    while nav.state() != NavState::Stuck {
        nav.tick(&snapshot_at(0.5, 0.5), &mut actuator, at_ms(t0, step * 50)).expect("linked");
        step += 1;
    }
    assert_eq!(nav.recovery_attempts(), 1);

    let first = nav.route().and_then(Route::next_waypoint).expect("route kept while recovering");
    // Recovery ends and the agent turns up on top of the next waypoint.
    let after = at_ms(t0, step * 50 + 1000);
    nav.tick(&snapshot_at(first.x, first.y), &mut actuator, after).expect("linked");
    assert_eq!(nav.recovery_attempts(), 0);
}

#[test]
fn explore_heads_for_a_frontier_and_finishes_once_it_is_visited() {
    let mut nav = engine_at(0.5, 0.5);
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();

    let frontier = nav.explore(WorldPos::flat(0.5, 0.5)).expect("unexplored grid");
    assert_eq!(nav.state(), NavState::Exploring);
    assert!(nav.is_exploring());
    let target = nav.goal().expect("frontier goal");
    assert_eq!(nav.map().map(|map| map.cell_of(target)), Some(frontier));

    let arrived = snapshot_at(target.x, target.y);
    nav.observe(&arrived);
    let status = nav.tick(&arrived, &mut actuator, t0).expect("linked");
    assert_eq!(status, NavStatus::Reached);
    assert!(nav.exploration_progress() > 0.0);
}

#[test]
fn fully_enclosed_start_has_no_frontier() {
    let mut nav = engine_at(0.5, 0.5);
    let map = nav.map.as_mut().expect("observed");
    let here = map.cell_of(WorldPos::flat(0.5, 0.5));
    for y in -3..=3 {
        for x in -3..=3 {
            let cell = Cell { y: here.y + y, x: here.x + x };
            if !map.is_visited(cell) {
                map.mark_blocked(cell);
            }
        }
    }
    assert_eq!(nav.explore(WorldPos::flat(0.5, 0.5)), Err(NavigationError::NoFrontier));
    assert_eq!(nav.state(), NavState::Idle);
}

#[test]
fn spent_search_budget_ends_exploration_without_abandoning_frontiers() {
    let mut nav = engine_at(0.5, 0.5);
    let normal = nav.limits;
    nav.limits = SearchLimits { time_budget: Duration::ZERO, ..normal };

    assert_eq!(
        nav.explore(WorldPos::flat(0.5, 0.5)),
        Err(NavigationError::NoRoute(SearchFailure::TimeBudget))
    );
    assert_eq!(nav.state(), NavState::Idle);
    assert!(nav.abandoned.is_empty());

    nav.limits = normal;
    let frontier = nav.explore(WorldPos::flat(0.5, 0.5)).expect("open grid");
    assert!(!nav.abandoned.contains(&frontier));
    assert_eq!(nav.state(), NavState::Exploring);
}

#[test]
fn changing_maps_discards_the_grid_and_goal() {
    let mut nav = engine_at(0.5, 0.5);
    nav.observe(&snapshot_at(4.5, 0.5));
    nav.navigate_to(WorldPos::flat(4.5, 0.5), WorldPos::flat(12.5, 0.5)).expect("open grid");
    let explored = nav.map().map(ExplorationMap::visited_count).expect("observed");

    nav.observe(&snapshot_at(4.5, 0.5).with_map(MapStatus::named("crypt")));
    assert_eq!(nav.state(), NavState::Idle);
    assert!(nav.goal().is_none());
    let fresh = nav.map().map(ExplorationMap::visited_count).expect("rebuilt");
    assert!(fresh < explored, "visit history must not carry across maps");
}

#[test]
fn leaving_the_route_corridor_triggers_a_replan() {
    let mut nav = engine_at(0.5, 0.5);
    let mut actuator = RecordingActuator::new();
    let goal = WorldPos::flat(10.5, 0.5);
    nav.navigate_to(WorldPos::flat(0.5, 0.5), goal).expect("open grid");

    let off = WorldPos::flat(5.5, 12.5);
    nav.tick(&snapshot_at(off.x, off.y), &mut actuator, Instant::now()).expect("linked");
    let route = nav.route().expect("replanned");
    assert_eq!(route.goal(), Some(goal));
    assert!(route.deviation(off) < 1e-3, "new route starts where the agent is");
    assert_eq!(nav.state(), NavState::Moving);
}

#[test]
fn blocking_entities_become_obstacles_for_one_observation() {
    let mut nav = engine_at(0.5, 0.5);
    let npc = Entity::new(7, EntityKind::Npc, WorldPos::flat(5.5, 0.5));
    nav.observe(&snapshot_at(0.5, 0.5).with_entity(npc));
    let map = nav.map().expect("observed");
    let cell = map.cell_of(WorldPos::flat(5.5, 0.5));
    assert!(map.is_obstacle(cell));

    nav.observe(&snapshot_at(0.5, 0.5));
    assert!(!nav.map().expect("observed").is_obstacle(cell));
}

#[test]
fn link_loss_while_moving_is_returned() {
    let mut nav = engine_at(0.5, 0.5);
    let mut actuator = RecordingActuator::new();
    actuator.set_linked(false);
    nav.navigate_to(WorldPos::flat(0.5, 0.5), WorldPos::flat(8.5, 0.5)).expect("open grid");
    let err = nav.tick(&snapshot_at(0.5, 0.5), &mut actuator, Instant::now());
    assert!(matches!(err, Err(ActuatorError::LinkLost(_))));
}
