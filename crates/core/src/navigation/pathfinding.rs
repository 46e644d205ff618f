//! Bounded, deterministic A* over the exploration grid.
//! This module exists so route search is reusable by goal navigation and frontier exploration alike.
//! It does not own route following or exploration policy.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use super::*;
use crate::error::SearchFailure;

pub(crate) const STRAIGHT_COST: u32 = 1000;
pub(crate) const DIAGONAL_COST: u32 = 1415;
const CLOCK_CHECK_INTERVAL: usize = 64;

// Ties resolve by lower h, then first insertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct OpenNode {
    f: u32,
    h: u32,
    seq: u64,
    y: i32,
    x: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_expansions: usize,
    pub time_budget: Duration,
}

impl SearchLimits {
    pub fn from_config(config: &NavigationConfig) -> Self {
        Self { max_expansions: config.max_expansions, time_budget: config.search_budget() }
    }
}

/// Cells from `start` (exclusive) to `goal` (inclusive). Empty when they coincide.
///
/// The start cell is never checked. The goal may sit under an obstacle
/// footprint, but not on blocked terrain.
pub fn find_path(
    map: &ExplorationMap,
    start: Cell,
    goal: Cell,
    limits: SearchLimits,
) -> Result<Vec<Cell>, SearchFailure> {
    if !map.in_bounds(goal) || !map.in_bounds(start) {
        return Err(SearchFailure::OutOfBounds);
    }
    if map.is_blocked_terrain(goal) {
        return Err(SearchFailure::Unreachable);
    }
    if start == goal {
        return Ok(vec![]);
    }

    let started = Instant::now();
    let mut open_set = BTreeSet::new();
    let mut g_score = BTreeMap::new();
    let mut came_from = BTreeMap::new();
    let mut seq = 0u64;
    let mut expanded = 0usize;

    let h = heuristic(start, goal);
    open_set.insert(OpenNode { f: h, h, seq, y: start.y, x: start.x });
    g_score.insert(start, 0u32);

    while let Some(curr) = open_set.pop_first() {
        let p = Cell { y: curr.y, x: curr.x };
        let Some(&cur_g) = g_score.get(&p) else {
            continue;
        };
        if curr.f - curr.h > cur_g {
            continue;
        }
        if p == goal {
            return Ok(reconstruct_path(&came_from, start, goal));
        }

        expanded += 1;
        if expanded > limits.max_expansions {
            return Err(SearchFailure::ExpansionBudget { expanded: limits.max_expansions });
        }
        if expanded % CLOCK_CHECK_INTERVAL == 0 && started.elapsed() > limits.time_budget {
            return Err(SearchFailure::TimeBudget);
        }

        for (n, step_cost) in successors(map, p, goal) {
            let tg = cur_g + step_cost;
            if tg < *g_score.get(&n).unwrap_or(&u32::MAX) {
                came_from.insert(n, p);
                g_score.insert(n, tg);
                let h = heuristic(n, goal);
                seq += 1;
                open_set.insert(OpenNode { f: tg + h, h, seq, y: n.y, x: n.x });
            }
        }
    }
    Err(SearchFailure::Unreachable)
}

fn successors(map: &ExplorationMap, p: Cell, goal: Cell) -> Vec<(Cell, u32)> {
    let enterable = |c: Cell| map.is_traversable(c) || (c == goal && !map.is_blocked_terrain(c));
    neighbors(p)
        .into_iter()
        .filter(|n| enterable(*n))
        .filter_map(|n| {
            let dy = n.y - p.y;
            let dx = n.x - p.x;
            if dy != 0 && dx != 0 {
                // No corner cutting: both orthogonal cells must be open.
                let side_a = Cell { y: p.y + dy, x: p.x };
                let side_b = Cell { y: p.y, x: p.x + dx };
                (enterable(side_a) && enterable(side_b)).then_some((n, DIAGONAL_COST))
            } else {
                Some((n, STRAIGHT_COST))
            }
        })
        .collect()
}

fn heuristic(a: Cell, b: Cell) -> u32 {
    let dy = f64::from(a.y - b.y);
    let dx = f64::from(a.x - b.x);
    (dx.hypot(dy) * f64::from(STRAIGHT_COST)).floor() as u32
}

fn reconstruct_path(came: &BTreeMap<Cell, Cell>, start: Cell, goal: Cell) -> Vec<Cell> {
    let mut p = goal;
    let mut result = vec![p];
    while p != start {
        let Some(&prev) = came.get(&p) else {
            break;
        };
        p = prev;
        result.push(p);
    }
    result.reverse();
    result.remove(0);
    result
}
