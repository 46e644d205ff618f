//! Waypoint sequences produced by a search and consumed by movement ticks.

use super::*;

#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    waypoints: Vec<WorldPos>,
    next: usize,
    // Where the current segment began: the route origin or the last consumed waypoint.
    segment_start: WorldPos,
}

impl Route {
    /// Builds a route from a grid path, merging collinear steps. The final
    /// waypoint is `goal` itself rather than its cell centre.
    pub fn from_cells(
        map: &ExplorationMap,
        origin: WorldPos,
        start: Cell,
        cells: &[Cell],
        goal: WorldPos,
    ) -> Self {
        let mut waypoints = Vec::new();
        let mut prev = start;
        for (idx, cell) in cells.iter().enumerate() {
            let heading = (cell.y - prev.y, cell.x - prev.x);
            let turns_next = cells
                .get(idx + 1)
                .is_some_and(|next| (next.y - cell.y, next.x - cell.x) != heading);
            if turns_next {
                waypoints.push(map.center_of(*cell));
            }
            prev = *cell;
        }
        waypoints.push(goal);
        Self { waypoints, next: 0, segment_start: origin }
    }

    pub fn waypoints(&self) -> &[WorldPos] {
        &self.waypoints
    }

    pub fn remaining(&self) -> &[WorldPos] {
        &self.waypoints[self.next.min(self.waypoints.len())..]
    }

    pub fn next_waypoint(&self) -> Option<WorldPos> {
        self.waypoints.get(self.next).copied()
    }

    pub fn goal(&self) -> Option<WorldPos> {
        self.waypoints.last().copied()
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.waypoints.len()
    }

    pub fn advance(&mut self) {
        if let Some(reached) = self.next_waypoint() {
            self.segment_start = reached;
            self.next += 1;
        }
    }

    /// Distance from `pos` to the segment currently being followed.
    pub fn deviation(&self, pos: WorldPos) -> f32 {
        match self.next_waypoint() {
            Some(end) => distance_to_segment(pos, self.segment_start, end),
            None => 0.0,
        }
    }
}

fn distance_to_segment(p: WorldPos, a: WorldPos, b: WorldPos) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq <= f32::EPSILON {
        return p.distance_2d(a);
    }
    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    p.distance_2d(WorldPos::flat(a.x + abx * t, a.y + aby * t))
}
