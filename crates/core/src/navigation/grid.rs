//! Coarse exploration grid over world coordinates.
//! This module exists so terrain knowledge, visit history and transient obstacles share one indexing scheme.
//! It does not own search or movement policy.

use std::collections::BTreeSet;

use super::*;

/// What the agent has learned about a cell's terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Terrain {
    Unknown,
    Walkable,
    Blocked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    Unknown,
    Walkable,
    Blocked,
    Visited,
}

#[derive(Clone, Debug)]
pub struct ExplorationMap {
    width: i32,
    height: i32,
    resolution: f32,
    // Lattice offset: cell = floor(world / resolution) - offset.
    offset_x: i32,
    offset_y: i32,
    z: f32,
    terrain: Vec<Terrain>,
    visited: Vec<bool>,
    visited_count: usize,
    obstacles: BTreeSet<Cell>,
}

impl ExplorationMap {
    /// Grid of `width` x `height` cells centred on `anchor`.
    pub fn new(width: u32, height: u32, resolution: f32, anchor: WorldPos) -> Self {
        let width = i32::try_from(width).unwrap_or(i32::MAX).max(1);
        let height = i32::try_from(height).unwrap_or(i32::MAX).max(1);
        let len = (width as usize) * (height as usize);
        Self {
            width,
            height,
            resolution,
            offset_x: (anchor.x / resolution).floor() as i32 - width / 2,
            offset_y: (anchor.y / resolution).floor() as i32 - height / 2,
            z: anchor.z,
            terrain: vec![Terrain::Unknown; len],
            visited: vec![false; len],
            visited_count: 0,
            obstacles: BTreeSet::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        self.in_bounds(cell).then(|| (cell.y as usize) * (self.width as usize) + cell.x as usize)
    }

    pub fn cell_of(&self, pos: WorldPos) -> Cell {
        Cell {
            y: (pos.y / self.resolution).floor() as i32 - self.offset_y,
            x: (pos.x / self.resolution).floor() as i32 - self.offset_x,
        }
    }

    pub fn center_of(&self, cell: Cell) -> WorldPos {
        WorldPos::new(
            ((cell.x + self.offset_x) as f32 + 0.5) * self.resolution,
            ((cell.y + self.offset_y) as f32 + 0.5) * self.resolution,
            self.z,
        )
    }

    /// Out-of-bounds cells read as blocked.
    pub fn state(&self, cell: Cell) -> CellState {
        let Some(idx) = self.index(cell) else {
            return CellState::Blocked;
        };
        match (self.terrain[idx], self.visited[idx]) {
            (Terrain::Blocked, _) => CellState::Blocked,
            (_, true) => CellState::Visited,
            (Terrain::Walkable, false) => CellState::Walkable,
            (Terrain::Unknown, false) => CellState::Unknown,
        }
    }

    pub fn is_visited(&self, cell: Cell) -> bool {
        self.index(cell).is_some_and(|idx| self.visited[idx])
    }

    pub fn is_blocked_terrain(&self, cell: Cell) -> bool {
        self.index(cell).is_none_or(|idx| self.terrain[idx] == Terrain::Blocked)
    }

    pub fn is_obstacle(&self, cell: Cell) -> bool {
        self.obstacles.contains(&cell)
    }

    /// In bounds, not blocked, not under an obstacle footprint. Unknown cells pass.
    pub fn is_traversable(&self, cell: Cell) -> bool {
        !self.is_blocked_terrain(cell) && !self.is_obstacle(cell)
    }

    pub fn mark_walkable(&mut self, cell: Cell) {
        if let Some(idx) = self.index(cell)
            && self.terrain[idx] == Terrain::Unknown
        {
            self.terrain[idx] = Terrain::Walkable;
        }
    }

    pub fn mark_blocked(&mut self, cell: Cell) {
        if let Some(idx) = self.index(cell) {
            self.terrain[idx] = Terrain::Blocked;
        }
    }

    pub fn mark_visited(&mut self, cell: Cell) {
        if let Some(idx) = self.index(cell)
            && !self.visited[idx]
        {
            self.visited[idx] = true;
            self.visited_count += 1;
        }
    }

    /// Marks every cell whose centre lies within `radius` world units of `center`.
    pub fn mark_visited_radius(&mut self, center: WorldPos, radius: f32) {
        let origin = self.cell_of(center);
        let span = (radius / self.resolution).ceil() as i32;
        for y in (origin.y - span)..=(origin.y + span) {
            for x in (origin.x - span)..=(origin.x + span) {
                let cell = Cell { y, x };
                if cell == origin || self.center_of(cell).distance_2d(center) <= radius {
                    self.mark_visited(cell);
                }
            }
        }
    }

    /// Replaces the obstacle overlay with the footprints of `blockers` (cell plus 8 neighbours).
    pub fn set_obstacles(&mut self, blockers: impl IntoIterator<Item = WorldPos>) {
        self.obstacles.clear();
        for pos in blockers {
            let cell = self.cell_of(pos);
            self.obstacles.insert(cell);
            for n in neighbors(cell) {
                self.obstacles.insert(n);
            }
        }
    }

    /// Unvisited traversable cell with at least one visited neighbour.
    pub fn is_frontier(&self, cell: Cell) -> bool {
        self.in_bounds(cell)
            && !self.is_visited(cell)
            && self.is_traversable(cell)
            && neighbors(cell).into_iter().any(|n| self.is_visited(n))
    }

    pub fn visited_count(&self) -> usize {
        self.visited_count
    }

    pub fn progress(&self) -> f32 {
        self.visited_count as f32 / self.visited.len() as f32
    }
}

/// 8-connected neighbours: orthogonals first, then diagonals.
pub(crate) fn neighbors(c: Cell) -> [Cell; 8] {
    [
        Cell { y: c.y - 1, x: c.x },
        Cell { y: c.y, x: c.x + 1 },
        Cell { y: c.y + 1, x: c.x },
        Cell { y: c.y, x: c.x - 1 },
        Cell { y: c.y - 1, x: c.x + 1 },
        Cell { y: c.y + 1, x: c.x + 1 },
        Cell { y: c.y + 1, x: c.x - 1 },
        Cell { y: c.y - 1, x: c.x - 1 },
    ]
}
