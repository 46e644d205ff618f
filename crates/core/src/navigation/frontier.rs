//! Breadth-first frontier search for exploration goals.

use std::collections::{BTreeMap, BTreeSet, VecDeque, btree_map::Entry};

use super::*;

/// Nearest frontier cell reachable through visited ground, ties broken by `(y, x)`.
pub(super) fn nearest_frontier(
    map: &ExplorationMap,
    start: Cell,
    abandoned: &BTreeSet<Cell>,
) -> Option<Cell> {
    if !map.in_bounds(start) {
        return None;
    }

    let mut visited = BTreeMap::new();
    let mut queue = VecDeque::new();
    visited.insert(start, 0u32);
    queue.push_back(start);

    let mut best: Option<(u32, Cell)> = None;

    while let Some(current) = queue.pop_front() {
        let Some(&dist) = visited.get(&current) else {
            continue;
        };
        if let Some((best_dist, _)) = best
            && dist >= best_dist
        {
            break;
        }

        for neighbor in neighbors(current) {
            if map.is_frontier(neighbor) && !abandoned.contains(&neighbor) {
                let candidate = dist + 1;
                let is_better = match best {
                    None => true,
                    Some((best_dist, best_cell)) => {
                        candidate < best_dist
                            || (candidate == best_dist
                                && (neighbor.y, neighbor.x) < (best_cell.y, best_cell.x))
                    }
                };
                if is_better {
                    best = Some((candidate, neighbor));
                }
                continue;
            }
            if !map.is_visited(neighbor) || !map.is_traversable(neighbor) {
                continue;
            }
            if let Entry::Vacant(entry) = visited.entry(neighbor) {
                entry.insert(dist + 1);
                queue.push_back(neighbor);
            }
        }
    }

    best.map(|(_, cell)| cell)
}
