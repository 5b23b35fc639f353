//! Reachability pruning for the time expansion.
//!
//! A (cell, t) pair can only carry an agent if the cell is reachable from
//! some start within t steps and some target is still reachable within the
//! remaining T - t steps. Everything outside that window is skipped when
//! the network is built. Pruning is purely a performance lever; the
//! planner must produce the same answers with an all-active map.

use crate::grid::{GridGraph, Node, Time};
use std::collections::VecDeque;

/// BFS distance from the nearest of `sources` to every passable cell;
/// `None` marks cells no source can reach.
pub fn multi_source_distances(grid: &GridGraph, sources: &[Node]) -> Vec<Option<u32>> {
    let mut dist: Vec<Option<u32>> = vec![None; grid.node_count()];
    let mut queue = VecDeque::new();
    for &s in sources {
        if dist[s as usize].is_none() {
            dist[s as usize] = Some(0);
            queue.push_back((s, 0u32));
        }
    }
    while let Some((u, du)) = queue.pop_front() {
        for &v in grid.neighbors(u) {
            if dist[v as usize].is_none() {
                dist[v as usize] = Some(du + 1);
                queue.push_back((v, du + 1));
            }
        }
    }
    dist
}

struct PickupGate {
    tau: Time,
    dist_pickup: Vec<Option<u32>>,
}

/// Per-cell activity windows derived from multi-source BFS distances.
pub struct ActivityMap {
    horizon: Time,
    dist_start: Vec<Option<u32>>,
    dist_target: Vec<Option<u32>>,
    pickup_gate: Option<PickupGate>,
}

impl ActivityMap {
    pub fn new(grid: &GridGraph, starts: &[Node], targets: &[Node], horizon: Time) -> Self {
        Self {
            horizon,
            dist_start: multi_source_distances(grid, starts),
            dist_target: multi_source_distances(grid, targets),
            pickup_gate: None,
        }
    }

    /// Sync-variant map: targets are the drop cells, and after the
    /// rendezvous time every cell must still be reachable from some pickup
    /// visited at tau.
    pub fn with_pickup_gate(
        grid: &GridGraph,
        starts: &[Node],
        drops: &[Node],
        pickups: &[Node],
        horizon: Time,
        tau: Time,
    ) -> Self {
        Self {
            horizon,
            dist_start: multi_source_distances(grid, starts),
            dist_target: multi_source_distances(grid, drops),
            pickup_gate: Some(PickupGate {
                tau,
                dist_pickup: multi_source_distances(grid, pickups),
            }),
        }
    }

    /// A map that keeps every (cell, t) active; used to run the planner
    /// with pruning disabled.
    pub fn all_active(num_cells: usize, horizon: Time) -> Self {
        Self {
            horizon,
            dist_start: vec![Some(0); num_cells],
            dist_target: vec![Some(0); num_cells],
            pickup_gate: None,
        }
    }

    /// First time step at which the cell can carry a path, if any.
    pub fn earliest(&self, cell: Node) -> Option<Time> {
        self.dist_start[cell as usize]
    }

    /// Last time step at which the cell can carry a path, if any.
    pub fn latest(&self, cell: Node) -> Option<Time> {
        let d = self.dist_target[cell as usize]?;
        self.horizon.checked_sub(d)
    }

    pub fn active(&self, cell: Node, t: Time) -> bool {
        match (self.earliest(cell), self.latest(cell)) {
            (Some(earliest), Some(latest)) if earliest <= t && t <= latest => {}
            _ => return false,
        }
        if let Some(gate) = &self.pickup_gate {
            if t >= gate.tau {
                match gate.dist_pickup[cell as usize] {
                    Some(d) => return d <= t - gate.tau,
                    None => return false,
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> GridGraph {
        GridGraph::from_cells(&[vec![0, 0, 0, 0]]).unwrap()
    }

    #[test]
    fn distances_from_single_source() {
        let g = corridor();
        let dist = multi_source_distances(&g, &[0]);
        assert_eq!(dist, vec![Some(0), Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn distances_take_nearest_source() {
        let g = corridor();
        let dist = multi_source_distances(&g, &[0, 3]);
        assert_eq!(dist, vec![Some(0), Some(1), Some(1), Some(0)]);
    }

    #[test]
    fn walls_split_reachability() {
        let g = GridGraph::from_cells(&[vec![0, 1, 0], vec![0, 1, 0]]).unwrap();
        let left = g.id(0, 0).unwrap();
        let dist = multi_source_distances(&g, &[left]);
        assert_eq!(dist[g.id(0, 1).unwrap() as usize], Some(1));
        assert_eq!(dist[g.id(2, 0).unwrap() as usize], None);
        assert_eq!(dist[g.id(2, 1).unwrap() as usize], None);
    }

    #[test]
    fn activity_window() {
        let g = corridor();
        // start at cell 0, target at cell 3, horizon 5
        let map = ActivityMap::new(&g, &[0], &[3], 5);
        assert_eq!(map.earliest(1), Some(1));
        assert_eq!(map.latest(1), Some(3));
        assert!(!map.active(1, 0));
        assert!(map.active(1, 1));
        assert!(map.active(1, 3));
        assert!(!map.active(1, 4));
        // exact horizon: every cell is active only on its shortest path slot
        let tight = ActivityMap::new(&g, &[0], &[3], 3);
        for cell in 0..4 {
            for t in 0..=3u32 {
                assert_eq!(tight.active(cell, t), t == cell);
            }
        }
    }

    #[test]
    fn unreachable_target_leaves_window_empty() {
        let g = GridGraph::from_cells(&[vec![0, 1, 0]]).unwrap();
        let map = ActivityMap::new(&g, &[0], &[1], 4);
        assert_eq!(map.latest(0), None);
        assert!(!map.active(0, 0));
    }

    #[test]
    fn pickup_gate_blocks_non_pickups_at_tau() {
        let g = corridor();
        // pickups at cell 2; tau = 2
        let map = ActivityMap::with_pickup_gate(&g, &[0], &[0, 3], &[2], 6, 2);
        // at tau only the pickup itself is active
        assert!(map.active(2, 2));
        assert!(!map.active(1, 2));
        assert!(!map.active(3, 2));
        // one step later its neighbors open up again
        assert!(map.active(1, 3));
        assert!(map.active(3, 3));
        // before tau the gate does not apply
        assert!(map.active(1, 1));
    }

    #[test]
    fn all_active_has_no_holes() {
        let map = ActivityMap::all_active(3, 4);
        for cell in 0..3 {
            for t in 0..=4 {
                assert!(map.active(cell, t));
            }
        }
        assert!(!map.active(0, 5));
    }
}
