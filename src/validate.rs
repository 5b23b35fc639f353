//! Standalone schedule checkers.
//!
//! These mirror the guarantees the planner makes about its output and let
//! hosts (and our own tests) verify a schedule without trusting the
//! solver. Schedules of different lengths are compared as if a finished
//! agent stays parked on its final cell.

use crate::grid::Direction;
use fxhash::FxHashMap;
use itertools::Itertools;

fn position(path: &[(i32, i32)], t: usize) -> (i32, i32) {
    path[t.min(path.len() - 1)]
}

fn max_len(paths: &[Vec<(i32, i32)>]) -> usize {
    paths.iter().map(|p| p.len()).max().unwrap_or(0)
}

/// Every position in bounds and on a passable cell.
pub fn paths_on_passable_cells(paths: &[Vec<(i32, i32)>], cells: &[Vec<i32>]) -> bool {
    let height = cells.len() as i32;
    let width = if height > 0 { cells[0].len() as i32 } else { 0 };
    paths.iter().flatten().all(|&(x, y)| {
        x >= 0 && y >= 0 && x < width && y < height && cells[y as usize][x as usize] == 0
    })
}

/// True iff two agents occupy the same cell at the same time.
pub fn has_vertex_conflict(paths: &[Vec<(i32, i32)>]) -> bool {
    (0..max_len(paths)).any(|t| {
        paths
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| position(p, t))
            .duplicates()
            .next()
            .is_some()
    })
}

/// True iff two agents exchange positions over one grid edge in one step.
pub fn has_swap_conflict(paths: &[Vec<(i32, i32)>]) -> bool {
    for t in 1..max_len(paths) {
        let mut used: FxHashMap<((i32, i32), (i32, i32)), usize> = FxHashMap::default();
        for (i, path) in paths.iter().enumerate().filter(|(_, p)| !p.is_empty()) {
            let prev = position(path, t - 1);
            let curr = position(path, t);
            if let Some(&j) = used.get(&(curr, prev)) {
                if j != i {
                    return true;
                }
            }
            used.insert((prev, curr), i);
        }
    }
    false
}

/// Every consecutive pair of positions is either equal or 4-adjacent.
pub fn steps_are_moves_or_waits(paths: &[Vec<(i32, i32)>]) -> bool {
    paths.iter().all(|path| {
        path.windows(2).all(|pair| {
            let (a, b) = (pair[0], pair[1]);
            a == b || (a.0 - b.0).abs() + (a.1 - b.1).abs() == 1
        })
    })
}

/// No schedule stands on a reserved (cell, t).
pub fn respects_cell_reservations(
    paths: &[Vec<(i32, i32)>],
    reserved_cells: &[(i32, i32, i32)],
) -> bool {
    reserved_cells.iter().all(|&(x, y, t)| {
        t < 0
            || !paths
                .iter()
                .filter(|p| !p.is_empty())
                .any(|p| position(p, t as usize) == (x, y))
    })
}

/// No schedule crosses a reserved edge (in either direction) at its slot.
pub fn respects_edge_reservations(
    paths: &[Vec<(i32, i32)>],
    reserved_edges: &[(i32, i32, i32, i32, i32)],
) -> bool {
    reserved_edges.iter().all(|&(x1, y1, x2, y2, t)| {
        if t < 0 {
            return true;
        }
        let (a, b) = ((x1, y1), (x2, y2));
        !paths.iter().filter(|p| !p.is_empty()).any(|p| {
            let step = (position(p, t as usize), position(p, t as usize + 1));
            step == (a, b) || step == (b, a)
        })
    })
}

/// Every step of a rotation-aware schedule is a wait (same cell, same
/// facing), a 90° rotation (same cell, perpendicular facing), or a forward
/// move into the faced neighbor (facing kept).
pub fn rotation_steps_valid(paths: &[Vec<(i32, i32)>], dirs: &[Vec<Direction>]) -> bool {
    if paths.len() != dirs.len() {
        return false;
    }
    paths.iter().zip(dirs).all(|(path, facing)| {
        if path.len() != facing.len() {
            return false;
        }
        (1..path.len()).all(|t| {
            let (prev, curr) = (path[t - 1], path[t]);
            let (d_prev, d_curr) = (facing[t - 1], facing[t]);
            if prev == curr {
                d_prev == d_curr || d_prev.perpendicular().contains(&d_curr)
            } else {
                d_prev == d_curr && Direction::between(prev, curr) == Some(d_prev)
            }
        })
    })
}
