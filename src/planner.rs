//! Top-level planning entry points.
//!
//! Each façade validates its inputs, prunes the time expansion, populates
//! the selected max-flow engine, and accepts the instance iff the flow
//! value equals the number of agents. Infeasibility is an answer, not an
//! error: only an unknown engine name or a ragged grid aborts the call.

use crate::expansion::{build_plain, build_rotation, build_sync};
use crate::extract::extract_routes;
use crate::flow::FlowMethod;
use crate::grid::{Direction, GridGraph, Node, Time};
use crate::pruning::ActivityMap;
use log::{debug, info};
use thiserror::Error;

/// Domain errors. Everything data-dependent is reported through
/// [`PlanResult::feasible`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("unknown flow method {0:?} (expected \"dinic\" or \"hlpp\")")]
    UnknownMethod(String),
    #[error("grid row {row} has width {found}, expected {expected}")]
    RaggedGrid {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Outcome of a planning call. On success `paths[i]` holds agent i's
/// position for every t in [0, T]; `path_dirs` is filled by the
/// rotation-aware variant only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanResult {
    pub feasible: bool,
    pub paths: Vec<Vec<(i32, i32)>>,
    pub path_dirs: Vec<Vec<Direction>>,
}

impl PlanResult {
    fn infeasible() -> Self {
        Self {
            feasible: false,
            paths: Vec::new(),
            path_dirs: Vec::new(),
        }
    }

    fn trivial() -> Self {
        Self {
            feasible: true,
            paths: Vec::new(),
            path_dirs: Vec::new(),
        }
    }
}

fn resolve_ids(grid: &GridGraph, coords: &[(i32, i32)]) -> Option<Vec<Node>> {
    coords.iter().map(|&(x, y)| grid.id(x, y)).collect()
}

fn normalize_caps(caps: &[i32], targets: usize) -> Option<Vec<i32>> {
    if caps.is_empty() {
        Some(vec![1; targets])
    } else if caps.len() == targets {
        Some(caps.to_vec())
    } else {
        None
    }
}

fn starts_active(activity: &ActivityMap, start_ids: &[Node]) -> bool {
    let ok = start_ids.iter().all(|&s| activity.active(s, 0));
    if !ok {
        info!("some start cannot reach any target within the horizon");
    }
    ok
}

/// Plans collision-free, swap-free paths from `starts` to the target pool.
///
/// `cells` uses 0 for passable and nonzero for blocked; `target_caps` must
/// match `targets` in length (empty means one unit each); `reserved_cells`
/// entries `(x, y, t)` forbid a cell at one time step and `reserved_edges`
/// entries `(x1, y1, x2, y2, t)` forbid both crossings of an undirected
/// edge during slot t. `method` selects the flow engine, case-insensitive;
/// the empty string picks the default.
#[allow(clippy::too_many_arguments)]
pub fn plan_flow(
    cells: &[Vec<i32>],
    starts: &[(i32, i32)],
    targets: &[(i32, i32)],
    target_caps: &[i32],
    horizon: Time,
    reserved_cells: &[(i32, i32, i32)],
    reserved_edges: &[(i32, i32, i32, i32, i32)],
    method: &str,
) -> Result<PlanResult, PlanError> {
    let method: FlowMethod = method.parse()?;
    let grid = GridGraph::from_cells(cells)?;
    if starts.is_empty() {
        return Ok(PlanResult::trivial());
    }
    if grid.node_count() == 0 {
        return Ok(PlanResult::infeasible());
    }

    let caps = match normalize_caps(target_caps, targets.len()) {
        Some(caps) => caps,
        None => return Ok(PlanResult::infeasible()),
    };
    let (start_ids, target_ids) = match (resolve_ids(&grid, starts), resolve_ids(&grid, targets)) {
        (Some(s), Some(t)) => (s, t),
        _ => return Ok(PlanResult::infeasible()),
    };

    let activity = ActivityMap::new(&grid, &start_ids, &target_ids, horizon);
    if !starts_active(&activity, &start_ids) {
        return Ok(PlanResult::infeasible());
    }

    let (mut net, expansion) = build_plain(
        method,
        &grid,
        &activity,
        &start_ids,
        &target_ids,
        &caps,
        horizon,
        reserved_cells,
        reserved_edges,
    );
    let flow = net.max_flow(expansion.source, expansion.sink);
    debug!("plan_flow: flow {} of {} agents", flow, start_ids.len());
    if flow != start_ids.len() as i64 {
        return Ok(PlanResult::infeasible());
    }

    let routes = extract_routes(net.as_mut(), &grid, &expansion, horizon);
    Ok(PlanResult {
        feasible: true,
        paths: routes.into_iter().map(|r| r.cells).collect(),
        path_dirs: Vec::new(),
    })
}

/// Synchronized-rendezvous variant: every agent must stand on some pickup
/// cell at time `tau` and on some drop cell at time T; drops absorb agents
/// only at the final step, `drop_caps[j]` of them at most.
#[allow(clippy::too_many_arguments)]
pub fn plan_flow_sync(
    cells: &[Vec<i32>],
    starts: &[(i32, i32)],
    pickups: &[(i32, i32)],
    drops: &[(i32, i32)],
    drop_caps: &[i32],
    horizon: Time,
    tau: Time,
    method: &str,
) -> Result<PlanResult, PlanError> {
    let method: FlowMethod = method.parse()?;
    let grid = GridGraph::from_cells(cells)?;
    if starts.is_empty() {
        return Ok(PlanResult::trivial());
    }
    if tau > horizon || pickups.is_empty() || grid.node_count() == 0 {
        return Ok(PlanResult::infeasible());
    }

    let caps = match normalize_caps(drop_caps, drops.len()) {
        Some(caps) => caps,
        None => return Ok(PlanResult::infeasible()),
    };
    let ids = (
        resolve_ids(&grid, starts),
        resolve_ids(&grid, pickups),
        resolve_ids(&grid, drops),
    );
    let (start_ids, pickup_ids, drop_ids) = match ids {
        (Some(s), Some(p), Some(d)) => (s, p, d),
        _ => return Ok(PlanResult::infeasible()),
    };
    let mut pickup_mask = vec![false; grid.node_count()];
    for &p in &pickup_ids {
        pickup_mask[p as usize] = true;
    }

    let activity =
        ActivityMap::with_pickup_gate(&grid, &start_ids, &drop_ids, &pickup_ids, horizon, tau);
    if !starts_active(&activity, &start_ids) {
        return Ok(PlanResult::infeasible());
    }

    let (mut net, expansion) = build_sync(
        method,
        &grid,
        &activity,
        &start_ids,
        &drop_ids,
        &caps,
        &pickup_mask,
        horizon,
        tau,
    );
    let flow = net.max_flow(expansion.source, expansion.sink);
    debug!(
        "plan_flow_sync: flow {} of {} agents (tau {})",
        flow,
        start_ids.len(),
        tau
    );
    if flow != start_ids.len() as i64 {
        return Ok(PlanResult::infeasible());
    }

    let routes = extract_routes(net.as_mut(), &grid, &expansion, horizon);
    Ok(PlanResult {
        feasible: true,
        paths: routes.into_iter().map(|r| r.cells).collect(),
        path_dirs: Vec::new(),
    })
}

/// Rotation-aware variant: agents carry a facing and per step either wait,
/// rotate 90°, or move forward into the faced neighbor. Returns the facing
/// sequence of each agent alongside its path.
#[allow(clippy::too_many_arguments)]
pub fn plan_flow_rot(
    cells: &[Vec<i32>],
    starts: &[(i32, i32)],
    start_dirs: &[Direction],
    targets: &[(i32, i32)],
    target_caps: &[i32],
    horizon: Time,
    reserved_cells: &[(i32, i32, i32)],
    reserved_edges: &[(i32, i32, i32, i32, i32)],
    method: &str,
) -> Result<PlanResult, PlanError> {
    let method: FlowMethod = method.parse()?;
    let grid = GridGraph::from_cells(cells)?;
    if starts.is_empty() {
        return Ok(PlanResult::trivial());
    }
    if start_dirs.len() != starts.len() || grid.node_count() == 0 {
        return Ok(PlanResult::infeasible());
    }

    let caps = match normalize_caps(target_caps, targets.len()) {
        Some(caps) => caps,
        None => return Ok(PlanResult::infeasible()),
    };
    let (start_ids, target_ids) = match (resolve_ids(&grid, starts), resolve_ids(&grid, targets)) {
        (Some(s), Some(t)) => (s, t),
        _ => return Ok(PlanResult::infeasible()),
    };

    // position-based pruning stays valid: rotation only delays agents
    let activity = ActivityMap::new(&grid, &start_ids, &target_ids, horizon);
    if !starts_active(&activity, &start_ids) {
        return Ok(PlanResult::infeasible());
    }

    let (mut net, expansion) = build_rotation(
        method,
        &grid,
        &activity,
        &start_ids,
        start_dirs,
        &target_ids,
        &caps,
        horizon,
        reserved_cells,
        reserved_edges,
    );
    let flow = net.max_flow(expansion.source, expansion.sink);
    debug!("plan_flow_rot: flow {} of {} agents", flow, start_ids.len());
    if flow != start_ids.len() as i64 {
        return Ok(PlanResult::infeasible());
    }

    let routes = extract_routes(net.as_mut(), &grid, &expansion, horizon);
    let (paths, path_dirs) = routes.into_iter().map(|r| (r.cells, r.dirs)).unzip();
    Ok(PlanResult {
        feasible: true,
        paths,
        path_dirs,
    })
}

/// Derives the reservations a later planning wave must respect so that it
/// stays out of the way of already-planned paths: every visited (cell, t)
/// and every traversed edge at its slot.
pub fn reservations_from_paths(
    paths: &[Vec<(i32, i32)>],
) -> (Vec<(i32, i32, i32)>, Vec<(i32, i32, i32, i32, i32)>) {
    let mut cells = Vec::new();
    let mut edges = Vec::new();
    for path in paths {
        for (t, &(x, y)) in path.iter().enumerate() {
            cells.push((x, y, t as i32));
        }
        for (t, pair) in path.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            if a != b {
                edges.push((a.0, a.1, b.0, b.1, t as i32));
            }
        }
    }
    (cells, edges)
}
