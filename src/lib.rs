//! Time-expanded multi-commodity path planning on 4-connected grids.
//!
//! Given a grid of passable/blocked cells, agent start positions, a pool
//! of target cells with capacities and a horizon T, the planner computes a
//! collision-free schedule assigning every agent a position for each
//! t in [0, T] such that all agents end on targets, no cell is shared at
//! any time, and no grid edge is crossed in both directions during the
//! same slot. Feasibility is decided by a unit-capacity max-flow over a
//! time-expanded network; per-agent paths are decoded from the residual
//! graph afterwards.
//!
//! Entry points: [`planner::plan_flow`], [`planner::plan_flow_sync`]
//! (rendezvous on pickup cells at a fixed time) and
//! [`planner::plan_flow_rot`] (agents carry a facing and may wait, rotate
//! 90°, or move forward).

pub mod expansion;
pub mod extract;
pub mod flow;
pub mod grid;
pub mod logging;
pub mod planner;
pub mod pruning;
pub mod validate;

pub use flow::FlowMethod;
pub use grid::{Direction, GridGraph, Node, Time};
pub use planner::{
    plan_flow, plan_flow_rot, plan_flow_sync, reservations_from_paths, PlanError, PlanResult,
};
