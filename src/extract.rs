//! Decodes per-agent paths out of a solved residual graph.
//!
//! Each agent consumes one source-to-sink unit: starting from its entry
//! in-node, the walk always takes the first adjacency edge that still
//! carries used flow, gives the unit back to the residual (so the next
//! agent cannot take the same edge), and records a position whenever a
//! vertex-capacity arc is crossed. The expansion is a DAG, so the walk
//! terminates; with flow == number of agents it always reaches the sink.

use crate::expansion::{Expansion, StateIndexer};
use crate::flow::FlowNetwork;
use crate::grid::{Direction, GridGraph, Time};

/// One decoded agent schedule; `dirs` is empty outside the rotation
/// variant, otherwise it is aligned with `cells`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRoute {
    pub cells: Vec<(i32, i32)>,
    pub dirs: Vec<Direction>,
}

/// Walks the residual graph once per agent, in input order, and pads each
/// schedule with its final entry to length `horizon + 1`.
pub fn extract_routes<I: StateIndexer>(
    net: &mut dyn FlowNetwork,
    grid: &GridGraph,
    expansion: &Expansion<I>,
    horizon: Time,
) -> Vec<AgentRoute> {
    let mut routes = Vec::with_capacity(expansion.entry_nodes.len());
    for &entry in &expansion.entry_nodes {
        let mut cells = Vec::with_capacity(horizon as usize + 1);
        let mut dirs = Vec::new();
        let mut cur = entry;
        while cur != expansion.sink {
            let g = net.graph_mut();
            let i = match g[cur as usize].iter().position(|e| e.used_flow() > 0) {
                Some(i) => i,
                None => break,
            };
            let e = g[cur as usize][i];
            if expansion.indexer.is_in_node(cur) && e.to == cur + 1 {
                let (cell, dir) = expansion.indexer.decode(cur);
                cells.push(grid.xy(cell));
                if let Some(d) = dir {
                    dirs.push(d);
                }
            }
            // hand the unit back so a later agent picks a different edge
            g[cur as usize][i].cap += 1;
            g[e.to as usize][e.rev as usize].cap -= 1;
            cur = e.to;
        }
        if let Some(&last) = cells.last() {
            while cells.len() < horizon as usize + 1 {
                cells.push(last);
            }
        }
        if let Some(&last) = dirs.last() {
            while dirs.len() < horizon as usize + 1 {
                dirs.push(last);
            }
        }
        routes.push(AgentRoute { cells, dirs });
    }
    routes
}
