//! Unit-capacity max-flow on a directed residual graph.
//!
//! Two interchangeable engines are provided: [`Dinic`] (the default) and
//! [`Hlpp`]. Both store the same adjacency representation with explicit
//! paired reverse edges, so callers can inspect and mutate residuals after
//! the solve without knowing which engine produced them.

pub mod dinic;
pub mod hlpp;

pub use dinic::Dinic;
pub use hlpp::Hlpp;

use crate::grid::Node;
use crate::planner::PlanError;
use std::str::FromStr;

/// A directed residual edge. Forward edges carry `original_cap > 0`; their
/// paired reverse edges are created with both capacities 0 and are linked
/// through `rev` (the index of the partner inside `to`'s adjacency).
#[derive(Debug, Clone, Copy)]
pub struct FlowEdge {
    pub to: Node,
    pub rev: u32,
    pub cap: i32,
    pub original_cap: i32,
}

impl FlowEdge {
    /// Units of flow currently routed over this edge. Reverse edges have
    /// `original_cap == 0` and never report used flow.
    pub fn used_flow(&self) -> i32 {
        (self.original_cap - self.cap).max(0)
    }
}

/// Common interface of the max-flow engines.
pub trait FlowNetwork {
    /// Adds a forward edge u -> v with the given capacity and its paired
    /// reverse edge v -> u with capacity 0.
    fn add_edge(&mut self, u: Node, v: Node, cap: i32);

    /// Computes the maximum s-t flow. Afterwards the adjacency exposed by
    /// [`FlowNetwork::graph`] holds the converged residual capacities.
    fn max_flow(&mut self, s: Node, t: Node) -> i64;

    fn graph(&self) -> &[Vec<FlowEdge>];

    fn graph_mut(&mut self) -> &mut [Vec<FlowEdge>];
}

pub(crate) fn push_edge_pair(g: &mut [Vec<FlowEdge>], u: Node, v: Node, cap: i32) {
    let forward = FlowEdge {
        to: v,
        rev: g[v as usize].len() as u32,
        cap,
        original_cap: cap,
    };
    let backward = FlowEdge {
        to: u,
        rev: g[u as usize].len() as u32,
        cap: 0,
        original_cap: 0,
    };
    g[u as usize].push(forward);
    g[v as usize].push(backward);
}

/// Engine selector. Parsing is case-insensitive; the empty string selects
/// the default engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMethod {
    Dinic,
    Hlpp,
}

impl Default for FlowMethod {
    fn default() -> Self {
        FlowMethod::Dinic
    }
}

impl FromStr for FlowMethod {
    type Err = PlanError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "" | "dinic" => Ok(FlowMethod::Dinic),
            "hlpp" => Ok(FlowMethod::Hlpp),
            _ => Err(PlanError::UnknownMethod(name.to_string())),
        }
    }
}

impl FlowMethod {
    /// Instantiates an empty engine over `n` nodes.
    pub fn new_network(self, n: usize) -> Box<dyn FlowNetwork> {
        match self {
            FlowMethod::Dinic => Box::new(Dinic::new(n)),
            FlowMethod::Hlpp => Box::new(Hlpp::new(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("" => FlowMethod::Dinic; "empty")]
    #[test_case("dinic" => FlowMethod::Dinic; "dinic_lower")]
    #[test_case("DiNiC" => FlowMethod::Dinic; "dinic_mixed")]
    #[test_case("hlpp" => FlowMethod::Hlpp; "hlpp_lower")]
    #[test_case("HLPP" => FlowMethod::Hlpp; "hlpp_upper")]
    fn parse_method(name: &str) -> FlowMethod {
        name.parse().unwrap()
    }

    #[test]
    fn parse_unknown_method() {
        let err = "simplex".parse::<FlowMethod>().unwrap_err();
        assert!(matches!(err, PlanError::UnknownMethod(name) if name == "simplex"));
    }

    #[test]
    fn edge_pairs_are_linked() {
        let mut g = vec![Vec::new(); 3];
        push_edge_pair(&mut g, 0, 1, 2);
        push_edge_pair(&mut g, 1, 2, 1);
        push_edge_pair(&mut g, 0, 2, 1);

        for (u, adj) in g.iter().enumerate() {
            for e in adj {
                let partner = &g[e.to as usize][e.rev as usize];
                assert_eq!(partner.to, u as Node);
                assert_eq!(g[partner.to as usize][partner.rev as usize].to, e.to);
                assert_eq!(e.cap + partner.cap, e.original_cap + partner.original_cap);
            }
        }
    }

    #[test]
    fn used_flow_ignores_reverse_edges() {
        let e = FlowEdge {
            to: 1,
            rev: 0,
            cap: 3,
            original_cap: 0,
        };
        assert_eq!(e.used_flow(), 0);
        let f = FlowEdge {
            to: 1,
            rev: 0,
            cap: 0,
            original_cap: 1,
        };
        assert_eq!(f.used_flow(), 1);
    }

    /// Every engine must agree on the flow value and leave per-edge
    /// `used_flow` consistent with conservation at inner nodes.
    #[test_case(FlowMethod::Dinic)]
    #[test_case(FlowMethod::Hlpp)]
    fn engines_agree_on_diamond(method: FlowMethod) {
        //        /-> 1 -\
        // (s) 0 =        => 3 (t), plus a cross edge 1 -> 2
        let mut net = method.new_network(4);
        net.add_edge(0, 1, 1);
        net.add_edge(0, 2, 1);
        net.add_edge(1, 3, 1);
        net.add_edge(2, 3, 1);
        net.add_edge(1, 2, 1);
        assert_eq!(net.max_flow(0, 3), 2);

        for (u, adj) in net.graph().iter().enumerate() {
            let u = u as Node;
            if u == 0 || u == 3 {
                continue;
            }
            let inflow: i32 = net
                .graph()
                .iter()
                .flat_map(|a| a.iter())
                .filter(|e| e.to == u)
                .map(|e| e.used_flow())
                .sum();
            let outflow: i32 = adj.iter().map(|e| e.used_flow()).sum();
            assert_eq!(inflow, outflow);
        }
    }
}
