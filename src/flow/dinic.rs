use super::{push_edge_pair, FlowEdge, FlowNetwork};
use crate::grid::Node;
use std::collections::VecDeque;

const INF: i32 = i32::MAX;

/// Dinic's algorithm: repeatedly build a BFS level graph from the source
/// and saturate it with blocking flow found by DFS. The per-node `iter`
/// pointer makes sure each DFS pass never revisits a saturated edge.
pub struct Dinic {
    g: Vec<Vec<FlowEdge>>,
    level: Vec<i32>,
    iter: Vec<usize>,
}

impl Dinic {
    pub fn new(n: usize) -> Self {
        Self {
            g: vec![Vec::new(); n],
            level: vec![-1; n],
            iter: vec![0; n],
        }
    }

    fn bfs(&mut self, s: Node, t: Node) -> bool {
        self.level.iter_mut().for_each(|l| *l = -1);
        let mut queue = VecDeque::new();
        self.level[s as usize] = 0;
        queue.push_back(s);
        while let Some(v) = queue.pop_front() {
            for e in &self.g[v as usize] {
                if e.cap > 0 && self.level[e.to as usize] < 0 {
                    self.level[e.to as usize] = self.level[v as usize] + 1;
                    queue.push_back(e.to);
                }
            }
        }
        self.level[t as usize] >= 0
    }

    fn dfs(&mut self, v: Node, t: Node, f: i32) -> i32 {
        if v == t {
            return f;
        }
        while self.iter[v as usize] < self.g[v as usize].len() {
            let i = self.iter[v as usize];
            let e = self.g[v as usize][i];
            if e.cap > 0 && self.level[v as usize] + 1 == self.level[e.to as usize] {
                let pushed = self.dfs(e.to, t, f.min(e.cap));
                if pushed > 0 {
                    self.g[v as usize][i].cap -= pushed;
                    self.g[e.to as usize][e.rev as usize].cap += pushed;
                    return pushed;
                }
            }
            self.iter[v as usize] += 1;
        }
        0
    }
}

impl FlowNetwork for Dinic {
    fn add_edge(&mut self, u: Node, v: Node, cap: i32) {
        push_edge_pair(&mut self.g, u, v, cap);
    }

    fn max_flow(&mut self, s: Node, t: Node) -> i64 {
        let mut flow = 0i64;
        while self.bfs(s, t) {
            self.iter.iter_mut().for_each(|i| *i = 0);
            loop {
                let pushed = self.dfs(s, t, INF);
                if pushed == 0 {
                    break;
                }
                flow += pushed as i64;
            }
        }
        flow
    }

    fn graph(&self) -> &[Vec<FlowEdge>] {
        &self.g
    }

    fn graph_mut(&mut self) -> &mut [Vec<FlowEdge>] {
        &mut self.g
    }
}
