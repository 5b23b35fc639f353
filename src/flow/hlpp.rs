use super::{push_edge_pair, FlowEdge, FlowNetwork};
use crate::grid::Node;
use std::collections::VecDeque;

/// Highest-label preflow-push.
///
/// Heights are seeded by a reverse BFS from the sink (the initial global
/// relabel), the source is lifted to `n`, and all source edges are
/// saturated. Nodes with excess are discharged highest-first out of
/// per-height buckets; the gap heuristic retires every node above an
/// emptied height layer by lifting it to `2n`.
pub struct Hlpp {
    n: usize,
    s: Node,
    t: Node,
    max_height: usize,
    inf_height: usize,
    g: Vec<Vec<FlowEdge>>,
    height: Vec<usize>,
    excess: Vec<i64>,
    active: Vec<bool>,
    current: Vec<usize>,
    count: Vec<u32>,
    buckets: Vec<Vec<Node>>,
}

impl Hlpp {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            s: 0,
            t: 0,
            max_height: 0,
            inf_height: 2 * n,
            g: vec![Vec::new(); n],
            height: Vec::new(),
            excess: Vec::new(),
            active: Vec::new(),
            current: Vec::new(),
            count: Vec::new(),
            buckets: Vec::new(),
        }
    }

    fn add_active(&mut self, v: Node) {
        let vi = v as usize;
        if v == self.s || v == self.t || self.active[vi] {
            return;
        }
        if self.excess[vi] <= 0 || self.height[vi] >= self.inf_height {
            return;
        }
        self.active[vi] = true;
        self.buckets[self.height[vi]].push(v);
        if self.height[vi] > self.max_height {
            self.max_height = self.height[vi];
        }
    }

    fn pop_active(&mut self) -> Option<Node> {
        loop {
            if let Some(v) = self.buckets[self.max_height].pop() {
                self.active[v as usize] = false;
                return Some(v);
            }
            if self.max_height == 0 {
                return None;
            }
            self.max_height -= 1;
        }
    }

    fn push(&mut self, u: Node, i: usize) {
        let ui = u as usize;
        let e = self.g[ui][i];
        if self.excess[ui] <= 0 || e.cap <= 0 {
            return;
        }
        let send = self.excess[ui].min(e.cap as i64) as i32;
        if send <= 0 {
            return;
        }
        self.g[ui][i].cap -= send;
        self.g[e.to as usize][e.rev as usize].cap += send;
        self.excess[ui] -= send as i64;
        self.excess[e.to as usize] += send as i64;
        if e.to != self.s && e.to != self.t && self.excess[e.to as usize] == send as i64 {
            self.add_active(e.to);
        }
    }

    fn relabel(&mut self, v: Node) {
        let vi = v as usize;
        let old_height = self.height[vi];
        let mut min_height = self.inf_height;
        for e in &self.g[vi] {
            if e.cap > 0 {
                min_height = min_height.min(self.height[e.to as usize]);
            }
        }
        let new_height = if min_height >= self.inf_height {
            self.inf_height
        } else {
            min_height + 1
        };
        self.height[vi] = new_height;
        self.current[vi] = 0;
        self.count[old_height] -= 1;
        self.count[new_height] += 1;

        // gap heuristic: an emptied layer below n disconnects everything
        // strictly above it from the sink
        if old_height < self.n && self.count[old_height] == 0 {
            for i in 0..self.n {
                if self.height[i] > old_height && self.height[i] < self.inf_height {
                    self.count[self.height[i]] -= 1;
                    self.height[i] = self.inf_height;
                    self.active[i] = false;
                }
            }
        }
    }

    fn global_relabel(&mut self, s: Node, t: Node) {
        self.height.iter_mut().for_each(|h| *h = self.inf_height);
        let mut queue = VecDeque::new();
        self.height[t as usize] = 0;
        queue.push_back(t);
        while let Some(v) = queue.pop_front() {
            for i in 0..self.g[v as usize].len() {
                let e = self.g[v as usize][i];
                // walk residual arcs backwards: e.to can reach v iff the
                // paired reverse edge has residual capacity
                if self.g[e.to as usize][e.rev as usize].cap <= 0 {
                    continue;
                }
                if self.height[e.to as usize] != self.inf_height {
                    continue;
                }
                self.height[e.to as usize] = self.height[v as usize] + 1;
                queue.push_back(e.to);
            }
        }
        self.height[s as usize] = self.n;
    }
}

impl FlowNetwork for Hlpp {
    fn add_edge(&mut self, u: Node, v: Node, cap: i32) {
        push_edge_pair(&mut self.g, u, v, cap);
    }

    fn max_flow(&mut self, s: Node, t: Node) -> i64 {
        if s == t {
            return 0;
        }
        self.s = s;
        self.t = t;
        self.inf_height = 2 * self.n;
        self.height = vec![0; self.n];
        self.excess = vec![0; self.n];
        self.active = vec![false; self.n];
        self.current = vec![0; self.n];
        self.count = vec![0; self.inf_height + 1];
        self.buckets = vec![Vec::new(); self.inf_height + 1];
        self.max_height = 0;

        self.global_relabel(s, t);
        for i in 0..self.n {
            self.count[self.height[i]] += 1;
        }

        for i in 0..self.g[s as usize].len() {
            let e = self.g[s as usize][i];
            if e.cap <= 0 {
                continue;
            }
            let send = e.cap;
            self.g[s as usize][i].cap = 0;
            self.g[e.to as usize][e.rev as usize].cap += send;
            self.excess[e.to as usize] += send as i64;
            self.excess[s as usize] -= send as i64;
            self.add_active(e.to);
        }

        while let Some(v) = self.pop_active() {
            let vi = v as usize;
            while self.excess[vi] > 0 {
                if self.current[vi] >= self.g[vi].len() {
                    self.relabel(v);
                    if self.height[vi] >= self.inf_height {
                        break;
                    }
                    continue;
                }
                let e = self.g[vi][self.current[vi]];
                if e.cap > 0 && self.height[vi] == self.height[e.to as usize] + 1 {
                    self.push(v, self.current[vi]);
                } else {
                    self.current[vi] += 1;
                }
            }
            if self.excess[vi] > 0 {
                self.add_active(v);
            }
        }

        self.excess[t as usize]
    }

    fn graph(&self) -> &[Vec<FlowEdge>] {
        &self.g
    }

    fn graph_mut(&mut self) -> &mut [Vec<FlowEdge>] {
        &mut self.g
    }
}
