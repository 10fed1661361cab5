//! A* shortest-path search with reusable, generation-stamped scratch state.
//!
//! # Scratch reuse
//!
//! `dist`, `prev`, `seen` and `closed` are sized to the node count once and
//! never cleared between queries.  Each query takes a fresh generation
//! number; a node's `dist`/`prev` entry counts only if its `seen` stamp
//! equals the current generation, and it is closed only if its `closed`
//! stamp does.  Starting a query is O(1) instead of O(n).
//!
//! # Heuristic
//!
//! Great-circle distance to the goal.  Edge weights are great-circle
//! distances between their endpoints, so by the triangle inequality the
//! heuristic is admissible and consistent, and the first time the goal is
//! popped its distance is optimal.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rn_core::{GeoPoint, NodeId};

use crate::network::RoadNetwork;

// ── Path ──────────────────────────────────────────────────────────────────────

/// The result of a search: node sequence from start to goal inclusive and
/// its total length.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub nodes:  Vec<NodeId>,
    pub cost_m: f64,
}

impl Path {
    /// `true` if start and goal are the same node.
    pub fn is_trivial(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn positions(&self, network: &RoadNetwork) -> Vec<GeoPoint> {
        self.nodes.iter().map(|&n| network.pos(n)).collect()
    }
}

// ── Priority queue entry ──────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
struct QueueEntry {
    f:    f64,
    node: NodeId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    /// Reversed so `BinaryHeap` (a max-heap) pops the lowest `f` first;
    /// `NodeId` breaks ties deterministically.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.node.cmp(&self.node))
    }
}

// ── AStar ─────────────────────────────────────────────────────────────────────

/// A* search state for one network.  Not `Sync`-shared: the engine wraps it
/// in a mutex so one search runs at a time.
pub struct AStar {
    dist:       Vec<f64>,
    prev:       Vec<NodeId>,
    seen:       Vec<u32>,
    closed:     Vec<u32>,
    generation: u32,
    heap:       BinaryHeap<QueueEntry>,
}

impl AStar {
    /// Scratch arrays for a network of `node_count` nodes.  All stamps start
    /// at 0 and the first query uses generation 1.
    pub fn new(node_count: usize) -> Self {
        Self {
            dist:       vec![f64::INFINITY; node_count],
            prev:       vec![NodeId::INVALID; node_count],
            seen:       vec![0; node_count],
            closed:     vec![0; node_count],
            generation: 0,
            heap:       BinaryHeap::new(),
        }
    }

    pub fn for_network(network: &RoadNetwork) -> Self {
        Self::new(network.node_count())
    }

    /// Generation of the most recent query.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Advance to a fresh generation.  On wrap-around the stamp arrays are
    /// cleared once so no stale stamp can match.
    fn next_generation(&mut self) -> u32 {
        if self.generation == u32::MAX {
            self.seen.fill(0);
            self.closed.fill(0);
            self.generation = 0;
        }
        self.generation += 1;
        self.generation
    }

    #[cfg(test)]
    pub(crate) fn set_generation(&mut self, generation: u32) {
        self.generation = generation;
    }

    #[inline]
    fn dist(&self, node: NodeId, generation: u32) -> f64 {
        if self.seen[node.index()] == generation {
            self.dist[node.index()]
        } else {
            f64::INFINITY
        }
    }

    #[inline]
    fn prev(&self, node: NodeId, generation: u32) -> NodeId {
        if self.seen[node.index()] == generation {
            self.prev[node.index()]
        } else {
            NodeId::INVALID
        }
    }

    #[inline]
    fn record(&mut self, node: NodeId, dist: f64, prev: NodeId, generation: u32) {
        self.dist[node.index()] = dist;
        self.prev[node.index()] = prev;
        self.seen[node.index()] = generation;
    }

    /// Shortest path from `start` to `goal`.
    ///
    /// Returns `None` if no path exists, either endpoint is not a node of
    /// `network`, or the path length is not finite.
    pub fn shortest_path(&mut self, network: &RoadNetwork, start: NodeId, goal: NodeId) -> Option<Path> {
        let n = network.node_count();
        if start.index() >= n || goal.index() >= n {
            return None;
        }
        if self.seen.len() != n {
            *self = Self::new(n);
        }

        let generation = self.next_generation();
        let goal_pos = network.pos(goal);
        let h = |node: NodeId| network.pos(node).distance_m(goal_pos);

        self.heap.clear();
        self.record(start, 0.0, NodeId::INVALID, generation);
        self.heap.push(QueueEntry { f: h(start), node: start });

        while let Some(QueueEntry { node: u, .. }) = self.heap.pop() {
            if self.closed[u.index()] == generation {
                continue;
            }
            self.closed[u.index()] = generation;

            if u == goal {
                return self.reconstruct(goal, generation);
            }

            let dist_u = self.dist(u, generation);
            for e in network.out_edges(u) {
                let v = network.edge_to[e.index()];
                let cand = dist_u + network.edge_weight_m[e.index()];
                if cand < self.dist(v, generation) {
                    self.record(v, cand, u, generation);
                    self.heap.push(QueueEntry { f: cand + h(v), node: v });
                }
            }
        }
        None
    }

    fn reconstruct(&self, goal: NodeId, generation: u32) -> Option<Path> {
        let cost_m = self.dist(goal, generation);
        if !cost_m.is_finite() {
            return None;
        }
        let mut nodes = Vec::new();
        let mut at = goal;
        while at.is_valid() {
            nodes.push(at);
            at = self.prev(at, generation);
        }
        nodes.reverse();
        Some(Path { nodes, cost_m })
    }
}
