//! Road network representation and builder.
//!
//! # Data layout
//!
//! Outgoing edges are kept as singly linked lists threaded through flat
//! arrays.  For a node `n`:
//!
//! ```text
//! e = head[n]; while e != INVALID { visit(edge_to[e], edge_weight_m[e]); e = edge_next[e] }
//! ```
//!
//! `EdgeId::INVALID` terminates every list.  New edges are prepended, so
//! the order of a node's outgoing edges carries no meaning.  All arrays are
//! frozen once the network is built; no per-edge allocation, no pointers.
//!
//! # Spatial index
//!
//! A uniform [`GridIndex`] maps `(lat, lon)` to the nearest `NodeId`.  Used
//! to snap query endpoints to road nodes.

use rn_core::{EdgeId, GeoPoint, NodeId};
use rn_pbf::Direction;

use crate::grid::GridIndex;

// ── RoadNetwork ───────────────────────────────────────────────────────────────

/// Directed road graph in head/next adjacency form plus a grid index for
/// node snapping.
///
/// All fields are `pub` for direct indexed access on hot paths.  Do not
/// construct directly; use [`RoadNetworkBuilder`] or the graph cache.
pub struct RoadNetwork {
    // ── Node data ─────────────────────────────────────────────────────────
    /// Geographic position of each node.  Indexed by `NodeId`.
    pub node_pos: Vec<GeoPoint>,

    /// First outgoing edge of each node, or `EdgeId::INVALID`.
    pub head: Vec<EdgeId>,

    // ── Edge data (indexed by EdgeId) ─────────────────────────────────────
    /// Destination node of each edge.
    pub edge_to: Vec<NodeId>,

    /// Next edge leaving the same source node, or `EdgeId::INVALID`.
    pub edge_next: Vec<EdgeId>,

    /// Great-circle length of each edge in metres.  Used as A* edge cost.
    pub edge_weight_m: Vec<f64>,

    // ── Spatial index ─────────────────────────────────────────────────────
    grid: GridIndex,
}

impl RoadNetwork {
    /// Construct an empty network with no nodes or edges.  Every query
    /// against it resolves to "no node" / "no path".
    pub fn empty() -> Self {
        RoadNetworkBuilder::new().build()
    }

    /// Assemble a network from raw arrays (e.g. decoded from the graph
    /// cache), checking every structural invariant first.
    ///
    /// Rejected: mismatched array lengths, non-finite coordinates, negative
    /// or non-finite weights, out-of-range indices, and adjacency lists that
    /// do not partition the edge set.  Every edge must be reached by walking
    /// some node's list, so each list is acyclic and sentinel-terminated.
    pub fn try_from_parts(
        node_pos:      Vec<GeoPoint>,
        head:          Vec<EdgeId>,
        edge_to:       Vec<NodeId>,
        edge_next:     Vec<EdgeId>,
        edge_weight_m: Vec<f64>,
    ) -> Result<Self, String> {
        let n = node_pos.len();
        let m = edge_to.len();
        if head.len() != n {
            return Err(format!("head has {} entries for {n} nodes", head.len()));
        }
        if edge_next.len() != m || edge_weight_m.len() != m {
            return Err("edge arrays differ in length".into());
        }
        if let Some(i) = node_pos.iter().position(|p| !p.is_finite()) {
            return Err(format!("node {i} has non-finite coordinates"));
        }
        if let Some(e) = edge_weight_m.iter().position(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(format!("edge {e} has invalid weight {}", edge_weight_m[e]));
        }
        if let Some(e) = edge_to.iter().position(|to| to.index() >= n) {
            return Err(format!("edge {e} points at missing node {}", edge_to[e].0));
        }

        // Each edge must be the target of exactly one head/next link.
        let mut referenced = vec![false; m];
        for &e in head.iter().chain(&edge_next) {
            if !e.is_valid() {
                continue;
            }
            match referenced.get_mut(e.index()) {
                None => return Err(format!("link to missing edge {}", e.0)),
                Some(true) => return Err(format!("edge {} linked twice", e.0)),
                Some(slot) => *slot = true,
            }
        }
        if let Some(e) = referenced.iter().position(|r| !r) {
            return Err(format!("edge {e} not linked from any list"));
        }

        // With every edge linked once, a `next` cycle that no head enters
        // still passes the check above.  Walking the lists finds it.
        let mut reached = 0usize;
        for &first in &head {
            let mut e = first;
            while e.is_valid() {
                reached += 1;
                if reached > m {
                    return Err("adjacency lists revisit an edge".into());
                }
                e = edge_next[e.index()];
            }
        }
        if reached != m {
            return Err(format!("{} edges sit on a cycle no node reaches", m - reached));
        }

        Ok(Self::from_parts_unchecked(node_pos, head, edge_to, edge_next, edge_weight_m))
    }

    fn from_parts_unchecked(
        node_pos:      Vec<GeoPoint>,
        head:          Vec<EdgeId>,
        edge_to:       Vec<NodeId>,
        edge_next:     Vec<EdgeId>,
        edge_weight_m: Vec<f64>,
    ) -> Self {
        let grid = GridIndex::build(&node_pos);
        Self { node_pos, head, edge_to, edge_next, edge_weight_m, grid }
    }

    // ── Graph dimensions ──────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_pos.is_empty()
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// Iterator over the `EdgeId`s of all outgoing edges from `node`.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> OutEdges<'_> {
        OutEdges { next: &self.edge_next, cur: self.head[node.index()] }
    }

    /// Out-degree of `node` (walks its list).
    pub fn out_degree(&self, node: NodeId) -> usize {
        self.out_edges(node).count()
    }

    #[inline]
    pub fn pos(&self, node: NodeId) -> GeoPoint {
        self.node_pos[node.index()]
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// Return the `NodeId` of the nearest road node to `pos`.
    ///
    /// Returns `None` if the network has no nodes, `pos` is not finite, or
    /// no node lies within the grid's search radius.
    pub fn snap_to_node(&self, pos: GeoPoint) -> Option<NodeId> {
        self.grid.nearest(&self.node_pos, pos)
    }

    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }
}

/// Walks one node's adjacency list.
pub struct OutEdges<'a> {
    next: &'a [EdgeId],
    cur:  EdgeId,
}

impl Iterator for OutEdges<'_> {
    type Item = EdgeId;

    #[inline]
    fn next(&mut self) -> Option<EdgeId> {
        if !self.cur.is_valid() {
            return None;
        }
        let e = self.cur;
        self.cur = self.next[e.index()];
        Some(e)
    }
}

// ── RoadNetworkBuilder ────────────────────────────────────────────────────────

/// Construct a [`RoadNetwork`] incrementally, then call [`build`](Self::build).
///
/// Each directed edge is prepended to its source node's list as it is added,
/// so `build()` only has to index the nodes spatially.
///
/// # Example
///
/// ```
/// use rn_core::GeoPoint;
/// use rn_spatial::RoadNetworkBuilder;
///
/// let mut b = RoadNetworkBuilder::new();
/// let a = b.add_node(GeoPoint::new(21.0285, 105.8542));
/// let c = b.add_node(GeoPoint::new(21.0301, 105.8519));
/// b.add_road(a, c, 300.0);
/// let net = b.build();
/// assert_eq!(net.node_count(), 2);
/// assert_eq!(net.edge_count(), 2); // bidirectional
/// ```
pub struct RoadNetworkBuilder {
    nodes:         Vec<GeoPoint>,
    head:          Vec<EdgeId>,
    edge_to:       Vec<NodeId>,
    edge_next:     Vec<EdgeId>,
    edge_weight_m: Vec<f64>,
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    /// Pre-allocate for the expected number of nodes and edges to reduce
    /// reallocations when bulk-loading from a map extract.
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            nodes:         Vec::with_capacity(nodes),
            head:          Vec::with_capacity(nodes),
            edge_to:       Vec::with_capacity(edges),
            edge_next:     Vec::with_capacity(edges),
            edge_weight_m: Vec::with_capacity(edges),
        }
    }

    /// Add a road node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, pos: GeoPoint) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(pos);
        self.head.push(EdgeId::INVALID);
        id
    }

    /// Add a **directed** edge from `from` to `to` with cost `weight_m`.
    pub fn add_directed_edge(&mut self, from: NodeId, to: NodeId, weight_m: f64) -> EdgeId {
        let e = EdgeId(self.edge_to.len() as u32);
        self.edge_to.push(to);
        self.edge_weight_m.push(weight_m);
        self.edge_next.push(self.head[from.index()]);
        self.head[from.index()] = e;
        e
    }

    /// Convenience: add edges in **both directions**.
    pub fn add_road(&mut self, a: NodeId, b: NodeId, weight_m: f64) {
        self.add_directed_edge(a, b, weight_m);
        self.add_directed_edge(b, a, weight_m);
    }

    /// Add the edges for one way segment `a → b`, weighted by great-circle
    /// distance.  Returns the number of directed edges added.
    pub fn add_segment(&mut self, a: NodeId, b: NodeId, direction: Direction) -> usize {
        let w = self.node_pos(a).distance_m(self.node_pos(b));
        match direction {
            Direction::Both => self.add_road(a, b, w),
            Direction::Forward => {
                self.add_directed_edge(a, b, w);
            }
            Direction::Reverse => {
                self.add_directed_edge(b, a, w);
            }
        }
        direction.edges_per_segment()
    }

    pub fn node_pos(&self, id: NodeId) -> GeoPoint {
        self.nodes[id.index()]
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn edge_count(&self) -> usize { self.edge_to.len() }

    /// Consume the builder and produce a [`RoadNetwork`].
    pub fn build(self) -> RoadNetwork {
        RoadNetwork::from_parts_unchecked(
            self.nodes,
            self.head,
            self.edge_to,
            self.edge_next,
            self.edge_weight_m,
        )
    }
}

impl Default for RoadNetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
