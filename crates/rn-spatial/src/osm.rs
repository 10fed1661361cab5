//! Build a [`RoadNetwork`] from an OSM PBF extract.
//!
//! Two passes over the file: ways first (collecting the referenced node
//! ids), then nodes (keeping only referenced ones).  Graph node indices
//! follow the order in which nodes are found in the node pass.

use std::path::Path;
use std::time::Instant;

use log::{debug, info};

use rn_core::{GeoPoint, LongIntMap, NodeId};
use rn_pbf::{read_nodes, read_ways, WayFilter, WayRecord};

use crate::network::{RoadNetwork, RoadNetworkBuilder};
use crate::SpatialResult;

/// Maps OSM node ids to dense graph indices and turns way records into
/// directed edges.
pub struct NetworkAssembler {
    builder:       RoadNetworkBuilder,
    index:         LongIntMap,
    dropped_pairs: usize,
}

impl NetworkAssembler {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            builder:       RoadNetworkBuilder::with_capacity(nodes, nodes * 2),
            index:         LongIntMap::with_capacity(nodes),
            dropped_pairs: 0,
        }
    }

    /// Register a map node.  A repeated id keeps its first position.
    pub fn add_node(&mut self, osm_id: i64, pos: GeoPoint) -> NodeId {
        if let Some(i) = self.index.get(osm_id) {
            return NodeId(i);
        }
        let id = self.builder.add_node(pos);
        self.index.insert(osm_id, id.0);
        id
    }

    pub fn node_index(&self, osm_id: i64) -> Option<NodeId> {
        self.index.get(osm_id).map(NodeId)
    }

    /// Emit edges for each consecutive pair of `way.refs` whose endpoints
    /// are both known.  Returns the number of directed edges added.
    pub fn add_way(&mut self, way: &WayRecord) -> usize {
        let mut added = 0;
        for pair in way.refs.windows(2) {
            match (self.node_index(pair[0]), self.node_index(pair[1])) {
                (Some(a), Some(b)) => added += self.builder.add_segment(a, b, way.direction),
                _ => self.dropped_pairs += 1,
            }
        }
        added
    }

    /// Consecutive pairs skipped so far because an endpoint was missing.
    pub fn dropped_pairs(&self) -> usize {
        self.dropped_pairs
    }

    pub fn finish(self) -> RoadNetwork {
        self.builder.build()
    }
}

impl Default for NetworkAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the extract at `path` and assemble its routable road network.
pub fn load_from_pbf(path: &Path, filter: WayFilter) -> SpatialResult<RoadNetwork> {
    let t0 = Instant::now();
    info!("building road graph from {}", path.display());

    let pass = read_ways(path, filter)?;
    let mut asm = NetworkAssembler::with_capacity(pass.referenced.len());
    read_nodes(path, &pass.referenced, |id, pos| {
        asm.add_node(id, pos);
    })?;
    drop(pass.referenced);

    for way in &pass.ways {
        asm.add_way(way);
    }
    if asm.dropped_pairs() > 0 {
        debug!("{} way segments skipped for unresolved nodes", asm.dropped_pairs());
    }

    let network = asm.finish();
    info!(
        "road graph: {} nodes, {} edges in {:.2}s",
        network.node_count(),
        network.edge_count(),
        t0.elapsed().as_secs_f64(),
    );
    Ok(network)
}
