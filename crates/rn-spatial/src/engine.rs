//! `RoutingEngine`: the query surface over one loaded road network.
//!
//! The network and its grid are immutable after construction.  The A*
//! scratch state is not, so every search runs under a mutex: at most one
//! path or distance query executes at a time per engine.  Separate engines
//! share nothing and may be used in parallel.

use std::fmt;
use std::time::Instant;

use log::{info, warn};
use parking_lot::Mutex;
use rand::Rng;

use rn_core::{EngineConfig, GeoPoint, NodeId};
use rn_pbf::WayFilter;

use crate::cache::{read_cache, write_cache};
use crate::network::RoadNetwork;
use crate::osm::load_from_pbf;
use crate::router::{AStar, Path};
use crate::SpatialResult;

/// Where the engine's graph came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GraphSource {
    /// Loaded from a valid cache file.
    Cache,
    /// Built from the map extract.
    Built,
}

impl fmt::Display for GraphSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GraphSource::Cache => "cache",
            GraphSource::Built => "built",
        })
    }
}

pub struct RoutingEngine {
    network: RoadNetwork,
    search:  Mutex<AStar>,
    source:  GraphSource,
}

impl RoutingEngine {
    /// Load the graph from the cache if it is valid, otherwise build it from
    /// the map extract and refresh the cache.
    ///
    /// Any cache problem falls back to a rebuild.  Errors reading or
    /// decoding the extract are fatal.
    pub fn init(config: &EngineConfig) -> SpatialResult<Self> {
        let t0 = Instant::now();
        let cache_path = config.cache_path();

        if cache_path.exists() {
            match read_cache(&cache_path) {
                Ok(network) => {
                    info!(
                        "loaded graph cache {}: {} nodes, {} edges in {:.2}s",
                        cache_path.display(),
                        network.node_count(),
                        network.edge_count(),
                        t0.elapsed().as_secs_f64(),
                    );
                    return Ok(Self::with_source(network, GraphSource::Cache));
                }
                Err(e) => warn!("ignoring graph cache {}: {e}", cache_path.display()),
            }
        }

        let filter = WayFilter { enforce_access: config.enforce_access };
        let network = load_from_pbf(config.pbf_path(), filter)?;

        if config.write_cache {
            match write_cache(&network, &cache_path) {
                Ok(()) => info!("wrote graph cache {}", cache_path.display()),
                Err(e) => warn!("could not write graph cache {}: {e}", cache_path.display()),
            }
        }
        Ok(Self::with_source(network, GraphSource::Built))
    }

    /// Wrap an already-built network.
    pub fn from_network(network: RoadNetwork) -> Self {
        Self::with_source(network, GraphSource::Built)
    }

    fn with_source(network: RoadNetwork, source: GraphSource) -> Self {
        let search = Mutex::new(AStar::for_network(&network));
        Self { network, search, source }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn graph_source(&self) -> GraphSource {
        self.source
    }

    /// Node nearest to `pos`, or `None` if the graph is empty or `pos` is
    /// not a finite coordinate.
    pub fn nearest_node(&self, pos: GeoPoint) -> Option<NodeId> {
        self.network.snap_to_node(pos)
    }

    /// Shortest path between two graph nodes.
    pub fn shortest_path(&self, start: NodeId, goal: NodeId) -> Option<Path> {
        self.search.lock().shortest_path(&self.network, start, goal)
    }

    /// Road path between the nodes nearest to `from` and `to`, as node
    /// positions.  Empty if either point has no nearest node or no path
    /// connects them.
    pub fn route(&self, from: GeoPoint, to: GeoPoint) -> Vec<GeoPoint> {
        let (Some(a), Some(b)) = (self.nearest_node(from), self.nearest_node(to)) else {
            return Vec::new();
        };
        self.shortest_path(a, b)
            .map(|p| p.positions(&self.network))
            .unwrap_or_default()
    }

    /// Road distance in metres between the nodes nearest to `a` and `b`.
    ///
    /// `0.0` when both snap to the same node, `f64::INFINITY` when either
    /// has no nearest node or the nodes are not connected.
    pub fn distance_m(&self, a: GeoPoint, b: GeoPoint) -> f64 {
        let (Some(s), Some(t)) = (self.nearest_node(a), self.nearest_node(b)) else {
            return f64::INFINITY;
        };
        if s == t {
            return 0.0;
        }
        match self.shortest_path(s, t) {
            Some(p) if p.cost_m.is_finite() => p.cost_m,
            _ => f64::INFINITY,
        }
    }

    /// Position of a uniformly chosen graph node, or `(0, 0)` for an empty
    /// graph.
    pub fn random_node_pos<R: Rng + ?Sized>(&self, rng: &mut R) -> GeoPoint {
        if self.network.is_empty() {
            return GeoPoint::new(0.0, 0.0);
        }
        let i = rng.gen_range(0..self.network.node_count());
        self.network.node_pos[i]
    }
}

impl fmt::Debug for RoutingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingEngine")
            .field("nodes", &self.network.node_count())
            .field("edges", &self.network.edge_count())
            .field("source", &self.source)
            .finish()
    }
}
