//! Unit tests for rn-spatial.
//!
//! Networks are built by hand or from map fixtures written with
//! `rn_pbf::write`, so no map file is needed on disk.

#[cfg(test)]
mod helpers {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use rn_core::{GeoPoint, NodeId};
    use rn_pbf::Direction;

    use crate::{RoadNetwork, RoadNetworkBuilder};

    /// Four corners of a ~110 m square.
    ///
    /// ```text
    ///   d ── c
    ///   │    │
    ///   a ── b
    /// ```
    ///
    /// All sides two-way except `d → a`, which is one-way.
    pub fn square() -> (RoadNetwork, [NodeId; 4]) {
        let mut b = RoadNetworkBuilder::new();
        let a = b.add_node(GeoPoint::new(21.000, 105.800));
        let bb = b.add_node(GeoPoint::new(21.000, 105.801));
        let c = b.add_node(GeoPoint::new(21.001, 105.801));
        let d = b.add_node(GeoPoint::new(21.001, 105.800));
        b.add_segment(a, bb, Direction::Both);
        b.add_segment(bb, c, Direction::Both);
        b.add_segment(c, d, Direction::Both);
        b.add_segment(d, a, Direction::Forward);
        (b.build(), [a, bb, c, d])
    }

    /// Random network in a ~2 km box with haversine-weighted segments of
    /// mixed direction.
    pub fn random_network(seed: u64, nodes: usize, segments: usize) -> RoadNetwork {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut b = RoadNetworkBuilder::new();
        for _ in 0..nodes {
            b.add_node(random_point(&mut rng));
        }
        for _ in 0..segments {
            let x = NodeId(rng.gen_range(0..nodes as u32));
            let y = NodeId(rng.gen_range(0..nodes as u32));
            let dir = match rng.gen_range(0..4) {
                0 => Direction::Forward,
                1 => Direction::Reverse,
                _ => Direction::Both,
            };
            b.add_segment(x, y, dir);
        }
        b.build()
    }

    pub fn random_point<R: Rng>(rng: &mut R) -> GeoPoint {
        GeoPoint::new(rng.gen_range(21.00..21.02), rng.gen_range(105.80..105.82))
    }

    /// Bellman-Ford distances from `start`, for cross-checking A*.
    pub fn reference_dist(net: &RoadNetwork, start: NodeId) -> Vec<f64> {
        let mut dist = vec![f64::INFINITY; net.node_count()];
        dist[start.index()] = 0.0;
        for _ in 0..net.node_count() {
            let mut changed = false;
            for u in 0..net.node_count() {
                if !dist[u].is_finite() {
                    continue;
                }
                for e in net.out_edges(NodeId(u as u32)) {
                    let v = net.edge_to[e.index()].index();
                    let cand = dist[u] + net.edge_weight_m[e.index()];
                    if cand < dist[v] {
                        dist[v] = cand;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        dist
    }

    /// Nearest node by exhaustive scan.
    pub fn brute_nearest(net: &RoadNetwork, q: GeoPoint) -> Option<(NodeId, f64)> {
        net.node_pos
            .iter()
            .enumerate()
            .map(|(i, p)| (NodeId(i as u32), p.distance_m(q)))
            .min_by(|x, y| x.1.total_cmp(&y.1))
    }
}

// ── Builder & network structure ───────────────────────────────────────────────

#[cfg(test)]
mod builder {
    use rn_core::{EdgeId, GeoPoint};
    use rn_pbf::{Direction, WayRecord};

    use crate::{NetworkAssembler, RoadNetworkBuilder};

    #[test]
    fn empty_build() {
        let net = RoadNetworkBuilder::new().build();
        assert_eq!(net.node_count(), 0);
        assert_eq!(net.edge_count(), 0);
        assert!(net.is_empty());
    }

    #[test]
    fn edges_per_direction() {
        for (dir, per_segment) in [(Direction::Both, 2), (Direction::Forward, 1), (Direction::Reverse, 1)] {
            let mut b = RoadNetworkBuilder::new();
            let ids: Vec<_> = (0..4).map(|i| b.add_node(GeoPoint::new(21.0 + i as f64 * 0.001, 105.8))).collect();
            for pair in ids.windows(2) {
                assert_eq!(b.add_segment(pair[0], pair[1], dir), per_segment);
            }
            assert_eq!(b.build().edge_count(), 3 * per_segment, "{dir:?}");
        }
    }

    #[test]
    fn reverse_points_backwards() {
        let mut b = RoadNetworkBuilder::new();
        let x = b.add_node(GeoPoint::new(21.0, 105.8));
        let y = b.add_node(GeoPoint::new(21.001, 105.8));
        b.add_segment(x, y, Direction::Reverse);
        let net = b.build();
        assert_eq!(net.out_degree(x), 0);
        assert_eq!(net.out_degree(y), 1);
        let e = net.out_edges(y).next().unwrap();
        assert_eq!(net.edge_to[e.index()], x);
    }

    #[test]
    fn segment_weight_is_haversine() {
        let mut b = RoadNetworkBuilder::new();
        let p = GeoPoint::new(21.0285, 105.8542);
        let q = GeoPoint::new(21.0301, 105.8519);
        let x = b.add_node(p);
        let y = b.add_node(q);
        b.add_segment(x, y, Direction::Forward);
        let net = b.build();
        assert_eq!(net.edge_weight_m[0], p.distance_m(q));
    }

    #[test]
    fn adjacency_lists_are_sentinel_terminated() {
        let (net, [a, ..]) = super::helpers::square();
        // a → b only; d → a arrives at a but does not leave it.
        assert_eq!(net.out_degree(a), 1);
        let total: usize = (0..net.node_count()).map(|i| net.out_degree(rn_core::NodeId(i as u32))).sum();
        assert_eq!(total, net.edge_count());
        let terminators = net.head.iter().chain(&net.edge_next).filter(|e| **e == EdgeId::INVALID).count();
        assert_eq!(terminators, net.node_count());
    }

    #[test]
    fn assembler_skips_unresolved_pairs() {
        let mut asm = NetworkAssembler::new();
        asm.add_node(10, GeoPoint::new(21.0, 105.8));
        asm.add_node(11, GeoPoint::new(21.001, 105.8));
        asm.add_node(13, GeoPoint::new(21.003, 105.8));
        // Repeated id keeps the first position.
        asm.add_node(10, GeoPoint::new(50.0, 50.0));

        let way = WayRecord { refs: vec![10, 11, 12, 13], direction: Direction::Both };
        assert_eq!(asm.add_way(&way), 2);
        assert_eq!(asm.dropped_pairs(), 2);

        let net = asm.finish();
        assert_eq!(net.node_count(), 3);
        assert_eq!(net.edge_count(), 2);
        assert_eq!(net.node_pos[0], GeoPoint::new(21.0, 105.8));
    }

    #[test]
    fn assembler_roundabout_way_is_one_way() {
        let mut asm = NetworkAssembler::new();
        for (id, lat) in [(1, 21.0), (2, 21.001), (3, 21.002), (4, 21.0)] {
            asm.add_node(id, GeoPoint::new(lat, 105.8 + id as f64 * 0.0005));
        }
        let ring = WayRecord { refs: vec![1, 2, 3, 4, 1], direction: Direction::Forward };
        assert_eq!(asm.add_way(&ring), 4);
        assert_eq!(asm.finish().edge_count(), 4);
    }
}

// ── Grid index ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod grid {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use rn_core::GeoPoint;

    use super::helpers::{brute_nearest, random_network, random_point, square};
    use crate::{GridIndex, RoadNetwork};

    #[test]
    fn exact_position_snaps_to_node() {
        let (net, [a, b, c, d]) = square();
        for n in [a, b, c, d] {
            assert_eq!(net.snap_to_node(net.pos(n)), Some(n));
        }
    }

    #[test]
    fn empty_network_has_no_nearest() {
        let net = RoadNetwork::empty();
        assert_eq!(net.snap_to_node(GeoPoint::new(21.0, 105.8)), None);
        assert_eq!(net.grid().cell_count(), 0);
    }

    #[test]
    fn non_finite_query_has_no_nearest() {
        let (net, _) = square();
        assert_eq!(net.snap_to_node(GeoPoint::new(f64::NAN, 105.8)), None);
        assert_eq!(net.snap_to_node(GeoPoint::new(21.0, f64::INFINITY)), None);
    }

    #[test]
    fn query_outside_bounding_box() {
        let (net, [_, b, ..]) = square();
        // ~50 m east of b, beyond the grid's eastern edge.
        assert_eq!(net.snap_to_node(GeoPoint::new(21.0, 105.8015)), Some(b));
    }

    #[test]
    fn matches_brute_force() {
        let mut rng = SmallRng::seed_from_u64(7);
        for seed in 0..5 {
            let net = random_network(seed, 300, 0);
            for _ in 0..200 {
                let q = random_point(&mut rng);
                let got = net.snap_to_node(q).unwrap();
                let (_, want_d) = brute_nearest(&net, q).unwrap();
                let got_d = net.pos(got).distance_m(q);
                assert!((got_d - want_d).abs() < 1e-6, "seed {seed}: {q} got {got_d} want {want_d}");
            }
        }
    }

    #[test]
    fn sparse_points_found_across_rings() {
        // Two nodes ~1.1 km apart: several empty rings between them.
        let nodes = [GeoPoint::new(21.0, 105.8), GeoPoint::new(21.01, 105.8)];
        let grid = GridIndex::build(&nodes);
        assert_eq!(grid.nearest(&nodes, GeoPoint::new(21.004, 105.8)).map(|n| n.0), Some(0));
        assert_eq!(grid.nearest(&nodes, GeoPoint::new(21.006, 105.8)).map(|n| n.0), Some(1));
    }
}

// ── A* routing ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod routing {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use rn_core::{GeoPoint, NodeId};

    use super::helpers::{random_network, reference_dist, square};
    use crate::{AStar, RoadNetworkBuilder};

    #[test]
    fn trivial_same_node() {
        let (net, [a, ..]) = square();
        let path = AStar::for_network(&net).shortest_path(&net, a, a).unwrap();
        assert!(path.is_trivial());
        assert_eq!(path.nodes, vec![a]);
        assert_eq!(path.cost_m, 0.0);
    }

    #[test]
    fn square_cost_is_sum_of_legs() {
        let (net, [a, b, c, d]) = square();
        let mut astar = AStar::for_network(&net);

        let path = astar.shortest_path(&net, a, c).unwrap();
        assert_eq!(path.nodes.len(), 3);
        assert_eq!(path.nodes.first(), Some(&a));
        assert_eq!(path.nodes.last(), Some(&c));
        let legs: f64 = path.nodes.windows(2).map(|w| net.pos(w[0]).distance_m(net.pos(w[1]))).sum();
        assert!((path.cost_m - legs).abs() < 1e-9);

        // d → a is one-way: a → d must go round through b and c.
        let back = astar.shortest_path(&net, a, d).unwrap();
        assert_eq!(back.nodes, vec![a, b, c, d]);
        let direct = astar.shortest_path(&net, d, a).unwrap();
        assert_eq!(direct.nodes, vec![d, a]);
    }

    #[test]
    fn matches_reference_distances() {
        let mut rng = SmallRng::seed_from_u64(11);
        for seed in 0..4 {
            let net = random_network(100 + seed, 80, 160);
            let mut astar = AStar::for_network(&net);
            for _ in 0..40 {
                let s = NodeId(rng.gen_range(0..80));
                let t = NodeId(rng.gen_range(0..80));
                let want = reference_dist(&net, s)[t.index()];
                match astar.shortest_path(&net, s, t) {
                    Some(p) => {
                        assert!((p.cost_m - want).abs() < 1e-6, "seed {seed} {s}->{t}: {} vs {want}", p.cost_m);
                        for w in p.nodes.windows(2) {
                            assert!(net.out_edges(w[0]).any(|e| net.edge_to[e.index()] == w[1]));
                        }
                    }
                    None => assert!(want.is_infinite(), "seed {seed} {s}->{t}: missed path of {want}"),
                }
            }
        }
    }

    #[test]
    fn no_state_leaks_between_queries() {
        let net = random_network(42, 60, 120);
        let pairs = [(0, 1), (2, 3), (0, 1), (59, 4), (5, 5), (4, 59)];
        let mut reused = AStar::for_network(&net);
        for (s, t) in pairs {
            let (s, t) = (NodeId(s), NodeId(t));
            let fresh = AStar::for_network(&net).shortest_path(&net, s, t);
            assert_eq!(reused.shortest_path(&net, s, t), fresh, "{s}->{t}");
        }
    }

    #[test]
    fn generation_advances_per_query() {
        let (net, [a, _, c, _]) = square();
        let mut astar = AStar::for_network(&net);
        assert_eq!(astar.generation(), 0);
        astar.shortest_path(&net, a, c);
        astar.shortest_path(&net, c, a);
        assert_eq!(astar.generation(), 2);
    }

    #[test]
    fn generation_wrap_clears_stamps() {
        let (net, [a, _, _, d]) = square();
        let mut astar = AStar::for_network(&net);
        let expected = astar.shortest_path(&net, a, d).unwrap();

        // The next query wraps back to generation 1; the stamps written by
        // the query above must not count as current.
        astar.set_generation(u32::MAX);
        assert_eq!(astar.shortest_path(&net, a, d), Some(expected));
        assert_eq!(astar.generation(), 1);
        assert_eq!(astar.shortest_path(&net, d, a).unwrap().nodes, vec![d, a]);
    }

    #[test]
    fn unreachable_is_none() {
        let mut b = RoadNetworkBuilder::new();
        let x = b.add_node(GeoPoint::new(21.0, 105.8));
        let y = b.add_node(GeoPoint::new(21.01, 105.8));
        let net = b.build();
        assert!(AStar::for_network(&net).shortest_path(&net, x, y).is_none());
    }

    #[test]
    fn out_of_range_endpoint_is_none() {
        let (net, [a, ..]) = square();
        let mut astar = AStar::for_network(&net);
        assert!(astar.shortest_path(&net, a, NodeId(4)).is_none());
        assert!(astar.shortest_path(&net, NodeId::INVALID, a).is_none());
    }

    #[test]
    fn resizes_for_another_network() {
        let (small, [a, _, c, _]) = square();
        let big = random_network(3, 50, 100);
        let mut astar = AStar::new(0);
        assert!(astar.shortest_path(&small, a, c).is_some());
        let want = AStar::for_network(&big).shortest_path(&big, NodeId(0), NodeId(49));
        assert_eq!(astar.shortest_path(&big, NodeId(0), NodeId(49)), want);
    }
}

// ── Graph cache ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod cache {
    use std::io::Cursor;

    use rn_core::NodeId;

    use super::helpers::{random_network, square};
    use crate::cache::{encoded_len, read_cache, read_from, write_cache, write_to, CACHE_VERSION};
    use crate::{AStar, CacheError, RoadNetwork};

    fn encode(net: &RoadNetwork) -> Vec<u8> {
        let mut out = Vec::new();
        write_to(net, &mut out).unwrap();
        out
    }

    fn decode(bytes: &[u8]) -> Result<RoadNetwork, CacheError> {
        read_from(&mut Cursor::new(bytes))
    }

    fn put_i32(bytes: &mut [u8], at: usize, v: i32) {
        bytes[at..at + 4].copy_from_slice(&v.to_be_bytes());
    }

    #[test]
    fn header_layout() {
        let (net, _) = square();
        let bytes = encode(&net);
        assert_eq!(bytes.len() as u64, encoded_len(4, 7));
        assert_eq!(&bytes[0..4], &CACHE_VERSION.to_be_bytes());
        assert_eq!(&bytes[4..8], &4i32.to_be_bytes());
        assert_eq!(&bytes[8..12], &7i32.to_be_bytes());
        // First node's latitude, big-endian f64.
        assert_eq!(&bytes[12..20], &21.0f64.to_be_bytes());
    }

    #[test]
    fn sentinel_written_as_minus_one() {
        let (net, _) = square();
        let bytes = encode(&net);
        // The first edge ever added has no successor in its list.
        let edges_at = 12 + 4 * 20;
        assert_eq!(&bytes[edges_at + 4..edges_at + 8], &(-1i32).to_be_bytes());
    }

    #[test]
    fn round_trip_preserves_arrays_and_routes() {
        let net = random_network(9, 120, 240);
        let back = decode(&encode(&net)).unwrap();
        assert_eq!(back.node_pos, net.node_pos);
        assert_eq!(back.head, net.head);
        assert_eq!(back.edge_to, net.edge_to);
        assert_eq!(back.edge_next, net.edge_next);
        assert_eq!(back.edge_weight_m, net.edge_weight_m);

        let (mut x, mut y) = (AStar::for_network(&net), AStar::for_network(&back));
        for (s, t) in [(0, 1), (5, 77), (119, 3), (40, 40)] {
            let (s, t) = (NodeId(s), NodeId(t));
            assert_eq!(x.shortest_path(&net, s, t), y.shortest_path(&back, s, t));
        }
    }

    #[test]
    fn empty_network_round_trips() {
        let bytes = encode(&RoadNetwork::empty());
        assert_eq!(bytes.len(), 12);
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn version_mismatch_rejected() {
        let (net, _) = square();
        let mut bytes = encode(&net);
        put_i32(&mut bytes, 0, 2);
        assert!(matches!(decode(&bytes), Err(CacheError::VersionMismatch { found: 2, expected: 1 })));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let (net, _) = square();
        let mut bytes = encode(&net);
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(CacheError::TrailingBytes)));
    }

    #[test]
    fn truncation_rejected() {
        let (net, _) = square();
        let bytes = encode(&net);
        for cut in [0, 3, 11, 12, 40, bytes.len() - 1] {
            assert!(matches!(decode(&bytes[..cut]), Err(CacheError::Truncated)), "cut at {cut}");
        }
    }

    #[test]
    fn negative_count_rejected() {
        let mut bytes = encode(&RoadNetwork::empty());
        put_i32(&mut bytes, 4, -3);
        assert!(matches!(decode(&bytes), Err(CacheError::Corrupt(_))));
    }

    #[test]
    fn bad_links_rejected() {
        let (net, _) = square();
        let clean = encode(&net);
        let heads_at = 12 + 4 * 16;
        let edges_at = 12 + 4 * 20;

        let mut to_missing_node = clean.clone();
        put_i32(&mut to_missing_node, edges_at, 4);
        assert!(matches!(decode(&to_missing_node), Err(CacheError::Corrupt(_))));

        let mut negative_next = clean.clone();
        put_i32(&mut negative_next, edges_at + 4, -5);
        assert!(matches!(decode(&negative_next), Err(CacheError::Corrupt(_))));

        // Point edge 0's successor at itself: a cycle.
        let mut cycle = clean.clone();
        put_i32(&mut cycle, edges_at + 4, 0);
        assert!(matches!(decode(&cycle), Err(CacheError::Corrupt(_))));

        let mut head_past_end = clean;
        put_i32(&mut head_past_end, heads_at, 99);
        assert!(matches!(decode(&head_past_end), Err(CacheError::Corrupt(_))));
    }

    #[test]
    fn next_cycle_outside_every_list_rejected() {
        use rn_core::{EdgeId, GeoPoint};

        let pos = vec![GeoPoint::new(21.0, 105.8), GeoPoint::new(21.001, 105.8)];
        let to = vec![NodeId(1), NodeId(0), NodeId(1)];
        let weights = vec![111.0; 3];
        // Edges 1 and 2 point at each other and no head enters them.
        let head = vec![EdgeId(0), EdgeId::INVALID];
        let next = vec![EdgeId::INVALID, EdgeId(2), EdgeId(1)];
        match RoadNetwork::try_from_parts(pos.clone(), head, to.clone(), next, weights.clone()) {
            Err(err) => assert!(err.contains("cycle"), "{err}"),
            Ok(_) => panic!("orphan next cycle accepted"),
        }

        let head = vec![EdgeId(0), EdgeId(1)];
        let next = vec![EdgeId::INVALID, EdgeId(2), EdgeId::INVALID];
        assert!(RoadNetwork::try_from_parts(pos, head, to, next, weights).is_ok());
    }

    #[test]
    fn negative_weight_rejected() {
        let (net, _) = square();
        let mut bytes = encode(&net);
        let weight_at = 12 + 4 * 20 + 8;
        bytes[weight_at..weight_at + 8].copy_from_slice(&(-1.0f64).to_be_bytes());
        assert!(matches!(decode(&bytes), Err(CacheError::Corrupt(_))));
    }

    #[test]
    fn file_round_trip_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.bin");
        let (net, _) = square();
        write_cache(&net, &path).unwrap();
        assert!(!path.with_extension("bin.tmp").exists());
        let back = read_cache(&path).unwrap();
        assert_eq!(back.edge_next, net.edge_next);
    }

    #[test]
    fn file_size_checked_before_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.bin");
        let (net, _) = square();
        let mut bytes = encode(&net);

        bytes.truncate(bytes.len() - 8);
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(read_cache(&path), Err(CacheError::Truncated)));

        let mut long = encode(&net);
        long.extend_from_slice(&[0; 16]);
        std::fs::write(&path, &long).unwrap();
        assert!(matches!(read_cache(&path), Err(CacheError::TrailingBytes)));

        std::fs::write(&path, [0u8, 0, 0, 1, 0]).unwrap();
        assert!(matches!(read_cache(&path), Err(CacheError::Truncated)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_cache(&dir.path().join("absent.bin")), Err(CacheError::Io(_))));
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod engine {
    use std::path::{Path, PathBuf};

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use rn_core::{EngineConfig, GeoPoint};
    use rn_pbf::write::{write_data_block, PrimitiveBlockBuilder};

    use crate::{GraphSource, RoadNetwork, RoutingEngine, SpatialError};

    const P1: GeoPoint = GeoPoint { lat: 21.000, lon: 105.800 };
    const P2: GeoPoint = GeoPoint { lat: 21.001, lon: 105.800 };
    const P3: GeoPoint = GeoPoint { lat: 21.002, lon: 105.800 };
    const P4: GeoPoint = GeoPoint { lat: 21.003, lon: 105.800 };
    const P5: GeoPoint = GeoPoint { lat: 21.010, lon: 105.810 };

    /// Residential way 1-2-3, footway 3-4 (not routable), and a motorway
    /// from 5 to the missing node 99.
    fn write_fixture(dir: &Path) -> PathBuf {
        let mut nodes = PrimitiveBlockBuilder::new();
        nodes
            .add_dense_nodes(&[(1, P1), (2, P2), (3, P3)])
            .add_nodes(&[(4, P4), (5, P5)]);
        let mut ways = PrimitiveBlockBuilder::new();
        ways.add_way(100, &[1, 2, 3], &[("highway", "residential")])
            .add_way(101, &[3, 4], &[("highway", "footway")])
            .add_way(102, &[5, 99], &[("highway", "motorway")]);

        let mut bytes = Vec::new();
        write_data_block(&mut bytes, &nodes.finish(), true).unwrap();
        write_data_block(&mut bytes, &ways.finish(), false).unwrap();
        let path = dir.join("fixture.osm.pbf");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn config(dir: &Path) -> EngineConfig {
        EngineConfig::new(write_fixture(dir), dir.join("cache"))
    }

    fn close(a: GeoPoint, b: GeoPoint) -> bool {
        a.distance_m(b) < 0.01
    }

    #[test]
    fn builds_from_map_and_writes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let engine = RoutingEngine::init(&cfg).unwrap();
        assert_eq!(engine.graph_source(), GraphSource::Built);
        assert_eq!(engine.network().node_count(), 4);
        assert_eq!(engine.network().edge_count(), 4);
        assert!(cfg.cache_path().exists());
    }

    #[test]
    fn second_init_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let built = RoutingEngine::init(&cfg).unwrap();
        let cached = RoutingEngine::init(&cfg).unwrap();
        assert_eq!(cached.graph_source(), GraphSource::Cache);
        assert_eq!(cached.network().node_pos, built.network().node_pos);
        assert_eq!(cached.distance_m(P1, P3), built.distance_m(P1, P3));
    }

    #[test]
    fn corrupt_cache_falls_back_to_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        std::fs::create_dir_all(&cfg.cache_dir).unwrap();
        std::fs::write(cfg.cache_path(), b"not a graph cache").unwrap();

        let engine = RoutingEngine::init(&cfg).unwrap();
        assert_eq!(engine.graph_source(), GraphSource::Built);
        // The bad file was replaced by a valid one.
        assert_eq!(RoutingEngine::init(&cfg).unwrap().graph_source(), GraphSource::Cache);
    }

    #[test]
    fn access_filter_does_not_reuse_unfiltered_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut nodes = PrimitiveBlockBuilder::new();
        nodes.add_dense_nodes(&[(1, P1), (2, P2), (3, P3), (5, P5)]);
        let mut ways = PrimitiveBlockBuilder::new();
        ways.add_way(100, &[1, 2, 3], &[("highway", "residential")])
            .add_way(103, &[3, 5], &[("highway", "residential"), ("access", "private")]);
        let mut bytes = Vec::new();
        write_data_block(&mut bytes, &nodes.finish(), true).unwrap();
        write_data_block(&mut bytes, &ways.finish(), true).unwrap();
        let pbf = dir.path().join("private.osm.pbf");
        std::fs::write(&pbf, bytes).unwrap();

        let mut cfg = EngineConfig::new(pbf, dir.path().join("cache"));
        let open = RoutingEngine::init(&cfg).unwrap();
        assert_eq!(open.graph_source(), GraphSource::Built);
        assert_eq!(open.network().edge_count(), 6);

        cfg.enforce_access = true;
        let filtered = RoutingEngine::init(&cfg).unwrap();
        assert_eq!(filtered.graph_source(), GraphSource::Built);
        assert_eq!(filtered.network().node_count(), 3);
        assert_eq!(filtered.network().edge_count(), 4);

        // Each filter setting now finds its own cache.
        assert_eq!(RoutingEngine::init(&cfg).unwrap().network().edge_count(), 4);
        cfg.enforce_access = false;
        let reopened = RoutingEngine::init(&cfg).unwrap();
        assert_eq!(reopened.graph_source(), GraphSource::Cache);
        assert_eq!(reopened.network().edge_count(), 6);
    }

    #[test]
    fn cache_write_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.write_cache = false;
        RoutingEngine::init(&cfg).unwrap();
        assert!(!cfg.cache_path().exists());
    }

    #[test]
    fn missing_map_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig::new(dir.path().join("absent.osm.pbf"), dir.path().join("cache"));
        assert!(matches!(RoutingEngine::init(&cfg), Err(SpatialError::Pbf(_))));
    }

    #[test]
    fn malformed_map_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pbf = dir.path().join("broken.osm.pbf");
        std::fs::write(&pbf, [0, 0, 0, 9, 1, 2]).unwrap();
        let cfg = EngineConfig::new(pbf, dir.path().join("cache"));
        assert!(RoutingEngine::init(&cfg).is_err());
    }

    #[test]
    fn route_and_distance() {
        let dir = tempfile::tempdir().unwrap();
        let engine = RoutingEngine::init(&config(dir.path())).unwrap();

        let route = engine.route(GeoPoint::new(21.0001, 105.8001), GeoPoint::new(21.0019, 105.7999));
        assert_eq!(route.len(), 3);
        assert!(close(route[0], P1) && close(route[1], P2) && close(route[2], P3));

        let d = engine.distance_m(P1, P3);
        assert!((d - (P1.distance_m(P2) + P2.distance_m(P3))).abs() < 0.05, "{d}");
        assert_eq!(engine.distance_m(P2, GeoPoint::new(21.00101, 105.8)), 0.0);
    }

    #[test]
    fn disconnected_points() {
        let dir = tempfile::tempdir().unwrap();
        let engine = RoutingEngine::init(&config(dir.path())).unwrap();
        // Node 5 is materialised but its only segment was dropped.
        assert!(engine.route(P1, P5).is_empty());
        assert_eq!(engine.distance_m(P1, P5), f64::INFINITY);
        // Node 4 only has a footway, so it is not in the graph.
        let near4 = engine.nearest_node(P4).unwrap();
        assert!(close(engine.network().pos(near4), P3));
    }

    #[test]
    fn empty_engine() {
        let engine = RoutingEngine::from_network(RoadNetwork::empty());
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(engine.nearest_node(P1), None);
        assert!(engine.route(P1, P2).is_empty());
        assert_eq!(engine.distance_m(P1, P2), f64::INFINITY);
        assert_eq!(engine.random_node_pos(&mut rng), GeoPoint::new(0.0, 0.0));
    }

    #[test]
    fn random_node_is_a_graph_node() {
        let dir = tempfile::tempdir().unwrap();
        let engine = RoutingEngine::init(&config(dir.path())).unwrap();
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..50 {
            let p = engine.random_node_pos(&mut rng);
            assert!(engine.network().node_pos.contains(&p));
        }
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let engine = RoutingEngine::init(&config(dir.path())).unwrap();
        let want = engine.distance_m(P1, P3);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..25 {
                        assert_eq!(engine.distance_m(P1, P3), want);
                    }
                });
            }
        });
    }
}
