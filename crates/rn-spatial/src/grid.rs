//! Uniform lat/lon grid for nearest-node queries.
//!
//! Cells are `CELL_SIZE_DEG` degrees square, numbered from the south-west
//! corner of the node set.  Each occupied cell keeps a linked list of its
//! nodes threaded through `next_in_cell`, the same head/next technique as
//! the graph adjacency; cell heads live in a [`LongIntMap`] keyed by
//! `(cx << 32) ^ cy`.
//!
//! A query scans square rings of cells around the query cell, perimeter
//! only, and stops once the next ring cannot hold anything closer than the
//! best node found so far.

use rn_core::{GeoPoint, LongIntMap, NodeId, EARTH_RADIUS_M};

/// Cell edge length in degrees (≈ 220 m of latitude).
pub const CELL_SIZE_DEG: f64 = 0.002;

/// Rings scanned before giving up.
pub const MAX_RINGS: i64 = 20;

pub struct GridIndex {
    min_lat:      f64,
    min_lon:      f64,
    /// Largest occupied cell coordinates; cells outside `0..=max` are empty.
    max_cx:       i64,
    max_cy:       i64,
    /// Largest |lat| of any node, for the metric width of a cell.
    max_abs_lat:  f64,
    cell_head:    LongIntMap,
    next_in_cell: Vec<NodeId>,
}

#[inline]
fn cell_key(cx: i64, cy: i64) -> i64 {
    (cx << 32) ^ (cy as u32 as i64)
}

impl GridIndex {
    pub fn build(nodes: &[GeoPoint]) -> Self {
        let mut min_lat = f64::INFINITY;
        let mut min_lon = f64::INFINITY;
        let mut max_abs_lat = 0.0f64;
        for p in nodes {
            min_lat = min_lat.min(p.lat);
            min_lon = min_lon.min(p.lon);
            max_abs_lat = max_abs_lat.max(p.lat.abs());
        }

        let mut grid = Self {
            min_lat,
            min_lon,
            max_cx: -1,
            max_cy: -1,
            max_abs_lat,
            cell_head: LongIntMap::with_capacity((nodes.len() / 2).max(16)),
            next_in_cell: vec![NodeId::INVALID; nodes.len()],
        };

        for (i, &p) in nodes.iter().enumerate() {
            let (cx, cy) = (grid.cell_x(p.lon), grid.cell_y(p.lat));
            grid.max_cx = grid.max_cx.max(cx);
            grid.max_cy = grid.max_cy.max(cy);
            let key = cell_key(cx, cy);
            if let Some(prev) = grid.cell_head.insert(key, i as u32) {
                grid.next_in_cell[i] = NodeId(prev);
            }
        }
        grid
    }

    /// Number of occupied cells.
    pub fn cell_count(&self) -> usize {
        self.cell_head.len()
    }

    /// Cell coordinates are clamped so ring arithmetic never overflows for
    /// queries far outside the node set.
    #[inline]
    fn cell_x(&self, lon: f64) -> i64 {
        ((lon - self.min_lon) / CELL_SIZE_DEG).floor().clamp(i32::MIN as f64, i32::MAX as f64) as i64
    }

    #[inline]
    fn cell_y(&self, lat: f64) -> i64 {
        ((lat - self.min_lat) / CELL_SIZE_DEG).floor().clamp(i32::MIN as f64, i32::MAX as f64) as i64
    }

    /// Nearest node to `q` by great-circle distance.
    ///
    /// `nodes` must be the slice the grid was built from.
    pub fn nearest(&self, nodes: &[GeoPoint], q: GeoPoint) -> Option<NodeId> {
        if nodes.is_empty() || !q.is_finite() {
            return None;
        }
        // Metric width of one cell at the highest latitude involved: a
        // lower bound on the east-west extent of every ring step.
        let lat_bound = self.max_abs_lat.max(q.lat.abs()).min(90.0);
        let cell_m = CELL_SIZE_DEG.to_radians() * EARTH_RADIUS_M * lat_bound.to_radians().cos();

        let (bx, by) = (self.cell_x(q.lon), self.cell_y(q.lat));
        let mut best: Option<(NodeId, f64)> = None;

        for r in 0..=MAX_RINGS {
            if r == 0 {
                self.scan_cell(bx, by, nodes, q, &mut best);
            } else {
                for dx in -r..=r {
                    self.scan_cell(bx + dx, by - r, nodes, q, &mut best);
                    self.scan_cell(bx + dx, by + r, nodes, q, &mut best);
                }
                for dy in (-r + 1)..r {
                    self.scan_cell(bx - r, by + dy, nodes, q, &mut best);
                    self.scan_cell(bx + r, by + dy, nodes, q, &mut best);
                }
            }
            if let Some((_, best_d)) = best {
                if r >= 1 && r as f64 * cell_m > best_d {
                    break;
                }
            }
        }
        best.map(|(node, _)| node)
    }

    fn scan_cell(&self, cx: i64, cy: i64, nodes: &[GeoPoint], q: GeoPoint, best: &mut Option<(NodeId, f64)>) {
        if !(0..=self.max_cx).contains(&cx) || !(0..=self.max_cy).contains(&cy) {
            return;
        }
        let Some(first) = self.cell_head.get(cell_key(cx, cy)) else {
            return;
        };
        let mut node = NodeId(first);
        while node.is_valid() {
            let d = q.distance_m(nodes[node.index()]);
            if d < best.map_or(f64::INFINITY, |(_, best_d)| best_d) {
                *best = Some((node, d));
            }
            node = self.next_in_cell[node.index()];
        }
    }
}
