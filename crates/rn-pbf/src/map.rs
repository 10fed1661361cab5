//! Whole-file passes driven by the graph builder.
//!
//! Ways reference nodes by map id and nodes usually precede ways in a file,
//! so the extract is read twice: once to collect routable ways and the set
//! of node ids they reference, then again to pick out just those nodes.

use std::io::Read;
use std::path::Path;
use std::time::Instant;

use log::{debug, info};

use rn_core::{GeoPoint, LongSet};

use crate::parser::{parse_nodes, parse_ways, WayFilter, WayRecord};
use crate::{BlockReader, PbfResult};

/// Output of the way pass.
#[derive(Debug, Default)]
pub struct WayPass {
    /// Routable ways in file order.
    pub ways: Vec<WayRecord>,
    /// Every node id referenced by at least one routable way.
    pub referenced: LongSet,
}

/// Collect routable ways from the extract at `path`.
pub fn read_ways(path: &Path, filter: WayFilter) -> PbfResult<WayPass> {
    read_ways_from(BlockReader::open(path)?, filter)
}

pub fn read_ways_from<R: Read>(mut blocks: BlockReader<R>, filter: WayFilter) -> PbfResult<WayPass> {
    let t0 = Instant::now();
    let mut pass = WayPass { ways: Vec::new(), referenced: LongSet::with_capacity(1 << 20) };

    while let Some(block) = blocks.next_block()? {
        let n = parse_ways(&block, filter, |way| {
            pass.referenced.extend(way.refs.iter().copied());
            pass.ways.push(way);
        })?;
        debug!("way pass: block of {} bytes, {n} routable ways", block.len());
    }

    let (data, skipped) = blocks.counts();
    info!(
        "way pass: {} routable ways, {} referenced nodes from {data} blocks ({skipped} skipped) in {:.2}s",
        pass.ways.len(),
        pass.referenced.len(),
        t0.elapsed().as_secs_f64(),
    );
    Ok(pass)
}

/// Stream the nodes of `path` whose id is in `referenced`, first occurrence
/// only.  Returns the number of nodes delivered.
pub fn read_nodes(
    path: &Path,
    referenced: &LongSet,
    on_node: impl FnMut(i64, GeoPoint),
) -> PbfResult<usize> {
    read_nodes_from(BlockReader::open(path)?, referenced, on_node)
}

pub fn read_nodes_from<R: Read>(
    mut blocks: BlockReader<R>,
    referenced: &LongSet,
    mut on_node: impl FnMut(i64, GeoPoint),
) -> PbfResult<usize> {
    let t0 = Instant::now();
    let mut delivered = LongSet::with_capacity(referenced.len() * 2);

    while let Some(block) = blocks.next_block()? {
        parse_nodes(&block, |id, pos| {
            if referenced.contains(id) && delivered.insert(id) {
                on_node(id, pos);
            }
        })?;
    }

    info!(
        "node pass: {} of {} referenced nodes found in {:.2}s",
        delivered.len(),
        referenced.len(),
        t0.elapsed().as_secs_f64(),
    );
    Ok(delivered.len())
}
