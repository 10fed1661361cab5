//! Versioned binary snapshot of a built [`RoadNetwork`].
//!
//! # Layout (all big-endian, no padding)
//!
//! ```text
//! i32 version | i32 node_count | i32 edge_count
//! node_count × { f64 lat, f64 lon }
//! node_count × i32 head
//! edge_count × { i32 to, i32 next, f64 weight_m }
//! ```
//!
//! List terminators are written as `-1`.  A file is accepted only if the
//! version matches exactly and the declared counts consume it to the last
//! byte; any failure rejects the whole file.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use rn_core::{EdgeId, GeoPoint, NodeId};

use crate::network::RoadNetwork;
use crate::{CacheError, CacheResult};

/// Schema version written to and required from every cache file.
pub const CACHE_VERSION: i32 = 1;

const HEADER_BYTES: u64 = 12;
const NODE_BYTES: u64 = 8 + 8 + 4;
const EDGE_BYTES: u64 = 4 + 4 + 8;

/// Upper bound on speculative pre-allocation from an untrusted count.
const MAX_PREALLOC: usize = 1 << 20;

/// Exact file size for the given counts.
pub fn encoded_len(node_count: u64, edge_count: u64) -> u64 {
    HEADER_BYTES + node_count * NODE_BYTES + edge_count * EDGE_BYTES
}

// ── Encoding ──────────────────────────────────────────────────────────────────

#[inline]
fn link_to_wire(e: EdgeId) -> i32 {
    if e.is_valid() { e.0 as i32 } else { -1 }
}

fn count_to_wire(n: usize, what: &str) -> io::Result<i32> {
    i32::try_from(n).map_err(|_| {
        io::Error::new(ErrorKind::InvalidInput, format!("{what} count {n} exceeds cache format limit"))
    })
}

/// Serialize `network` into `out`.
pub fn write_to<W: Write>(network: &RoadNetwork, out: &mut W) -> io::Result<()> {
    out.write_i32::<BigEndian>(CACHE_VERSION)?;
    out.write_i32::<BigEndian>(count_to_wire(network.node_count(), "node")?)?;
    out.write_i32::<BigEndian>(count_to_wire(network.edge_count(), "edge")?)?;

    for p in &network.node_pos {
        out.write_f64::<BigEndian>(p.lat)?;
        out.write_f64::<BigEndian>(p.lon)?;
    }
    for &e in &network.head {
        out.write_i32::<BigEndian>(link_to_wire(e))?;
    }
    for e in 0..network.edge_count() {
        out.write_i32::<BigEndian>(network.edge_to[e].0 as i32)?;
        out.write_i32::<BigEndian>(link_to_wire(network.edge_next[e]))?;
        out.write_f64::<BigEndian>(network.edge_weight_m[e])?;
    }
    Ok(())
}

/// Write the cache file at `path`, creating its directory if needed.
///
/// Data goes to a sibling temporary file first and is renamed into place,
/// so readers never observe a half-written cache.
pub fn write_cache(network: &RoadNetwork, path: &Path) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("bin.tmp");
    {
        let mut out = BufWriter::new(File::create(&tmp)?);
        write_to(network, &mut out)?;
        out.flush()?;
    }
    fs::rename(&tmp, path)?;
    debug!(
        "wrote {} ({} bytes)",
        path.display(),
        encoded_len(network.node_count() as u64, network.edge_count() as u64),
    );
    Ok(())
}

// ── Decoding ──────────────────────────────────────────────────────────────────

fn eof_as_truncated(e: io::Error) -> CacheError {
    if e.kind() == ErrorKind::UnexpectedEof {
        CacheError::Truncated
    } else {
        CacheError::Io(e)
    }
}

fn link_from_wire(v: i32, what: &str) -> CacheResult<EdgeId> {
    match v {
        -1 => Ok(EdgeId::INVALID),
        v if v >= 0 => Ok(EdgeId(v as u32)),
        v => Err(CacheError::Corrupt(format!("negative {what} link {v}"))),
    }
}

fn count_from_wire(v: i32, what: &str) -> CacheResult<usize> {
    usize::try_from(v).map_err(|_| CacheError::Corrupt(format!("negative {what} count {v}")))
}

/// Deserialize a network from `input`, which must end exactly where the
/// declared arrays do.
pub fn read_from<R: Read>(input: &mut R) -> CacheResult<RoadNetwork> {
    let version = input.read_i32::<BigEndian>().map_err(eof_as_truncated)?;
    if version != CACHE_VERSION {
        return Err(CacheError::VersionMismatch { found: version, expected: CACHE_VERSION });
    }
    let node_count = count_from_wire(input.read_i32::<BigEndian>().map_err(eof_as_truncated)?, "node")?;
    let edge_count = count_from_wire(input.read_i32::<BigEndian>().map_err(eof_as_truncated)?, "edge")?;

    let mut node_pos = Vec::with_capacity(node_count.min(MAX_PREALLOC));
    for _ in 0..node_count {
        let lat = input.read_f64::<BigEndian>().map_err(eof_as_truncated)?;
        let lon = input.read_f64::<BigEndian>().map_err(eof_as_truncated)?;
        node_pos.push(GeoPoint::new(lat, lon));
    }

    let mut head = Vec::with_capacity(node_count.min(MAX_PREALLOC));
    for _ in 0..node_count {
        head.push(link_from_wire(input.read_i32::<BigEndian>().map_err(eof_as_truncated)?, "head")?);
    }

    let mut edge_to = Vec::with_capacity(edge_count.min(MAX_PREALLOC));
    let mut edge_next = Vec::with_capacity(edge_count.min(MAX_PREALLOC));
    let mut edge_weight_m = Vec::with_capacity(edge_count.min(MAX_PREALLOC));
    for _ in 0..edge_count {
        let to = input.read_i32::<BigEndian>().map_err(eof_as_truncated)?;
        let to = u32::try_from(to).map_err(|_| CacheError::Corrupt(format!("negative edge target {to}")))?;
        edge_to.push(NodeId(to));
        edge_next.push(link_from_wire(input.read_i32::<BigEndian>().map_err(eof_as_truncated)?, "next")?);
        edge_weight_m.push(input.read_f64::<BigEndian>().map_err(eof_as_truncated)?);
    }

    let mut extra = [0u8; 1];
    loop {
        match input.read(&mut extra) {
            Ok(0) => break,
            Ok(_) => return Err(CacheError::TrailingBytes),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CacheError::Io(e)),
        }
    }

    RoadNetwork::try_from_parts(node_pos, head, edge_to, edge_next, edge_weight_m)
        .map_err(CacheError::Corrupt)
}

/// Read and validate the cache file at `path`.
///
/// The file length is checked against the declared counts before any array
/// is allocated.
pub fn read_cache(path: &Path) -> CacheResult<RoadNetwork> {
    let file = File::open(path)?;
    let actual = file.metadata()?.len();
    let mut input = BufReader::new(file);

    if actual >= HEADER_BYTES {
        let mut header = [0u8; HEADER_BYTES as usize];
        input.read_exact(&mut header)?;
        let mut h = &header[..];
        let version = h.read_i32::<BigEndian>()?;
        let nodes = h.read_i32::<BigEndian>()?;
        let edges = h.read_i32::<BigEndian>()?;
        if version == CACHE_VERSION && nodes >= 0 && edges >= 0 {
            let expected = encoded_len(nodes as u64, edges as u64);
            if actual < expected {
                return Err(CacheError::Truncated);
            }
            if actual > expected {
                return Err(CacheError::TrailingBytes);
            }
        }
        // Re-read from the start so one decoder handles every case.
        return read_from(&mut (&header[..]).chain(input));
    }
    read_from(&mut input)
}
