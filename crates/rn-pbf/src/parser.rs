//! Primitive-block decoding: string table, ways, explicit and dense nodes.
//!
//! ```text
//! PrimitiveBlock { 1: stringtable, 2: primitivegroup*, 17: granularity,
//!                  19: lat_offset, 20: lon_offset }
//! PrimitiveGroup { 1: node*, 2: dense, 3: way* }
//! Node           { 1: id (sint64), 8: lat (sint64), 9: lon (sint64) }
//! DenseNodes     { 1: id, 8: lat, 9: lon   (packed sint64, delta-coded) }
//! Way            { 2: keys, 3: vals (packed uint32), 8: refs (packed sint64, delta-coded) }
//! ```

use rn_core::GeoPoint;

use crate::wire::{packed_sint64_delta, packed_uint32, PackedVarints, WireReader, zigzag_decode};
use crate::PbfResult;

// ── Way records ───────────────────────────────────────────────────────────────

/// Which directed edges a way contributes for each consecutive node pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `a → b` and `b → a`.
    Both,
    /// `a → b` only.
    Forward,
    /// `b → a` only.
    Reverse,
}

impl Direction {
    /// Directed edges emitted per segment.
    pub fn edges_per_segment(self) -> usize {
        match self {
            Direction::Both => 2,
            Direction::Forward | Direction::Reverse => 1,
        }
    }
}

/// A routable way: its node-id references (absolute map ids, in way order)
/// and its resolved direction.  Only lives until the graph is built.
#[derive(Clone, Debug, PartialEq)]
pub struct WayRecord {
    pub refs:      Vec<i64>,
    pub direction: Direction,
}

/// Way selection options beyond the `highway` allow-list.
#[derive(Copy, Clone, Debug, Default)]
pub struct WayFilter {
    /// Also drop ways whose `access`/`vehicle`/`motor_vehicle` tag denies cars.
    pub enforce_access: bool,
}

// ── Tag helpers ───────────────────────────────────────────────────────────────

/// Block-local string table.  Index 0 is conventionally the empty string.
pub struct StringTable<'a> {
    entries: Vec<&'a [u8]>,
}

impl<'a> StringTable<'a> {
    pub fn parse(bytes: &'a [u8]) -> PbfResult<Self> {
        let mut r = WireReader::new(bytes);
        let mut entries = Vec::new();
        while !r.is_at_end() {
            let (field, wire) = r.read_tag()?;
            match field {
                1 => entries.push(r.read_bytes(field, wire)?),
                _ => r.skip(wire)?,
            }
        }
        Ok(Self { entries })
    }

    /// Out-of-range indices and non-UTF-8 entries read as `""`.
    pub fn get(&self, idx: u32) -> &'a str {
        self.entries
            .get(idx as usize)
            .and_then(|b| std::str::from_utf8(b).ok())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `highway` values drivable by car.
pub fn is_routable_highway(value: &str) -> bool {
    matches!(
        value,
        "motorway" | "trunk" | "primary" | "secondary" | "tertiary"
            | "unclassified" | "residential" | "service" | "living_street"
            | "motorway_link" | "trunk_link" | "primary_link"
            | "secondary_link" | "tertiary_link"
    )
}

/// `false` if any `access`, `vehicle` or `motor_vehicle` tag forbids
/// general car traffic.
pub fn access_allowed(tags: &[(&str, &str)]) -> bool {
    !tags.iter().any(|(k, v)| {
        matches!(*k, "access" | "vehicle" | "motor_vehicle")
            && matches!(*v, "no" | "private" | "agricultural" | "forestry" | "delivery")
    })
}

/// Resolve the travel direction of a way from its tags.
///
/// `junction=roundabout` wins over any `oneway` value.  Otherwise `oneway`
/// (trimmed, case-insensitive) maps `yes`/`true`/`1` to forward and
/// `-1`/`reverse` to reverse; anything else, or no tag, is two-way.
pub fn direction_of(tags: &[(&str, &str)]) -> Direction {
    let mut oneway = None;
    let mut junction = None;
    for &(k, v) in tags {
        match k {
            "oneway" => oneway = Some(v),
            "junction" => junction = Some(v),
            _ => {}
        }
    }
    if junction == Some("roundabout") {
        return Direction::Forward;
    }
    let Some(oneway) = oneway else {
        return Direction::Both;
    };
    match oneway.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Direction::Forward,
        "-1" | "reverse" => Direction::Reverse,
        _ => Direction::Both,
    }
}

// ── Block envelope ────────────────────────────────────────────────────────────

/// Coordinate scaling parameters of one primitive block (nanodegrees).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockScale {
    pub granularity: i64,
    pub lat_offset:  i64,
    pub lon_offset:  i64,
}

impl Default for BlockScale {
    fn default() -> Self {
        Self { granularity: 100, lat_offset: 0, lon_offset: 0 }
    }
}

impl BlockScale {
    /// `1e-9 * (offset + granularity * raw)` for each axis.
    #[inline]
    pub fn to_point(&self, raw_lat: i64, raw_lon: i64) -> GeoPoint {
        let lat = self.lat_offset.wrapping_add(self.granularity.wrapping_mul(raw_lat));
        let lon = self.lon_offset.wrapping_add(self.granularity.wrapping_mul(raw_lon));
        GeoPoint::new(1e-9 * lat as f64, 1e-9 * lon as f64)
    }
}

struct BlockParts<'a> {
    strings: Option<&'a [u8]>,
    groups:  Vec<&'a [u8]>,
    scale:   BlockScale,
}

fn split_block(block: &[u8]) -> PbfResult<BlockParts<'_>> {
    let mut r = WireReader::new(block);
    let mut parts = BlockParts { strings: None, groups: Vec::new(), scale: BlockScale::default() };
    while !r.is_at_end() {
        let (field, wire) = r.read_tag()?;
        match field {
            1 => parts.strings = Some(r.read_bytes(field, wire)?),
            2 => parts.groups.push(r.read_bytes(field, wire)?),
            17 => parts.scale.granularity = r.read_int64(field, wire)?,
            19 => parts.scale.lat_offset = r.read_int64(field, wire)?,
            20 => parts.scale.lon_offset = r.read_int64(field, wire)?,
            _ => r.skip(wire)?,
        }
    }
    Ok(parts)
}

/// Iterate `(field, payload)` for the length-delimited members of a group
/// matching `wanted`, skipping everything else.
fn for_each_member<'a>(
    group: &'a [u8],
    wanted: &[u32],
    mut f: impl FnMut(u32, &'a [u8]) -> PbfResult<()>,
) -> PbfResult<()> {
    let mut r = WireReader::new(group);
    while !r.is_at_end() {
        let (field, wire) = r.read_tag()?;
        if wanted.contains(&field) {
            f(field, r.read_bytes(field, wire)?)?;
        } else {
            r.skip(wire)?;
        }
    }
    Ok(())
}

// ── Way pass ──────────────────────────────────────────────────────────────────

/// Decode every routable way of a primitive block and hand it to `on_way`.
///
/// Blocks without a string table cannot carry resolvable tags and yield
/// nothing.  Returns the number of ways emitted.
pub fn parse_ways(
    block: &[u8],
    filter: WayFilter,
    mut on_way: impl FnMut(WayRecord),
) -> PbfResult<usize> {
    let parts = split_block(block)?;
    let Some(strings) = parts.strings else {
        return Ok(0);
    };
    let strings = StringTable::parse(strings)?;

    let mut emitted = 0;
    for group in &parts.groups {
        for_each_member(group, &[3], |_, way| {
            if let Some(record) = parse_way(way, &strings, filter)? {
                on_way(record);
                emitted += 1;
            }
            Ok(())
        })?;
    }
    Ok(emitted)
}

fn parse_way(bytes: &[u8], strings: &StringTable<'_>, filter: WayFilter) -> PbfResult<Option<WayRecord>> {
    let mut r = WireReader::new(bytes);
    let mut keys: &[u8] = &[];
    let mut vals: &[u8] = &[];
    let mut refs = None;
    while !r.is_at_end() {
        let (field, wire) = r.read_tag()?;
        match field {
            2 => keys = r.read_bytes(field, wire)?,
            3 => vals = r.read_bytes(field, wire)?,
            8 => refs = Some(r.read_bytes(field, wire)?),
            _ => r.skip(wire)?,
        }
    }
    let Some(refs) = refs else {
        return Ok(None);
    };

    let keys = packed_uint32(keys)?;
    let vals = packed_uint32(vals)?;
    let tags: Vec<(&str, &str)> = keys
        .iter()
        .zip(&vals)
        .map(|(&k, &v)| (strings.get(k), strings.get(v)))
        .collect();

    let highway = tags.iter().find(|(k, _)| *k == "highway").map(|(_, v)| *v);
    if !highway.is_some_and(is_routable_highway) {
        return Ok(None);
    }
    if filter.enforce_access && !access_allowed(&tags) {
        return Ok(None);
    }

    Ok(Some(WayRecord {
        refs:      packed_sint64_delta(refs)?,
        direction: direction_of(&tags),
    }))
}

// ── Node pass ─────────────────────────────────────────────────────────────────

/// Decode every explicit and dense node of a primitive block, in block
/// order, calling `on_node(map_id, position)`.  Returns the node count.
pub fn parse_nodes(block: &[u8], mut on_node: impl FnMut(i64, GeoPoint)) -> PbfResult<usize> {
    let parts = split_block(block)?;
    let scale = parts.scale;

    let mut seen = 0;
    for group in &parts.groups {
        for_each_member(group, &[1, 2], |field, bytes| {
            seen += match field {
                1 => parse_node(bytes, &scale, &mut on_node)?,
                _ => parse_dense(bytes, &scale, &mut on_node)?,
            };
            Ok(())
        })?;
    }
    Ok(seen)
}

fn parse_node(bytes: &[u8], scale: &BlockScale, on_node: &mut impl FnMut(i64, GeoPoint)) -> PbfResult<usize> {
    let mut r = WireReader::new(bytes);
    let mut id = None;
    let (mut lat, mut lon) = (0, 0);
    while !r.is_at_end() {
        let (field, wire) = r.read_tag()?;
        match field {
            1 => id = Some(r.read_sint64(field, wire)?),
            8 => lat = r.read_sint64(field, wire)?,
            9 => lon = r.read_sint64(field, wire)?,
            _ => r.skip(wire)?,
        }
    }
    match id {
        Some(id) => {
            on_node(id, scale.to_point(lat, lon));
            Ok(1)
        }
        None => Ok(0),
    }
}

/// Dense groups store three parallel delta-coded columns.  A group missing
/// any column is ignored; columns of unequal length stop at the shortest.
fn parse_dense(bytes: &[u8], scale: &BlockScale, on_node: &mut impl FnMut(i64, GeoPoint)) -> PbfResult<usize> {
    let mut r = WireReader::new(bytes);
    let (mut ids, mut lats, mut lons) = (None, None, None);
    while !r.is_at_end() {
        let (field, wire) = r.read_tag()?;
        match field {
            1 => ids = Some(r.read_bytes(field, wire)?),
            8 => lats = Some(r.read_bytes(field, wire)?),
            9 => lons = Some(r.read_bytes(field, wire)?),
            _ => r.skip(wire)?,
        }
    }
    let (Some(ids), Some(lats), Some(lons)) = (ids, lats, lons) else {
        return Ok(0);
    };

    let (mut id, mut lat, mut lon) = (0i64, 0i64, 0i64);
    let mut count = 0;
    let columns = PackedVarints::new(ids).zip(PackedVarints::new(lats)).zip(PackedVarints::new(lons));
    for ((d_id, d_lat), d_lon) in columns {
        id = id.wrapping_add(zigzag_decode(d_id?));
        lat = lat.wrapping_add(zigzag_decode(d_lat?));
        lon = lon.wrapping_add(zigzag_decode(d_lon?));
        on_node(id, scale.to_point(lat, lon));
        count += 1;
    }
    Ok(count)
}
