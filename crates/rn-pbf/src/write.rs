//! Encoder for the map format, the inverse of [`crate::wire`],
//! [`crate::parser`] and [`crate::block`].
//!
//! Used to author small synthetic extracts for tests and tooling.  Each
//! `add_*` call appends its own primitive group.

use std::collections::HashMap;
use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;

use rn_core::GeoPoint;

use crate::parser::BlockScale;
use crate::wire::{zigzag_encode, WireType};

// ── WireWriter ────────────────────────────────────────────────────────────────

/// Append-only protobuf message writer.
#[derive(Default, Debug, Clone)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_varint(&mut self, mut v: u64) -> &mut Self {
        while v >= 0x80 {
            self.buf.push((v as u8) | 0x80);
            v >>= 7;
        }
        self.buf.push(v as u8);
        self
    }

    pub fn write_tag(&mut self, field: u32, wire: WireType) -> &mut Self {
        self.write_varint((u64::from(field) << 3) | u64::from(wire.raw()))
    }

    pub fn uint64_field(&mut self, field: u32, v: u64) -> &mut Self {
        self.write_tag(field, WireType::Varint).write_varint(v)
    }

    pub fn int64_field(&mut self, field: u32, v: i64) -> &mut Self {
        self.uint64_field(field, v as u64)
    }

    pub fn sint64_field(&mut self, field: u32, v: i64) -> &mut Self {
        self.uint64_field(field, zigzag_encode(v))
    }

    pub fn bytes_field(&mut self, field: u32, bytes: &[u8]) -> &mut Self {
        self.write_tag(field, WireType::Len).write_varint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn packed_uint32_field(&mut self, field: u32, values: &[u32]) -> &mut Self {
        let mut inner = WireWriter::new();
        for &v in values {
            inner.write_varint(u64::from(v));
        }
        self.bytes_field(field, &inner.buf)
    }

    /// Packed `sint64`, each value delta-coded against its predecessor.
    pub fn packed_sint64_delta_field(&mut self, field: u32, values: &[i64]) -> &mut Self {
        let mut inner = WireWriter::new();
        let mut prev = 0i64;
        for &v in values {
            inner.write_varint(zigzag_encode(v.wrapping_sub(prev)));
            prev = v;
        }
        self.bytes_field(field, &inner.buf)
    }
}

// ── PrimitiveBlockBuilder ─────────────────────────────────────────────────────

/// Builds one primitive block with its own string table.
pub struct PrimitiveBlockBuilder {
    strings: Vec<String>,
    lookup:  HashMap<String, u32>,
    groups:  Vec<Vec<u8>>,
    scale:   BlockScale,
    emit_string_table: bool,
}

impl PrimitiveBlockBuilder {
    pub fn new() -> Self {
        Self::with_scale(BlockScale::default())
    }

    pub fn with_scale(scale: BlockScale) -> Self {
        let mut b = Self {
            strings: Vec::new(),
            lookup:  HashMap::new(),
            groups:  Vec::new(),
            scale,
            emit_string_table: true,
        };
        b.intern("");
        b
    }

    /// Leave the string table out of the encoded block.
    pub fn without_string_table(mut self) -> Self {
        self.emit_string_table = false;
        self
    }

    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.lookup.get(s) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_owned());
        self.lookup.insert(s.to_owned(), idx);
        idx
    }

    fn raw_coords(&self, pos: GeoPoint) -> (i64, i64) {
        let g = self.scale.granularity as f64;
        let lat = ((pos.lat * 1e9 - self.scale.lat_offset as f64) / g).round() as i64;
        let lon = ((pos.lon * 1e9 - self.scale.lon_offset as f64) / g).round() as i64;
        (lat, lon)
    }

    pub fn add_way(&mut self, id: i64, refs: &[i64], tags: &[(&str, &str)]) -> &mut Self {
        let (keys, vals): (Vec<u32>, Vec<u32>) =
            tags.iter().map(|&(k, v)| (self.intern(k), self.intern(v))).unzip();
        let mut way = WireWriter::new();
        way.int64_field(1, id)
            .packed_uint32_field(2, &keys)
            .packed_uint32_field(3, &vals)
            .packed_sint64_delta_field(8, refs);
        let mut group = WireWriter::new();
        group.bytes_field(3, &way.into_bytes());
        self.groups.push(group.into_bytes());
        self
    }

    /// One group of explicit `Node` messages.
    pub fn add_nodes(&mut self, nodes: &[(i64, GeoPoint)]) -> &mut Self {
        let mut group = WireWriter::new();
        for &(id, pos) in nodes {
            let (lat, lon) = self.raw_coords(pos);
            let mut node = WireWriter::new();
            node.sint64_field(1, id).sint64_field(8, lat).sint64_field(9, lon);
            group.bytes_field(1, &node.into_bytes());
        }
        self.groups.push(group.into_bytes());
        self
    }

    /// One `DenseNodes` group.
    pub fn add_dense_nodes(&mut self, nodes: &[(i64, GeoPoint)]) -> &mut Self {
        let ids: Vec<i64> = nodes.iter().map(|&(id, _)| id).collect();
        let (lats, lons): (Vec<i64>, Vec<i64>) = nodes.iter().map(|&(_, p)| self.raw_coords(p)).unzip();
        let mut dense = WireWriter::new();
        dense
            .packed_sint64_delta_field(1, &ids)
            .packed_sint64_delta_field(8, &lats)
            .packed_sint64_delta_field(9, &lons);
        let mut group = WireWriter::new();
        group.bytes_field(2, &dense.into_bytes());
        self.groups.push(group.into_bytes());
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut block = WireWriter::new();
        if self.emit_string_table {
            let mut table = WireWriter::new();
            for s in &self.strings {
                table.bytes_field(1, s.as_bytes());
            }
            block.bytes_field(1, &table.into_bytes());
        }
        for g in &self.groups {
            block.bytes_field(2, g);
        }
        let defaults = BlockScale::default();
        if self.scale.granularity != defaults.granularity {
            block.int64_field(17, self.scale.granularity);
        }
        if self.scale.lat_offset != 0 {
            block.int64_field(19, self.scale.lat_offset);
        }
        if self.scale.lon_offset != 0 {
            block.int64_field(20, self.scale.lon_offset);
        }
        block.into_bytes()
    }
}

impl Default for PrimitiveBlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Framing ───────────────────────────────────────────────────────────────────

/// Wrap block bytes in a `Blob`, zlib-compressed when `compress` is set.
pub fn encode_blob(block: &[u8], compress: bool) -> io::Result<Vec<u8>> {
    let mut blob = WireWriter::new();
    if compress {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(block)?;
        let zlib = enc.finish()?;
        blob.int64_field(2, block.len() as i64).bytes_field(3, &zlib);
    } else {
        blob.bytes_field(1, block);
    }
    Ok(blob.into_bytes())
}

/// Write one `[len][BlobHeader][Blob]` record.
pub fn write_frame<W: Write>(out: &mut W, kind: &str, blob: &[u8]) -> io::Result<()> {
    let mut header = WireWriter::new();
    header.bytes_field(1, kind.as_bytes()).int64_field(3, blob.len() as i64);
    let header = header.into_bytes();
    out.write_u32::<BigEndian>(header.len() as u32)?;
    out.write_all(&header)?;
    out.write_all(blob)
}

/// Convenience: frame `block` as an `OSMData` record.
pub fn write_data_block<W: Write>(out: &mut W, block: &[u8], compress: bool) -> io::Result<()> {
    write_frame(out, crate::OSM_DATA, &encode_blob(block, compress)?)
}
