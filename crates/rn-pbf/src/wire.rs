//! Minimal protobuf wire-format primitives over a borrowed byte span.
//!
//! Only what the map format needs: tags, varints (plain and zigzag),
//! length-delimited slices, fixed-width skips, and packed repeated varints.
//! Every read is bounds-checked against the span; running off the end is a
//! [`PbfError::Truncated`] or [`PbfError::InvalidLength`], never a short read.

use crate::{PbfError, PbfResult};

/// Protobuf wire types understood by the decoder.  Group wire types (3, 4)
/// and the reserved values are rejected at tag-read time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    Len,
    Fixed32,
}

impl WireType {
    pub fn from_raw(raw: u8) -> PbfResult<Self> {
        match raw {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::Len),
            5 => Ok(WireType::Fixed32),
            other => Err(PbfError::UnsupportedWireType(other)),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            WireType::Varint => 0,
            WireType::Fixed64 => 1,
            WireType::Len => 2,
            WireType::Fixed32 => 5,
        }
    }
}

/// Map a zigzag-encoded varint back to a signed value.
#[inline]
pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Inverse of [`zigzag_decode`].
#[inline]
pub fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Forward-only cursor over one protobuf message.
#[derive(Clone, Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn read_varint(&mut self) -> PbfResult<u64> {
        let mut result = 0u64;
        for shift in (0..64).step_by(7) {
            let Some(&b) = self.buf.get(self.pos) else {
                return Err(PbfError::Truncated { what: "varint" });
            };
            self.pos += 1;
            result |= u64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(PbfError::VarintTooLong)
    }

    /// Read a field key: `(field number, wire type)`.
    pub fn read_tag(&mut self) -> PbfResult<(u32, WireType)> {
        let key = self.read_varint()?;
        let wire = WireType::from_raw((key & 7) as u8)?;
        Ok(((key >> 3) as u32, wire))
    }

    /// Skip the payload of a field whose tag was just read.
    pub fn skip(&mut self, wire: WireType) -> PbfResult<()> {
        match wire {
            WireType::Varint => self.read_varint().map(drop),
            WireType::Fixed64 => self.advance(8, "fixed64"),
            WireType::Fixed32 => self.advance(4, "fixed32"),
            WireType::Len => self.read_len_prefixed().map(drop),
        }
    }

    /// Length-delimited payload, borrowed from the underlying buffer.
    pub fn read_bytes(&mut self, field: u32, wire: WireType) -> PbfResult<&'a [u8]> {
        expect(field, WireType::Len, wire)?;
        self.read_len_prefixed()
    }

    pub fn read_uint64(&mut self, field: u32, wire: WireType) -> PbfResult<u64> {
        expect(field, WireType::Varint, wire)?;
        self.read_varint()
    }

    /// `int64`: two's-complement varint.
    pub fn read_int64(&mut self, field: u32, wire: WireType) -> PbfResult<i64> {
        self.read_uint64(field, wire).map(|v| v as i64)
    }

    /// `int32`: varint truncated to the low 32 bits.
    pub fn read_int32(&mut self, field: u32, wire: WireType) -> PbfResult<i32> {
        self.read_uint64(field, wire).map(|v| v as i32)
    }

    /// `sint64`: zigzag varint.
    pub fn read_sint64(&mut self, field: u32, wire: WireType) -> PbfResult<i64> {
        self.read_uint64(field, wire).map(zigzag_decode)
    }

    fn read_len_prefixed(&mut self) -> PbfResult<&'a [u8]> {
        let len = self.read_varint()?;
        let limit = self.buf.len();
        let end = usize::try_from(len)
            .ok()
            .and_then(|l| self.pos.checked_add(l))
            .filter(|&end| end <= limit)
            .ok_or(PbfError::InvalidLength { len, pos: self.pos, limit })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn advance(&mut self, n: usize, what: &'static str) -> PbfResult<()> {
        if self.buf.len() - self.pos < n {
            return Err(PbfError::Truncated { what });
        }
        self.pos += n;
        Ok(())
    }
}

#[inline]
fn expect(field: u32, expected: WireType, found: WireType) -> PbfResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(PbfError::UnexpectedWireType { field, expected, found })
    }
}

// ── Packed repeated fields ────────────────────────────────────────────────────

/// Iterator over the varints of a packed repeated field.
pub struct PackedVarints<'a> {
    reader: WireReader<'a>,
}

impl<'a> PackedVarints<'a> {
    pub fn new(packed: &'a [u8]) -> Self {
        Self { reader: WireReader::new(packed) }
    }
}

impl Iterator for PackedVarints<'_> {
    type Item = PbfResult<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.is_at_end() {
            None
        } else {
            Some(self.reader.read_varint())
        }
    }
}

/// Decode a packed `uint32` field (string-table indices).
pub fn packed_uint32(packed: &[u8]) -> PbfResult<Vec<u32>> {
    PackedVarints::new(packed).map(|v| v.map(|v| v as u32)).collect()
}

/// Decode a packed, delta-coded `sint64` field into absolute values
/// (running sum of the zigzag deltas).
pub fn packed_sint64_delta(packed: &[u8]) -> PbfResult<Vec<i64>> {
    let mut acc = 0i64;
    PackedVarints::new(packed)
        .map(|v| {
            acc = acc.wrapping_add(zigzag_decode(v?));
            Ok(acc)
        })
        .collect()
}
