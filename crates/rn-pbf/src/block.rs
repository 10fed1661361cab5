//! File framing: `[u32 BE header length][BlobHeader][Blob]` records.
//!
//! ```text
//! BlobHeader { 1: type (string), 2: indexdata (skipped), 3: datasize (int32) }
//! Blob       { 1: raw (bytes), 2: raw_size (int32), 3: zlib_data (bytes) }
//! ```
//!
//! End of stream exactly at a record boundary ends iteration; end of stream
//! anywhere inside a record is [`PbfError::Truncated`].

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use flate2::read::ZlibDecoder;
use log::debug;

use crate::wire::WireReader;
use crate::{PbfError, PbfResult};

/// Header type of blocks carrying map primitives.  All other block types
/// (`OSMHeader`, vendor extensions) are read past and dropped.
pub const OSM_DATA: &str = "OSMData";

/// Upper bounds from the file-format definition; anything larger is corrupt.
const MAX_HEADER_SIZE: u32 = 64 * 1024;
const MAX_BLOB_SIZE: i32 = 32 * 1024 * 1024;

/// One framed record before blob decoding.
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: String,
    pub blob: Vec<u8>,
}

/// Sequential reader yielding decoded `OSMData` blocks.
///
/// Implements `Iterator<Item = PbfResult<Vec<u8>>>`; iteration stops after
/// the first error.
pub struct BlockReader<R: Read> {
    inner:          R,
    failed:         bool,
    data_blocks:    usize,
    skipped_blocks: usize,
}

impl BlockReader<BufReader<File>> {
    pub fn open(path: &Path) -> PbfResult<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> BlockReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, failed: false, data_blocks: 0, skipped_blocks: 0 }
    }

    /// Read the next framed record without decoding its blob.
    /// `Ok(None)` at a clean end of stream.
    pub fn next_frame(&mut self) -> PbfResult<Option<Frame>> {
        let Some(header_len) = self.read_header_len()? else {
            return Ok(None);
        };
        if header_len > MAX_HEADER_SIZE {
            return Err(PbfError::InvalidHeader("header length exceeds 64 KiB"));
        }
        let header = self.read_exactly(header_len as usize, "block header")?;
        let (kind, data_size) = parse_header(&header)?;
        let blob = self.read_exactly(data_size, "block blob")?;
        Ok(Some(Frame { kind, blob }))
    }

    /// Read forward to the next `OSMData` record and return its decoded
    /// payload.  `Ok(None)` at a clean end of stream.
    pub fn next_block(&mut self) -> PbfResult<Option<Vec<u8>>> {
        while let Some(frame) = self.next_frame()? {
            if frame.kind != OSM_DATA {
                debug!("skipping {} block ({} bytes)", frame.kind, frame.blob.len());
                self.skipped_blocks += 1;
                continue;
            }
            self.data_blocks += 1;
            return decode_blob(&frame.blob).map(Some);
        }
        Ok(None)
    }

    /// `(data blocks returned, other blocks skipped)` so far.
    pub fn counts(&self) -> (usize, usize) {
        (self.data_blocks, self.skipped_blocks)
    }

    fn read_header_len(&mut self) -> PbfResult<Option<u32>> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            4 => Ok(Some(BigEndian::read_u32(&buf))),
            _ => Err(PbfError::Truncated { what: "block header length" }),
        }
    }

    fn read_exactly(&mut self, len: usize, what: &'static str) -> PbfResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => PbfError::Truncated { what },
            _ => PbfError::Io(e),
        })?;
        Ok(buf)
    }
}

impl<R: Read> Iterator for BlockReader<R> {
    type Item = PbfResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_block() {
            Ok(block) => block.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn parse_header(bytes: &[u8]) -> PbfResult<(String, usize)> {
    let mut r = WireReader::new(bytes);
    let mut kind = None;
    let mut data_size = None;
    while !r.is_at_end() {
        let (field, wire) = r.read_tag()?;
        match field {
            1 => kind = Some(r.read_bytes(field, wire)?),
            3 => data_size = Some(r.read_int32(field, wire)?),
            _ => r.skip(wire)?,
        }
    }
    let kind = kind.ok_or(PbfError::InvalidHeader("missing type"))?;
    let kind = String::from_utf8(kind.to_vec())
        .map_err(|_| PbfError::InvalidHeader("type is not UTF-8"))?;
    let data_size = data_size.ok_or(PbfError::InvalidHeader("missing datasize"))?;
    if !(0..=MAX_BLOB_SIZE).contains(&data_size) {
        return Err(PbfError::InvalidHeader("datasize out of range"));
    }
    Ok((kind, data_size as usize))
}

/// Decode a `Blob` message into the primitive-block bytes it carries,
/// inflating zlib payloads.
pub fn decode_blob(bytes: &[u8]) -> PbfResult<Vec<u8>> {
    let mut r = WireReader::new(bytes);
    let mut raw = None;
    let mut raw_size = 0usize;
    let mut zlib = None;
    while !r.is_at_end() {
        let (field, wire) = r.read_tag()?;
        match field {
            1 => raw = Some(r.read_bytes(field, wire)?),
            2 => raw_size = r.read_int32(field, wire)?.clamp(0, MAX_BLOB_SIZE) as usize,
            3 => zlib = Some(r.read_bytes(field, wire)?),
            _ => r.skip(wire)?,
        }
    }
    match (raw, zlib) {
        (Some(raw), _) => Ok(raw.to_vec()),
        (None, Some(zlib)) => inflate(zlib, raw_size, MAX_BLOB_SIZE as usize),
        (None, None) => Err(PbfError::UnsupportedBlobEncoding),
    }
}

/// Inflate a zlib payload, failing once the output passes `limit` bytes.
pub(crate) fn inflate(zlib: &[u8], size_hint: usize, limit: usize) -> PbfResult<Vec<u8>> {
    let mut out = Vec::with_capacity(size_hint.min(limit));
    ZlibDecoder::new(zlib).take(limit as u64 + 1).read_to_end(&mut out)?;
    if out.len() > limit {
        return Err(PbfError::BlobTooLarge { limit });
    }
    Ok(out)
}
