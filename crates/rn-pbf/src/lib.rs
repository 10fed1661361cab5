//! `rn-pbf`: map extract decoding without a protobuf schema library.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                     |
//! |------------|--------------------------------------------------------------|
//! | [`wire`]   | `WireReader`: varint, zigzag, tag, length-delimited, packed  |
//! | [`block`]  | `BlockReader`: header/blob framing and zlib inflation        |
//! | [`parser`] | Per-block way/node extraction, tag filters, `Direction`      |
//! | [`map`]    | Whole-file way pass and node pass                            |
//! | [`write`]  | Encoder for the same format (fixture authoring)              |
//! | [`error`]  | `PbfError`, `PbfResult<T>`                                   |
//!
//! Every error here is fatal to graph construction: the caller never gets a
//! partially decoded file.

pub mod block;
pub mod error;
pub mod map;
pub mod parser;
pub mod wire;
pub mod write;


pub use block::{BlockReader, OSM_DATA};
pub use error::{PbfError, PbfResult};
pub use map::{read_nodes, read_ways, WayPass};
pub use parser::{Direction, WayFilter, WayRecord};
pub use wire::{WireReader, WireType};
