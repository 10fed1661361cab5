//! `rn-core`: foundational types for the `roadnav` routing engine.
//!
//! This crate is a dependency of every other `rn-*` crate.  It intentionally
//! has no `rn-*` dependencies and minimal external ones (only `thiserror`,
//! plus optional `serde`).
//!
//! # What lives here
//!
//! | Module     | Contents                                                   |
//! |------------|------------------------------------------------------------|
//! | [`ids`]    | `NodeId`, `EdgeId`                                         |
//! | [`geo`]    | `GeoPoint`, haversine distance                             |
//! | [`hash`]   | `LongSet`, `LongIntMap` (open addressing, `i64` keys)      |
//! | [`config`] | `EngineConfig`                                             |
//! | [`error`]  | `CoreError`, `CoreResult`                                  |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to `GeoPoint`, ids, config. |

pub mod config;
pub mod error;
pub mod geo;
pub mod hash;
pub mod ids;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{EngineConfig, ACCESS_CACHE_FILE_NAME, CACHE_FILE_NAME};
pub use error::{CoreError, CoreResult};
pub use geo::{GeoPoint, EARTH_RADIUS_M};
pub use hash::{LongIntMap, LongSet};
pub use ids::{EdgeId, NodeId};
