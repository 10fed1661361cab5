//! `rn-spatial`: road network, graph cache, spatial indexing, and routing.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                    |
//! |-------------|-------------------------------------------------------------|
//! | [`network`] | `RoadNetwork` (head/next adjacency + grid), `RoadNetworkBuilder` |
//! | [`osm`]     | `load_from_pbf`, `NetworkAssembler`                         |
//! | [`cache`]   | Versioned big-endian graph snapshot                         |
//! | [`grid`]    | `GridIndex` nearest-node lookup                             |
//! | [`router`]  | `AStar` with generation-stamped scratch arrays, `Path`      |
//! | [`engine`]  | `RoutingEngine`: init, route, distance, nearest, random     |
//! | [`error`]   | `SpatialError`, `CacheError`                                |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on `rn-core` public types. |

pub mod cache;
pub mod engine;
pub mod error;
pub mod grid;
pub mod network;
pub mod osm;
pub mod router;

#[cfg(test)]
mod tests;

pub use engine::{GraphSource, RoutingEngine};
pub use error::{CacheError, CacheResult, SpatialError, SpatialResult};
pub use grid::GridIndex;
pub use network::{RoadNetwork, RoadNetworkBuilder};
pub use osm::{load_from_pbf, NetworkAssembler};
pub use router::{AStar, Path};
