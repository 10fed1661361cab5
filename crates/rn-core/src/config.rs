//! Engine configuration.

use std::env;
use std::path::{Path, PathBuf};

use crate::{CoreError, CoreResult};

/// File name of the binary graph cache inside [`EngineConfig::cache_dir`].
/// The `v1` suffix tracks the cache schema version.
pub const CACHE_FILE_NAME: &str = "road-graph-v1.bin";

/// Cache file name for graphs built with [`EngineConfig::enforce_access`].
/// Filtered and unfiltered graphs never share a file.
pub const ACCESS_CACHE_FILE_NAME: &str = "road-graph-v1-access.bin";

/// Where the engine reads its map extract and keeps its graph cache.
///
/// Typically built with [`EngineConfig::from_env`] by the application crate
/// and handed to `RoutingEngine::init`.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Source map extract (length-prefixed blob records).
    pub pbf_path: PathBuf,

    /// Directory holding the graph cache.  Created on first write.
    pub cache_dir: PathBuf,

    /// Drop ways whose `access`/`vehicle`/`motor_vehicle` tag denies cars.
    /// Default: `false` (routability decided by the `highway` allow-list only).
    pub enforce_access: bool,

    /// Write a fresh cache after building from source.  Default: `true`.
    pub write_cache: bool,
}

impl EngineConfig {
    pub fn new(pbf_path: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            pbf_path: pbf_path.into(),
            cache_dir: cache_dir.into(),
            enforce_access: false,
            write_cache: true,
        }
    }

    /// Read the configuration from the process environment.
    ///
    /// | Variable                 | Default                         |
    /// |--------------------------|---------------------------------|
    /// | `GRAPH_DATA_DIR`         | `data`                          |
    /// | `OSM_PBF_FILE`           | `$GRAPH_DATA_DIR/hanoi.osm.pbf` |
    /// | `GRAPH_CACHE_DIR`        | `$GRAPH_DATA_DIR/graph-cache`   |
    /// | `ROUTING_ENFORCE_ACCESS` | `false`                         |
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but with an injectable lookup, so
    /// tests do not have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = PathBuf::from(lookup("GRAPH_DATA_DIR").unwrap_or_else(|| "data".into()));
        let pbf_path = lookup("OSM_PBF_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("hanoi.osm.pbf"));
        let cache_dir = lookup("GRAPH_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("graph-cache"));

        let enforce_access = match lookup("ROUTING_ENFORCE_ACCESS") {
            None => false,
            Some(v) => parse_bool(&v).ok_or_else(|| {
                CoreError::Config(format!("ROUTING_ENFORCE_ACCESS: expected true/false, got `{v}`"))
            })?,
        };

        Ok(Self { pbf_path, cache_dir, enforce_access, write_cache: true })
    }

    /// Full path of the graph cache file for this way filter.
    pub fn cache_path(&self) -> PathBuf {
        if self.enforce_access {
            self.cache_dir.join(ACCESS_CACHE_FILE_NAME)
        } else {
            self.cache_dir.join(CACHE_FILE_NAME)
        }
    }

    pub fn pbf_path(&self) -> &Path {
        &self.pbf_path
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
