//! rn-query: load (or build) a road graph and answer one query against it.
//!
//! Configuration comes from the environment (`GRAPH_DATA_DIR`,
//! `OSM_PBF_FILE`, `GRAPH_CACHE_DIR`, `ROUTING_ENFORCE_ACCESS`); the flags
//! below override it.  Results are printed as JSON on stdout, logs go to
//! stderr (`RUST_LOG` controls verbosity, default `info`).
//!
//! ```text
//! rn-query build
//! rn-query route --from 21.0285,105.8542 --to 21.0368,105.8343
//! rn-query distance --from 21.0285,105.8542 --to 21.0368,105.8343
//! rn-query nearest --at 21.0285,105.8542
//! rn-query random --count 5 --seed 42
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;

use rn_core::{EngineConfig, GeoPoint, NodeId};
use rn_spatial::RoutingEngine;

#[derive(Parser)]
#[command(author, version, about = "Road-network routing queries", long_about = None)]
struct Cli {
    /// Map extract to build from (overrides OSM_PBF_FILE)
    #[arg(long, value_name = "PBF_FILE", global = true)]
    pbf: Option<PathBuf>,

    /// Graph cache directory (overrides GRAPH_CACHE_DIR)
    #[arg(long, value_name = "DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Drop ways whose access tags deny cars
    #[arg(long, global = true)]
    enforce_access: bool,

    /// Do not write a graph cache after building
    #[arg(long, global = true)]
    no_cache_write: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load or build the graph and report its size
    Build,
    /// Road path between the nodes nearest two points
    Route {
        #[arg(long, value_name = "LAT,LON")]
        from: GeoPoint,
        #[arg(long, value_name = "LAT,LON")]
        to: GeoPoint,
    },
    /// Road distance in metres between the nodes nearest two points
    Distance {
        #[arg(long, value_name = "LAT,LON")]
        from: GeoPoint,
        #[arg(long, value_name = "LAT,LON")]
        to: GeoPoint,
    },
    /// Graph node nearest a point
    Nearest {
        #[arg(long, value_name = "LAT,LON")]
        at: GeoPoint,
    },
    /// Positions of uniformly chosen graph nodes
    Random {
        #[arg(long, default_value_t = 1)]
        count: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

// ── JSON output ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GraphSummary {
    source:     String,
    nodes:      usize,
    edges:      usize,
    cache_path: PathBuf,
    load_secs:  f64,
}

#[derive(Serialize)]
struct RouteOutput {
    /// `None` (JSON `null`) when the points are not connected.
    distance_m: Option<f64>,
    points:     Vec<GeoPoint>,
}

#[derive(Serialize)]
struct NearestOutput {
    node:     NodeId,
    pos:      GeoPoint,
    offset_m: f64,
}

fn finite(d: f64) -> Option<f64> {
    d.is_finite().then_some(d)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn config(cli: &Cli) -> Result<EngineConfig> {
    let mut cfg = EngineConfig::from_env().context("reading engine configuration")?;
    if let Some(pbf) = &cli.pbf {
        cfg.pbf_path = pbf.clone();
    }
    if let Some(dir) = &cli.cache_dir {
        cfg.cache_dir = dir.clone();
    }
    cfg.enforce_access |= cli.enforce_access;
    cfg.write_cache = !cli.no_cache_write;
    Ok(cfg)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cfg = config(&cli)?;

    let t0 = Instant::now();
    let engine = RoutingEngine::init(&cfg)
        .with_context(|| format!("initialising routing engine from {}", cfg.pbf_path.display()))?;
    let load_secs = t0.elapsed().as_secs_f64();
    info!("engine ready: {engine:?}");

    match cli.command {
        Command::Build => print_json(&GraphSummary {
            source: engine.graph_source().to_string(),
            nodes: engine.network().node_count(),
            edges: engine.network().edge_count(),
            cache_path: cfg.cache_path(),
            load_secs,
        }),
        Command::Route { from, to } => {
            let points = engine.route(from, to);
            let distance_m = if points.is_empty() { None } else { finite(engine.distance_m(from, to)) };
            print_json(&RouteOutput { distance_m, points })
        }
        Command::Distance { from, to } => {
            print_json(&serde_json::json!({ "distance_m": finite(engine.distance_m(from, to)) }))
        }
        Command::Nearest { at } => {
            let out = engine.nearest_node(at).map(|node| {
                let pos = engine.network().pos(node);
                NearestOutput { node, pos, offset_m: pos.distance_m(at) }
            });
            print_json(&out)
        }
        Command::Random { count, seed } => {
            let mut rng = SmallRng::seed_from_u64(seed);
            let points: Vec<GeoPoint> = (0..count).map(|_| engine.random_node_pos(&mut rng)).collect();
            print_json(&points)
        }
    }
}
