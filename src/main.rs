use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

use veloroute::cache::TileCache;
use veloroute::costing::BicycleType;
use veloroute::{RiderProfile, RouteSummary, Router};

#[derive(Parser)]
#[command(name = "veloroute")]
#[command(about = "Offline bicycle routing over compressed graph tiles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find a bicycle route between two coordinates
    Route {
        /// Tiles root directory
        tiles: PathBuf,
        /// Start coordinate (lat,lon)
        #[arg(long)]
        from: String,
        /// End coordinate (lat,lon)
        #[arg(long)]
        to: String,
        /// Bicycle type: 0=road, 1=cross, 2=hybrid, 3=mountain
        #[arg(long, default_value_t = 3)]
        bicycle_type: u8,
        /// Willingness to ride on roads, 0..1
        #[arg(long, default_value_t = 0.25)]
        use_roads: f64,
        /// Willingness to climb, 0..1
        #[arg(long, default_value_t = 0.25)]
        use_hills: f64,
        /// Penalize stretches where the bike must be pushed
        #[arg(long)]
        avoid_pushing: bool,
        /// Penalize roads shared with car traffic
        #[arg(long)]
        avoid_cars: bool,
        /// Override the iteration budget
        #[arg(long)]
        max_iterations: Option<u64>,
    },
    /// Print the decoded header of one tile
    TileInfo {
        /// Tiles root directory
        tiles: PathBuf,
        /// Level-2 tile id
        tile_id: u32,
    },
}

#[derive(Serialize)]
struct CoordOut {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct RouteOut {
    coords: Vec<CoordOut>,
    nodes: usize,
    total_dist_km: f64,
    cost: f64,
    dist_car_free: f64,
    dist_separated: f64,
    dist_with_cars: f64,
    dist_pushing: f64,
    iterations: u64,
}

impl From<&RouteSummary> for RouteOut {
    fn from(summary: &RouteSummary) -> Self {
        RouteOut {
            coords: summary
                .path
                .iter()
                .map(|p| CoordOut {
                    lat: p.lat,
                    lon: p.lon,
                })
                .collect(),
            nodes: summary.path.len(),
            total_dist_km: summary.distance_m / 1000.0,
            cost: summary.cost,
            dist_car_free: summary.exposure.car_free_m / 1000.0,
            dist_separated: summary.exposure.separated_m / 1000.0,
            dist_with_cars: summary.exposure.with_cars_m / 1000.0,
            dist_pushing: summary.exposure.pushing_m / 1000.0,
            iterations: summary.iterations,
        }
    }
}

#[derive(Serialize)]
struct ErrorOut {
    error: String,
}

fn parse_coord(s: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        anyhow::bail!("Coordinate must be in format 'lat,lon'");
    }
    let lat = parts[0].trim().parse::<f64>()?;
    let lon = parts[1].trim().parse::<f64>()?;
    Ok((lat, lon))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Route {
            tiles,
            from,
            to,
            bicycle_type,
            use_roads,
            use_hills,
            avoid_pushing,
            avoid_cars,
            max_iterations,
        } => {
            let (from_lat, from_lon) = parse_coord(&from)?;
            let (to_lat, to_lon) = parse_coord(&to)?;

            let profile = RiderProfile {
                bicycle_type: BicycleType::from_index(bicycle_type),
                use_roads,
                use_hills,
                avoid_pushing,
                avoid_cars,
            };
            let mut router = Router::new(tiles, profile);
            if let Some(budget) = max_iterations {
                router = router.with_max_iterations(budget);
            }

            let start = Instant::now();
            match router.route(from_lat, from_lon, to_lat, to_lon) {
                Ok(summary) => {
                    eprintln!(
                        "route: {:.2} km over {} nodes in {:.3}s ({} iterations, {} tile loads)",
                        summary.distance_m / 1000.0,
                        summary.path.len(),
                        start.elapsed().as_secs_f64(),
                        summary.iterations,
                        router.cache().loads(),
                    );
                    println!("{}", serde_json::to_string(&RouteOut::from(&summary))?);
                }
                Err(err) => {
                    eprintln!("route failed after {:.3}s: {err}", start.elapsed().as_secs_f64());
                    println!(
                        "{}",
                        serde_json::to_string(&ErrorOut {
                            error: err.to_string(),
                        })?
                    );
                    std::process::exit(1);
                }
            }
        }
        Commands::TileInfo { tiles, tile_id } => {
            let mut cache = TileCache::new(tiles);
            let tile = cache.get(tile_id)?;
            println!(
                "tile {}: base {:.4},{:.4} nodes={} edges={} transitions={}",
                tile.tile_id,
                tile.base_lat,
                tile.base_lon,
                tile.node_count,
                tile.edge_count,
                tile.transition_count,
            );
        }
    }

    Ok(())
}
