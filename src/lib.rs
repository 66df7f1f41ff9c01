//! Veloroute: offline bicycle routing over a tiled road graph.
//!
//! Pipeline for one query:
//! - Coordinates map to level-2 tile ids via a fixed 0.25 degree grid
//! - Tiles load lazily through a bounded FIFO cache (gzip decode +
//!   bit-field parse, immutable once resident)
//! - Origin and destination snap to the nearest routable nodes
//! - A bidirectional A* expands both frontiers under a bicycle cost
//!   model until the best meeting point is proven optimal
//! - The reconstructed path is classified into traffic-exposure
//!   distance buckets
//!
//! Everything runs single-threaded within one query; the only state
//! that may outlive a query is the tile cache.

pub mod cache;
pub mod costing;
pub mod error;
pub mod formats;
pub mod geo;
pub mod graph;
pub mod route;
pub mod stats;
pub mod visited;

pub use cache::TileCache;
pub use costing::{BicycleType, CostModel, RiderProfile};
pub use error::RouteError;
pub use graph::{tile_id_for, NodeRef};
pub use route::{PathPoint, Router, RouteSummary};
pub use stats::Exposure;
