//! Error kinds reported by the routing core.
//!
//! These are reported values, not panics: a query either produces a
//! path or exactly one of these kinds. Malformed edges encountered
//! mid-search are skipped by the driver and never surface here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    /// The tile file for an origin or destination coordinate is absent.
    #[error("tile {tile_id} not found under {}", .root.display())]
    TileNotFound { tile_id: u32, root: PathBuf },

    /// The tile file exists but its header or tables are inconsistent.
    #[error("malformed tile {tile_id}: {reason}")]
    MalformedTile { tile_id: u32, reason: String },

    /// The containing tile has no node with any outgoing edge.
    #[error("no routable graph node near {lat:.6},{lon:.6}")]
    NoNearbyNode { lat: f64, lon: f64 },

    /// Search exhausted or the iteration budget ran out without a
    /// meeting point. Carries the iteration count actually performed.
    #[error("no path found after {iterations} iterations")]
    NoPath { iterations: u64 },

    /// Pre-allocation of a search structure failed.
    #[error("failed to allocate {what}")]
    AllocationFailure { what: &'static str },
}
