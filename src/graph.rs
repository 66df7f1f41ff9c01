//! Grid arithmetic and graph node handles.
//!
//! Only level 2 of the tile hierarchy (0.25 degree cells) is
//! consulted; rows run south to north, columns west to east.

use crate::formats::tile::{Node, Tile};
use crate::geo::haversine_distance;

/// Hierarchy level this router operates on.
pub const GRAPH_LEVEL: u8 = 2;

/// Side length of a level-2 tile in degrees.
pub const TILE_SIZE_DEG: f64 = 0.25;

/// Columns per grid row (360 / 0.25).
pub const TILES_PER_ROW: u32 = 1440;

/// Tile id of the level-2 cell containing a coordinate.
pub fn tile_id_for(lat: f64, lon: f64) -> u32 {
    let col = ((lon + 180.0) / TILE_SIZE_DEG) as u32;
    let row = ((lat + 90.0) / TILE_SIZE_DEG) as u32;
    row * TILES_PER_ROW + col
}

/// Global handle of a graph node: (tile id, node id) at level 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub tile_id: u32,
    pub node_id: u32,
}

impl NodeRef {
    /// Null sentinel marking "no predecessor" in the visited maps.
    pub const NONE: NodeRef = NodeRef {
        tile_id: 0,
        node_id: 0,
    };

    pub fn new(tile_id: u32, node_id: u32) -> Self {
        Self { tile_id, node_id }
    }
}

/// Whether a node has at least one usable outgoing edge: same
/// hierarchy level and bicycle or pedestrian access.
fn node_is_routable(tile: &Tile, node: &Node) -> bool {
    tile.outgoing(node).any(|ei| {
        tile.edge_end(ei).is_some_and(|end| {
            end.end_level == GRAPH_LEVEL && (end.has_bike() || end.has_pedestrian())
        })
    })
}

/// Resolve the graph node a query coordinate snaps to.
///
/// Among nodes with outgoing edges, tracks both the overall nearest
/// and the nearest routable one, preferring the routable node when it
/// is under 500 m away or within twice the overall best distance.
pub fn nearest_node(tile: &Tile, lat: f64, lon: f64) -> Option<u32> {
    let mut best: Option<(f64, u32)> = None;
    let mut best_routable: Option<(f64, u32)> = None;

    for node_id in 0..tile.node_count {
        let node = tile.node(node_id)?;
        if node.edge_count == 0 {
            continue;
        }
        let dist = haversine_distance(lat, lon, node.lat, node.lon);
        if best.map_or(true, |(d, _)| dist < d) {
            best = Some((dist, node_id));
        }
        if best_routable.map_or(true, |(d, _)| dist < d) && node_is_routable(tile, node) {
            best_routable = Some((dist, node_id));
        }
    }

    let (best_dist, best_id) = best?;
    match best_routable {
        Some((dist, id)) if dist < 500.0 || dist <= 2.0 * best_dist => Some(id),
        _ => Some(best_id),
    }
}
