//! Traffic-exposure statistics over a reconstructed path.
//!
//! Each consecutive state pair is resolved back to its connecting
//! edge in the source node's outgoing span, and the edge length is
//! credited to exactly one bucket.

use crate::cache::TileCache;
use crate::costing::use_class;
use crate::formats::tile::{EdgeAttrs, EdgeEnd};
use crate::graph::NodeRef;

/// Distance totals in meters, partitioned by exposure to car traffic.
#[derive(Debug, Default, Clone, Copy)]
pub struct Exposure {
    /// Pedestrian-only stretches where the bike is pushed.
    pub pushing_m: f64,
    /// Infrastructure without car traffic.
    pub car_free_m: f64,
    /// Roads with a dedicated or separated cycle lane.
    pub separated_m: f64,
    /// Roads shared with car traffic.
    pub with_cars_m: f64,
}

impl Exposure {
    pub fn total_m(&self) -> f64 {
        self.pushing_m + self.car_free_m + self.separated_m + self.with_cars_m
    }
}

fn bucket<'a>(exposure: &'a mut Exposure, end: &EdgeEnd, attrs: &EdgeAttrs) -> &'a mut f64 {
    let car_free_use = matches!(
        attrs.use_class,
        use_class::CYCLEWAY | use_class::PATH | use_class::FOOTWAY | use_class::MOUNTAIN_BIKE
    );
    let calm_use = matches!(
        attrs.use_class,
        use_class::TRACK | use_class::LIVING_STREET | use_class::SERVICE_ROAD
    );
    if end.pushing_only() {
        &mut exposure.pushing_m
    } else if (car_free_use && !end.has_car()) || calm_use {
        &mut exposure.car_free_m
    } else if attrs.cycle_lane >= 2 {
        &mut exposure.separated_m
    } else if end.has_car() {
        &mut exposure.with_cars_m
    } else {
        &mut exposure.car_free_m
    }
}

/// Classify every edge of a path. States whose connecting edge cannot
/// be located (evicted-and-missing tiles, truncated records) simply
/// contribute nothing, mirroring the search's skip semantics.
pub fn classify_path(cache: &mut TileCache, states: &[NodeRef]) -> Exposure {
    let mut exposure = Exposure::default();

    for pair in states.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let tile = match cache.get(from.tile_id) {
            Ok(tile) => tile,
            Err(_) => continue,
        };
        let node = match tile.node(from.node_id) {
            Some(node) => *node,
            None => continue,
        };
        for ei in tile.outgoing(&node) {
            let (end, attrs) = match (tile.edge_end(ei), tile.edge_attrs(ei)) {
                (Some(end), Some(attrs)) => (end, attrs),
                _ => continue,
            };
            if end.end_tile_id == to.tile_id && end.end_node_id == to.node_id {
                *bucket(&mut exposure, &end, &attrs) += attrs.length_m as f64;
                break;
            }
        }
    }

    exposure
}
