//! Bidirectional A* driver.
//!
//! Two best-first searches run in lockstep, one rooted at the origin
//! and one at the destination, over the same outgoing-edge tables
//! (edges are treated as bidirectional for the bicycle profile; see
//! DESIGN.md). A state settled by both sides is a meeting candidate;
//! the cheapest one is returned once the frontier minima prove it
//! cannot be beaten.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::PathBuf;

use crate::cache::TileCache;
use crate::costing::{CostModel, RiderProfile};
use crate::error::RouteError;
use crate::formats::tile::{EdgeAttrs, EdgeEnd};
use crate::geo::haversine_distance;
use crate::graph::{nearest_node, tile_id_for, NodeRef, GRAPH_LEVEL};
use crate::stats::{classify_path, Exposure};
use crate::visited::{VisitedMap, DEFAULT_SLOTS};

/// Frontier entry budget per direction; pushes beyond it are dropped.
pub const HEAP_CAPACITY: usize = 1_000_000;

/// Reconstruction guard against corrupt predecessor chains.
const MAX_PATH: usize = 50_000;

/// One frontier entry. `seq` breaks f ties by insertion order so two
/// runs with identical inputs pop in the same order.
#[derive(Debug, Clone, Copy)]
struct FrontierEntry {
    f: f64,
    g: f64,
    dist: f64,
    state: NodeRef,
    seq: u64,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.seq == other.seq
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for a min-heap; earlier insertion wins ties.
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// One direction of the search.
struct SearchSide {
    heap: BinaryHeap<FrontierEntry>,
    visited: VisitedMap,
    /// Root of the opposing search, the heuristic target.
    target_lat: f64,
    target_lon: f64,
}

impl SearchSide {
    fn new(target_lat: f64, target_lon: f64, visited_slots: usize) -> Result<Self, RouteError> {
        let mut heap = BinaryHeap::new();
        heap.try_reserve(HEAP_CAPACITY)
            .map_err(|_| RouteError::AllocationFailure {
                what: "frontier heap",
            })?;
        Ok(Self {
            heap,
            visited: VisitedMap::with_slots(visited_slots)?,
            target_lat,
            target_lon,
        })
    }

    fn min_f(&self) -> f64 {
        self.heap.peek().map_or(f64::INFINITY, |e| e.f)
    }
}

/// A path state resolved to coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PathPoint {
    pub state: NodeRef,
    pub lat: f64,
    pub lon: f64,
}

/// Result of a successful query.
#[derive(Debug)]
pub struct RouteSummary {
    /// States from origin to destination, inclusive.
    pub path: Vec<PathPoint>,
    /// Total cost in time units.
    pub cost: f64,
    /// Total edge length in meters.
    pub distance_m: f64,
    /// Traffic-exposure breakdown of the path.
    pub exposure: Exposure,
    /// Pops performed across both directions.
    pub iterations: u64,
}

/// Owns all per-query state: tile cache, cost model, both frontiers
/// and visited maps. Nothing survives across queries except the tile
/// cache.
pub struct Router {
    cache: TileCache,
    model: CostModel,
    max_iterations: Option<u64>,
    visited_slots: usize,
}

impl Router {
    pub fn new(tiles_root: PathBuf, profile: RiderProfile) -> Self {
        Self {
            cache: TileCache::new(tiles_root),
            model: CostModel::new(profile),
            max_iterations: None,
            visited_slots: DEFAULT_SLOTS,
        }
    }

    /// Override the distance-derived iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Shrink the visited maps, for memory-constrained callers.
    pub fn with_visited_slots(mut self, slots: usize) -> Self {
        self.visited_slots = slots.max(1);
        self
    }

    pub fn cache(&mut self) -> &mut TileCache {
        &mut self.cache
    }

    /// Find the cheapest bicycle path between two coordinates.
    pub fn route(
        &mut self,
        from_lat: f64,
        from_lon: f64,
        to_lat: f64,
        to_lon: f64,
    ) -> Result<RouteSummary, RouteError> {
        let origin_tile = tile_id_for(from_lat, from_lon);
        let dest_tile = tile_id_for(to_lat, to_lon);

        // Origin and destination tiles are fatal if missing.
        let start_node = {
            let tile = self.cache.get(origin_tile)?;
            nearest_node(tile, from_lat, from_lon).ok_or(RouteError::NoNearbyNode {
                lat: from_lat,
                lon: from_lon,
            })?
        };
        let goal_node = {
            let tile = self.cache.get(dest_tile)?;
            nearest_node(tile, to_lat, to_lon).ok_or(RouteError::NoNearbyNode {
                lat: to_lat,
                lon: to_lon,
            })?
        };
        let start = NodeRef::new(origin_tile, start_node);
        let goal = NodeRef::new(dest_tile, goal_node);
        let (start_lat, start_lon) = self.node_coords(start)?;
        let (goal_lat, goal_lon) = self.node_coords(goal)?;

        if start == goal {
            return Ok(RouteSummary {
                path: vec![PathPoint {
                    state: start,
                    lat: start_lat,
                    lon: start_lon,
                }],
                cost: 0.0,
                distance_m: 0.0,
                exposure: Exposure::default(),
                iterations: 0,
            });
        }

        let max_iterations = self.max_iterations.unwrap_or_else(|| {
            let dist_km = haversine_distance(from_lat, from_lon, to_lat, to_lon) / 1000.0;
            ((30_000.0 * dist_km) as u64).clamp(1_000_000, 6_000_000)
        });

        let mut fwd = SearchSide::new(goal_lat, goal_lon, self.visited_slots)?;
        let mut bwd = SearchSide::new(start_lat, start_lon, self.visited_slots)?;
        let mut seq: u64 = 0;
        self.seed(&mut fwd, start, start_lat, start_lon, &mut seq);
        self.seed(&mut bwd, goal, goal_lat, goal_lon, &mut seq);

        let mut best: Option<(f64, NodeRef)> = None;
        let mut iterations: u64 = 0;

        loop {
            if fwd.heap.is_empty() && bwd.heap.is_empty() {
                break;
            }
            if iterations >= max_iterations {
                break;
            }
            if !fwd.heap.is_empty() {
                iterations += 1;
                self.expand(&mut fwd, &bwd.visited, &mut best, &mut seq);
            }
            if iterations >= max_iterations {
                break;
            }
            if !bwd.heap.is_empty() {
                iterations += 1;
                self.expand(&mut bwd, &fwd.visited, &mut best, &mut seq);
            }
            if let Some((bound, _)) = best {
                if fwd.min_f() + bwd.min_f() >= bound {
                    break;
                }
            }
        }

        let (cost, meeting) = match best {
            Some(found) => found,
            None => return Err(RouteError::NoPath { iterations }),
        };

        let states = self.reconstruct(&fwd.visited, &bwd.visited, meeting);
        let mut path = Vec::with_capacity(states.len());
        for state in &states {
            let (lat, lon) = self.node_coords(*state)?;
            path.push(PathPoint {
                state: *state,
                lat,
                lon,
            });
        }
        let exposure = classify_path(&mut self.cache, &states);
        let distance_m = exposure.total_m();

        Ok(RouteSummary {
            path,
            cost,
            distance_m,
            exposure,
            iterations,
        })
    }

    fn node_coords(&mut self, state: NodeRef) -> Result<(f64, f64), RouteError> {
        let tile = self.cache.get(state.tile_id)?;
        match tile.node(state.node_id) {
            Some(node) => Ok((node.lat, node.lon)),
            None => Err(RouteError::MalformedTile {
                tile_id: state.tile_id,
                reason: format!("node {} out of range", state.node_id),
            }),
        }
    }

    fn heuristic(&self, lat: f64, lon: f64, side: &SearchSide) -> f64 {
        haversine_distance(lat, lon, side.target_lat, side.target_lon) * 3.6
            / self.model.max_speed_kph()
    }

    fn seed(&self, side: &mut SearchSide, root: NodeRef, lat: f64, lon: f64, seq: &mut u64) {
        side.visited.insert(root, 0.0, NodeRef::NONE, 0);
        *seq += 1;
        side.heap.push(FrontierEntry {
            f: self.heuristic(lat, lon, side),
            g: 0.0,
            dist: 0.0,
            state: root,
            seq: *seq,
        });
    }

    /// Pop and expand one state for one direction.
    fn expand(
        &mut self,
        side: &mut SearchSide,
        other: &VisitedMap,
        best: &mut Option<(f64, NodeRef)>,
        seq: &mut u64,
    ) {
        let entry = match side.heap.pop() {
            Some(entry) => entry,
            None => return,
        };
        let state = entry.state;

        // Stale frontier duplicate: a cheaper copy was settled already.
        if let Some(settled) = side.visited.find(state) {
            if entry.g > settled.g {
                return;
            }
        }

        // Meeting candidate against the opposing search.
        if let Some(opposing) = other.find(state) {
            let total = entry.g + opposing.g;
            if best.map_or(true, |(bound, _)| total < bound) {
                *best = Some((total, state));
            }
        }

        // Project the outgoing edges out of the tile borrow first:
        // loading end tiles below may evict the current tile.
        let mut edges: Vec<(u32, EdgeEnd, EdgeAttrs)> = Vec::new();
        {
            let tile = match self.cache.get(state.tile_id) {
                Ok(tile) => tile,
                Err(_) => return,
            };
            let node = match tile.node(state.node_id) {
                Some(node) => *node,
                None => return,
            };
            edges.reserve(node.edge_count as usize);
            for ei in tile.outgoing(&node) {
                if let (Some(end), Some(attrs)) = (tile.edge_end(ei), tile.edge_attrs(ei)) {
                    edges.push((ei, end, attrs));
                }
            }
        }

        for (ei, end, attrs) in edges {
            if end.end_level != GRAPH_LEVEL {
                continue;
            }
            if !end.has_bike() && !end.has_pedestrian() {
                continue;
            }
            let mut cost = match self.model.edge_cost(&end, &attrs) {
                Some(cost) => cost,
                None => continue,
            };
            // Second pushing multiplier, applied at expansion time.
            if end.pushing_only() {
                cost *= self.model.pushing_penalty();
            }
            let new_g = entry.g + cost;
            let next = NodeRef::new(end.end_tile_id, end.end_node_id);
            if let Some(existing) = side.visited.find(next) {
                if new_g >= existing.g {
                    continue;
                }
            }
            // A neighbour tile that fails to load makes the edge
            // unusable, never the query fatal.
            let (next_lat, next_lon) = match self.cache.get(next.tile_id) {
                Ok(tile) => match tile.node(next.node_id) {
                    Some(node) => (node.lat, node.lon),
                    None => continue,
                },
                Err(_) => continue,
            };
            let h = self.heuristic(next_lat, next_lon, side);
            if !side.visited.insert(next, new_g, state, ei) {
                continue;
            }
            if side.heap.len() >= HEAP_CAPACITY {
                continue;
            }
            *seq += 1;
            side.heap.push(FrontierEntry {
                f: new_g + h,
                g: new_g,
                dist: entry.dist + attrs.length_m as f64,
                state: next,
                seq: *seq,
            });
        }
    }

    /// Stitch the two predecessor chains at the meeting point.
    fn reconstruct(
        &self,
        fwd: &VisitedMap,
        bwd: &VisitedMap,
        meeting: NodeRef,
    ) -> Vec<NodeRef> {
        let mut states = Vec::new();

        let mut state = meeting;
        loop {
            states.push(state);
            let entry = match fwd.find(state) {
                Some(entry) => entry,
                None => break,
            };
            if entry.parent == NodeRef::NONE || states.len() >= MAX_PATH {
                break;
            }
            state = entry.parent;
        }
        states.reverse();

        let mut state = match bwd.find(meeting) {
            Some(entry) => entry.parent,
            None => NodeRef::NONE,
        };
        while state != NodeRef::NONE && states.len() < MAX_PATH {
            states.push(state);
            state = match bwd.find(state) {
                Some(entry) => entry.parent,
                None => NodeRef::NONE,
            };
        }

        states
    }
}
