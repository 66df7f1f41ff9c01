//! End-to-end routing over synthetic tile fixtures.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tempfile::TempDir;

use veloroute::cache::TileCache;
use veloroute::costing::{use_class, BicycleType, CostModel, RiderProfile};
use veloroute::formats::builder::{EdgeSpec, TileBuilder};
use veloroute::formats::tile::ACCESS_PEDESTRIAN;
use veloroute::{tile_id_for, NodeRef, RouteError, Router};

/// One node of a fixture tile with its outgoing edges in order.
struct FixtureNode {
    lat: f64,
    lon: f64,
    edges: Vec<EdgeSpec>,
}

fn build_tile(root: &Path, tile_id: u32, base: (f32, f32), nodes: &[FixtureNode], plain: bool) {
    let mut builder = TileBuilder::new(tile_id, base.0, base.1);
    let mut edge_index = 0u32;
    for node in nodes {
        builder.node_at(node.lat, node.lon, edge_index, node.edges.len() as u32);
        edge_index += node.edges.len() as u32;
    }
    for node in nodes {
        for edge in &node.edges {
            builder.push_edge(*edge);
        }
    }
    if plain {
        builder.write_plain(root).unwrap();
    } else {
        builder.write_compressed(root).unwrap();
    }
}

fn assert_no_cycles(summary: &veloroute::RouteSummary) {
    let distinct: HashSet<NodeRef> = summary.path.iter().map(|p| p.state).collect();
    assert_eq!(distinct.len(), summary.path.len(), "path revisits a state");
}

/// Two nodes ~980 m apart joined by a cycleway in both directions.
fn cycleway_pair(root: &Path, plain: bool) -> u32 {
    let tile_id = tile_id_for(47.30, 8.10);
    let edge = |to: u32| EdgeSpec {
        use_class: use_class::CYCLEWAY,
        ..EdgeSpec::bike_edge(tile_id, to, 1000)
    };
    build_tile(
        root,
        tile_id,
        (47.25, 8.0),
        &[
            FixtureNode {
                lat: 47.30,
                lon: 8.10,
                edges: vec![edge(1)],
            },
            FixtureNode {
                lat: 47.30,
                lon: 8.113,
                edges: vec![edge(0)],
            },
        ],
        plain,
    );
    tile_id
}

fn hybrid_profile() -> RiderProfile {
    RiderProfile {
        bicycle_type: BicycleType::Hybrid,
        ..Default::default()
    }
}

/// A single direct cycleway edge between two nodes in one tile.
#[test]
fn test_direct_cycleway_route() {
    let dir = TempDir::new().unwrap();
    cycleway_pair(dir.path(), false);

    let mut router = Router::new(dir.path().to_path_buf(), hybrid_profile());
    let summary = router.route(47.30, 8.10, 47.30, 8.113).unwrap();

    assert_eq!(summary.path.len(), 2);
    assert!((summary.distance_m - 1000.0).abs() < 1e-9);
    assert!((summary.exposure.car_free_m - 1000.0).abs() < 1e-9);
    assert_eq!(summary.exposure.with_cars_m, 0.0);
    assert_eq!(summary.exposure.separated_m, 0.0);
    assert_eq!(summary.exposure.pushing_m, 0.0);
    assert_no_cycles(&summary);

    // Hybrid at 18 km/h, grade-7 factor 0.95, cycleway preference
    // 0.90, hill term 1 + 0.75 * 0.1 at the default use_hills.
    let expected = 1000.0 * 3.6 / (18.0 * 0.95) * 0.90 * 1.075;
    assert!(
        (summary.cost - expected).abs() < 1e-6,
        "cost {} != {expected}",
        summary.cost
    );
}

#[test]
fn test_uncompressed_fallback_route() {
    let dir = TempDir::new().unwrap();
    cycleway_pair(dir.path(), true);
    let mut router = Router::new(dir.path().to_path_buf(), hybrid_profile());
    let summary = router.route(47.30, 8.10, 47.30, 8.113).unwrap();
    assert_eq!(summary.path.len(), 2);
}

#[test]
fn test_same_node_is_trivial() {
    let dir = TempDir::new().unwrap();
    cycleway_pair(dir.path(), false);
    let mut router = Router::new(dir.path().to_path_buf(), hybrid_profile());
    let summary = router.route(47.30, 8.10, 47.3001, 8.1001).unwrap();
    assert_eq!(summary.path.len(), 1);
    assert_eq!(summary.cost, 0.0);
    assert_eq!(summary.distance_m, 0.0);
    assert_eq!(summary.iterations, 0);
}

#[test]
fn test_missing_origin_tile() {
    let dir = TempDir::new().unwrap();
    let mut router = Router::new(dir.path().to_path_buf(), hybrid_profile());
    let err = router.route(47.30, 8.10, 47.30, 8.113).unwrap_err();
    assert!(matches!(err, RouteError::TileNotFound { .. }));
}

/// A pedestrian-only edge is routable but costed as pushing, and its
/// distance lands in the pushing bucket.
#[test]
fn test_pedestrian_only_edge_is_pushed() {
    let dir = TempDir::new().unwrap();
    let tile_id = tile_id_for(47.30, 8.10);
    let edge = |to: u32| EdgeSpec {
        use_class: use_class::FOOTWAY,
        forward_access: ACCESS_PEDESTRIAN,
        reverse_access: ACCESS_PEDESTRIAN,
        ..EdgeSpec::bike_edge(tile_id, to, 1000)
    };
    build_tile(
        dir.path(),
        tile_id,
        (47.25, 8.0),
        &[
            FixtureNode {
                lat: 47.30,
                lon: 8.10,
                edges: vec![edge(1)],
            },
            FixtureNode {
                lat: 47.30,
                lon: 8.113,
                edges: vec![edge(0)],
            },
        ],
        false,
    );

    let mut router = Router::new(dir.path().to_path_buf(), hybrid_profile());
    let summary = router.route(47.30, 8.10, 47.30, 8.113).unwrap();

    assert_eq!(summary.path.len(), 2);
    assert!((summary.exposure.pushing_m - 1000.0).abs() < 1e-9);
    assert_eq!(summary.exposure.car_free_m, 0.0);

    // Footway preference 0.95, pushing applied twice (preference and
    // expansion), hill term 1.075.
    let expected = 1000.0 * 3.6 / (18.0 * 0.95) * 0.95 * 2.0 * 2.0 * 1.075;
    assert!((summary.cost - expected).abs() < 1e-6);

    // avoid_pushing raises both multipliers from 2 to 5.
    let mut strict = Router::new(
        dir.path().to_path_buf(),
        RiderProfile {
            avoid_pushing: true,
            ..hybrid_profile()
        },
    );
    let avoided = strict.route(47.30, 8.10, 47.30, 8.113).unwrap();
    assert!((avoided.cost / summary.cost - 25.0 / 4.0).abs() < 1e-9);
}

/// Origin and destination in adjacent tiles; the backward search
/// crosses back into the origin tile through the cache.
#[test]
fn test_two_tile_crossing() {
    let dir = TempDir::new().unwrap();
    let tile_a = tile_id_for(47.30, 8.24);
    let tile_b = tile_id_for(47.30, 8.26);
    assert_ne!(tile_a, tile_b);

    build_tile(
        dir.path(),
        tile_a,
        (47.25, 8.0),
        &[
            FixtureNode {
                lat: 47.30,
                lon: 8.24,
                edges: vec![EdgeSpec::bike_edge(tile_a, 1, 700)],
            },
            FixtureNode {
                lat: 47.30,
                lon: 8.249,
                edges: vec![
                    EdgeSpec::bike_edge(tile_a, 0, 700),
                    EdgeSpec::bike_edge(tile_b, 0, 900),
                ],
            },
        ],
        false,
    );
    build_tile(
        dir.path(),
        tile_b,
        (47.25, 8.25),
        &[FixtureNode {
            lat: 47.30,
            lon: 8.26,
            edges: vec![EdgeSpec::bike_edge(tile_a, 1, 900)],
        }],
        false,
    );

    let mut router = Router::new(dir.path().to_path_buf(), hybrid_profile());
    let summary = router.route(47.30, 8.24, 47.30, 8.26).unwrap();

    let states: Vec<NodeRef> = summary.path.iter().map(|p| p.state).collect();
    assert_eq!(
        states,
        vec![
            NodeRef::new(tile_a, 0),
            NodeRef::new(tile_a, 1),
            NodeRef::new(tile_b, 0),
        ]
    );
    assert!((summary.distance_m - 1600.0).abs() < 1e-9);
    assert_eq!(router.cache().loads(), 2);
    assert_no_cycles(&summary);
}

/// The only edge has a surface the road bike rejects.
#[test]
fn test_unrideable_surface_is_no_path() {
    let dir = TempDir::new().unwrap();
    let tile_id = tile_id_for(47.30, 8.10);
    let edge = |to: u32| EdgeSpec {
        surface: 6,
        ..EdgeSpec::bike_edge(tile_id, to, 1000)
    };
    build_tile(
        dir.path(),
        tile_id,
        (47.25, 8.0),
        &[
            FixtureNode {
                lat: 47.30,
                lon: 8.10,
                edges: vec![edge(1)],
            },
            FixtureNode {
                lat: 47.30,
                lon: 8.113,
                edges: vec![edge(0)],
            },
        ],
        false,
    );

    let mut router = Router::new(
        dir.path().to_path_buf(),
        RiderProfile {
            bicycle_type: BicycleType::Road,
            ..Default::default()
        },
    );
    let err = router.route(47.30, 8.10, 47.30, 8.113).unwrap_err();
    match err {
        RouteError::NoPath { iterations } => assert_eq!(iterations, 2),
        other => panic!("expected NoPath, got {other:?}"),
    }

    // The same fixture is rideable on a mountain bike.
    let mut mountain = Router::new(dir.path().to_path_buf(), RiderProfile::default());
    assert!(mountain.route(47.30, 8.10, 47.30, 8.113).is_ok());
}

/// The iteration budget cuts a long chain short and the performed
/// count is reported.
#[test]
fn test_iteration_budget_reports_count() {
    let dir = TempDir::new().unwrap();
    let tile_id = tile_id_for(47.30, 8.10);
    let count = 40u32;
    let mut nodes = Vec::new();
    for i in 0..count {
        let mut edges = Vec::new();
        if i > 0 {
            edges.push(EdgeSpec::bike_edge(tile_id, i - 1, 250));
        }
        if i + 1 < count {
            edges.push(EdgeSpec::bike_edge(tile_id, i + 1, 250));
        }
        nodes.push(FixtureNode {
            lat: 47.30 + 0.002 * i as f64,
            lon: 8.10,
            edges,
        });
    }
    build_tile(dir.path(), tile_id, (47.25, 8.0), &nodes, false);

    let mut router =
        Router::new(dir.path().to_path_buf(), hybrid_profile()).with_max_iterations(10);
    let err = router
        .route(47.30, 8.10, 47.30 + 0.002 * (count - 1) as f64, 8.10)
        .unwrap_err();
    match err {
        RouteError::NoPath { iterations } => assert_eq!(iterations, 10),
        other => panic!("expected NoPath, got {other:?}"),
    }

    // The same chain resolves under the distance-derived budget.
    let mut patient = Router::new(dir.path().to_path_buf(), hybrid_profile());
    let summary = patient
        .route(47.30, 8.10, 47.30 + 0.002 * (count - 1) as f64, 8.10)
        .unwrap();
    assert_eq!(summary.path.len(), count as usize);
    assert_no_cycles(&summary);
}

/// Unidirectional Dijkstra over the same tiles and cost model.
fn reference_cost(root: &Path, profile: RiderProfile, from: NodeRef, to: NodeRef) -> Option<f64> {
    let model = CostModel::new(profile);
    let mut cache = TileCache::new(root.to_path_buf());
    let mut dist: HashMap<NodeRef, f64> = HashMap::new();
    let mut settled: HashSet<NodeRef> = HashSet::new();
    dist.insert(from, 0.0);

    loop {
        let current = dist
            .iter()
            .filter(|(state, _)| !settled.contains(*state))
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(state, g)| (*state, *g));
        let (state, g) = current?;
        if state == to {
            return Some(g);
        }
        settled.insert(state);

        let mut edges = Vec::new();
        {
            let tile = cache.get(state.tile_id).ok()?;
            let node = *tile.node(state.node_id)?;
            for ei in tile.outgoing(&node) {
                if let (Some(end), Some(attrs)) = (tile.edge_end(ei), tile.edge_attrs(ei)) {
                    edges.push((end, attrs));
                }
            }
        }
        for (end, attrs) in edges {
            if end.end_level != 2 || (!end.has_bike() && !end.has_pedestrian()) {
                continue;
            }
            let mut cost = match model.edge_cost(&end, &attrs) {
                Some(cost) => cost,
                None => continue,
            };
            if end.pushing_only() {
                cost *= model.pushing_penalty();
            }
            let next = NodeRef::new(end.end_tile_id, end.end_node_id);
            let entry = dist.entry(next).or_insert(f64::INFINITY);
            if g + cost < *entry {
                *entry = g + cost;
            }
        }
    }
}

/// The bidirectional search agrees with a reference Dijkstra on a
/// 3x3 grid with varied edge lengths.
#[test]
fn test_bidirectional_matches_dijkstra_on_grid() {
    let dir = TempDir::new().unwrap();
    let tile_id = tile_id_for(47.30, 8.10);
    let index = |r: u32, c: u32| r * 3 + c;
    // Symmetric per pair, long enough to keep the heuristic a lower
    // bound (grid spacing is ~1.1 km).
    let length = |a: u32, b: u32| 1200 + 13 * (a + b) + 7 * ((a * b) % 11);

    let mut lengths: HashMap<(u32, u32), u32> = HashMap::new();
    let mut nodes = Vec::new();
    for r in 0..3u32 {
        for c in 0..3u32 {
            let here = index(r, c);
            let mut edges = Vec::new();
            let mut neighbors = Vec::new();
            if r > 0 {
                neighbors.push(index(r - 1, c));
            }
            if r < 2 {
                neighbors.push(index(r + 1, c));
            }
            if c > 0 {
                neighbors.push(index(r, c - 1));
            }
            if c < 2 {
                neighbors.push(index(r, c + 1));
            }
            for other in neighbors {
                let len = length(here.min(other), here.max(other));
                lengths.insert((here, other), len);
                edges.push(EdgeSpec {
                    grade: 6,
                    ..EdgeSpec::bike_edge(tile_id, other, len)
                });
            }
            nodes.push(FixtureNode {
                lat: 47.30 + 0.01 * r as f64,
                lon: 8.10 + 0.01 * c as f64,
                edges,
            });
        }
    }
    build_tile(dir.path(), tile_id, (47.25, 8.0), &nodes, false);

    let profile = RiderProfile::default();
    let mut router = Router::new(dir.path().to_path_buf(), profile).with_visited_slots(50_021);
    let summary = router.route(47.30, 8.10, 47.32, 8.12).unwrap();
    assert_no_cycles(&summary);

    // Identical inputs replay to the identical path.
    let replay = router.route(47.30, 8.10, 47.32, 8.12).unwrap();
    let states: Vec<NodeRef> = summary.path.iter().map(|p| p.state).collect();
    let replay_states: Vec<NodeRef> = replay.path.iter().map(|p| p.state).collect();
    assert_eq!(states, replay_states);
    assert_eq!(summary.iterations, replay.iterations);

    let reference = reference_cost(
        dir.path(),
        profile,
        NodeRef::new(tile_id, 0),
        NodeRef::new(tile_id, 8),
    )
    .unwrap();
    assert!(
        (summary.cost - reference).abs() <= 1e-4 * reference,
        "bidirectional {} vs dijkstra {reference}",
        summary.cost
    );

    // The exposure buckets partition the path's edge length.
    let mut expected_total = 0.0;
    for pair in summary.path.windows(2) {
        let a = pair[0].state.node_id;
        let b = pair[1].state.node_id;
        expected_total += lengths[&(a, b)] as f64;
    }
    let total = summary.exposure.total_m();
    assert!((total - expected_total).abs() <= 1e-6 * expected_total);
    assert!((summary.distance_m - expected_total).abs() <= 1e-6 * expected_total);
}
