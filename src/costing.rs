//! Bicycle cost model.
//!
//! A deterministic, stateless mapping from edge attributes and rider
//! profile to a scalar time-based cost. Speed derives from surface
//! and grade tables per bicycle type; the preference multiplier
//! encodes cycleway, road, network, pushing, hill, and traffic-stress
//! adjustments.

use crate::formats::tile::{EdgeAttrs, EdgeEnd};

/// Road/path use classes consumed by the cost model.
pub mod use_class {
    pub const ROAD: u8 = 0;
    pub const TRACK: u8 = 3;
    pub const LIVING_STREET: u8 = 10;
    pub const SERVICE_ROAD: u8 = 11;
    pub const CYCLEWAY: u8 = 20;
    pub const MOUNTAIN_BIKE: u8 = 21;
    pub const FOOTWAY: u8 = 25;
    pub const STEPS: u8 = 26;
    pub const PATH: u8 = 27;
    pub const FERRY: u8 = 41;
}

/// Base cycling speed on smooth flat pavement, km/h, per bicycle type.
pub const BASE_SPEED_KPH: [f64; 4] = [25.0, 20.0, 18.0, 16.0];

/// Speed factor per weighted grade index (0 steep descent, 15 steep climb).
pub const GRADE_SPEED_FACTOR: [f64; 16] = [
    2.2, 2.0, 1.9, 1.7, 1.4, 1.2, 1.0, 0.95, 0.85, 0.75, 0.65, 0.55, 0.5, 0.45, 0.4, 0.3,
];

/// Speed factor per surface class, one row per bicycle type.
pub const SURFACE_SPEED_FACTOR: [[f64; 8]; 4] = [
    [1.0, 1.0, 0.9, 0.6, 0.5, 0.3, 0.2, 0.0],
    [1.0, 1.0, 1.0, 0.8, 0.7, 0.5, 0.4, 0.0],
    [1.0, 1.0, 1.0, 0.8, 0.6, 0.4, 0.25, 0.0],
    [1.0, 1.0, 1.0, 1.0, 0.9, 0.75, 0.55, 0.0],
];

/// Worst surface class each bicycle type will ride at all.
pub const WORST_ALLOWED_SURFACE: [u8; 4] = [2, 3, 4, 6];

/// Per-grade avoid-hills strengths, scaled by (1 - use_hills).
const HILL_STRENGTH: [f64; 16] = [
    2.0, 1.0, 0.5, 0.2, 0.1, 0.0, 0.05, 0.1, 0.3, 0.8, 2.0, 3.0, 4.5, 6.5, 10.0, 12.0,
];

const DISMOUNT_SPEED_KPH: f64 = 5.1;
const MIN_SPEED_KPH: f64 = 4.0;
const MAX_SPEED_KPH: f64 = 40.0;
const BIKE_NETWORK_FACTOR: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BicycleType {
    Road,
    Cross,
    Hybrid,
    Mountain,
}

impl BicycleType {
    /// Map the wire value 0..3; anything else falls back to mountain,
    /// the most permissive type.
    pub fn from_index(index: u8) -> Self {
        match index {
            0 => BicycleType::Road,
            1 => BicycleType::Cross,
            2 => BicycleType::Hybrid,
            _ => BicycleType::Mountain,
        }
    }

    pub fn index(self) -> usize {
        match self {
            BicycleType::Road => 0,
            BicycleType::Cross => 1,
            BicycleType::Hybrid => 2,
            BicycleType::Mountain => 3,
        }
    }
}

/// Rider preferences controlling the cost model.
#[derive(Debug, Clone, Copy)]
pub struct RiderProfile {
    pub bicycle_type: BicycleType,
    /// Willingness to ride on roads, 0 (avoid) to 1 (freely).
    pub use_roads: f64,
    /// Willingness to climb, 0 (avoid) to 1 (indifferent).
    pub use_hills: f64,
    /// Penalize edges where the bike must be pushed.
    pub avoid_pushing: bool,
    /// Penalize edges shared with car traffic.
    pub avoid_cars: bool,
}

impl Default for RiderProfile {
    fn default() -> Self {
        Self {
            bicycle_type: BicycleType::Mountain,
            use_roads: 0.25,
            use_hills: 0.25,
            avoid_pushing: false,
            avoid_cars: false,
        }
    }
}

/// Precomputed per-query costing tables.
pub struct CostModel {
    bicycle_type: BicycleType,
    use_roads: f64,
    avoid_pushing: bool,
    avoid_cars: bool,
    base_speed_kph: f64,
    surface_speed: [f64; 8],
    worst_surface: u8,
    hill_penalty: [f64; 16],
}

impl CostModel {
    pub fn new(profile: RiderProfile) -> Self {
        let b = profile.bicycle_type.index();
        let use_roads = profile.use_roads.clamp(0.0, 1.0);
        let avoid_hills = 1.0 - profile.use_hills.clamp(0.0, 1.0);
        let mut hill_penalty = [0.0; 16];
        for (penalty, strength) in hill_penalty.iter_mut().zip(HILL_STRENGTH) {
            *penalty = avoid_hills * strength;
        }
        Self {
            bicycle_type: profile.bicycle_type,
            use_roads,
            avoid_pushing: profile.avoid_pushing,
            avoid_cars: profile.avoid_cars,
            base_speed_kph: BASE_SPEED_KPH[b],
            surface_speed: SURFACE_SPEED_FACTOR[b],
            worst_surface: WORST_ALLOWED_SURFACE[b],
            hill_penalty,
        }
    }

    /// Upper bound on cost-speed used to scale the search heuristic.
    pub fn max_speed_kph(&self) -> f64 {
        2.0 * self.base_speed_kph
    }

    /// Expansion-time multiplier for pedestrian-only edges.
    pub fn pushing_penalty(&self) -> f64 {
        if self.avoid_pushing {
            5.0
        } else {
            2.0
        }
    }

    pub fn surface_allowed(&self, surface: u8) -> bool {
        surface <= self.worst_surface
    }

    /// Riding speed in km/h for an edge, before any preference factor.
    pub fn cycling_speed_kph(&self, attrs: &EdgeAttrs) -> f64 {
        if attrs.dismount {
            return DISMOUNT_SPEED_KPH;
        }
        let surface = self.surface_speed[attrs.surface.min(7) as usize];
        let grade = GRADE_SPEED_FACTOR[(attrs.grade() & 0xF) as usize];
        (self.base_speed_kph * surface * grade).clamp(MIN_SPEED_KPH, MAX_SPEED_KPH)
    }

    /// Traversal cost of an edge in time units, or `None` when the
    /// surface is beyond what this bicycle type rides.
    ///
    /// Pure: repeated invocation with equal inputs yields equal
    /// output, independent of call order.
    pub fn edge_cost(&self, end: &EdgeEnd, attrs: &EdgeAttrs) -> Option<f64> {
        if !self.surface_allowed(attrs.surface) {
            return None;
        }
        let length = attrs.length_m as f64;

        // Steps and ferries bypass the riding-speed model entirely.
        if attrs.use_class == use_class::STEPS {
            return Some(length * (3.6 / 4.0) * 3.0);
        }
        if attrs.use_class == use_class::FERRY {
            return Some(length * (3.6 / attrs.speed_kph() as f64) * 1.2);
        }

        let seconds = length * 3.6 / self.cycling_speed_kph(attrs);

        let mut factor = match attrs.use_class {
            use_class::CYCLEWAY | use_class::TRACK => 0.90,
            use_class::MOUNTAIN_BIKE if self.bicycle_type == BicycleType::Mountain => 0.85,
            use_class::PATH | use_class::FOOTWAY => 0.95,
            use_class::LIVING_STREET => 0.95,
            use_class::ROAD => {
                let mut road = 1.0 + (1.0 - self.use_roads) * 0.15;
                if attrs.cycle_lane >= 2 {
                    road -= 0.10;
                }
                road
            }
            _ => 1.0,
        };

        if attrs.bike_network {
            factor *= BIKE_NETWORK_FACTOR;
        }
        if end.pushing_only() {
            factor *= self.pushing_penalty();
        }
        if self.avoid_cars && end.has_car() {
            factor *= self.car_stress_factor(attrs);
        }
        factor *= 1.0 + self.hill_penalty[(attrs.grade() & 0xF) as usize];

        Some(seconds * factor)
    }

    fn car_stress_factor(&self, attrs: &EdgeAttrs) -> f64 {
        match attrs.use_class {
            use_class::TRACK | use_class::LIVING_STREET | use_class::SERVICE_ROAD => 1.05,
            _ => {
                let speed = attrs.speed_kph();
                let mut stress: f64 = 0.2;
                if speed > 50 {
                    stress += 0.3;
                }
                if speed > 70 {
                    stress += 0.3;
                }
                if attrs.classification <= 2 {
                    stress += 0.2;
                }
                if attrs.lane_count() >= 2 {
                    stress += 0.1;
                }
                if attrs.cycle_lane >= 2 {
                    stress -= 0.3;
                }
                1.0 + stress.clamp(0.1, 1.0) * 0.5
            }
        }
    }
}
