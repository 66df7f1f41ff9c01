//! Tile image construction.
//!
//! Packs node and directed-edge specs into the binary layout that
//! [`Tile::parse`](crate::formats::tile::Tile::parse) decodes. This
//! is the write side the round-trip tests and synthetic fixtures are
//! built on; the router itself never writes tiles.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::cache::tile_path;
use crate::formats::tile::{
    ACCESS_BICYCLE, ACCESS_CAR, ACCESS_PEDESTRIAN, EDGE_SIZE, HEADER_SIZE, NODE_SIZE,
    TRANSITION_SIZE,
};
use crate::graph::GRAPH_LEVEL;

/// A node to be packed. Offsets are in micro-degrees plus tenths of a
/// micro-degree relative to the tile base.
#[derive(Debug, Clone, Copy)]
pub struct NodeSpec {
    pub lat_micro: u64,
    pub lat_tenth: u64,
    pub lon_micro: u64,
    pub lon_tenth: u64,
    pub edge_index: u32,
    pub edge_count: u32,
}

impl NodeSpec {
    /// Build from exact packed offsets (22-bit micro, 4-bit tenth).
    pub fn with_offsets(
        lat_micro: u64,
        lat_tenth: u64,
        lon_micro: u64,
        lon_tenth: u64,
        edge_index: u32,
        edge_count: u32,
    ) -> Self {
        Self {
            lat_micro,
            lat_tenth,
            lon_micro,
            lon_tenth,
            edge_index,
            edge_count,
        }
    }
}

/// A directed edge to be packed.
#[derive(Debug, Clone, Copy)]
pub struct EdgeSpec {
    pub end_level: u8,
    pub end_tile_id: u32,
    pub end_node_id: u32,
    pub forward_access: u16,
    pub reverse_access: u16,
    pub length_m: u32,
    pub speed_kph: u8,
    pub use_class: u8,
    pub classification: u8,
    pub surface: u8,
    pub lane_count: u8,
    pub cycle_lane: u8,
    pub bike_network: bool,
    pub use_sidepath: bool,
    pub shoulder: bool,
    pub dismount: bool,
    pub grade: u8,
}

impl Default for EdgeSpec {
    fn default() -> Self {
        Self {
            end_level: GRAPH_LEVEL,
            end_tile_id: 0,
            end_node_id: 0,
            forward_access: 0,
            reverse_access: 0,
            length_m: 0,
            speed_kph: 0,
            use_class: 0,
            classification: 5,
            surface: 0,
            lane_count: 0,
            cycle_lane: 0,
            bike_network: false,
            use_sidepath: false,
            shoulder: false,
            dismount: false,
            grade: 7,
        }
    }
}

impl EdgeSpec {
    /// A plain bike-and-pedestrian-accessible edge of the given length.
    pub fn bike_edge(end_tile_id: u32, end_node_id: u32, length_m: u32) -> Self {
        Self {
            end_tile_id,
            end_node_id,
            forward_access: ACCESS_BICYCLE | ACCESS_PEDESTRIAN,
            reverse_access: ACCESS_BICYCLE | ACCESS_PEDESTRIAN,
            length_m,
            ..Default::default()
        }
    }

    /// A car-accessible road edge of the given length.
    pub fn road_edge(end_tile_id: u32, end_node_id: u32, length_m: u32) -> Self {
        Self {
            forward_access: ACCESS_BICYCLE | ACCESS_PEDESTRIAN | ACCESS_CAR,
            reverse_access: ACCESS_BICYCLE | ACCESS_PEDESTRIAN | ACCESS_CAR,
            ..Self::bike_edge(end_tile_id, end_node_id, length_m)
        }
    }
}

pub struct TileBuilder {
    tile_id: u32,
    base_lat: f32,
    base_lon: f32,
    transition_records: u32,
    nodes: Vec<NodeSpec>,
    edges: Vec<EdgeSpec>,
}

impl TileBuilder {
    pub fn new(tile_id: u32, base_lat: f32, base_lon: f32) -> Self {
        Self {
            tile_id,
            base_lat,
            base_lon,
            transition_records: 0,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn push_node(&mut self, node: NodeSpec) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Push a node at absolute coordinates, deriving the packed
    /// offsets from the tile base. Coordinates must lie north-east of
    /// the base (offsets are unsigned).
    pub fn node_at(&mut self, lat: f64, lon: f64, edge_index: u32, edge_count: u32) -> &mut Self {
        let lat_off = ((lat - self.base_lat as f64) * 1e7).round().max(0.0) as u64;
        let lon_off = ((lon - self.base_lon as f64) * 1e7).round().max(0.0) as u64;
        self.push_node(NodeSpec::with_offsets(
            lat_off / 10,
            lat_off % 10,
            lon_off / 10,
            lon_off % 10,
            edge_index,
            edge_count,
        ))
    }

    pub fn push_edge(&mut self, edge: EdgeSpec) -> &mut Self {
        self.edges.push(edge);
        self
    }

    /// Pad the transitions table with zeroed records, exercising the
    /// edge-offset arithmetic without encoding real transitions.
    pub fn set_transition_records(&mut self, count: u32) -> &mut Self {
        self.transition_records = count;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let size = HEADER_SIZE
            + self.nodes.len() * NODE_SIZE
            + self.transition_records as usize * TRANSITION_SIZE
            + self.edges.len() * EDGE_SIZE;
        let mut out = vec![0u8; HEADER_SIZE];
        out.reserve(size - HEADER_SIZE);

        let graph_id = GRAPH_LEVEL as u64 | ((self.tile_id as u64) << 3);
        out[0..8].copy_from_slice(&graph_id.to_le_bytes());
        out[8..12].copy_from_slice(&self.base_lon.to_le_bytes());
        out[12..16].copy_from_slice(&self.base_lat.to_le_bytes());
        let counts = self.nodes.len() as u64 | ((self.edges.len() as u64) << 21);
        out[40..48].copy_from_slice(&counts.to_le_bytes());
        out[48..52].copy_from_slice(&self.transition_records.to_le_bytes());

        for n in &self.nodes {
            let w0 = (n.lat_micro & 0x3F_FFFF)
                | (n.lat_tenth & 0xF) << 22
                | (n.lon_micro & 0x3F_FFFF) << 26
                | (n.lon_tenth & 0xF) << 48;
            let w1 = (n.edge_index as u64 & 0x1F_FFFF) | ((n.edge_count as u64 & 0x7F) << 21);
            let mut record = [0u8; NODE_SIZE];
            record[0..8].copy_from_slice(&w0.to_le_bytes());
            record[8..16].copy_from_slice(&w1.to_le_bytes());
            out.extend_from_slice(&record);
        }

        out.resize(out.len() + self.transition_records as usize * TRANSITION_SIZE, 0);

        for edge in &self.edges {
            let w0 = edge.end_level as u64 & 0x7
                | ((edge.end_tile_id as u64 & 0x3F_FFFF) << 3)
                | ((edge.end_node_id as u64 & 0x1F_FFFF) << 25);
            let w2 = edge.speed_kph as u64
                | ((edge.use_class as u64 & 0x3F) << 40)
                | ((edge.lane_count as u64 & 0xF) << 46)
                | ((edge.classification as u64 & 0x7) << 54)
                | ((edge.surface as u64 & 0x7) << 57);
            let w3 = edge.forward_access as u64 & 0xFFF
                | ((edge.reverse_access as u64 & 0xFFF) << 12)
                | ((edge.cycle_lane as u64 & 0x3) << 37)
                | ((edge.bike_network as u64) << 39)
                | ((edge.use_sidepath as u64) << 40)
                | ((edge.shoulder as u64) << 41)
                | ((edge.dismount as u64) << 42);
            let w4 = ((edge.length_m as u64 & 0xFF_FFFF) << 32) | ((edge.grade as u64 & 0xF) << 56);
            let mut record = [0u8; EDGE_SIZE];
            record[0..8].copy_from_slice(&w0.to_le_bytes());
            record[16..24].copy_from_slice(&w2.to_le_bytes());
            record[24..32].copy_from_slice(&w3.to_le_bytes());
            record[32..40].copy_from_slice(&w4.to_le_bytes());
            out.extend_from_slice(&record);
        }

        debug_assert_eq!(out.len(), size);
        out
    }

    /// Write the gzip-compressed tile into a tiles root, creating the
    /// `<root>/2/AAA/BBB/` directory layout.
    pub fn write_compressed(&self, root: &Path) -> Result<()> {
        let path = tile_path(root, self.tile_id);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let file = fs::File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut encoder = GzEncoder::new(file, Compression::fast());
        encoder.write_all(&self.to_bytes())?;
        encoder.finish()?;
        Ok(())
    }

    /// Write the tile uncompressed at the `.gph` fallback path.
    pub fn write_plain(&self, root: &Path) -> Result<()> {
        let path = tile_path(root, self.tile_id).with_extension("");
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        fs::write(&path, self.to_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
