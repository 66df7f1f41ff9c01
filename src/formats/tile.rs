//! Graph tile format (one `.gph` file per 0.25 degree level-2 cell).
//!
//! Layout (little-endian, bit-packed within 64-bit words):
//!
//! Header (272 bytes):
//!   word 0:        graph id: level (3 bits) + tile id (22 bits)
//!   bytes 8..12:   base longitude (f32)
//!   bytes 12..16:  base latitude (f32)
//!   bytes 40..48:  node count (bits 0-20) + directed edge count (bits 21-41)
//!   bytes 48..52:  transition count (bits 0-21)
//!
//! Node records (32 bytes each, starting at byte 272):
//!   word 0: lat offset: micro-degrees (bits 0-21) + tenths (bits 22-25)
//!           lon offset: micro-degrees (bits 26-47) + tenths (bits 48-51)
//!   word 1: first outgoing edge index (bits 0-20) + edge count (bits 21-27)
//!
//! Transition records (8 bytes each) follow the nodes; they are not
//! consumed here but size the directed-edge offset.
//!
//! Directed edge records (48 bytes each) follow the transitions. Two
//! projections are read from each record:
//!   word 0: end node graph id: level (bits 0-2) + tile id (bits 3-24)
//!           + node id (bits 25-45)
//!   word 2: default speed (bits 0-7), use class (bits 40-45),
//!           lane count (bits 46-49), classification (bits 54-56),
//!           surface (bits 57-59)
//!   word 3: forward access (bits 0-11), reverse access (bits 12-23),
//!           cycle lane (bits 37-38), bike network (bit 39),
//!           use sidepath (bit 40), shoulder (bit 41), dismount (bit 42)
//!   word 4: length in meters (bits 32-55), weighted grade (bits 56-59)

use crate::error::RouteError;
use crate::formats::reader::{bits, ByteReader};

pub const HEADER_SIZE: usize = 272;
pub const NODE_SIZE: usize = 32;
pub const TRANSITION_SIZE: usize = 8;
pub const EDGE_SIZE: usize = 48;

/// Access mask bits shared by the forward and reverse access fields.
pub const ACCESS_CAR: u16 = 0x1;
pub const ACCESS_PEDESTRIAN: u16 = 0x2;
pub const ACCESS_BICYCLE: u16 = 0x4;

/// A node with absolute coordinates and its outgoing-edge span.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub lat: f64,
    pub lon: f64,
    pub edge_index: u32,
    pub edge_count: u32,
}

/// Connectivity projection of a directed edge record.
#[derive(Debug, Clone, Copy)]
pub struct EdgeEnd {
    pub end_level: u8,
    pub end_tile_id: u32,
    pub end_node_id: u32,
    pub forward_access: u16,
    pub reverse_access: u16,
}

impl EdgeEnd {
    pub fn has_bike(&self) -> bool {
        (self.forward_access | self.reverse_access) & ACCESS_BICYCLE != 0
    }

    pub fn has_pedestrian(&self) -> bool {
        (self.forward_access | self.reverse_access) & ACCESS_PEDESTRIAN != 0
    }

    pub fn has_car(&self) -> bool {
        (self.forward_access | self.reverse_access) & ACCESS_CAR != 0
    }

    /// Pedestrian access without bicycle access: the bike is pushed.
    pub fn pushing_only(&self) -> bool {
        self.has_pedestrian() && !self.has_bike()
    }
}

/// Attribute projection of a directed edge record.
///
/// Fields hold the raw decoded values; the zero-means-default rules
/// live in the accessor methods so decoding stays lossless.
#[derive(Debug, Clone, Copy)]
pub struct EdgeAttrs {
    pub length_m: u32,
    pub raw_speed_kph: u8,
    pub use_class: u8,
    pub classification: u8,
    pub surface: u8,
    pub raw_lane_count: u8,
    pub cycle_lane: u8,
    pub bike_network: bool,
    pub use_sidepath: bool,
    pub shoulder: bool,
    pub dismount: bool,
    pub raw_grade: u8,
}

impl EdgeAttrs {
    /// Posted/default speed in km/h; unset (0) means 15 km/h.
    pub fn speed_kph(&self) -> u8 {
        if self.raw_speed_kph == 0 {
            15
        } else {
            self.raw_speed_kph
        }
    }

    /// Lane count; unset (0) means a single lane.
    pub fn lane_count(&self) -> u8 {
        if self.raw_lane_count == 0 {
            1
        } else {
            self.raw_lane_count
        }
    }

    /// Weighted grade index 0..15; unset (0) means 7 (flat).
    pub fn grade(&self) -> u8 {
        if self.raw_grade == 0 {
            7
        } else {
            self.raw_grade
        }
    }
}

/// A parsed tile: owns its raw decompressed buffer and node table.
///
/// Edge records stay in the raw buffer and are projected on demand,
/// so the two views of the 48-byte record never exist twice.
#[derive(Debug)]
pub struct Tile {
    pub tile_id: u32,
    pub base_lat: f64,
    pub base_lon: f64,
    pub node_count: u32,
    pub edge_count: u32,
    pub transition_count: u32,
    edges_offset: usize,
    nodes: Vec<Node>,
    raw: Vec<u8>,
}

impl Tile {
    /// Decode a tile from its decompressed bytes.
    pub fn parse(tile_id: u32, raw: Vec<u8>) -> Result<Tile, RouteError> {
        let malformed = |reason: &str| RouteError::MalformedTile {
            tile_id,
            reason: reason.to_string(),
        };

        if raw.len() < HEADER_SIZE {
            return Err(malformed("shorter than header"));
        }
        let r = ByteReader::new(&raw);

        let base_lon = r.f32_at(8).ok_or_else(|| malformed("truncated header"))? as f64;
        let base_lat = r.f32_at(12).ok_or_else(|| malformed("truncated header"))? as f64;

        let counts = r.u64_at(40).ok_or_else(|| malformed("truncated header"))?;
        let node_count = bits(counts, 0, 21) as u32;
        let edge_count = bits(counts, 21, 21) as u32;
        let transition_count =
            bits(r.u32_at(48).ok_or_else(|| malformed("truncated header"))? as u64, 0, 22) as u32;

        let transitions_offset = HEADER_SIZE + node_count as usize * NODE_SIZE;
        let edges_offset = transitions_offset + transition_count as usize * TRANSITION_SIZE;
        let table_end = edges_offset + edge_count as usize * EDGE_SIZE;
        if table_end > raw.len() {
            return Err(malformed("declared counts overflow file"));
        }

        let mut nodes = Vec::with_capacity(node_count as usize);
        for i in 0..node_count as usize {
            let offset = HEADER_SIZE + i * NODE_SIZE;
            // In bounds: the node table precedes the checked edge table.
            let w0 = r.u64_at(offset).ok_or_else(|| malformed("truncated node table"))?;
            let w1 = r.u64_at(offset + 8).ok_or_else(|| malformed("truncated node table"))?;
            nodes.push(Node {
                lat: base_lat + bits(w0, 0, 22) as f64 * 1e-6 + bits(w0, 22, 4) as f64 * 1e-7,
                lon: base_lon + bits(w0, 26, 22) as f64 * 1e-6 + bits(w0, 48, 4) as f64 * 1e-7,
                edge_index: bits(w1, 0, 21) as u32,
                edge_count: bits(w1, 21, 7) as u32,
            });
        }

        Ok(Tile {
            tile_id,
            base_lat,
            base_lon,
            node_count,
            edge_count,
            transition_count,
            edges_offset,
            nodes,
            raw,
        })
    }

    pub fn node(&self, node_id: u32) -> Option<&Node> {
        self.nodes.get(node_id as usize)
    }

    /// Indices of a node's outgoing edges, clamped to the edge table.
    pub fn outgoing(&self, node: &Node) -> std::ops::Range<u32> {
        let end = (node.edge_index + node.edge_count).min(self.edge_count);
        node.edge_index.min(end)..end
    }

    fn edge_word(&self, edge_index: u32, word: usize) -> Option<u64> {
        if edge_index >= self.edge_count {
            return None;
        }
        let offset = self.edges_offset + edge_index as usize * EDGE_SIZE + word * 8;
        ByteReader::new(&self.raw).u64_at(offset)
    }

    /// Connectivity projection of one directed edge.
    pub fn edge_end(&self, edge_index: u32) -> Option<EdgeEnd> {
        let w0 = self.edge_word(edge_index, 0)?;
        let w3 = self.edge_word(edge_index, 3)?;
        let end = bits(w0, 0, 46);
        Some(EdgeEnd {
            end_level: bits(end, 0, 3) as u8,
            end_tile_id: bits(end, 3, 22) as u32,
            end_node_id: bits(end, 25, 21) as u32,
            forward_access: bits(w3, 0, 12) as u16,
            reverse_access: bits(w3, 12, 12) as u16,
        })
    }

    /// Attribute projection of one directed edge.
    pub fn edge_attrs(&self, edge_index: u32) -> Option<EdgeAttrs> {
        let w2 = self.edge_word(edge_index, 2)?;
        let w3 = self.edge_word(edge_index, 3)?;
        let w4 = self.edge_word(edge_index, 4)?;
        Some(EdgeAttrs {
            length_m: bits(w4, 32, 24) as u32,
            raw_speed_kph: bits(w2, 0, 8) as u8,
            use_class: bits(w2, 40, 6) as u8,
            classification: bits(w2, 54, 3) as u8,
            surface: bits(w2, 57, 3) as u8,
            raw_lane_count: bits(w2, 46, 4) as u8,
            cycle_lane: bits(w3, 37, 2) as u8,
            bike_network: bits(w3, 39, 1) != 0,
            use_sidepath: bits(w3, 40, 1) != 0,
            shoulder: bits(w3, 41, 1) != 0,
            dismount: bits(w3, 42, 1) != 0,
            raw_grade: bits(w4, 56, 4) as u8,
        })
    }
}
