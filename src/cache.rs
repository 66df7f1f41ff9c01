//! Bounded tile cache.
//!
//! Tiles are loaded lazily, decompressed into an owned buffer, parsed
//! once, and kept immutable until evicted. Eviction is FIFO in
//! insertion order; the search working set is spatially local enough
//! that recency tracking buys nothing here.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::RouteError;
use crate::formats::tile::Tile;
use crate::graph::GRAPH_LEVEL;

/// Resident tile budget for one query.
pub const DEFAULT_CAPACITY: usize = 200;

/// On-disk location of a level-2 tile: `<root>/2/AAA/BBB/CCC.gph.gz`
/// with the id split into millions / thousands / ones.
pub fn tile_path(root: &Path, tile_id: u32) -> PathBuf {
    root.join(GRAPH_LEVEL.to_string())
        .join(format!("{:03}", tile_id / 1_000_000))
        .join(format!("{:03}", (tile_id / 1_000) % 1_000))
        .join(format!("{:03}.gph.gz", tile_id % 1_000))
}

pub struct TileCache {
    root: PathBuf,
    capacity: usize,
    tiles: HashMap<u32, Tile>,
    insertion_order: VecDeque<u32>,
    loads: u64,
}

impl TileCache {
    pub fn new(root: PathBuf) -> Self {
        Self::with_capacity(root, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(root: PathBuf, capacity: usize) -> Self {
        Self {
            root,
            capacity: capacity.max(1),
            tiles: HashMap::new(),
            insertion_order: VecDeque::new(),
            loads: 0,
        }
    }

    pub fn resident(&self) -> usize {
        self.tiles.len()
    }

    pub fn contains(&self, tile_id: u32) -> bool {
        self.tiles.contains_key(&tile_id)
    }

    /// Number of tile files loaded from disk so far.
    pub fn loads(&self) -> u64 {
        self.loads
    }

    /// Get a tile, loading and possibly evicting on a miss.
    pub fn get(&mut self, tile_id: u32) -> Result<&Tile, RouteError> {
        if !self.tiles.contains_key(&tile_id) {
            let raw = self.read_tile_bytes(tile_id)?;
            let tile = Tile::parse(tile_id, raw)?;
            self.loads += 1;
            while self.tiles.len() >= self.capacity {
                match self.insertion_order.pop_front() {
                    Some(oldest) => {
                        self.tiles.remove(&oldest);
                    }
                    None => break,
                }
            }
            self.tiles.insert(tile_id, tile);
            self.insertion_order.push_back(tile_id);
        }
        Ok(&self.tiles[&tile_id])
    }

    fn read_tile_bytes(&self, tile_id: u32) -> Result<Vec<u8>, RouteError> {
        let gz_path = tile_path(&self.root, tile_id);
        if let Ok(file) = File::open(&gz_path) {
            let mut raw = Vec::new();
            GzDecoder::new(BufReader::new(file))
                .read_to_end(&mut raw)
                .map_err(|e| RouteError::MalformedTile {
                    tile_id,
                    reason: format!("gzip decode failed: {e}"),
                })?;
            return Ok(raw);
        }
        // Uncompressed fallback at the same path without the suffix.
        let plain_path = gz_path.with_extension("");
        std::fs::read(&plain_path).map_err(|_| RouteError::TileNotFound {
            tile_id,
            root: self.root.clone(),
        })
    }
}
