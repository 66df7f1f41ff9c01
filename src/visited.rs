//! Open-addressed visited maps for the two search directions.
//!
//! Linear probing over a prime-sized slot array, keyed by
//! (tile id, node id) with an FNV-1a hash. Probes are capped so a
//! pathological chain can stall an operation but never the search;
//! the caller drops the corresponding frontier push instead.

use crate::error::RouteError;
use crate::graph::NodeRef;

/// Slot count per direction. Prime, to spread the folded hash.
pub const DEFAULT_SLOTS: usize = 2_000_003;

/// Probe budget per operation.
const PROBE_LIMIT: usize = 2_000;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone, Copy)]
pub struct VisitedEntry {
    /// Best cost observed from this direction's search root.
    pub g: f64,
    /// Predecessor state; `NodeRef::NONE` at the root.
    pub parent: NodeRef,
    /// Index of the edge from the predecessor, within its tile.
    pub parent_edge: u32,
}

#[derive(Clone, Copy)]
struct Slot {
    state: NodeRef,
    entry: VisitedEntry,
    occupied: bool,
}

const EMPTY_SLOT: Slot = Slot {
    state: NodeRef::NONE,
    entry: VisitedEntry {
        g: 0.0,
        parent: NodeRef::NONE,
        parent_edge: 0,
    },
    occupied: false,
};

pub struct VisitedMap {
    slots: Vec<Slot>,
    len: usize,
    high_water_probe: usize,
}

impl VisitedMap {
    pub fn new() -> Result<Self, RouteError> {
        Self::with_slots(DEFAULT_SLOTS)
    }

    pub fn with_slots(slot_count: usize) -> Result<Self, RouteError> {
        let slot_count = slot_count.max(1);
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(slot_count)
            .map_err(|_| RouteError::AllocationFailure {
                what: "visited map",
            })?;
        slots.resize(slot_count, EMPTY_SLOT);
        Ok(Self {
            slots,
            len: 0,
            high_water_probe: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Longest probe chain walked so far; load-factor canary.
    pub fn high_water_probe(&self) -> usize {
        self.high_water_probe
    }

    fn index_of(&self, state: NodeRef) -> usize {
        let mut h = FNV_OFFSET;
        for byte in state
            .tile_id
            .to_le_bytes()
            .into_iter()
            .chain(state.node_id.to_le_bytes())
        {
            h ^= byte as u64;
            h = h.wrapping_mul(FNV_PRIME);
        }
        (h % self.slots.len() as u64) as usize
    }

    pub fn find(&self, state: NodeRef) -> Option<VisitedEntry> {
        let mut index = self.index_of(state);
        for _ in 0..PROBE_LIMIT.min(self.slots.len()) {
            let slot = &self.slots[index];
            if !slot.occupied {
                return None;
            }
            if slot.state == state {
                return Some(slot.entry);
            }
            index = (index + 1) % self.slots.len();
        }
        None
    }

    /// Insert or overwrite the entry for a state. The relaxation test
    /// (`new_g < existing.g`) is the caller's responsibility. Returns
    /// false when the probe budget runs out and the entry is dropped.
    pub fn insert(&mut self, state: NodeRef, g: f64, parent: NodeRef, parent_edge: u32) -> bool {
        let mut index = self.index_of(state);
        for probe in 0..PROBE_LIMIT.min(self.slots.len()) {
            let slot = &mut self.slots[index];
            if !slot.occupied || slot.state == state {
                if !slot.occupied {
                    self.len += 1;
                }
                *slot = Slot {
                    state,
                    entry: VisitedEntry {
                        g,
                        parent,
                        parent_edge,
                    },
                    occupied: true,
                };
                self.high_water_probe = self.high_water_probe.max(probe);
                return true;
            }
            index = (index + 1) % self.slots.len();
        }
        false
    }
}
