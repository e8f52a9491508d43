//! Recorder-side cache of mono bitmaps shared between bands.

use std::collections::{HashMap, VecDeque};

use xxhash_rust::xxh3::Xxh3;

use crate::raster::MonoBitmap;

use super::band::{BandLayout, TILE_ENTRY_OVERHEAD};
use super::record::MAX_DRAW_RECORD_SIZE;

const TILE_SEED: u64 = 0x6c61_6d69_6e61_7469;

fn tile_key(bitmap: &MonoBitmap) -> u64 {
    let mut h = Xxh3::with_seed(TILE_SEED);
    h.update(&bitmap.width().to_le_bytes());
    h.update(&bitmap.height().to_le_bytes());
    h.update(bitmap.data());
    h.digest()
}

#[derive(Debug)]
struct TileEntry {
    key: u64,
    bitmap: MonoBitmap,
    /// Bands that already received SET_TILE for this id.
    known: Vec<bool>,
}

impl TileEntry {
    fn cost(&self) -> usize {
        self.bitmap.data().len() + TILE_ENTRY_OVERHEAD
    }
}

/// Result of looking a bitmap up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileUse {
    pub id: u32,
    /// Bands of the requested range that still need SET_TILE.
    pub missing: Vec<u32>,
}

/// Bitmaps keyed by content hash, evicted oldest first.
#[derive(Debug)]
pub struct TileCache {
    budget: usize,
    max_entries: usize,
    n_bands: usize,
    used: usize,
    next_id: u32,
    entries: HashMap<u32, TileEntry>,
    by_key: HashMap<u64, Vec<u32>>,
    order: VecDeque<u32>,
}

impl TileCache {
    pub fn new(layout: &BandLayout) -> Self {
        Self {
            budget: layout.tile_cache_bytes,
            max_entries: layout.tile_max_count.min(layout.tile_hash_mask as usize + 1),
            n_bands: layout.n_bands as usize,
            used: 0,
            next_id: 1,
            entries: HashMap::new(),
            by_key: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Whether `bitmap` is small enough to be cached at all: a quarter of the cache, and one
    /// SET_TILE record.
    pub fn accepts(&self, bitmap: &MonoBitmap) -> bool {
        bitmap.data().len() + TILE_ENTRY_OVERHEAD <= (self.budget / 4).min(MAX_DRAW_RECORD_SIZE)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.used
    }

    /// Id of the cached copy of `bitmap` without inserting it.
    pub fn find(&self, bitmap: &MonoBitmap) -> Option<u32> {
        self.by_key
            .get(&tile_key(bitmap))?
            .iter()
            .copied()
            .find(|id| self.entries.get(id).is_some_and(|e| &e.bitmap == bitmap))
    }

    /// Id `bitmap` would get and the bands in `bands` that have not seen it. Does not change
    /// the cache; call [`TileCache::commit`] once the records are written.
    pub fn lookup(&self, bitmap: &MonoBitmap, bands: (u32, u32)) -> TileUse {
        match self.find(bitmap) {
            Some(id) => {
                let known = &self.entries[&id].known;
                TileUse {
                    id,
                    missing: (bands.0..=bands.1)
                        .filter(|&b| !known[b as usize])
                        .collect(),
                }
            }
            None => TileUse {
                id: self.next_id,
                missing: (bands.0..=bands.1).collect(),
            },
        }
    }

    /// Records that the bands in `used.missing` now hold the tile, inserting it if new.
    pub fn commit(&mut self, bitmap: &MonoBitmap, used: &TileUse) {
        if !self.entries.contains_key(&used.id) {
            let key = tile_key(bitmap);
            let entry = TileEntry {
                key,
                bitmap: bitmap.clone(),
                known: vec![false; self.n_bands],
            };
            let cost = entry.cost();
            while !self.order.is_empty()
                && (self.used + cost > self.budget || self.entries.len() >= self.max_entries)
            {
                self.evict_oldest();
            }
            self.used += cost;
            self.entries.insert(used.id, entry);
            self.by_key.entry(key).or_default().push(used.id);
            self.order.push_back(used.id);
            self.next_id = self.next_id.wrapping_add(1).max(1);
        }
        if let Some(entry) = self.entries.get_mut(&used.id) {
            for &b in &used.missing {
                entry.known[b as usize] = true;
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_key.clear();
        self.order.clear();
        self.used = 0;
    }

    fn evict_oldest(&mut self) {
        let Some(id) = self.order.pop_front() else {
            return;
        };
        if let Some(entry) = self.entries.remove(&id) {
            self.used -= entry.cost();
            if let Some(ids) = self.by_key.get_mut(&entry.key) {
                ids.retain(|&i| i != id);
                if ids.is_empty() {
                    self.by_key.remove(&entry.key);
                }
            }
            tracing::trace!(id, "evicted tile");
        }
    }
}
