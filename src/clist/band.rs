//! Splitting a page into bands under a working-memory budget.

use serde::{Deserialize, Serialize};

use crate::foundation::error::{LaminaError, LaminaResult};
use crate::foundation::math::align4;

use super::codec::ByteOrder;
use super::record::MAX_DRAW_RECORD_SIZE;

/// Bytes of per-band bookkeeping (record count, colors used, run cursor).
pub const BAND_STATE_SIZE: usize = 64;
/// Bytes reserved ahead of every buffered run.
pub const CMD_PREFIX_SIZE: usize = 16;
/// Smallest tile cache worth having.
pub const MIN_TILE_CACHE: usize = 1024;
/// Per-entry bookkeeping of the tile cache on top of the bitmap bytes.
pub const TILE_ENTRY_OVERHEAD: usize = 32;
/// Bitmap bytes assumed for an average cached tile.
pub const AVG_TILE_BITS: usize = 128;
const HASH_SLOT_SIZE: usize = 4;
const MIN_HASH_MASK: u32 = 0xff;
const MAX_HASH_MASK: u32 = 0xfff;

/// Banding configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandOpts {
    /// Fixed band height; derived from the budget when `None`.
    pub band_height: Option<u32>,
    /// Space shared by band scratch rows, the tile cache and the command buffer; defaults to
    /// `memory_budget`.
    pub band_buffer_space: Option<usize>,
    pub memory_budget: usize,
    pub byte_order: ByteOrder,
    /// A halftoning device needs the full tile cache.
    pub must_halftone: bool,
    /// Upper bound on log bytes held in memory across all pages; `None` is unbounded.
    pub max_stream_bytes: Option<usize>,
}

impl Default for BandOpts {
    fn default() -> Self {
        Self {
            band_height: None,
            band_buffer_space: None,
            memory_budget: 4 << 20,
            byte_order: ByteOrder::Little,
            must_halftone: false,
            max_stream_bytes: None,
        }
    }
}

/// Page properties that drive banding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageGeometry {
    pub width: u32,
    pub height: u32,
    pub n_colorants: usize,
    pub uses_transparency: bool,
}

/// Result of partitioning: band size and how the band buffer space is divided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandLayout {
    pub band_height: u32,
    pub n_bands: u32,
    pub page_height: u32,
    pub tile_cache_bytes: usize,
    pub tile_max_count: usize,
    pub tile_hash_mask: u32,
    pub command_buffer_bytes: usize,
    pub scratch_row_bytes: usize,
}

impl BandLayout {
    /// Rows `y0..y1` of band `band`.
    pub fn band_rows(&self, band: u32) -> (i32, i32) {
        let y0 = band.saturating_mul(self.band_height).min(self.page_height);
        let y1 = y0.saturating_add(self.band_height).min(self.page_height);
        (y0 as i32, y1 as i32)
    }

    /// Inclusive band range touched by rows `y0..y1`, if any.
    pub fn bands_for_rows(&self, y0: i32, y1: i32) -> Option<(u32, u32)> {
        let y0 = y0.max(0);
        let y1 = y1.min(self.page_height as i32);
        if y0 >= y1 {
            return None;
        }
        let bh = self.band_height as i32;
        Some(((y0 / bh) as u32, ((y1 - 1) / bh) as u32))
    }
}

fn tile_cache_size(budget: usize, must_halftone: bool) -> usize {
    let mut size = (budget / 5) & !7;
    if !must_halftone {
        size -= size / 4;
    }
    size.max(MIN_TILE_CACHE)
}

fn scratch_row_bytes(page: &PageGeometry) -> usize {
    let raster = page.width as usize * page.n_colorants;
    let planar = if page.uses_transparency {
        align4(page.width as usize) * (page.n_colorants + 3)
    } else {
        0
    };
    raster + std::mem::size_of::<u64>() + planar
}

fn fixed_overhead() -> usize {
    CMD_PREFIX_SIZE + MAX_DRAW_RECORD_SIZE + 100
}

/// Computes band height, tile cache and command buffer sizes for `page`.
#[tracing::instrument(level = "debug", skip(opts), fields(budget = opts.memory_budget))]
pub fn partition(page: &PageGeometry, opts: &BandOpts) -> LaminaResult<BandLayout> {
    if page.width == 0 || page.height == 0 {
        return Err(LaminaError::range(format!(
            "page size {}x{}",
            page.width, page.height
        )));
    }
    let budget = opts.memory_budget;
    let space = opts.band_buffer_space.unwrap_or(budget);
    let scratch = scratch_row_bytes(page);
    let half = budget / 2;

    let (band_height, tile_bits) = match opts.band_height {
        Some(0) => return Err(LaminaError::range("band height must be at least 1")),
        Some(h) => {
            let h = h.min(page.height);
            let rows = scratch
                .checked_mul(h as usize)
                .ok_or_else(|| LaminaError::range("band scratch size overflow"))?;
            if rows >= space {
                return Err(LaminaError::range(format!(
                    "{h} rows need {rows} bytes, band space is {space}"
                )));
            }
            (h, (space - rows).min(half))
        }
        None => {
            let bits = tile_cache_size(budget, opts.must_halftone).min(half);
            let region = space.saturating_sub(bits);
            let fits = |h: u32| {
                let n_bands = page.height.div_ceil(h) as usize;
                scratch * h as usize + n_bands * BAND_STATE_SIZE + fixed_overhead() <= region
            };
            let mut h = (region.saturating_sub(fixed_overhead()) / scratch).min(page.height as usize)
                as u32;
            while h > 0 && !fits(h) {
                h -= 1;
            }
            if h == 0 {
                return Err(LaminaError::range(format!(
                    "a one-row band does not fit {space} bytes of band space"
                )));
            }
            (h, bits)
        }
    };

    let tile_max_count = tile_bits / (TILE_ENTRY_OVERHEAD + AVG_TILE_BITS);
    if tile_max_count < 3 {
        return Err(LaminaError::range(format!(
            "tile cache of {tile_bits} bytes holds fewer than 3 tiles"
        )));
    }
    let mut tile_hash_mask = (tile_max_count.next_power_of_two() as u32)
        .saturating_sub(1)
        .clamp(MIN_HASH_MASK, MAX_HASH_MASK);
    while tile_hash_mask > MIN_HASH_MASK
        && (tile_hash_mask as usize + 1) * HASH_SLOT_SIZE > tile_bits / 2
    {
        tile_hash_mask >>= 1;
    }

    let n_bands = page.height.div_ceil(band_height);
    let remaining = space
        .saturating_sub(tile_bits)
        .saturating_sub(scratch * band_height as usize);
    let states = n_bands as usize * BAND_STATE_SIZE;
    if states + fixed_overhead() > remaining {
        return Err(LaminaError::range(format!(
            "{n_bands} band states and the command buffer need {} bytes, {remaining} remain",
            states + fixed_overhead()
        )));
    }

    let layout = BandLayout {
        band_height,
        n_bands,
        page_height: page.height,
        tile_cache_bytes: tile_bits,
        tile_max_count,
        tile_hash_mask,
        command_buffer_bytes: remaining - states,
        scratch_row_bytes: scratch,
    };
    tracing::debug!(?layout, "partitioned page");
    Ok(layout)
}

#[cfg(test)]
#[path = "../../tests/unit/clist/band.rs"]
mod tests;
