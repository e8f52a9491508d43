//! The two log streams of a recorded page and the memory they are charged against.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::color::ColorModel;
use crate::foundation::core::IntRect;
use crate::foundation::error::{LaminaError, LaminaResult};

use super::band::BandLayout;
use super::codec::{ByteOrder, Decoder, Encoder};
use super::record::Opcode;

/// Bytes per band-index entry.
pub const INDEX_ENTRY_SIZE: usize = 16;
/// Band value of the index sentinel.
pub const END_BAND: i32 = -1;

/// One band-index triple: records from `offset` up to the next END_RUN apply to bands
/// `band_min..=band_max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub band_min: i32,
    pub band_max: i32,
    pub offset: u64,
}

impl IndexEntry {
    pub fn sentinel(offset: u64) -> Self {
        Self {
            band_min: END_BAND,
            band_max: END_BAND,
            offset,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.band_min == END_BAND && self.band_max == END_BAND
    }

    pub fn covers(&self, band: u32) -> bool {
        !self.is_sentinel() && self.band_min <= band as i32 && band as i32 <= self.band_max
    }

    pub(crate) fn encode(&self, e: &mut Encoder) {
        e.put_i32(self.band_min);
        e.put_i32(self.band_max);
        e.put_u64(self.offset);
    }
}

/// What the recorder learned about one band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BandState {
    pub record_count: u32,
    /// OR of every packed color drawn into the band.
    pub colors_used: u64,
}

impl BandState {
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }
}

#[derive(Debug)]
struct PoolInner {
    used: AtomicUsize,
    limit: Option<usize>,
}

/// Byte budget shared by every page log still held in memory.
#[derive(Clone, Debug)]
pub struct MemoryPool {
    inner: Arc<PoolInner>,
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemoryPool {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                used: AtomicUsize::new(0),
                limit,
            }),
        }
    }

    pub fn used(&self) -> usize {
        self.inner.used.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> Option<usize> {
        self.inner.limit
    }

    /// Reserves `bytes`, or fails with `OutOfMemory` leaving the pool unchanged.
    pub fn try_charge(&self, bytes: usize) -> LaminaResult<PoolCharge> {
        let limit = self.inner.limit;
        self.inner
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                let next = used.checked_add(bytes)?;
                match limit {
                    Some(l) if next > l => None,
                    _ => Some(next),
                }
            })
            .map_err(|used| {
                LaminaError::out_of_memory(format!(
                    "log stream needs {bytes} bytes, {used} of {} in use",
                    limit.unwrap_or(usize::MAX)
                ))
            })?;
        Ok(PoolCharge {
            pool: self.clone(),
            bytes,
        })
    }
}

/// Bytes held against a [`MemoryPool`]; released on drop.
#[derive(Debug)]
pub struct PoolCharge {
    pool: MemoryPool,
    bytes: usize,
}

impl PoolCharge {
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Takes over `other`'s bytes. Both charges must come from the same pool.
    pub fn absorb(&mut self, mut other: PoolCharge) {
        debug_assert!(Arc::ptr_eq(&self.pool.inner, &other.pool.inner));
        self.bytes += std::mem::take(&mut other.bytes);
    }
}

impl Drop for PoolCharge {
    fn drop(&mut self) {
        if self.bytes > 0 {
            self.pool.inner.used.fetch_sub(self.bytes, Ordering::AcqRel);
        }
    }
}

/// A recorded page: content stream, band index, per-band state and what is needed to replay
/// them.
#[derive(Debug)]
pub struct PageLog {
    pub(crate) rect: IntRect,
    pub(crate) model: ColorModel,
    pub(crate) layout: BandLayout,
    pub(crate) byte_order: ByteOrder,
    pub(crate) content: Vec<u8>,
    pub(crate) index: Vec<u8>,
    pub(crate) bands: Vec<BandState>,
    /// False for the committed prefix cut by hard recovery; such a log has no END_PAGE.
    pub(crate) complete: bool,
    pub(crate) charge: Option<PoolCharge>,
}

impl PageLog {
    pub fn rect(&self) -> IntRect {
        self.rect
    }

    pub fn model(&self) -> ColorModel {
        self.model
    }

    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn index(&self) -> &[u8] {
        &self.index
    }

    pub fn bands(&self) -> &[BandState] {
        &self.bands
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Bytes of both streams.
    pub fn stream_bytes(&self) -> usize {
        self.content.len() + self.index.len()
    }

    /// Decodes the band index, checking that it ends with the sentinel and that offsets stay
    /// inside the content stream in ascending order.
    pub fn entries(&self) -> LaminaResult<Vec<IndexEntry>> {
        if self.index.len() % INDEX_ENTRY_SIZE != 0 {
            return Err(LaminaError::range(format!(
                "band index of {} bytes is not a whole number of entries",
                self.index.len()
            )));
        }
        let mut d = Decoder::new(&self.index, self.byte_order);
        let mut out = Vec::with_capacity(self.index.len() / INDEX_ENTRY_SIZE);
        let mut last = 0u64;
        while d.remaining() > 0 {
            let e = IndexEntry {
                band_min: d.get_i32()?,
                band_max: d.get_i32()?,
                offset: d.get_u64()?,
            };
            if e.offset < last || e.offset > self.content.len() as u64 {
                return Err(LaminaError::range(format!("index offset {} out of order", e.offset)));
            }
            let bad_range = e.band_min < 0
                || e.band_min > e.band_max
                || e.band_max as u32 >= self.layout.n_bands;
            if !e.is_sentinel() && bad_range {
                return Err(LaminaError::range(format!(
                    "index entry for bands {}..={}",
                    e.band_min, e.band_max
                )));
            }
            last = e.offset;
            out.push(e);
        }
        match out.last() {
            Some(e) if e.is_sentinel() => {}
            _ => return Err(LaminaError::range("band index has no sentinel")),
        }
        if out[..out.len() - 1].iter().any(IndexEntry::is_sentinel) {
            return Err(LaminaError::range("sentinel before the end of the band index"));
        }
        if self.complete {
            let end = out[out.len() - 1].offset as usize;
            if self.content.get(end) != Some(&(Opcode::EndPage as u8)) {
                return Err(LaminaError::range("content stream does not end with END_PAGE"));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clist/stream.rs"]
mod tests;
