//! Recording drawing operations into a banded page log.

use serde::{Deserialize, Serialize};

use crate::color::{ColorIndex, ColorModel, ColorModelContext};
use crate::compositor::{BlendParams, BlendParamsUpdate, GroupParams, MaskIdTracker, MaskParams};
use crate::device::Device;
use crate::foundation::core::{BezPath, IntRect};
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::raster::{
    FillRule, ImageCursor, ImageHeader, MonoBitmap, StrokeStyle, path_bounds, stroke_outline,
};

use super::band::{BandLayout, BandOpts, CMD_PREFIX_SIZE, PageGeometry, partition};
use super::codec::{ByteOrder, Encoder};
use super::record::{MAX_DRAW_RECORD_SIZE, Opcode, Record};
use super::stream::{BandState, INDEX_ENTRY_SIZE, IndexEntry, MemoryPool, PageLog, PoolCharge};
use super::tile::TileCache;

/// Lifecycle of the page being recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Open,
    Recording,
    /// The committed part was cut off by hard recovery; recording resumes on the next record.
    Flushed,
    Closed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderStats {
    pub records: u64,
    pub record_bytes: u64,
    pub runs: u64,
    pub flushes: u64,
    /// Drawing records that touched no band.
    pub culled: u64,
    pub tiles_set: u64,
    pub tiles_copied: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameKind {
    Page,
    Group,
    Mask,
}

/// Rows that records issued inside a group or mask may touch.
#[derive(Clone, Copy, Debug)]
struct CropFrame {
    kind: FrameKind,
    y0: i32,
    y1: i32,
}

#[derive(Debug)]
struct Run {
    bands: (u32, u32),
    bytes: Vec<u8>,
}

/// One encoded record and the bands it goes to.
#[derive(Debug)]
struct Queued {
    bands: (u32, u32),
    bytes: Vec<u8>,
    color: u64,
}

#[derive(Debug, Clone)]
struct OpenImage {
    cursor: ImageCursor,
    bands: Option<(u32, u32)>,
}

/// Serializes drawing operations into a content stream and a band index.
///
/// Every operation either completes or fails without changing the recorder, so an
/// `OutOfMemory` from the stream pool can be retried after memory is released.
#[derive(Debug)]
pub struct Recorder {
    rect: IntRect,
    model: ColorModel,
    layout: BandLayout,
    byte_order: ByteOrder,
    pool: MemoryPool,

    colors: ColorModelContext,
    mask_ids: MaskIdTracker,
    crops: Vec<CropFrame>,
    blend: BlendParams,
    compositing: Option<u32>,
    image: Option<OpenImage>,
    tiles: TileCache,

    bands: Vec<BandState>,
    runs: Vec<Run>,
    pending_bytes: usize,
    content: Vec<u8>,
    index: Vec<u8>,
    charge: Option<PoolCharge>,

    state: PageState,
    stats: RecorderStats,
}

impl Recorder {
    pub fn new(
        page: PageGeometry,
        model: ColorModel,
        opts: &BandOpts,
        pool: MemoryPool,
    ) -> LaminaResult<Self> {
        let layout = partition(&page, opts)?;
        let rect = IntRect::new(0, 0, page.width as i32, page.height as i32);
        Ok(Self {
            rect,
            model,
            byte_order: opts.byte_order,
            pool,
            colors: ColorModelContext::new(model),
            mask_ids: MaskIdTracker::default(),
            crops: vec![Self::page_frame(rect)],
            blend: BlendParams::default(),
            compositing: None,
            image: None,
            tiles: TileCache::new(&layout),
            bands: vec![BandState::default(); layout.n_bands as usize],
            runs: Vec::new(),
            pending_bytes: 0,
            content: Vec::new(),
            index: Vec::new(),
            charge: None,
            state: PageState::Open,
            stats: RecorderStats::default(),
            layout,
        })
    }

    fn page_frame(rect: IntRect) -> CropFrame {
        CropFrame {
            kind: FrameKind::Page,
            y0: rect.y0,
            y1: rect.y1,
        }
    }

    pub fn rect(&self) -> IntRect {
        self.rect
    }

    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    pub fn band_states(&self) -> &[BandState] {
        &self.bands
    }

    pub fn is_compositing(&self) -> bool {
        self.compositing.is_some()
    }

    /// Bytes committed to the streams so far, excluding buffered runs.
    pub fn stream_bytes(&self) -> usize {
        self.content.len() + self.index.len()
    }

    /// Whether the recorded part of the page can be rendered now and recording resumed: no
    /// group, mask, image or cropping frame is open and no finished mask awaits its group.
    pub fn can_hard_recover(&self) -> bool {
        self.crops.len() == 1
            && self.image.is_none()
            && self.mask_ids.depth() == 0
            && !self.mask_ids.has_pending()
            && self.colors.depth() == 0
            && self.state != PageState::Closed
    }

    fn crop(&self) -> CropFrame {
        self.crops
            .last()
            .copied()
            .unwrap_or_else(|| Self::page_frame(self.rect))
    }

    fn all_bands(&self) -> (u32, u32) {
        (0, self.layout.n_bands - 1)
    }

    /// Bands touched by rows `y0..y1` inside the current cropping frame.
    fn cropped_bands(&self, y0: i32, y1: i32) -> Option<(u32, u32)> {
        let crop = self.crop();
        self.layout
            .bands_for_rows(y0.max(crop.y0), y1.min(crop.y1))
    }

    fn draw_bands(&self, rect: IntRect) -> Option<(u32, u32)> {
        let r = rect.intersect(&self.rect);
        if r.is_empty() {
            return None;
        }
        self.cropped_bands(r.y0, r.y1)
    }

    fn color_bytes(&self) -> usize {
        self.colors.model().index_bytes()
    }

    fn encode(&self, rec: &Record) -> LaminaResult<Vec<u8>> {
        rec.encode(self.byte_order, self.color_bytes())
    }

    fn check_open(&self, op: &str) -> LaminaResult<()> {
        if self.state == PageState::Closed {
            return Err(LaminaError::invalid_state(format!("{op} after end_page")));
        }
        Ok(())
    }

    fn require_compositing(&self, op: &str) -> LaminaResult<()> {
        self.check_open(op)?;
        if self.compositing.is_none() {
            return Err(LaminaError::invalid_state(format!("{op} outside push_device")));
        }
        Ok(())
    }

    /// Queues `batch`, flushing buffered runs first when the command buffer would overflow.
    /// The flush is the only step that can fail, and it fails before anything is queued.
    fn write(&mut self, batch: Vec<Queued>) -> LaminaResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let need: usize = batch.iter().map(|q| q.bytes.len() + CMD_PREFIX_SIZE).sum();
        if !self.runs.is_empty() && self.pending_bytes + need > self.layout.command_buffer_bytes {
            self.flush_runs(true)?;
        }
        for q in batch {
            self.queue(q);
        }
        if self.state != PageState::Recording {
            self.state = PageState::Recording;
        }
        Ok(())
    }

    fn queue(&mut self, q: Queued) {
        for b in q.bands.0..=q.bands.1 {
            let state = &mut self.bands[b as usize];
            state.record_count = state.record_count.saturating_add(1);
            state.colors_used |= q.color;
        }
        self.stats.records = self.stats.records.saturating_add(1);
        self.stats.record_bytes = self.stats.record_bytes.saturating_add(q.bytes.len() as u64);
        if let Some(run) = self.runs.last_mut()
            && run.bands == q.bands
        {
            self.pending_bytes += q.bytes.len();
            run.bytes.extend_from_slice(&q.bytes);
            return;
        }
        self.pending_bytes += q.bytes.len() + CMD_PREFIX_SIZE;
        self.stats.runs = self.stats.runs.saturating_add(1);
        self.runs.push(Run {
            bands: q.bands,
            bytes: q.bytes,
        });
    }

    fn single(
        &self,
        bands: Option<(u32, u32)>,
        rec: &Record,
        color: u64,
    ) -> LaminaResult<Vec<Queued>> {
        let bytes = self.encode(rec)?;
        tracing::trace!(op = ?rec.opcode(), ?bands, len = bytes.len(), "record");
        Ok(bands
            .map(|bands| Queued {
                bands,
                bytes,
                color,
            })
            .into_iter()
            .collect())
    }

    /// Moves buffered runs into the streams. With `charge`, the bytes are first reserved in
    /// the pool and an `OutOfMemory` leaves everything as it was.
    fn flush_runs(&mut self, charge: bool) -> LaminaResult<()> {
        if self.runs.is_empty() {
            return Ok(());
        }
        let content_bytes: usize = self.runs.iter().map(|r| r.bytes.len() + 1).sum();
        let total = content_bytes + self.runs.len() * INDEX_ENTRY_SIZE;
        if charge {
            let c = self.pool.try_charge(total)?;
            self.absorb(c);
        }

        let mut index = Encoder::new(self.byte_order);
        for run in self.runs.drain(..) {
            IndexEntry {
                band_min: run.bands.0 as i32,
                band_max: run.bands.1 as i32,
                offset: self.content.len() as u64,
            }
            .encode(&mut index);
            self.content.extend_from_slice(&run.bytes);
            self.content.push(Opcode::EndRun as u8);
        }
        self.index.extend_from_slice(index.as_bytes());
        self.pending_bytes = 0;
        self.stats.flushes = self.stats.flushes.saturating_add(1);
        tracing::debug!(bytes = total, stream = self.stream_bytes(), "flushed runs");
        Ok(())
    }

    fn absorb(&mut self, c: PoolCharge) {
        match self.charge.as_mut() {
            Some(held) => held.absorb(c),
            None => self.charge = Some(c),
        }
    }

    fn sentinel(&self) -> Vec<u8> {
        let mut e = Encoder::new(self.byte_order);
        IndexEntry::sentinel(self.content.len() as u64).encode(&mut e);
        e.into_bytes()
    }

    fn take_log(&mut self, complete: bool) -> PageLog {
        PageLog {
            rect: self.rect,
            model: self.model,
            layout: self.layout,
            byte_order: self.byte_order,
            content: std::mem::take(&mut self.content),
            index: std::mem::take(&mut self.index),
            bands: std::mem::replace(
                &mut self.bands,
                vec![BandState::default(); self.layout.n_bands as usize],
            ),
            complete,
            charge: self.charge.take(),
        }
    }

    /// Closes the page: flushes buffered runs, writes END_PAGE and the index sentinel.
    #[tracing::instrument(level = "debug", skip_all, fields(records = self.stats.records))]
    pub fn end_page(&mut self) -> LaminaResult<PageLog> {
        self.check_open("end_page")?;
        if self.crops.len() != 1 {
            return Err(LaminaError::invalid_state(format!(
                "{} cropping frames open at end_page",
                self.crops.len() - 1
            )));
        }
        if self.image.is_some() {
            return Err(LaminaError::invalid_state("end_page inside an image"));
        }
        if self.compositing.is_some() {
            return Err(LaminaError::invalid_state("end_page inside push_device"));
        }
        // END_PAGE and the sentinel are reserved together with the last runs.
        let tail = 1 + INDEX_ENTRY_SIZE;
        let tail_charge = self.pool.try_charge(tail)?;
        self.flush_runs(true)?;
        self.absorb(tail_charge);
        let sentinel = self.sentinel();
        self.index.extend_from_slice(&sentinel);
        self.content.push(Opcode::EndPage as u8);
        self.state = PageState::Closed;
        Ok(self.take_log(true))
    }

    /// Cuts off everything recorded so far as a log that can be played now, then resets the
    /// recorder to a clean state. An active compositor is re-opened with the current marking
    /// state so recording continues where it left off.
    ///
    /// The flush is not charged to the pool; the returned log is meant to be rendered and
    /// dropped right away.
    pub fn take_partial(&mut self) -> LaminaResult<PageLog> {
        if !self.can_hard_recover() {
            return Err(LaminaError::invalid_state(
                "cannot cut the page log inside a group, mask or image",
            ));
        }
        self.flush_runs(false)?;
        let sentinel = self.sentinel();
        self.index.extend_from_slice(&sentinel);
        let log = self.take_log(false);

        self.crops = vec![Self::page_frame(self.rect)];
        self.mask_ids.reset();
        self.colors.reset(self.model);
        self.tiles.clear();
        self.state = PageState::Flushed;

        if let Some(spots) = self.compositing {
            let mut batch = self.single(
                Some(self.all_bands()),
                &Record::PushDevice {
                    spot_color_count: spots,
                },
                0,
            )?;
            let update = self.blend.as_update();
            batch.extend(self.single(
                Some(self.all_bands()),
                &Record::SetBlendParams(update),
                0,
            )?);
            for q in batch {
                self.queue(q);
            }
        }
        Ok(log)
    }

    fn image_batch(
        &self,
        open: &OpenImage,
        first_row: u32,
        rows: &[u8],
        n_rows: u32,
    ) -> LaminaResult<Vec<Queued>> {
        let mut batch = Vec::new();
        if open.bands.is_none() {
            return Ok(batch);
        }
        let header = open.cursor.header();
        let row_bytes = header.row_bytes();
        // opcode, first row, row count, byte length
        let max_rows = ((MAX_DRAW_RECORD_SIZE - 13) / row_bytes) as u32;
        if max_rows == 0 {
            return Err(LaminaError::range(format!(
                "image row of {row_bytes} bytes exceeds {MAX_DRAW_RECORD_SIZE}"
            )));
        }
        let crop = self.crop();
        let mut r = 0;
        while r < n_rows {
            let y = header.y + (first_row + r) as i32;
            if y < crop.y0.max(self.rect.y0) || y >= crop.y1.min(self.rect.y1) {
                r += 1;
                continue;
            }
            let Some((band, _)) = self.layout.bands_for_rows(y, y + 1) else {
                r += 1;
                continue;
            };
            let (_, band_y1) = self.layout.band_rows(band);
            let stop = band_y1.min(crop.y1).min(self.rect.y1);
            let k = ((stop - y) as u32).min(n_rows - r).min(max_rows);
            let start = r as usize * row_bytes;
            let rec = Record::ImageRows {
                first_row: first_row + r,
                n_rows: k,
                data: rows[start..start + k as usize * row_bytes].to_vec(),
            };
            batch.extend(self.single(Some((band, band)), &rec, 0)?);
            r += k;
        }
        Ok(batch)
    }

    fn mono_batch(
        &self,
        bitmap: &MonoBitmap,
        x: i32,
        y: i32,
        color: ColorIndex,
        bands: (u32, u32),
    ) -> LaminaResult<Vec<Queued>> {
        let mut batch = Vec::new();
        let crop = self.crop();
        let raster = bitmap.raster().max(1);
        // opcode, x, y, color, width, height
        let overhead = 1 + 4 + 4 + self.color_bytes() + 4 + 4;
        let max_rows = ((MAX_DRAW_RECORD_SIZE - overhead) / raster) as u32;
        if max_rows == 0 {
            return Err(LaminaError::range(format!(
                "bitmap row of {raster} bytes exceeds {MAX_DRAW_RECORD_SIZE}"
            )));
        }
        for band in bands.0..=bands.1 {
            let (by0, by1) = self.layout.band_rows(band);
            let y0 = by0.max(crop.y0).max(y);
            let y1 = by1.min(crop.y1).min(y + bitmap.height() as i32);
            let mut row = y0;
            while row < y1 {
                let k = ((y1 - row) as u32).min(max_rows);
                let rec = Record::CopyMono {
                    x,
                    y: row,
                    color,
                    bitmap: bitmap.rows((row - y) as u32, k)?,
                };
                batch.extend(self.single(Some((band, band)), &rec, color.0)?);
                row += k as i32;
            }
        }
        Ok(batch)
    }
}

impl Device for Recorder {
    fn color_model(&self) -> ColorModel {
        self.colors.model()
    }

    fn push_device(&mut self, spot_color_count: u32) -> LaminaResult<()> {
        self.check_open("push_device")?;
        if self.compositing.is_some() {
            return Err(LaminaError::invalid_state("push_device while already compositing"));
        }
        let batch = self.single(
            Some(self.all_bands()),
            &Record::PushDevice { spot_color_count },
            0,
        )?;
        self.write(batch)?;
        self.compositing = Some(spot_color_count);
        self.blend = BlendParams::default();
        self.mask_ids.reset();
        Ok(())
    }

    fn pop_device(&mut self) -> LaminaResult<()> {
        self.require_compositing("pop_device")?;
        if self.crops.len() != 1 {
            return Err(LaminaError::invalid_state(format!(
                "{} group/mask levels open at pop_device",
                self.crops.len() - 1
            )));
        }
        let batch = self.single(Some(self.all_bands()), &Record::PopDevice, 0)?;
        self.write(batch)?;
        self.compositing = None;
        Ok(())
    }

    fn set_blend_params(&mut self, update: &BlendParamsUpdate) -> LaminaResult<()> {
        self.require_compositing("set_blend_params")?;
        let mut next = self.blend;
        next.apply(update);
        let diff = next.diff(&self.blend);
        if diff.is_empty() {
            return Ok(());
        }
        // Marking state persists past any group, so every band sees every change.
        let batch = self.single(Some(self.all_bands()), &Record::SetBlendParams(diff), 0)?;
        self.write(batch)?;
        self.blend = next;
        Ok(())
    }

    fn begin_group(&mut self, params: &GroupParams) -> LaminaResult<()> {
        self.require_compositing("begin_group")?;
        let model = params
            .group_color
            .resolve(params.n_color_comps, self.colors.model())?;
        let mut ids = self.mask_ids.clone();
        let mask_id = ids.begin_group();
        let rec = Record::BeginGroup(GroupParams {
            mask_id,
            ..params.clone()
        });
        let dev = params.device_rect().intersect(&self.rect);
        let crop = self.crop();
        let (y0, y1) = if dev.is_empty() {
            (crop.y0, crop.y0)
        } else {
            let y0 = crop.y0.max(dev.y0);
            (y0, crop.y1.min(dev.y1).max(y0))
        };
        let batch = self.single(self.cropped_bands(y0, y1), &rec, 0)?;
        self.write(batch)?;
        self.mask_ids = ids;
        self.colors.push(model);
        self.crops.push(CropFrame {
            kind: FrameKind::Group,
            y0,
            y1,
        });
        Ok(())
    }

    fn end_group(&mut self) -> LaminaResult<()> {
        self.require_compositing("end_group")?;
        let frame = self.crop();
        if frame.kind != FrameKind::Group {
            return Err(LaminaError::invalid_state("end_group without a matching begin_group"));
        }
        let mut ids = self.mask_ids.clone();
        ids.end_group()?;
        let batch = self.single(self.cropped_bands(frame.y0, frame.y1), &Record::EndGroup, 0)?;
        self.write(batch)?;
        self.mask_ids = ids;
        self.colors.pop()?;
        self.crops.pop();
        Ok(())
    }

    fn begin_mask(&mut self, params: &MaskParams) -> LaminaResult<()> {
        self.require_compositing("begin_mask")?;
        let model = params
            .group_color
            .resolve(params.n_color_comps, self.colors.model())?;
        let mut ids = self.mask_ids.clone();
        let mask_id = ids.begin_mask(params.replacing);
        let rec = Record::BeginMask(MaskParams {
            mask_id,
            ..params.clone()
        });
        let crop = self.crop();
        let batch = self.single(self.cropped_bands(crop.y0, crop.y1), &rec, 0)?;
        self.write(batch)?;
        self.mask_ids = ids;
        self.colors.push(model);
        self.crops.push(CropFrame {
            kind: FrameKind::Mask,
            ..crop
        });
        Ok(())
    }

    fn end_mask(&mut self) -> LaminaResult<()> {
        self.require_compositing("end_mask")?;
        let frame = self.crop();
        if frame.kind != FrameKind::Mask {
            return Err(LaminaError::invalid_state("end_mask without a matching begin_mask"));
        }
        let mut ids = self.mask_ids.clone();
        ids.end_mask()?;
        let batch = self.single(self.cropped_bands(frame.y0, frame.y1), &Record::EndMask, 0)?;
        self.write(batch)?;
        self.mask_ids = ids;
        self.colors.pop()?;
        self.crops.pop();
        Ok(())
    }

    fn fill_rectangle(&mut self, rect: IntRect, color: ColorIndex) -> LaminaResult<()> {
        self.check_open("fill_rectangle")?;
        let r = rect.intersect(&self.rect);
        let bands = self.draw_bands(r);
        if bands.is_none() {
            self.stats.culled = self.stats.culled.saturating_add(1);
            return Ok(());
        }
        let batch = self.single(bands, &Record::FillRect { rect: r, color }, color.0)?;
        self.write(batch)
    }

    fn fill_path(
        &mut self,
        path: &BezPath,
        rule: FillRule,
        color: ColorIndex,
    ) -> LaminaResult<()> {
        self.check_open("fill_path")?;
        let bands = self.draw_bands(path_bounds(path));
        if bands.is_none() {
            self.stats.culled = self.stats.culled.saturating_add(1);
            return Ok(());
        }
        let rec = Record::FillPath {
            rule,
            color,
            path: path.clone(),
        };
        let batch = self.single(bands, &rec, color.0)?;
        self.write(batch)
    }

    fn stroke_path(
        &mut self,
        path: &BezPath,
        style: &StrokeStyle,
        color: ColorIndex,
    ) -> LaminaResult<()> {
        self.check_open("stroke_path")?;
        let bands = self.draw_bands(path_bounds(&stroke_outline(path, style)));
        if bands.is_none() {
            self.stats.culled = self.stats.culled.saturating_add(1);
            return Ok(());
        }
        let rec = Record::StrokePath {
            style: *style,
            color,
            path: path.clone(),
        };
        let batch = self.single(bands, &rec, color.0)?;
        self.write(batch)
    }

    fn begin_image(&mut self, header: &ImageHeader) -> LaminaResult<()> {
        self.check_open("begin_image")?;
        if self.image.is_some() {
            return Err(LaminaError::invalid_state("begin_image inside an image"));
        }
        let cursor = ImageCursor::new(*header)?;
        let bands = self.draw_bands(header.rect());
        let batch = self.single(bands, &Record::BeginImage(*header), 0)?;
        self.write(batch)?;
        self.image = Some(OpenImage { cursor, bands });
        Ok(())
    }

    fn image_data(&mut self, rows: &[u8], n_rows: u32) -> LaminaResult<()> {
        let mut open = self
            .image
            .clone()
            .ok_or_else(|| LaminaError::invalid_state("image_data outside an image"))?;
        let first_row = open.cursor.next_row();
        open.cursor.feed(rows, n_rows, |_, _| {})?;
        let batch = self.image_batch(&open, first_row, rows, n_rows)?;
        self.write(batch)?;
        self.image = Some(open);
        Ok(())
    }

    fn end_image(&mut self) -> LaminaResult<()> {
        let open = self
            .image
            .as_ref()
            .ok_or_else(|| LaminaError::invalid_state("end_image without begin_image"))?;
        let batch = self.single(open.bands, &Record::EndImage, 0)?;
        self.write(batch)?;
        self.image = None;
        Ok(())
    }

    fn copy_mono(
        &mut self,
        bitmap: &MonoBitmap,
        x: i32,
        y: i32,
        color: ColorIndex,
    ) -> LaminaResult<()> {
        self.check_open("copy_mono")?;
        let rect = IntRect::from_xywh(x, y, bitmap.width() as i32, bitmap.height() as i32);
        let Some(bands) = self.draw_bands(rect) else {
            self.stats.culled = self.stats.culled.saturating_add(1);
            return Ok(());
        };
        if !self.tiles.accepts(bitmap) {
            let batch = self.mono_batch(bitmap, x, y, color, bands)?;
            return self.write(batch);
        }

        let tile = self.tiles.lookup(bitmap, bands);
        let mut batch = Vec::with_capacity(tile.missing.len() + 1);
        for &band in &tile.missing {
            let rec = Record::SetTile {
                id: tile.id,
                bitmap: bitmap.clone(),
            };
            batch.extend(self.single(Some((band, band)), &rec, 0)?);
        }
        let rec = Record::CopyTile {
            id: tile.id,
            x,
            y,
            color,
        };
        batch.extend(self.single(Some(bands), &rec, color.0)?);
        self.write(batch)?;
        self.tiles.commit(bitmap, &tile);
        self.stats.tiles_set = self
            .stats
            .tiles_set
            .saturating_add(tile.missing.len() as u64);
        self.stats.tiles_copied = self.stats.tiles_copied.saturating_add(1);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clist/writer.rs"]
mod tests;
