//! Banded rendering device with low-memory recovery.
//!
//! When the stream pool refuses a flush, recording is retried after either rendering a page
//! that was queued earlier (soft recovery, nothing changes for the current page) or, when no
//! page is queued and nothing is open, rendering what was recorded of the current page into
//! its raster and recording the rest on top (hard recovery). A device that could do neither
//! refuses further work.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::color::{ColorIndex, ColorModel};
use crate::compositor::{BlendParamsUpdate, CompositorOpts, GroupParams, MaskParams};
use crate::device::Device;
use crate::foundation::core::{BezPath, IntRect};
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::raster::{FillRule, ImageHeader, MonoBitmap, Raster, StrokeStyle};

use super::band::{BandOpts, PageGeometry};
use super::reader::{PlaybackStats, Player};
use super::stream::{MemoryPool, PageLog};
use super::writer::{Recorder, RecorderStats};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClistStats {
    pub pages: u64,
    pub recorder: RecorderStats,
    pub playback: PlaybackStats,
    pub soft_recoveries: u64,
    pub hard_recoveries: u64,
}

impl ClistStats {
    fn add_recorder(&mut self, r: &RecorderStats) {
        let s = &mut self.recorder;
        s.records = s.records.saturating_add(r.records);
        s.record_bytes = s.record_bytes.saturating_add(r.record_bytes);
        s.runs = s.runs.saturating_add(r.runs);
        s.flushes = s.flushes.saturating_add(r.flushes);
        s.culled = s.culled.saturating_add(r.culled);
        s.tiles_set = s.tiles_set.saturating_add(r.tiles_set);
        s.tiles_copied = s.tiles_copied.saturating_add(r.tiles_copied);
    }
}

#[derive(Debug)]
struct QueuedPage {
    raster: Raster,
    log: PageLog,
}

/// Completed pages whose logs are held until they are rendered, oldest first.
#[derive(Debug, Default)]
pub struct PageQueue {
    pages: VecDeque<QueuedPage>,
}

impl PageQueue {
    pub fn pages_remain(&self) -> bool {
        !self.pages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Log bytes held by queued pages.
    pub fn stream_bytes(&self) -> usize {
        self.pages.iter().map(|p| p.log.stream_bytes()).sum()
    }
}

#[derive(Debug)]
struct OpenPage {
    recorder: Recorder,
    raster: Raster,
}

/// Records pages into banded logs and renders them band by band.
#[derive(Debug)]
pub struct ClistDevice {
    band: BandOpts,
    compositor: CompositorOpts,
    pool: MemoryPool,
    threads: Option<rayon::ThreadPool>,
    defer_render: bool,
    page: Option<OpenPage>,
    queue: PageQueue,
    rendered: Vec<Raster>,
    permanent_error: bool,
    stats: ClistStats,
}

impl ClistDevice {
    pub fn new(band: BandOpts, compositor: CompositorOpts) -> Self {
        Self {
            pool: MemoryPool::new(band.max_stream_bytes),
            band,
            compositor,
            threads: None,
            defer_render: false,
            page: None,
            queue: PageQueue::default(),
            rendered: Vec::new(),
            permanent_error: false,
            stats: ClistStats::default(),
        }
    }

    /// Plays bands on `pool` instead of the calling thread.
    pub fn with_thread_pool(mut self, pool: rayon::ThreadPool) -> Self {
        self.threads = Some(pool);
        self
    }

    /// Queues completed pages instead of rendering them at `end_page`.
    pub fn with_defer_render(mut self, defer: bool) -> Self {
        self.defer_render = defer;
        self
    }

    /// Charges log streams against `pool` (shared with other devices, for example).
    pub fn with_memory_pool(mut self, pool: MemoryPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn memory_pool(&self) -> &MemoryPool {
        &self.pool
    }

    pub fn queue(&self) -> &PageQueue {
        &self.queue
    }

    pub fn stats(&self) -> ClistStats {
        self.stats
    }

    pub fn has_permanent_error(&self) -> bool {
        self.permanent_error
    }

    pub fn recorder(&self) -> Option<&Recorder> {
        self.page.as_ref().map(|p| &p.recorder)
    }

    /// Starts recording a page drawn over `raster`.
    pub fn begin_page(&mut self, raster: Raster, uses_transparency: bool) -> LaminaResult<()> {
        if self.page.is_some() {
            return Err(LaminaError::invalid_state("begin_page while a page is open"));
        }
        if self.permanent_error {
            return Err(LaminaError::invalid_state("device failed on an earlier page"));
        }
        let geometry = PageGeometry {
            width: raster.width(),
            height: raster.height(),
            n_colorants: raster.model().n_colorants(),
            uses_transparency,
        };
        let recorder = Recorder::new(geometry, raster.model(), &self.band, self.pool.clone())?;
        self.page = Some(OpenPage { recorder, raster });
        Ok(())
    }

    /// Closes the current page and renders it, or queues it when rendering is deferred.
    #[tracing::instrument(level = "debug", skip_all, fields(page = self.stats.pages))]
    pub fn end_page(&mut self) -> LaminaResult<()> {
        let log = self.with_recovery(Recorder::end_page)?;
        let page = self
            .page
            .take()
            .ok_or_else(|| LaminaError::invalid_state("end_page without begin_page"))?;
        self.stats.pages += 1;
        self.stats.add_recorder(&page.recorder.stats());
        self.queue.pages.push_back(QueuedPage {
            raster: page.raster,
            log,
        });
        if !self.defer_render {
            while self.queue.pages_remain() {
                self.render_oldest()?;
            }
        }
        Ok(())
    }

    /// Renders every queued page and hands back all finished pages in order.
    pub fn finish(&mut self) -> LaminaResult<Vec<Raster>> {
        if self.page.is_some() {
            return Err(LaminaError::invalid_state("finish with a page still open"));
        }
        while self.queue.pages_remain() {
            self.render_oldest()?;
        }
        Ok(self.take_rendered())
    }

    /// Pages rendered so far, in page order.
    pub fn take_rendered(&mut self) -> Vec<Raster> {
        std::mem::take(&mut self.rendered)
    }

    fn render_oldest(&mut self) -> LaminaResult<()> {
        let Some(QueuedPage { mut raster, log }) = self.queue.pages.pop_front() else {
            return Ok(());
        };
        let stats = Player::new(&log, self.compositor)?.play(&mut raster, self.threads.as_ref())?;
        self.stats.playback.merge(&stats);
        self.rendered.push(raster);
        // Dropping the log releases its stream bytes.
        drop(log);
        Ok(())
    }

    fn hard_recover(&mut self) -> LaminaResult<()> {
        let page = self
            .page
            .as_mut()
            .ok_or_else(|| LaminaError::invalid_state("no page to recover"))?;
        let log = page.recorder.take_partial()?;
        let stats = Player::new(&log, self.compositor)?.play(&mut page.raster, None)?;
        self.stats.playback.merge(&stats);
        tracing::debug!(
            bytes = log.stream_bytes(),
            bands = stats.bands_rendered,
            "rendered partial page"
        );
        Ok(())
    }

    /// Drops the open page and everything recorded for it, returning its log bytes to the
    /// pool. Returns whether a page was open.
    pub fn abort_page(&mut self) -> bool {
        match self.page.take() {
            Some(page) => {
                tracing::debug!(records = page.recorder.stats().records, "page aborted");
                true
            }
            None => false,
        }
    }

    /// Runs `op` on the recorder with low-memory recovery. Any error that still comes out of
    /// it aborts the open page.
    fn with_recovery<T>(
        &mut self,
        op: impl FnMut(&mut Recorder) -> LaminaResult<T>,
    ) -> LaminaResult<T> {
        self.retry_recovering(op).inspect_err(|_| {
            self.abort_page();
        })
    }

    /// Runs `op` on the recorder, recovering from `OutOfMemory` and retrying. Soft recovery
    /// repeats while queued pages remain; hard recovery is tried once per operation.
    fn retry_recovering<T>(
        &mut self,
        mut op: impl FnMut(&mut Recorder) -> LaminaResult<T>,
    ) -> LaminaResult<T> {
        if self.permanent_error {
            return Err(LaminaError::invalid_state(
                "device failed earlier and refuses further operations",
            ));
        }
        let mut hard_tried = false;
        loop {
            let page = self
                .page
                .as_mut()
                .ok_or_else(|| LaminaError::invalid_state("drawing outside begin_page/end_page"))?;
            let err = match op(&mut page.recorder) {
                Ok(v) => return Ok(v),
                Err(e) if e.is_out_of_memory() => e,
                Err(e) => return Err(e),
            };
            if self.queue.pages_remain() {
                tracing::debug!(queued = self.queue.len(), %err, "soft recovery");
                self.render_oldest()?;
                self.stats.soft_recoveries += 1;
                continue;
            }
            if !hard_tried && page.recorder.can_hard_recover() {
                tracing::debug!(%err, "hard recovery");
                hard_tried = true;
                self.hard_recover()?;
                self.stats.hard_recoveries += 1;
                continue;
            }
            tracing::debug!(%err, "low-memory recovery exhausted");
            self.permanent_error = true;
            return Err(err);
        }
    }
}

impl Device for ClistDevice {
    fn color_model(&self) -> ColorModel {
        match &self.page {
            Some(p) => p.recorder.color_model(),
            None => ColorModel::default(),
        }
    }

    fn push_device(&mut self, spot_color_count: u32) -> LaminaResult<()> {
        self.with_recovery(|r| r.push_device(spot_color_count))
    }

    fn pop_device(&mut self) -> LaminaResult<()> {
        self.with_recovery(Recorder::pop_device)
    }

    fn set_blend_params(&mut self, update: &BlendParamsUpdate) -> LaminaResult<()> {
        self.with_recovery(|r| r.set_blend_params(update))
    }

    fn begin_group(&mut self, params: &GroupParams) -> LaminaResult<()> {
        self.with_recovery(|r| r.begin_group(params))
    }

    fn end_group(&mut self) -> LaminaResult<()> {
        self.with_recovery(Recorder::end_group)
    }

    fn begin_mask(&mut self, params: &MaskParams) -> LaminaResult<()> {
        self.with_recovery(|r| r.begin_mask(params))
    }

    fn end_mask(&mut self) -> LaminaResult<()> {
        self.with_recovery(Recorder::end_mask)
    }

    fn fill_rectangle(&mut self, rect: IntRect, color: ColorIndex) -> LaminaResult<()> {
        self.with_recovery(|r| r.fill_rectangle(rect, color))
    }

    fn fill_path(
        &mut self,
        path: &BezPath,
        rule: FillRule,
        color: ColorIndex,
    ) -> LaminaResult<()> {
        self.with_recovery(|r| r.fill_path(path, rule, color))
    }

    fn stroke_path(
        &mut self,
        path: &BezPath,
        style: &StrokeStyle,
        color: ColorIndex,
    ) -> LaminaResult<()> {
        self.with_recovery(|r| r.stroke_path(path, style, color))
    }

    fn begin_image(&mut self, header: &ImageHeader) -> LaminaResult<()> {
        self.with_recovery(|r| r.begin_image(header))
    }

    fn image_data(&mut self, rows: &[u8], n_rows: u32) -> LaminaResult<()> {
        self.with_recovery(|r| r.image_data(rows, n_rows))
    }

    fn end_image(&mut self) -> LaminaResult<()> {
        self.with_recovery(Recorder::end_image)
    }

    fn copy_mono(
        &mut self,
        bitmap: &MonoBitmap,
        x: i32,
        y: i32,
        color: ColorIndex,
    ) -> LaminaResult<()> {
        self.with_recovery(|r| r.copy_mono(bitmap, x, y, color))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clist/recovery.rs"]
mod tests;
