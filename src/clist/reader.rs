//! Replaying a page log band by band, and dumping it for inspection.

use std::collections::HashMap;
use std::fmt::Write as _;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::{ColorModel, ColorModelContext};
use crate::compositor::CompositorOpts;
use crate::device::{Device, PageDevice};
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::raster::{ImageHeader, MonoBitmap, Raster};

use super::codec::Decoder;
use super::record::Record;
use super::stream::{IndexEntry, PageLog};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackStats {
    pub bands_rendered: u64,
    pub bands_skipped: u64,
    pub records: u64,
}

impl PlaybackStats {
    pub fn merge(&mut self, other: &PlaybackStats) {
        self.bands_rendered = self.bands_rendered.saturating_add(other.bands_rendered);
        self.bands_skipped = self.bands_skipped.saturating_add(other.bands_skipped);
        self.records = self.records.saturating_add(other.records);
    }
}

/// A thread pool for parallel band playback. `Some(0)` threads is rejected.
pub fn build_thread_pool(threads: Option<usize>) -> LaminaResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(LaminaError::range("playback 'threads' must be >= 1 when set"));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| LaminaError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

trait BandVisitor {
    /// Width of color operands at the current point of the band.
    fn color_bytes(&self) -> usize;
    fn visit(&mut self, offset: usize, rec: Record) -> LaminaResult<()>;
}

/// Decodes every run indexed for `band`, in log order. Returns the number of records seen.
fn walk_band(
    log: &PageLog,
    entries: &[IndexEntry],
    band: u32,
    visitor: &mut impl BandVisitor,
) -> LaminaResult<u64> {
    let mut count = 0u64;
    for entry in entries.iter().filter(|e| e.covers(band)) {
        let start = entry.offset as usize;
        let mut d = Decoder::new(&log.content[start..], log.byte_order);
        loop {
            let at = start + d.position();
            match Record::decode(&mut d, visitor.color_bytes())? {
                Record::EndRun => break,
                Record::EndPage => {
                    return Err(LaminaError::range(format!("END_PAGE inside the run at {start}")));
                }
                rec => {
                    visitor.visit(at, rec)?;
                    count += 1;
                }
            }
        }
    }
    Ok(count)
}

/// Per-band replay state: the band device plus what the log keeps outside it.
struct BandReplay {
    device: PageDevice,
    image: Option<ImageHeader>,
    tiles: HashMap<u32, MonoBitmap>,
}

impl BandVisitor for BandReplay {
    fn color_bytes(&self) -> usize {
        self.device.color_model().index_bytes()
    }

    fn visit(&mut self, _offset: usize, rec: Record) -> LaminaResult<()> {
        let dev = &mut self.device;
        match rec {
            Record::PushDevice { spot_color_count } => dev.push_device(spot_color_count),
            Record::PopDevice => dev.pop_device(),
            Record::BeginGroup(p) => dev.begin_group(&p),
            Record::EndGroup => dev.end_group(),
            Record::BeginMask(p) => dev.begin_mask(&p),
            Record::EndMask => dev.end_mask(),
            Record::SetBlendParams(u) => dev.set_blend_params(&u),
            Record::FillRect { rect, color } => dev.fill_rectangle(rect, color),
            Record::FillPath { rule, color, path } => dev.fill_path(&path, rule, color),
            Record::StrokePath { style, color, path } => dev.stroke_path(&path, &style, color),
            Record::BeginImage(header) => {
                self.image = Some(header);
                Ok(())
            }
            Record::ImageRows {
                first_row,
                n_rows,
                data,
            } => {
                let header = self
                    .image
                    .ok_or_else(|| LaminaError::invalid_state("image rows outside an image"))?;
                if first_row.saturating_add(n_rows) > header.height {
                    return Err(LaminaError::range(format!(
                        "image rows {first_row}+{n_rows} past height {}",
                        header.height
                    )));
                }
                // Each chunk is drawn as an image of its own at its final position.
                let chunk = ImageHeader {
                    y: header.y + first_row as i32,
                    height: n_rows,
                    ..header
                };
                dev.begin_image(&chunk)?;
                dev.image_data(&data, n_rows)?;
                dev.end_image()
            }
            Record::EndImage => {
                self.image = None;
                Ok(())
            }
            Record::CopyMono {
                x,
                y,
                color,
                bitmap,
            } => dev.copy_mono(&bitmap, x, y, color),
            Record::SetTile { id, bitmap } => {
                self.tiles.insert(id, bitmap);
                Ok(())
            }
            Record::CopyTile { id, x, y, color } => {
                let bitmap = self.tiles.get(&id).ok_or_else(|| {
                    LaminaError::invalid_state(format!("tile {id} was never set"))
                })?;
                dev.copy_mono(bitmap, x, y, color)
            }
            Record::EndRun | Record::EndPage => Ok(()),
        }
    }
}

/// Renders a [`PageLog`] into a page raster.
#[derive(Debug)]
pub struct Player<'a> {
    log: &'a PageLog,
    entries: Vec<IndexEntry>,
    opts: CompositorOpts,
}

impl<'a> Player<'a> {
    pub fn new(log: &'a PageLog, opts: CompositorOpts) -> LaminaResult<Self> {
        Ok(Self {
            entries: log.entries()?,
            log,
            opts,
        })
    }

    /// Renders band `band` on top of its rows in `page`. Returns the band raster and the
    /// number of records replayed.
    pub fn render_band(&self, band: u32, page: &Raster) -> LaminaResult<(Raster, u64)> {
        let (y0, y1) = self.log.layout.band_rows(band);
        let mut replay = BandReplay {
            device: PageDevice::for_playback(page.band(y0, y1)?, self.opts),
            image: None,
            tiles: HashMap::new(),
        };
        let records = walk_band(self.log, &self.entries, band, &mut replay)?;
        let raster = if self.log.complete {
            replay.device.into_raster()?
        } else {
            replay.device.finish_partial()?
        };
        Ok((raster, records))
    }

    /// Renders every band that received records into `page`, on `pool` when given.
    /// Sequential and pooled playback produce identical pixels.
    #[tracing::instrument(level = "debug", skip_all, fields(bands = self.log.layout.n_bands))]
    pub fn play(
        &self,
        page: &mut Raster,
        pool: Option<&rayon::ThreadPool>,
    ) -> LaminaResult<PlaybackStats> {
        if page.rect() != self.log.rect || page.model() != self.log.model {
            return Err(LaminaError::invalid_state(format!(
                "log for {:?} {:?} played into {:?} {:?}",
                self.log.rect,
                self.log.model,
                page.rect(),
                page.model()
            )));
        }
        let mut stats = PlaybackStats::default();
        let bands: Vec<u32> = (0..self.log.layout.n_bands)
            .filter(|&b| !self.log.bands[b as usize].is_empty())
            .collect();
        stats.bands_skipped = u64::from(self.log.layout.n_bands) - bands.len() as u64;

        let src: &Raster = page;
        let rendered: Vec<LaminaResult<(Raster, u64)>> = match pool {
            Some(pool) => pool.install(|| {
                bands
                    .par_iter()
                    .map(|&b| self.render_band(b, src))
                    .collect()
            }),
            None => bands.iter().map(|&b| self.render_band(b, src)).collect(),
        };
        let mut done = Vec::with_capacity(rendered.len());
        for r in rendered {
            done.push(r?);
        }
        for (band, records) in done {
            page.write_band(&band)?;
            stats.bands_rendered += 1;
            stats.records = stats.records.saturating_add(records);
        }
        tracing::debug!(?stats, "played page log");
        Ok(stats)
    }
}

struct Listing {
    base: ColorModel,
    colors: ColorModelContext,
    out: String,
}

impl BandVisitor for Listing {
    fn color_bytes(&self) -> usize {
        self.colors.model().index_bytes()
    }

    fn visit(&mut self, offset: usize, rec: Record) -> LaminaResult<()> {
        let _ = writeln!(self.out, "  {offset:>8}  {}", rec.summary());
        match &rec {
            Record::PushDevice { .. } => self.colors.reset(self.base),
            Record::BeginGroup(p) => {
                let model = p.group_color.resolve(p.n_color_comps, self.colors.model())?;
                self.colors.push(model);
            }
            Record::BeginMask(p) => {
                let model = p.group_color.resolve(p.n_color_comps, self.colors.model())?;
                self.colors.push(model);
            }
            Record::EndGroup | Record::EndMask => {
                self.colors.pop()?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Human-readable dump of a page log, band by band.
#[derive(Debug)]
pub struct Inspector<'a> {
    log: &'a PageLog,
}

impl<'a> Inspector<'a> {
    pub fn new(log: &'a PageLog) -> Self {
        Self { log }
    }

    pub fn listing(&self) -> LaminaResult<String> {
        let log = self.log;
        let entries = log.entries()?;
        let layout = &log.layout;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "page {}x{} {:?}, {} bands of {} rows, content {} bytes, index {} entries",
            log.rect.width(),
            log.rect.height(),
            log.model,
            layout.n_bands,
            layout.band_height,
            log.content.len(),
            entries.len()
        );
        for band in 0..layout.n_bands {
            let state = log.bands[band as usize];
            let (y0, y1) = layout.band_rows(band);
            let _ = writeln!(
                out,
                "band {band} rows {y0}..{y1}: {} records, colors {:#x}",
                state.record_count, state.colors_used
            );
            if state.is_empty() {
                continue;
            }
            let mut listing = Listing {
                base: log.model,
                colors: ColorModelContext::new(log.model),
                out: String::new(),
            };
            walk_band(log, &entries, band, &mut listing)?;
            out.push_str(&listing.out);
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clist/reader.rs"]
mod tests;
