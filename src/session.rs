//! Rendering page scripts into sinks, directly or through banded command lists.

use serde::{Deserialize, Serialize};

use crate::clist::{
    BandOpts, ClistDevice, ClistStats, MemoryPool, PageGeometry, PageLog, Recorder,
    build_thread_pool,
};
use crate::compositor::CompositorOpts;
use crate::device::PageDevice;
use crate::encode::{PageImage, PageSink, SinkConfig};
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::raster::Raster;
use crate::script::PageScript;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Draw every page straight into its raster.
    Direct,
    /// Record each page into a band log, then play the bands back.
    #[default]
    Banded,
}

/// Options controlling how scripts are rendered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOpts {
    pub mode: RenderMode,
    /// Play bands on a dedicated rayon pool.
    pub parallel: bool,
    /// Override the number of rayon worker threads. `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Keep finished page logs queued until the end of the run (or until memory runs short).
    pub defer_render: bool,
    pub band: BandOpts,
    pub compositor: CompositorOpts,
}

/// Statistics of one render run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    pub pages: u64,
    pub mode: RenderMode,
    /// Recording, playback and recovery counters of a banded run.
    pub clist: Option<ClistStats>,
}

fn sink_config(script: &PageScript) -> SinkConfig {
    SinkConfig {
        width: script.width,
        height: script.height,
        model: script.color_model,
    }
}

/// Renders a single page into `sink`.
pub fn render_script(
    script: &PageScript,
    opts: &RenderOpts,
    sink: &mut dyn PageSink,
) -> LaminaResult<RenderStats> {
    render_scripts(std::slice::from_ref(script), opts, sink)
}

/// Renders `scripts` as consecutive pages of one document. The sink is configured from the
/// first page.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(pages = scripts.len(), mode = ?opts.mode)
)]
pub fn render_scripts(
    scripts: &[PageScript],
    opts: &RenderOpts,
    sink: &mut dyn PageSink,
) -> LaminaResult<RenderStats> {
    let first = scripts
        .first()
        .ok_or_else(|| LaminaError::range("nothing to render"))?;
    sink.begin(sink_config(first))?;
    let stats = match opts.mode {
        RenderMode::Direct => render_direct(scripts, opts, sink)?,
        RenderMode::Banded => render_banded(scripts, opts, sink)?,
    };
    sink.end()?;
    tracing::debug!(?stats, "render finished");
    Ok(stats)
}

fn render_direct(
    scripts: &[PageScript],
    opts: &RenderOpts,
    sink: &mut dyn PageSink,
) -> LaminaResult<RenderStats> {
    for (i, script) in scripts.iter().enumerate() {
        let raster = direct_page(script, opts.compositor)?;
        sink.push_page(i as u64, &PageImage::from_raster(raster))?;
    }
    Ok(RenderStats {
        pages: scripts.len() as u64,
        mode: RenderMode::Direct,
        clist: None,
    })
}

fn render_banded(
    scripts: &[PageScript],
    opts: &RenderOpts,
    sink: &mut dyn PageSink,
) -> LaminaResult<RenderStats> {
    let mut dev =
        ClistDevice::new(opts.band.clone(), opts.compositor).with_defer_render(opts.defer_render);
    if opts.parallel {
        dev = dev.with_thread_pool(build_thread_pool(opts.threads)?);
    }
    let mut pushed = 0u64;
    let mut push = |pages: Vec<Raster>, sink: &mut dyn PageSink| -> LaminaResult<()> {
        for page in pages {
            sink.push_page(pushed, &PageImage::from_raster(page))?;
            pushed += 1;
        }
        Ok(())
    };
    for script in scripts {
        dev.begin_page(script.page_raster()?, script.uses_transparency())?;
        script.play(&mut dev)?;
        dev.end_page()?;
        push(dev.take_rendered(), sink)?;
    }
    push(dev.finish()?, sink)?;
    Ok(RenderStats {
        pages: scripts.len() as u64,
        mode: RenderMode::Banded,
        clist: Some(dev.stats()),
    })
}

/// Renders `script` without banding.
pub fn direct_page(script: &PageScript, opts: CompositorOpts) -> LaminaResult<Raster> {
    let mut dev = PageDevice::new(script.page_raster()?, opts);
    script.play(&mut dev)?;
    dev.into_raster()
}

/// Records `script` into a page log without playing it, for inspection. The log is not
/// charged against any shared pool.
pub fn record_page(script: &PageScript, band: &BandOpts) -> LaminaResult<PageLog> {
    let geometry = PageGeometry {
        width: script.width,
        height: script.height,
        n_colorants: script.color_model.n_colorants(),
        uses_transparency: script.uses_transparency(),
    };
    let mut rec = Recorder::new(geometry, script.color_model, band, MemoryPool::default())?;
    script.play(&mut rec)?;
    rec.end_page()
}

#[cfg(test)]
#[path = "../tests/unit/session.rs"]
mod tests;
