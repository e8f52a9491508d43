use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::color::ColorModel;
use crate::encode::sink::{PageImage, PageSink, SinkConfig};
use crate::foundation::error::{LaminaError, LaminaResult};

/// Options for [`PngSink`].
#[derive(Clone, Debug)]
pub struct PngSinkOpts {
    /// Path of the first page. Page `n > 0` goes next to it as `<stem>-<n + 1>.png`.
    pub out_path: PathBuf,
    /// Overwrite files that already exist.
    pub overwrite: bool,
}

impl PngSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
        }
    }
}

/// Writes every page as an 8-bit PNG. Gray pages stay gray, everything else becomes RGB.
#[derive(Debug)]
pub struct PngSink {
    opts: PngSinkOpts,
    cfg: Option<SinkConfig>,
    written: Vec<PathBuf>,
}

impl PngSink {
    pub fn new(opts: PngSinkOpts) -> Self {
        Self {
            opts,
            cfg: None,
            written: Vec::new(),
        }
    }

    /// Files written so far, in page order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn path_for(&self, index: u64) -> PathBuf {
        let out = &self.opts.out_path;
        if index == 0 {
            return out.clone();
        }
        let stem = out
            .file_stem()
            .map_or_else(|| "page".to_owned(), |s| s.to_string_lossy().into_owned());
        out.with_file_name(format!("{stem}-{}.png", index + 1))
    }
}

pub fn ensure_parent_dir(path: &Path) -> LaminaResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

impl PageSink for PngSink {
    fn begin(&mut self, cfg: SinkConfig) -> LaminaResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(LaminaError::range("png sink width/height must be non-zero"));
        }
        ensure_parent_dir(&self.opts.out_path)?;
        self.cfg = Some(cfg);
        self.written.clear();
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, page), fields(w = page.width, h = page.height))]
    fn push_page(&mut self, index: u64, page: &PageImage) -> LaminaResult<()> {
        if self.cfg.is_none() {
            return Err(LaminaError::invalid_state("push_page before begin"));
        }
        let path = self.path_for(index);
        if !self.opts.overwrite && path.exists() {
            return Err(LaminaError::invalid_state(format!(
                "output file '{}' already exists",
                path.display()
            )));
        }
        let (buf, color) = match page.model {
            ColorModel::Gray => (page.data.clone(), image::ColorType::L8),
            _ => (page.to_rgb8(), image::ColorType::Rgb8),
        };
        image::save_buffer_with_format(
            &path,
            &buf,
            page.width,
            page.height,
            color,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        tracing::debug!(path = %path.display(), "wrote page");
        self.written.push(path);
        Ok(())
    }

    fn end(&mut self) -> LaminaResult<()> {
        Ok(())
    }
}
