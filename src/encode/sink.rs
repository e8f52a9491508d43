use serde::{Deserialize, Serialize};

use crate::color::ColorModel;
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::raster::Raster;

/// Configuration provided to a [`PageSink`] before the first page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub model: ColorModel,
}

/// A finished page: chunky 8-bit samples, `model.n_colorants()` per pixel, rows top to bottom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageImage {
    pub width: u32,
    pub height: u32,
    pub model: ColorModel,
    pub data: Vec<u8>,
}

impl PageImage {
    pub fn from_raster(raster: Raster) -> Self {
        Self {
            width: raster.width(),
            height: raster.height(),
            model: raster.model(),
            data: raster.into_data(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let n = self.model.n_colorants();
        let at = (y as usize * self.width as usize + x as usize) * n;
        &self.data[at..at + n]
    }

    /// Samples converted to 8-bit RGB. Subtractive models are converted naively from their
    /// first four colorants; spot colorants are dropped.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let n = self.model.n_colorants();
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for px in self.data.chunks_exact(n) {
            out.extend_from_slice(&device_to_rgb(self.model, px));
        }
        out
    }
}

fn device_to_rgb(model: ColorModel, px: &[u8]) -> [u8; 3] {
    let inv = |v: u8, k: u8| ((255 - u16::from(v)) * (255 - u16::from(k)) / 255) as u8;
    match model {
        ColorModel::Gray => [px[0]; 3],
        ColorModel::Rgb => [px[0], px[1], px[2]],
        ColorModel::Cmyk | ColorModel::CmykSpot(_) => {
            [inv(px[0], px[3]), inv(px[1], px[3]), inv(px[2], px[3])]
        }
        ColorModel::Custom(_) if px.len() >= 4 => {
            [inv(px[0], px[3]), inv(px[1], px[3]), inv(px[2], px[3])]
        }
        ColorModel::Custom(_) => {
            let ink = px.iter().copied().max().unwrap_or(0);
            [255 - ink; 3]
        }
    }
}

/// Consumer of finished pages, in page order.
pub trait PageSink {
    /// Called once before any page is pushed.
    fn begin(&mut self, cfg: SinkConfig) -> LaminaResult<()>;
    /// Push page `index` (0-based, strictly increasing).
    fn push_page(&mut self, index: u64, page: &PageImage) -> LaminaResult<()>;
    /// Called once after the last page.
    fn end(&mut self) -> LaminaResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    pages: Vec<PageImage>,
    ended: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    pub fn pages(&self) -> &[PageImage] {
        &self.pages
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl PageSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> LaminaResult<()> {
        self.cfg = Some(cfg);
        self.pages.clear();
        self.ended = false;
        Ok(())
    }

    fn push_page(&mut self, index: u64, page: &PageImage) -> LaminaResult<()> {
        if index != self.pages.len() as u64 {
            return Err(LaminaError::invalid_state(format!(
                "page {index} pushed after {} pages",
                self.pages.len()
            )));
        }
        self.pages.push(page.clone());
        Ok(())
    }

    fn end(&mut self) -> LaminaResult<()> {
        self.ended = true;
        Ok(())
    }
}
