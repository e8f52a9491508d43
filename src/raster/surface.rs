use crate::color::ColorModel;
use crate::device::{BlendedImage, ImageSink};
use crate::foundation::core::IntRect;
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::foundation::math::lerp8;

/// Chunky 8-bit raster covering `rect`, one byte per colorant.
///
/// A page raster has `rect.y0 == 0`; a band raster covers a horizontal strip of the page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    rect: IntRect,
    model: ColorModel,
    data: Vec<u8>,
}

impl Raster {
    /// A raster filled with the model's paper color.
    pub fn new(rect: IntRect, model: ColorModel) -> LaminaResult<Self> {
        Self::filled(rect, model, &model.paper())
    }

    pub fn filled(rect: IntRect, model: ColorModel, colors: &[u8]) -> LaminaResult<Self> {
        let n = model.validate()?.n_colorants();
        let rect = rect.normalized();
        let len = (rect.width() as usize)
            .checked_mul(rect.height() as usize)
            .and_then(|px| px.checked_mul(n))
            .ok_or_else(|| LaminaError::out_of_memory("raster size overflow"))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| LaminaError::out_of_memory(format!("raster of {len} bytes")))?;
        for _ in 0..len / n.max(1) {
            data.extend((0..n).map(|i| colors.get(i).copied().unwrap_or(0)));
        }
        Ok(Self { rect, model, data })
    }

    pub fn rect(&self) -> IntRect {
        self.rect
    }

    pub fn model(&self) -> ColorModel {
        self.model
    }

    pub fn width(&self) -> u32 {
        self.rect.width() as u32
    }

    pub fn height(&self) -> u32 {
        self.rect.height() as u32
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn row_bytes(&self) -> usize {
        self.rect.width() as usize * self.model.n_colorants()
    }

    fn offset(&self, x: i32, y: i32) -> usize {
        let n = self.model.n_colorants();
        ((y - self.rect.y0) as usize * self.rect.width() as usize + (x - self.rect.x0) as usize)
            * n
    }

    /// Colorants at `(x, y)`; empty outside the raster.
    pub fn pixel(&self, x: i32, y: i32) -> &[u8] {
        if !self.rect.contains(x, y) {
            return &[];
        }
        let o = self.offset(x, y);
        &self.data[o..o + self.model.n_colorants()]
    }

    pub fn fill_span(&mut self, y: i32, x0: i32, x1: i32, colors: &[u8]) {
        let (x0, x1) = (x0.max(self.rect.x0), x1.min(self.rect.x1));
        if y < self.rect.y0 || y >= self.rect.y1 || x0 >= x1 {
            return;
        }
        let n = self.model.n_colorants();
        let start = self.offset(x0, y);
        let end = self.offset(x1, y);
        for px in self.data[start..end].chunks_exact_mut(n) {
            for (i, v) in px.iter_mut().enumerate() {
                *v = colors.get(i).copied().unwrap_or(0);
            }
        }
    }

    pub fn fill_rect(&mut self, rect: IntRect, colors: &[u8]) {
        let r = rect.intersect(&self.rect);
        for y in r.y0..r.y1 {
            self.fill_span(y, r.x0, r.x1, colors);
        }
    }

    /// Copy of rows `y0..y1` (page coordinates) as a band raster.
    pub fn band(&self, y0: i32, y1: i32) -> LaminaResult<Raster> {
        let r = IntRect::new(self.rect.x0, y0, self.rect.x1, y1).intersect(&self.rect);
        if r.is_empty() {
            return Err(LaminaError::range(format!(
                "rows {y0}..{y1} outside raster {:?}",
                self.rect
            )));
        }
        let (start, end) = (self.offset(r.x0, r.y0), self.offset(r.x0, r.y1));
        Ok(Raster {
            rect: r,
            model: self.model,
            data: self.data[start..end].to_vec(),
        })
    }

    /// Writes a band produced by [`Raster::band`] back into place.
    pub fn write_band(&mut self, band: &Raster) -> LaminaResult<()> {
        let r = band.rect;
        if band.model != self.model
            || r.x0 != self.rect.x0
            || r.x1 != self.rect.x1
            || r.intersect(&self.rect) != r
        {
            return Err(LaminaError::invalid_state(format!(
                "band {r:?} does not fit raster {:?}",
                self.rect
            )));
        }
        let start = self.offset(r.x0, r.y0);
        self.data[start..start + band.data.len()].copy_from_slice(&band.data);
        Ok(())
    }
}

impl ImageSink for Raster {
    fn put_image(&mut self, image: &BlendedImage<'_>) -> LaminaResult<()> {
        if image.model() != self.model {
            return Err(LaminaError::unsupported_color_space(format!(
                "{:?} pixels into a {:?} raster",
                image.model(),
                self.model
            )));
        }
        let r = image.rect.intersect(&self.rect);
        let n = self.model.n_colorants();
        let mut c = [0u8; crate::color::MAX_COLORANTS];
        for y in r.y0..r.y1 {
            for x in r.x0..r.x1 {
                let a = image.pixel(x, y, &mut c);
                if a == 0 {
                    continue;
                }
                let o = self.offset(x, y);
                for (i, v) in self.data[o..o + n].iter_mut().enumerate() {
                    *v = lerp8(*v, c[i], a);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/surface.rs"]
mod tests;
