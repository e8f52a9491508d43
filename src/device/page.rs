use crate::color::{ClientColor, ColorIndex, ColorModel, Colorants};
use crate::compositor::{
    BlendParamsUpdate, Compositor, CompositorOpts, GroupParams, MaskIdTracker, MaskParams,
};
use crate::foundation::core::{BezPath, IntRect};
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::raster::{
    FillRule, ImageCursor, ImageHeader, MonoBitmap, Raster, StrokeStyle, fill_spans,
    stroke_outline,
};

use super::Device;

/// Renders drawing calls straight into a raster.
///
/// Between `push_device` and `pop_device` drawing goes through a [`Compositor`] covering the
/// raster's rect; outside that it paints opaquely. The same type renders whole pages in
/// direct mode and single bands during log playback.
#[derive(Debug)]
pub struct PageDevice {
    raster: Raster,
    opts: CompositorOpts,
    compositor: Option<Compositor>,
    /// Present when this device hands out mask ids itself; playback uses recorded ids.
    mask_ids: Option<MaskIdTracker>,
    image: Option<ImageCursor>,
}

impl PageDevice {
    pub fn new(raster: Raster, opts: CompositorOpts) -> Self {
        Self {
            raster,
            opts,
            compositor: None,
            mask_ids: Some(MaskIdTracker::default()),
            image: None,
        }
    }

    /// A device that trusts the mask ids carried by group and mask parameters.
    pub fn for_playback(raster: Raster, opts: CompositorOpts) -> Self {
        Self {
            mask_ids: None,
            ..Self::new(raster, opts)
        }
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn is_compositing(&self) -> bool {
        self.compositor.is_some()
    }

    pub fn compositor(&self) -> Option<&Compositor> {
        self.compositor.as_ref()
    }

    /// Returns the finished raster. Fails while compositing or an image is still open.
    pub fn into_raster(self) -> LaminaResult<Raster> {
        if self.compositor.is_some() {
            return Err(LaminaError::invalid_state("page ended inside push_device"));
        }
        if self.image.is_some() {
            return Err(LaminaError::invalid_state("page ended inside an image"));
        }
        Ok(self.raster)
    }

    /// Flattens a compositor left open by a log that was cut short, then returns the raster.
    pub fn finish_partial(mut self) -> LaminaResult<Raster> {
        if self.compositor.is_some() {
            self.pop_device()?;
        }
        self.into_raster()
    }

    fn compositor_mut(&mut self, op: &str) -> LaminaResult<&mut Compositor> {
        self.compositor
            .as_mut()
            .ok_or_else(|| LaminaError::invalid_state(format!("{op} outside push_device")))
    }

    fn paint_span(&mut self, y: i32, x0: i32, x1: i32, colors: &[u8]) {
        match self.compositor.as_mut() {
            Some(c) => c.fill_span(y, x0, x1, colors),
            None => self.raster.fill_span(y, x0, x1, colors),
        }
    }

    fn paint_path(&mut self, path: &BezPath, rule: FillRule, colors: &[u8]) {
        let clip = self.raster.rect();
        fill_spans(path, rule, clip, |y, x0, x1| self.paint_span(y, x0, x1, colors));
    }
}

impl Device for PageDevice {
    fn color_model(&self) -> ColorModel {
        self.compositor
            .as_ref()
            .map_or(self.raster.model(), Compositor::color_model)
    }

    fn push_device(&mut self, spot_color_count: u32) -> LaminaResult<()> {
        if self.compositor.is_some() {
            return Err(LaminaError::invalid_state("push_device while already compositing"));
        }
        let mut c = Compositor::new(self.raster.rect(), self.raster.model(), self.opts)?;
        c.set_spot_colors(spot_color_count);
        self.compositor = Some(c);
        if let Some(ids) = self.mask_ids.as_mut() {
            ids.reset();
        }
        Ok(())
    }

    fn pop_device(&mut self) -> LaminaResult<()> {
        let c = self
            .compositor
            .take()
            .ok_or_else(|| LaminaError::invalid_state("pop_device without push_device"))?;
        c.finish(&mut self.raster)
    }

    fn set_blend_params(&mut self, update: &BlendParamsUpdate) -> LaminaResult<()> {
        self.compositor_mut("set_blend_params")?
            .set_blend_params(update);
        Ok(())
    }

    fn begin_group(&mut self, params: &GroupParams) -> LaminaResult<()> {
        let mask_id = match self.mask_ids.as_mut() {
            Some(ids) => ids.begin_group(),
            None => params.mask_id,
        };
        self.compositor_mut("begin_group")?
            .begin_group(&GroupParams {
                mask_id,
                ..params.clone()
            })
    }

    fn end_group(&mut self) -> LaminaResult<()> {
        if let Some(ids) = self.mask_ids.as_mut() {
            ids.end_group()?;
        }
        self.compositor_mut("end_group")?.end_group()
    }

    fn begin_mask(&mut self, params: &MaskParams) -> LaminaResult<()> {
        let mask_id = match self.mask_ids.as_mut() {
            Some(ids) => ids.begin_mask(params.replacing),
            None => params.mask_id,
        };
        self.compositor_mut("begin_mask")?
            .begin_mask(&MaskParams {
                mask_id,
                ..params.clone()
            })
    }

    fn end_mask(&mut self) -> LaminaResult<()> {
        if let Some(ids) = self.mask_ids.as_mut() {
            ids.end_mask()?;
        }
        self.compositor_mut("end_mask")?.end_mask()
    }

    fn fill_rectangle(&mut self, rect: IntRect, color: ColorIndex) -> LaminaResult<()> {
        let colors = self.color_model().unpack(color);
        let r = rect.intersect(&self.raster.rect());
        for y in r.y0..r.y1 {
            self.paint_span(y, r.x0, r.x1, &colors);
        }
        Ok(())
    }

    fn fill_path(
        &mut self,
        path: &BezPath,
        rule: FillRule,
        color: ColorIndex,
    ) -> LaminaResult<()> {
        let colors = self.color_model().unpack(color);
        self.paint_path(path, rule, &colors);
        Ok(())
    }

    fn stroke_path(
        &mut self,
        path: &BezPath,
        style: &StrokeStyle,
        color: ColorIndex,
    ) -> LaminaResult<()> {
        let colors = self.color_model().unpack(color);
        let outline = stroke_outline(path, style);
        self.paint_path(&outline, FillRule::NonZero, &colors);
        Ok(())
    }

    fn begin_image(&mut self, header: &ImageHeader) -> LaminaResult<()> {
        if self.image.is_some() {
            return Err(LaminaError::invalid_state("begin_image inside an image"));
        }
        self.image = Some(ImageCursor::new(*header)?);
        Ok(())
    }

    fn image_data(&mut self, rows: &[u8], n_rows: u32) -> LaminaResult<()> {
        let mut cursor = self
            .image
            .take()
            .ok_or_else(|| LaminaError::invalid_state("image_data outside an image"))?;
        let model = self.color_model();
        let n = usize::from(cursor.header().n_comps);
        let x0 = cursor.header().x;
        let result = cursor.feed(rows, n_rows, |y, row| {
            // Runs of identical samples are painted as one span.
            let mut run_start = 0;
            let pixels: Vec<&[u8]> = row.chunks_exact(n).collect();
            for i in 1..=pixels.len() {
                if i < pixels.len() && pixels[i] == pixels[run_start] {
                    continue;
                }
                let colors: Colorants =
                    model.map_color(&ClientColor::from_samples(pixels[run_start]));
                self.paint_span(y, x0 + run_start as i32, x0 + i as i32, &colors);
                run_start = i;
            }
        });
        self.image = Some(cursor);
        result
    }

    fn end_image(&mut self) -> LaminaResult<()> {
        self.image
            .take()
            .map(|_| ())
            .ok_or_else(|| LaminaError::invalid_state("end_image without begin_image"))
    }

    fn copy_mono(
        &mut self,
        bitmap: &MonoBitmap,
        x: i32,
        y: i32,
        color: ColorIndex,
    ) -> LaminaResult<()> {
        let colors = self.color_model().unpack(color);
        for row in 0..bitmap.height() {
            let py = y + row as i32;
            if !self.raster.rect().contains(self.raster.rect().x0, py) {
                continue;
            }
            bitmap.spans(row, |a, b| {
                self.paint_span(py, x + a as i32, x + b as i32, &colors);
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/page.rs"]
mod tests;
