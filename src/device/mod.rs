//! The drawing surface shared by direct rendering, recording and playback.

pub mod page;

use crate::color::{ClientColor, ColorIndex, ColorModel};
use crate::compositor::{BlendParamsUpdate, GroupParams, MaskParams, PlaneBuffer};
use crate::foundation::core::{BezPath, IntRect};
use crate::foundation::error::LaminaResult;
use crate::raster::{FillRule, ImageHeader, MonoBitmap, StrokeStyle};

pub use page::PageDevice;

/// Drawing operations a page description issues.
///
/// Colors are packed in the device's *current* color model, which changes while groups or
/// masks with their own blending color space are open; use [`Device::map_color`].
pub trait Device {
    fn color_model(&self) -> ColorModel;

    fn map_color(&self, color: &ClientColor) -> ColorIndex {
        self.color_model().map_index(color)
    }

    /// Starts transparency compositing for the rest of the page (or until `pop_device`).
    fn push_device(&mut self, spot_color_count: u32) -> LaminaResult<()>;
    /// Flattens composited pixels into the output and stops compositing.
    fn pop_device(&mut self) -> LaminaResult<()>;
    fn set_blend_params(&mut self, update: &BlendParamsUpdate) -> LaminaResult<()>;
    fn begin_group(&mut self, params: &GroupParams) -> LaminaResult<()>;
    fn end_group(&mut self) -> LaminaResult<()>;
    fn begin_mask(&mut self, params: &MaskParams) -> LaminaResult<()>;
    fn end_mask(&mut self) -> LaminaResult<()>;

    fn fill_rectangle(&mut self, rect: IntRect, color: ColorIndex) -> LaminaResult<()>;
    fn fill_path(&mut self, path: &BezPath, rule: FillRule, color: ColorIndex)
    -> LaminaResult<()>;
    fn stroke_path(
        &mut self,
        path: &BezPath,
        style: &StrokeStyle,
        color: ColorIndex,
    ) -> LaminaResult<()>;
    fn begin_image(&mut self, header: &ImageHeader) -> LaminaResult<()>;
    /// `rows` holds `n_rows` complete rows of samples.
    fn image_data(&mut self, rows: &[u8], n_rows: u32) -> LaminaResult<()>;
    fn end_image(&mut self) -> LaminaResult<()>;
    fn copy_mono(
        &mut self,
        bitmap: &MonoBitmap,
        x: i32,
        y: i32,
        color: ColorIndex,
    ) -> LaminaResult<()>;
}

/// Finished compositor pixels handed to the output.
pub struct BlendedImage<'a> {
    /// Region of `buffer` worth transferring (painted area clipped to the buffer).
    pub rect: IntRect,
    pub buffer: &'a PlaneBuffer,
}

impl BlendedImage<'_> {
    pub fn model(&self) -> ColorModel {
        self.buffer.model
    }

    /// Writes the colorants at `(x, y)` into `out` and returns the alpha.
    pub fn pixel(&self, x: i32, y: i32, out: &mut [u8]) -> u8 {
        let n = self.buffer.n_colorants();
        for (i, o) in out.iter_mut().take(n).enumerate() {
            *o = self.buffer.get(i, x, y);
        }
        self.buffer.get(n, x, y)
    }
}

/// Consumer of composited pixels: a page or band raster, or a parent device.
pub trait ImageSink {
    fn put_image(&mut self, image: &BlendedImage<'_>) -> LaminaResult<()>;
}
