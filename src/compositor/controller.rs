use crate::blend::{MAX_CHANNELS, composite_pixel_alpha, knockout_simple, overprint_write_back};
use crate::color::{ColorModel, ColorModelContext};
use crate::device::{BlendedImage, ImageSink};
use crate::foundation::core::IntRect;
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::foundation::math::{union8, unit_to_u8};

use super::params::{BlendParams, BlendParamsUpdate, GroupColor, GroupParams, MaskParams};
use super::stack::{CompositingStack, CompositorOpts, PushGroup, PushMask};

/// Group/mask controller for one page or band.
///
/// Owns the compositing stack, the color-model context and the current marking state. Every
/// instance is independent; concurrent bands each get their own.
#[derive(Debug)]
pub struct Compositor {
    stack: CompositingStack,
    colors: ColorModelContext,
    params: BlendParams,
    spot_colors: u32,
}

impl Compositor {
    pub fn new(rect: IntRect, model: ColorModel, opts: CompositorOpts) -> LaminaResult<Self> {
        Ok(Self {
            stack: CompositingStack::new(rect, model, opts)?,
            colors: ColorModelContext::new(model),
            params: BlendParams::default(),
            spot_colors: 0,
        })
    }

    pub fn rect(&self) -> IntRect {
        self.stack.rect()
    }

    /// Model of the innermost open group or mask.
    pub fn color_model(&self) -> ColorModel {
        self.colors.model()
    }

    pub fn blend_params(&self) -> &BlendParams {
        &self.params
    }

    pub fn stack(&self) -> &CompositingStack {
        &self.stack
    }

    pub fn spot_colors(&self) -> u32 {
        self.spot_colors
    }

    pub fn set_spot_colors(&mut self, n: u32) {
        self.spot_colors = n;
    }

    pub fn set_blend_params(&mut self, update: &BlendParamsUpdate) {
        self.params.apply(update);
    }

    pub fn begin_group(&mut self, params: &GroupParams) -> LaminaResult<()> {
        let model = params
            .group_color
            .resolve(params.n_color_comps, self.colors.model())?;
        let changed = self.colors.push(model);
        let req = PushGroup {
            rect: params.device_rect().intersect(&self.stack.rect()),
            // A group blending in another color space cannot see its parent's pixels.
            isolated: params.isolated || changed,
            knockout: params.knockout,
            alpha: unit_to_u8(params.opacity * params.shape),
            shape: unit_to_u8(params.shape),
            blend_mode: params.blend_mode,
            mask_id: params.mask_id,
            model,
            idle: params.idle,
        };
        if let Err(e) = self.stack.push_group(&req) {
            self.colors.pop()?;
            return Err(e);
        }
        Ok(())
    }

    pub fn end_group(&mut self) -> LaminaResult<()> {
        self.stack.pop_group()?;
        self.colors.pop()?;
        Ok(())
    }

    pub fn begin_mask(&mut self, params: &MaskParams) -> LaminaResult<()> {
        let model = params
            .group_color
            .resolve(params.n_color_comps, self.colors.model())?;
        self.colors.push(model);
        let req = PushMask {
            rect: params.device_rect().intersect(&self.stack.rect()),
            bg_alpha: params.bg_alpha(),
            transfer_fn: params.transfer_fn.clone(),
            mask_id: params.mask_id,
            subtype: params.subtype,
            is_cie: params.group_color == GroupColor::CieXyz,
            replacing: params.replacing,
            model,
            idle: params.idle,
        };
        if let Err(e) = self.stack.push_mask(&req) {
            self.colors.pop()?;
            return Err(e);
        }
        Ok(())
    }

    pub fn end_mask(&mut self) -> LaminaResult<()> {
        self.stack.pop_mask()?;
        self.colors.pop()?;
        Ok(())
    }

    /// Paints `colors` (device bytes in [`Self::color_model`]) over `x0..x1` on row `y` of
    /// the innermost buffer with the current marking state.
    pub fn fill_span(&mut self, y: i32, x0: i32, x1: i32, colors: &[u8]) {
        let src_alpha = unit_to_u8(self.params.opacity * self.params.shape);
        let shape_val = unit_to_u8(self.params.shape);
        let mode = self.params.blend_mode;
        let overprint = self.params.overprint;
        let overprint_mode = self.params.overprint_mode;

        let buf = self.stack.top_mut();
        let rect = buf.rect;
        let (x0, x1) = (x0.max(rect.x0), x1.min(rect.x1));
        if y < rect.y0 || y >= rect.y1 || x0 >= x1 || !buf.has_data() {
            return;
        }
        let n = buf.n_colorants();
        let model = buf.model;
        let additive = model.is_additive();
        let knockout = buf.knockout;
        let stride = buf.planestride;
        let shape_plane = buf.shape_plane();
        let alpha_g_plane = buf.alpha_g_plane();

        let mut src = [0u8; MAX_CHANNELS];
        let mut drawn: u64 = 0;
        for i in 0..n {
            let c = colors.get(i).copied().unwrap_or(0);
            src[i] = if additive { c } else { 255 - c };
            if !overprint || overprint_mode != 1 || additive || c != 0 {
                drawn |= 1 << i;
            }
        }

        let start = buf.offset(x0, y);
        let Some(data) = buf.data.as_mut() else {
            return;
        };
        let mut dst = [0u8; MAX_CHANNELS];
        let mut out = [0u8; MAX_CHANNELS];
        for o in start..start + (x1 - x0) as usize {
            for i in 0..=n {
                let v = data[i * stride + o];
                dst[i] = if i < n && !additive { 255 - v } else { v };
            }
            if knockout {
                src[n] = 255;
                let mut s = shape_plane.map(|p| data[p * stride + o]);
                knockout_simple(&mut dst, s.as_mut(), &src, n, src_alpha);
                if let (Some(p), Some(s)) = (shape_plane, s) {
                    data[p * stride + o] = s;
                }
            } else {
                src[n] = src_alpha;
                out[..=n].copy_from_slice(&dst[..=n]);
                composite_pixel_alpha(&mut out, &src, n, mode, model);
                if overprint {
                    overprint_write_back(&mut dst, &out, n, drawn);
                } else {
                    dst[..=n].copy_from_slice(&out[..=n]);
                }
                if let Some(p) = alpha_g_plane {
                    data[p * stride + o] = union8(data[p * stride + o], src_alpha);
                }
                if let Some(p) = shape_plane {
                    data[p * stride + o] = union8(data[p * stride + o], shape_val);
                }
            }
            for i in 0..=n {
                data[i * stride + o] = if i < n && !additive { 255 - dst[i] } else { dst[i] };
            }
        }
        buf.grow_bbox(&IntRect::new(x0, y, x1, y + 1));
    }

    pub fn fill_rect(&mut self, rect: IntRect, colors: &[u8]) {
        let r = rect.intersect(&self.stack.top().rect);
        for y in r.y0..r.y1 {
            self.fill_span(y, r.x0, r.x1, colors);
        }
    }

    /// Hands the base buffer's painted pixels to `sink`.
    pub fn put_image(&self, sink: &mut dyn ImageSink) -> LaminaResult<()> {
        let base = self.stack.base();
        let rect = base.rect.intersect(&base.bbox);
        if rect.is_empty() || !base.has_data() {
            return Ok(());
        }
        sink.put_image(&BlendedImage { rect, buffer: base })
    }

    /// Checks that every group and mask was closed, then flattens into `sink`.
    #[tracing::instrument(level = "debug", skip_all, fields(rect = ?self.stack.rect()))]
    pub fn finish(self, sink: &mut dyn ImageSink) -> LaminaResult<()> {
        self.colors.ensure_balanced()?;
        if self.stack.depth() != 1 {
            return Err(LaminaError::invalid_state(format!(
                "{} group/mask levels open at pop_device",
                self.stack.depth() - 1
            )));
        }
        self.put_image(sink)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/controller.rs"]
mod tests;
