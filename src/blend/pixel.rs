use crate::color::{ColorModel, MAX_COLORANTS};
use crate::foundation::math::{mul8, union8};

use super::modes::{BlendMode, blend_pixel};

/// Colorants plus alpha.
pub const MAX_CHANNELS: usize = MAX_COLORANTS + 1;

/// Composites `src` (colors + alpha) over `dst` using `mode`.
///
/// The result alpha is the union of both alphas; colors are mixed by `src_alpha / result_alpha`
/// in 16.16 fixed point.
pub fn composite_pixel_alpha(
    dst: &mut [u8],
    src: &[u8],
    n_chan: usize,
    mode: BlendMode,
    model: ColorModel,
) {
    let src_alpha = src[n_chan];
    if src_alpha == 0 {
        return;
    }
    let a_b = dst[n_chan];
    if a_b == 0 {
        dst[..=n_chan].copy_from_slice(&src[..=n_chan]);
        return;
    }
    let a_r = union8(a_b, src_alpha);
    let src_scale = ((u32::from(src_alpha) << 16) + (u32::from(a_r) >> 1)) / u32::from(a_r);
    let src_scale = src_scale as i64;

    if mode.is_normal() {
        for i in 0..n_chan {
            let (c_s, c_b) = (i64::from(src[i]), i64::from(dst[i]));
            let t = (c_b << 16) + src_scale * (c_s - c_b) + 0x8000;
            dst[i] = (t >> 16).clamp(0, 255) as u8;
        }
    } else {
        let mut blend = [0u8; MAX_CHANNELS];
        blend_pixel(&mut blend, dst, src, n_chan, mode, model);
        for i in 0..n_chan {
            let (c_s, c_b) = (i64::from(src[i]), i64::from(dst[i]));
            let t = (i64::from(blend[i]) - c_s) * i64::from(a_b) + 0x80;
            let c_mix = c_s + ((t + (t >> 8)) >> 8);
            let t = (c_b << 16) + src_scale * (c_mix - c_b) + 0x8000;
            dst[i] = (t >> 16).clamp(0, 255) as u8;
        }
    }
    dst[n_chan] = a_r;
}

/// Composites a finished isolated group pixel onto its parent, scaled by `alpha`.
pub fn composite_group(
    dst: &mut [u8],
    dst_alpha_g: Option<&mut u8>,
    src: &[u8],
    n_chan: usize,
    alpha: u8,
    mode: BlendMode,
    model: ColorModel,
) {
    let mut src_alpha = src[n_chan];
    if src_alpha == 0 {
        return;
    }
    if alpha != 255 {
        src_alpha = mul8(src_alpha, alpha);
    }
    let mut tmp = [0u8; MAX_CHANNELS];
    tmp[..n_chan].copy_from_slice(&src[..n_chan]);
    tmp[n_chan] = src_alpha;
    composite_pixel_alpha(dst, &tmp, n_chan, mode, model);
    if let Some(g) = dst_alpha_g {
        *g = union8(*g, src_alpha);
    }
}

/// Composites a non-isolated group pixel onto its parent.
///
/// `src` already contains the backdrop; `src_alpha_g` is the group's own accumulated alpha,
/// used to remove the backdrop contribution before blending.
#[allow(clippy::too_many_arguments)]
pub fn recomposite_group(
    dst: &mut [u8],
    dst_alpha_g: Option<&mut u8>,
    src: &[u8],
    src_alpha_g: u8,
    n_chan: usize,
    alpha: u8,
    mode: BlendMode,
    model: ColorModel,
) {
    if src_alpha_g == 0 {
        return;
    }
    if mode.is_normal() && alpha == 255 {
        if let Some(g) = dst_alpha_g {
            *g = union8(*g, src_alpha_g);
        }
        dst[..=n_chan].copy_from_slice(&src[..=n_chan]);
        return;
    }

    let mut ca = [0u8; MAX_CHANNELS];
    let dst_alpha = i64::from(dst[n_chan]);
    if src_alpha_g == 255 || dst_alpha == 0 {
        ca[..n_chan].copy_from_slice(&src[..n_chan]);
    } else {
        // Solve src = (ca, src_alpha_g) over dst for ca.
        let g = i64::from(src_alpha_g);
        let scale = (dst_alpha * 255 * 2 + g) / (g << 1) - dst_alpha;
        for i in 0..n_chan {
            let (si, di) = (i64::from(src[i]), i64::from(dst[i]));
            let t = (si - di) * scale + 0x80;
            ca[i] = (si + ((t + (t >> 8)) >> 8)).clamp(0, 255) as u8;
        }
    }
    let src_alpha = mul8(src_alpha_g, alpha);
    ca[n_chan] = src_alpha;
    if let Some(g) = dst_alpha_g {
        *g = union8(*g, src_alpha);
    }
    composite_pixel_alpha(dst, &ca, n_chan, mode, model);
}

/// Knockout fill: `src` replaces `dst`, interpolated by the source coverage `src[n_chan]`.
pub fn knockout_simple(
    dst: &mut [u8],
    dst_shape: Option<&mut u8>,
    src: &[u8],
    n_chan: usize,
    opacity: u8,
) {
    let src_shape = src[n_chan];
    if src_shape == 0 {
        return;
    }
    if src_shape == 255 {
        dst[..n_chan].copy_from_slice(&src[..n_chan]);
        dst[n_chan] = opacity;
        if let Some(s) = dst_shape {
            *s = 255;
        }
        return;
    }
    interpolate(dst, src, n_chan, src_shape, opacity);
    if let Some(s) = dst_shape {
        *s = union8(*s, src_shape);
    }
}

/// Composites a group pixel into a knockout parent: the group replaces the parent's content
/// in proportion to its `shape`, with the group's alpha scaled by `alpha_mask`.
pub fn knockout_isolated(
    dst: &mut [u8],
    dst_shape: Option<&mut u8>,
    src: &[u8],
    n_chan: usize,
    shape: u8,
    alpha_mask: u8,
) {
    if shape == 0 {
        return;
    }
    let src_alpha = mul8(src[n_chan], alpha_mask);
    if shape == 255 {
        dst[..n_chan].copy_from_slice(&src[..n_chan]);
        dst[n_chan] = src_alpha;
        if let Some(s) = dst_shape {
            *s = 255;
        }
        return;
    }
    interpolate(dst, src, n_chan, shape, src_alpha);
    if let Some(s) = dst_shape {
        *s = union8(*s, shape);
    }
}

/// Premultiplied interpolation between `dst` and `(src, src_alpha)` by `shape`.
fn interpolate(dst: &mut [u8], src: &[u8], n_chan: usize, shape: u8, src_alpha: u8) {
    let dst_alpha = i64::from(dst[n_chan]);
    let shape = i64::from(shape);
    let src_alpha = i64::from(src_alpha);
    let t = (src_alpha - dst_alpha) * shape + 0x80;
    let result_alpha = dst_alpha + ((t + (t >> 8)) >> 8);
    if result_alpha != 0 {
        for i in 0..n_chan {
            let t = i64::from(dst[i]) * dst_alpha * (255 - shape)
                + i64::from(src[i]) * src_alpha * shape
                + (result_alpha << 7);
            dst[i] = (t / (result_alpha * 255)).clamp(0, 255) as u8;
        }
    }
    dst[n_chan] = result_alpha.clamp(0, 255) as u8;
}

/// Copies the composited `result` into `dst`, limited to the colorants whose bit is set in
/// `drawn_comps`. Alpha is always written.
pub fn overprint_write_back(dst: &mut [u8], result: &[u8], n_chan: usize, drawn_comps: u64) {
    for i in 0..n_chan {
        if drawn_comps & (1 << i) != 0 {
            dst[i] = result[i];
        }
    }
    dst[n_chan] = result[n_chan];
}

#[cfg(test)]
#[path = "../../tests/unit/blend/pixel.rs"]
mod tests;
