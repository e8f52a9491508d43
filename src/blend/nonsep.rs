//! Luminosity and saturation helpers for the non-separable blend modes.
//!
//! Models with three or more colorants apply the RGB rule to the first three channels
//! (CMY in complemented form behaves like RGB); single-channel models treat the channel as
//! luminosity.

use crate::color::ColorModel;

fn lum(c: [i32; 3]) -> i32 {
    (c[0] * 77 + c[1] * 151 + c[2] * 28 + 0x80) >> 8
}

fn rgb(p: &[u8]) -> [i32; 3] {
    [i32::from(p[0]), i32::from(p[1]), i32::from(p[2])]
}

/// Pulls out-of-gamut channels back toward luminosity `y` along the gray axis.
fn clip_to_lum(c: [i32; 3], y: i32) -> [u8; 3] {
    let max = c[0].max(c[1]).max(c[2]);
    let min = c[0].min(c[1]).min(c[2]);
    let scale = if max > 255 {
        ((255 - y) << 16) / (max - y)
    } else if min < 0 {
        (y << 16) / (y - min)
    } else {
        return [c[0] as u8, c[1] as u8, c[2] as u8];
    };
    let f = |v: i32| (y + (((v - y) * scale + 0x8000) >> 16)).clamp(0, 255) as u8;
    [f(c[0]), f(c[1]), f(c[2])]
}

fn three_channel(model: ColorModel, n_chan: usize) -> bool {
    n_chan >= 3 && model.n_colorants() >= 3
}

/// Colors of `backdrop` shifted to the luminosity of `src`; extra colorants come from `src`.
pub(crate) fn luminosity(
    model: ColorModel,
    n_chan: usize,
    dst: &mut [u8],
    backdrop: &[u8],
    src: &[u8],
) {
    if !three_channel(model, n_chan) {
        dst[..n_chan].copy_from_slice(&src[..n_chan]);
        return;
    }
    let b = rgb(backdrop);
    let s = rgb(src);
    let delta_y = ((s[0] - b[0]) * 77 + (s[1] - b[1]) * 151 + (s[2] - b[2]) * 28 + 0x80) >> 8;
    let c = [b[0] + delta_y, b[1] + delta_y, b[2] + delta_y];
    dst[..3].copy_from_slice(&clip_to_lum(c, lum(s)));
    dst[3..n_chan].copy_from_slice(&src[3..n_chan]);
}

/// Hue and luminosity of `backdrop` with the saturation of `src`; extra colorants come from
/// `backdrop`.
pub(crate) fn saturation(
    model: ColorModel,
    n_chan: usize,
    dst: &mut [u8],
    backdrop: &[u8],
    src: &[u8],
) {
    if !three_channel(model, n_chan) {
        dst[..n_chan].copy_from_slice(&backdrop[..n_chan]);
        return;
    }
    let b = rgb(backdrop);
    let s = rgb(src);
    let minb = b[0].min(b[1]).min(b[2]);
    let maxb = b[0].max(b[1]).max(b[2]);
    if minb == maxb {
        dst[..3].copy_from_slice(&[b[1] as u8; 3]);
        dst[3..n_chan].copy_from_slice(&backdrop[3..n_chan]);
        return;
    }
    let sat_s = s[0].max(s[1]).max(s[2]) - s[0].min(s[1]).min(s[2]);
    let scale = (sat_s << 16) / (maxb - minb);
    let mut c = b.map(|v| ((v - minb) * scale + 0x8000) >> 16);
    let y = lum(b);
    let delta = y - lum(c);
    c.iter_mut().for_each(|v| *v += delta);
    dst[..3].copy_from_slice(&clip_to_lum(c, y));
    dst[3..n_chan].copy_from_slice(&backdrop[3..n_chan]);
}
