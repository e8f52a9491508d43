//! 8-bit fixed-point helpers shared by the blend engine and raster code.

/// `round(x * y / 255)` for `x, y` in `0..=255`.
pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// `x * y / 255` using the add-high-byte trick: `t = x*y + 0x80; (t + (t >> 8)) >> 8`.
#[inline]
pub(crate) fn mul8(x: u8, y: u8) -> u8 {
    let t = u32::from(x) * u32::from(y) + 0x80;
    ((t + (t >> 8)) >> 8) as u8
}

/// Union of two coverages: `255 - (255-a)*(255-b)/255`.
#[inline]
pub(crate) fn union8(a: u8, b: u8) -> u8 {
    255 - mul8(255 - a, 255 - b)
}

/// Interpolates `bg` toward `c` by `a/255`.
#[inline]
pub(crate) fn lerp8(bg: u8, c: u8, a: u8) -> u8 {
    let t = (i32::from(c) - i32::from(bg)) * i32::from(a) + 0x80;
    (i32::from(bg) + ((t + (t >> 8)) >> 8)).clamp(0, 255) as u8
}

/// `round(255 * v)` for `v` clamped to `[0, 1]`.
pub(crate) fn unit_to_u8(v: f32) -> u8 {
    let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
    (v * 255.0 + 0.5).floor() as u8
}

pub(crate) fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

pub(crate) fn align4(n: usize) -> usize {
    (n + 3) & !3
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
