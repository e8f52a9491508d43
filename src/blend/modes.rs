use serde::{Deserialize, Serialize};

use crate::color::ColorModel;
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::foundation::math::{clamp_u8, mul8};

use super::nonsep;

/// PDF blend modes, in their log-record byte order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BlendMode {
    #[default]
    Normal = 0,
    Compatible = 1,
    Multiply = 2,
    Screen = 3,
    Overlay = 4,
    SoftLight = 5,
    HardLight = 6,
    ColorDodge = 7,
    ColorBurn = 8,
    Darken = 9,
    Lighten = 10,
    Difference = 11,
    Exclusion = 12,
    Hue = 13,
    Saturation = 14,
    Color = 15,
    Luminosity = 16,
}

impl BlendMode {
    const ALL: [BlendMode; 17] = [
        Self::Normal,
        Self::Compatible,
        Self::Multiply,
        Self::Screen,
        Self::Overlay,
        Self::SoftLight,
        Self::HardLight,
        Self::ColorDodge,
        Self::ColorBurn,
        Self::Darken,
        Self::Lighten,
        Self::Difference,
        Self::Exclusion,
        Self::Hue,
        Self::Saturation,
        Self::Color,
        Self::Luminosity,
    ];

    pub fn from_u8(v: u8) -> LaminaResult<Self> {
        Self::ALL
            .get(usize::from(v))
            .copied()
            .ok_or_else(|| LaminaError::range(format!("blend mode {v} out of range")))
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Normal and Compatible composite without a blend step.
    pub fn is_normal(self) -> bool {
        matches!(self, Self::Normal | Self::Compatible)
    }

    pub fn is_separable(self) -> bool {
        !matches!(
            self,
            Self::Hue | Self::Saturation | Self::Color | Self::Luminosity
        )
    }
}

/// Computes the blend result `B(backdrop, src)` for each of the `n_chan` color channels.
pub(crate) fn blend_pixel(
    dst: &mut [u8],
    backdrop: &[u8],
    src: &[u8],
    n_chan: usize,
    mode: BlendMode,
    model: ColorModel,
) {
    if !mode.is_separable() {
        match mode {
            BlendMode::Luminosity => nonsep::luminosity(model, n_chan, dst, backdrop, src),
            BlendMode::Color => nonsep::luminosity(model, n_chan, dst, src, backdrop),
            BlendMode::Saturation => nonsep::saturation(model, n_chan, dst, backdrop, src),
            _ => {
                let mut tmp = [0u8; super::MAX_CHANNELS];
                nonsep::luminosity(model, n_chan, &mut tmp, src, backdrop);
                nonsep::saturation(model, n_chan, dst, &tmp, backdrop);
            }
        }
        return;
    }
    for i in 0..n_chan {
        dst[i] = blend_channel(backdrop[i], src[i], mode);
    }
}

fn blend_channel(b: u8, s: u8, mode: BlendMode) -> u8 {
    match mode {
        BlendMode::Normal | BlendMode::Compatible => s,
        BlendMode::Multiply => mul8(b, s),
        BlendMode::Screen => 255 - mul8(255 - b, 255 - s),
        BlendMode::Overlay => hard_light(s, b),
        BlendMode::HardLight => hard_light(b, s),
        BlendMode::SoftLight => soft_light(b, s),
        BlendMode::ColorDodge => {
            let (b, inv) = (u32::from(b), 255 - u32::from(s));
            if b == 0 {
                0
            } else if b >= inv {
                255
            } else {
                ((b * 255 + (inv >> 1)) / inv) as u8
            }
        }
        BlendMode::ColorBurn => {
            let (ib, s) = (255 - u32::from(b), u32::from(s));
            if ib == 0 {
                255
            } else if ib >= s {
                0
            } else {
                (255 - (ib * 255 + (s >> 1)) / s) as u8
            }
        }
        BlendMode::Darken => b.min(s),
        BlendMode::Lighten => b.max(s),
        BlendMode::Difference => b.abs_diff(s),
        BlendMode::Exclusion => {
            let (b, s) = (u32::from(b), u32::from(s));
            let t = (255 - b) * s + b * (255 - s) + 0x80;
            ((t + (t >> 8)) >> 8).min(255) as u8
        }
        BlendMode::Hue | BlendMode::Saturation | BlendMode::Color | BlendMode::Luminosity => s,
    }
}

fn hard_light(b: u8, s: u8) -> u8 {
    let (b, s) = (u32::from(b), u32::from(s));
    let t = if s < 128 {
        2 * b * s
    } else {
        0xfe01 - 2 * (255 - b) * (255 - s)
    } + 0x80;
    ((t + (t >> 8)) >> 8) as u8
}

fn soft_light(b: u8, s: u8) -> u8 {
    let (b, s) = (i32::from(b), i32::from(s));
    if s < 128 {
        let t = (255 - 2 * s) * b * (255 - b);
        clamp_u8(b - (t + 32512) / 65025)
    } else {
        let d = if b <= 64 {
            let t = (16 * b - 12 * 255) * b / 255 + 4 * 255;
            t * b / 255
        } else {
            isqrt(b * 255)
        };
        clamp_u8(b + ((2 * s - 255) * (d - b) + 127) / 255)
    }
}

fn isqrt(v: i32) -> i32 {
    if v <= 0 {
        return 0;
    }
    let mut x = v;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + v / x) / 2;
    }
    x
}

#[cfg(test)]
#[path = "../../tests/unit/blend/modes.rs"]
mod tests;
