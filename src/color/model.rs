use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::foundation::error::{LaminaError, LaminaResult};
use crate::foundation::math::unit_to_u8;

/// Upper bound on colorants per pixel; a packed [`ColorIndex`] holds one byte per colorant.
pub const MAX_COLORANTS: usize = 8;

/// Unpacked device colorant bytes.
pub type Colorants = SmallVec<[u8; MAX_COLORANTS]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Zero is black, 255 is full intensity (Gray, RGB).
    Additive,
    /// Zero is no ink, 255 is full coverage (CMYK and DeviceN).
    Subtractive,
}

/// Process color model of a device, group or mask.
///
/// Each variant implies its colorant count, polarity and the non-separable blend rule used
/// by the blend engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorModel {
    Gray,
    #[default]
    Rgb,
    Cmyk,
    /// CMYK plus the given number of spot colorants.
    CmykSpot(u8),
    /// Subtractive DeviceN with the given number of colorants.
    Custom(u8),
}

impl ColorModel {
    pub fn n_colorants(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
            Self::CmykSpot(n) => 4 + usize::from(n),
            Self::Custom(n) => usize::from(n),
        }
    }

    pub fn polarity(self) -> Polarity {
        match self {
            Self::Gray | Self::Rgb => Polarity::Additive,
            Self::Cmyk | Self::CmykSpot(_) | Self::Custom(_) => Polarity::Subtractive,
        }
    }

    pub fn is_additive(self) -> bool {
        self.polarity() == Polarity::Additive
    }

    /// Bits per packed color index.
    pub fn depth(self) -> u32 {
        8 * self.n_colorants() as u32
    }

    /// Bytes a packed color index occupies in a log record.
    pub fn index_bytes(self) -> usize {
        self.n_colorants()
    }

    pub fn validate(self) -> LaminaResult<Self> {
        let n = self.n_colorants();
        if n == 0 || n > MAX_COLORANTS {
            return Err(LaminaError::unsupported_color_space(format!(
                "{self:?} has {n} colorants (supported: 1..={MAX_COLORANTS})"
            )));
        }
        Ok(self)
    }

    /// Model implied by a bare colorant count: 1 Gray, 3 RGB, 4 CMYK, anything else DeviceN.
    pub fn from_colorant_count(n: usize) -> LaminaResult<Self> {
        let model = match n {
            1 => Self::Gray,
            3 => Self::Rgb,
            4 => Self::Cmyk,
            n => Self::Custom(u8::try_from(n).map_err(|_| {
                LaminaError::unsupported_color_space(format!("{n} colorants"))
            })?),
        };
        model.validate()
    }

    /// Device value of "no paint": white for additive models, no ink for subtractive ones.
    pub fn paper(self) -> Colorants {
        let v = if self.is_additive() { 255 } else { 0 };
        SmallVec::from_elem(v, self.n_colorants())
    }

    pub fn pack(self, comps: &[u8]) -> ColorIndex {
        let mut v = 0u64;
        for i in 0..self.n_colorants() {
            v = (v << 8) | u64::from(comps.get(i).copied().unwrap_or(0));
        }
        ColorIndex(v)
    }

    pub fn unpack(self, index: ColorIndex) -> Colorants {
        let n = self.n_colorants();
        (0..n)
            .map(|i| (index.0 >> (8 * (n - 1 - i))) as u8)
            .collect()
    }

    /// Maps a client color into this model's device bytes.
    pub fn map_color(self, color: &ClientColor) -> Colorants {
        match self {
            Self::Gray => {
                let g = match color {
                    ClientColor::Gray(g) => *g,
                    ClientColor::Rgb(rgb) => luminance(*rgb),
                    ClientColor::Cmyk(cmyk) => luminance(cmyk_to_rgb(*cmyk)),
                    ClientColor::DeviceN(v) => 1.0 - v.first().copied().unwrap_or(0.0),
                };
                SmallVec::from_elem(unit_to_u8(g), 1)
            }
            Self::Rgb => {
                let rgb = match color {
                    ClientColor::Gray(g) => [*g; 3],
                    ClientColor::Rgb(rgb) => *rgb,
                    ClientColor::Cmyk(cmyk) => cmyk_to_rgb(*cmyk),
                    ClientColor::DeviceN(v) => cmyk_to_rgb(first_four(v)),
                };
                rgb.iter().map(|&c| unit_to_u8(c)).collect()
            }
            Self::Cmyk | Self::CmykSpot(_) | Self::Custom(_) => {
                let n = self.n_colorants();
                let mut out: Colorants = SmallVec::from_elem(0, n);
                let process: Option<[f32; 4]> = match color {
                    ClientColor::Gray(g) => Some([0.0, 0.0, 0.0, 1.0 - g]),
                    ClientColor::Rgb(rgb) => Some(rgb_to_cmyk(*rgb)),
                    ClientColor::Cmyk(cmyk) => Some(*cmyk),
                    ClientColor::DeviceN(_) => None,
                };
                match (process, color) {
                    (Some(cmyk), _) if matches!(self, Self::Custom(_)) && n < 4 => {
                        let ink = 1.0 - luminance(cmyk_to_rgb(cmyk));
                        out.iter_mut().for_each(|o| *o = unit_to_u8(ink));
                    }
                    (Some(cmyk), _) => {
                        for (o, c) in out.iter_mut().zip(cmyk) {
                            *o = unit_to_u8(c);
                        }
                    }
                    (None, ClientColor::DeviceN(v)) => {
                        for (o, c) in out.iter_mut().zip(v.iter()) {
                            *o = unit_to_u8(*c);
                        }
                    }
                    (None, _) => {}
                }
                out
            }
        }
    }

    pub fn map_index(self, color: &ClientColor) -> ColorIndex {
        self.pack(&self.map_color(color))
    }
}

/// A device-independent paint color as supplied by a caller, components in `[0, 1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientColor {
    Gray(f32),
    Rgb([f32; 3]),
    Cmyk([f32; 4]),
    DeviceN(Vec<f32>),
}

impl ClientColor {
    pub const BLACK: ClientColor = ClientColor::Gray(0.0);
    pub const WHITE: ClientColor = ClientColor::Gray(1.0);

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::Rgb([r, g, b])
    }

    /// Color from 8-bit samples in the given client color space (1, 3 or 4 components).
    pub fn from_samples(samples: &[u8]) -> Self {
        let f = |v: u8| f32::from(v) / 255.0;
        match samples {
            [g] => Self::Gray(f(*g)),
            [r, g, b] => Self::Rgb([f(*r), f(*g), f(*b)]),
            [c, m, y, k] => Self::Cmyk([f(*c), f(*m), f(*y), f(*k)]),
            other => Self::DeviceN(other.iter().map(|&v| f(v)).collect()),
        }
    }
}

/// Packed device color: one byte per colorant, first colorant most significant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorIndex(pub u64);

fn luminance([r, g, b]: [f32; 3]) -> f32 {
    0.30 * r + 0.59 * g + 0.11 * b
}

fn cmyk_to_rgb([c, m, y, k]: [f32; 4]) -> [f32; 3] {
    [
        1.0 - (c + k).min(1.0),
        1.0 - (m + k).min(1.0),
        1.0 - (y + k).min(1.0),
    ]
}

fn rgb_to_cmyk([r, g, b]: [f32; 3]) -> [f32; 4] {
    let (c, m, y) = (1.0 - r, 1.0 - g, 1.0 - b);
    let k = c.min(m).min(y);
    [c - k, m - k, y - k, k]
}

fn first_four(v: &[f32]) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (o, c) in out.iter_mut().zip(v) {
        *o = *c;
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/color/model.rs"]
mod tests;
