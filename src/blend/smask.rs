use serde::{Deserialize, Serialize};

use crate::color::ColorModel;
use crate::foundation::error::{LaminaError, LaminaResult};

/// How a soft mask's content is reduced to a single coverage channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum MaskSubtype {
    Alpha = 0,
    #[default]
    Luminosity = 1,
}

impl MaskSubtype {
    pub fn from_u32(v: u32) -> LaminaResult<Self> {
        match v {
            0 => Ok(Self::Alpha),
            1 => Ok(Self::Luminosity),
            v => Err(LaminaError::range(format!("mask subtype {v} out of range"))),
        }
    }
}

/// 256-entry lookup table applied to a collapsed mask value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFn(#[serde(with = "table")] pub [u8; 256]);

impl Default for TransferFn {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Debug for TransferFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_identity() {
            f.write_str("TransferFn(identity)")
        } else {
            f.debug_tuple("TransferFn").field(&&self.0[..]).finish()
        }
    }
}

impl TransferFn {
    /// `round(i * 255 / 255)` for every entry.
    pub fn identity() -> Self {
        let mut t = [0u8; 256];
        for (i, v) in t.iter_mut().enumerate() {
            *v = ((i as f32 * 255.0 / 255.0) + 0.5).floor() as u8;
        }
        Self(t)
    }

    pub fn inverted() -> Self {
        let mut t = [0u8; 256];
        for (i, v) in t.iter_mut().enumerate() {
            *v = 255 - i as u8;
        }
        Self(t)
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &v)| usize::from(v) == i)
    }

    #[inline]
    pub fn apply(&self, v: u8) -> u8 {
        self.0[usize::from(v)]
    }
}

mod table {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub(super) fn serialize<S: Serializer>(t: &[u8; 256], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(t.iter())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 256], D::Error> {
        let v = Vec::<u8>::deserialize(d)?;
        <[u8; 256]>::try_from(v.as_slice())
            .map_err(|_| D::Error::custom(format!("transfer table needs 256 entries, got {}", v.len())))
    }
}

/// Reduces one mask pixel (colors in device form, then alpha) to a coverage byte before the
/// transfer function is applied.
///
/// Pixels no fill touched (`alpha == 0`) take `background`.
pub(crate) fn collapse_pixel(
    model: ColorModel,
    subtype: MaskSubtype,
    is_cie: bool,
    colors: &[u8],
    alpha: u8,
    background: u8,
) -> u8 {
    if subtype == MaskSubtype::Alpha {
        return alpha;
    }
    if alpha == 0 {
        return background;
    }
    if is_cie || colors.len() < 3 {
        // CIE masks carry luminosity in their first plane; gray is its own luminosity.
        return if model.is_additive() || is_cie {
            colors[0]
        } else {
            255 - colors[0]
        };
    }
    let (r, g, b) = if model.is_additive() {
        (
            u32::from(colors[0]),
            u32::from(colors[1]),
            u32::from(colors[2]),
        )
    } else {
        let k = colors.get(3).copied().map(u32::from).unwrap_or(0);
        let inv = |c: u8| 255 - (u32::from(c) + k).min(255);
        (inv(colors[0]), inv(colors[1]), inv(colors[2]))
    };
    ((r * 77 + g * 151 + b * 28 + 0x80) >> 8) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/blend/smask.rs"]
mod tests;
