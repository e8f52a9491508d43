use serde::{Deserialize, Serialize};

use crate::blend::{BlendMode, MaskSubtype, TransferFn};
use crate::color::ColorModel;
use crate::foundation::core::{Ctm, IntRect, Rect};
use crate::foundation::error::{LaminaError, LaminaResult};

/// Blending color space declared by a group or mask, as carried in log records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GroupColor {
    /// Inherit the enclosing level's color space.
    #[default]
    Unknown = 0,
    Gray = 1,
    Rgb = 2,
    Cmyk = 3,
    CieXyz = 4,
    DeviceN = 5,
}

impl GroupColor {
    pub fn from_u8(v: u8) -> LaminaResult<Self> {
        Ok(match v {
            0 => Self::Unknown,
            1 => Self::Gray,
            2 => Self::Rgb,
            3 => Self::Cmyk,
            4 => Self::CieXyz,
            5 => Self::DeviceN,
            v => return Err(LaminaError::range(format!("group color {v} out of range"))),
        })
    }

    /// Color space a group declaring this value blends in, given its parent's.
    pub fn resolve(self, n_color_comps: u32, parent: ColorModel) -> LaminaResult<ColorModel> {
        let n = n_color_comps as usize;
        let expect = |model: ColorModel| -> LaminaResult<ColorModel> {
            if n != 0 && n != model.n_colorants() {
                return Err(LaminaError::unsupported_color_space(format!(
                    "{self:?} group declares {n} colorants"
                )));
            }
            Ok(model)
        };
        match self {
            Self::Unknown => Ok(parent),
            Self::Gray => expect(ColorModel::Gray),
            Self::Rgb | Self::CieXyz => expect(ColorModel::Rgb),
            Self::Cmyk => expect(ColorModel::Cmyk),
            Self::DeviceN => {
                let model = match parent {
                    ColorModel::CmykSpot(_) if n >= 4 => ColorModel::CmykSpot((n - 4) as u8),
                    _ => ColorModel::Custom(u8::try_from(n).map_err(|_| {
                        LaminaError::unsupported_color_space(format!("{n} DeviceN colorants"))
                    })?),
                };
                model.validate()
            }
        }
    }

    /// Record value describing `model`.
    pub fn of(model: ColorModel) -> Self {
        match model {
            ColorModel::Gray => Self::Gray,
            ColorModel::Rgb => Self::Rgb,
            ColorModel::Cmyk => Self::Cmyk,
            ColorModel::CmykSpot(_) | ColorModel::Custom(_) => Self::DeviceN,
        }
    }
}

/// Parameters of a transparency group, in user space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupParams {
    pub ctm: Ctm,
    pub bbox: Rect,
    pub isolated: bool,
    pub knockout: bool,
    pub blend_mode: BlendMode,
    pub group_color: GroupColor,
    pub n_color_comps: u32,
    pub opacity: f32,
    pub shape: f32,
    /// Assigned by the device from its mask bookkeeping; callers leave it 0.
    pub mask_id: u32,
    #[serde(skip)]
    pub idle: bool,
}

impl Default for GroupParams {
    fn default() -> Self {
        Self {
            ctm: Ctm::IDENTITY,
            bbox: Rect::ZERO,
            isolated: false,
            knockout: false,
            blend_mode: BlendMode::Normal,
            group_color: GroupColor::Unknown,
            n_color_comps: 0,
            opacity: 1.0,
            shape: 1.0,
            mask_id: 0,
            idle: false,
        }
    }
}

impl GroupParams {
    pub fn new(bbox: Rect) -> Self {
        Self {
            bbox,
            ..Self::default()
        }
    }

    pub fn device_rect(&self) -> IntRect {
        self.ctm.device_rect(self.bbox)
    }
}

/// Parameters of a soft mask, in user space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskParams {
    pub ctm: Ctm,
    pub bbox: Rect,
    pub subtype: MaskSubtype,
    pub group_color: GroupColor,
    pub n_color_comps: u32,
    pub replacing: bool,
    pub transfer_fn: TransferFn,
    /// Backdrop color components; empty when the mask has no backdrop.
    pub background: Vec<f32>,
    pub gray_background: f32,
    pub mask_id: u32,
    #[serde(skip)]
    pub idle: bool,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            ctm: Ctm::IDENTITY,
            bbox: Rect::ZERO,
            subtype: MaskSubtype::Luminosity,
            group_color: GroupColor::Unknown,
            n_color_comps: 0,
            replacing: true,
            transfer_fn: TransferFn::identity(),
            background: Vec::new(),
            gray_background: 0.0,
            mask_id: 0,
            idle: false,
        }
    }
}

impl MaskParams {
    pub fn new(bbox: Rect) -> Self {
        Self {
            bbox,
            ..Self::default()
        }
    }

    pub fn device_rect(&self) -> IntRect {
        self.ctm.device_rect(self.bbox)
    }

    /// Value given to mask pixels no fill reached.
    pub fn bg_alpha(&self) -> u8 {
        if self.background.is_empty() {
            0
        } else {
            crate::foundation::math::unit_to_u8(self.gray_background)
        }
    }
}

/// Marking state applied to every fill.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendParams {
    pub blend_mode: BlendMode,
    pub text_knockout: bool,
    pub opacity: f32,
    pub shape: f32,
    pub overprint: bool,
    pub overprint_mode: u8,
}

impl Default for BlendParams {
    fn default() -> Self {
        Self {
            blend_mode: BlendMode::Normal,
            text_knockout: false,
            opacity: 1.0,
            shape: 1.0,
            overprint: false,
            overprint_mode: 0,
        }
    }
}

impl BlendParams {
    pub fn apply(&mut self, u: &BlendParamsUpdate) {
        if let Some(v) = u.blend_mode {
            self.blend_mode = v;
        }
        if let Some(v) = u.text_knockout {
            self.text_knockout = v;
        }
        if let Some(v) = u.opacity {
            self.opacity = v;
        }
        if let Some(v) = u.shape {
            self.shape = v;
        }
        if let Some(v) = u.overprint {
            self.overprint = v;
        }
        if let Some(v) = u.overprint_mode {
            self.overprint_mode = v;
        }
    }

    /// Fields of `self` that differ from `prev`.
    pub fn diff(&self, prev: &BlendParams) -> BlendParamsUpdate {
        BlendParamsUpdate {
            blend_mode: (self.blend_mode != prev.blend_mode).then_some(self.blend_mode),
            text_knockout: (self.text_knockout != prev.text_knockout)
                .then_some(self.text_knockout),
            opacity: (self.opacity != prev.opacity).then_some(self.opacity),
            shape: (self.shape != prev.shape).then_some(self.shape),
            overprint: (self.overprint != prev.overprint).then_some(self.overprint),
            overprint_mode: (self.overprint_mode != prev.overprint_mode)
                .then_some(self.overprint_mode),
        }
    }

    /// Every field, as an update.
    pub fn as_update(&self) -> BlendParamsUpdate {
        BlendParamsUpdate {
            blend_mode: Some(self.blend_mode),
            text_knockout: Some(self.text_knockout),
            opacity: Some(self.opacity),
            shape: Some(self.shape),
            overprint: Some(self.overprint),
            overprint_mode: Some(self.overprint_mode),
        }
    }
}

/// Partial change to [`BlendParams`]; `None` fields are left alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendParamsUpdate {
    pub blend_mode: Option<BlendMode>,
    pub text_knockout: Option<bool>,
    pub opacity: Option<f32>,
    pub shape: Option<f32>,
    pub overprint: Option<bool>,
    pub overprint_mode: Option<u8>,
}

impl BlendParamsUpdate {
    pub const BLEND_MODE: u8 = 1;
    pub const TEXT_KNOCKOUT: u8 = 2;
    pub const OPACITY: u8 = 4;
    pub const SHAPE: u8 = 8;
    pub const OVERPRINT: u8 = 16;
    pub const OVERPRINT_MODE: u8 = 32;

    pub fn changed_bits(&self) -> u8 {
        let mut bits = 0;
        if self.blend_mode.is_some() {
            bits |= Self::BLEND_MODE;
        }
        if self.text_knockout.is_some() {
            bits |= Self::TEXT_KNOCKOUT;
        }
        if self.opacity.is_some() {
            bits |= Self::OPACITY;
        }
        if self.shape.is_some() {
            bits |= Self::SHAPE;
        }
        if self.overprint.is_some() {
            bits |= Self::OVERPRINT;
        }
        if self.overprint_mode.is_some() {
            bits |= Self::OVERPRINT_MODE;
        }
        bits
    }

    pub fn is_empty(&self) -> bool {
        self.changed_bits() == 0
    }

    pub fn opacity(v: f32) -> Self {
        Self {
            opacity: Some(v),
            ..Self::default()
        }
    }

    pub fn blend_mode(m: BlendMode) -> Self {
        Self {
            blend_mode: Some(m),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct MaskIds {
    mask_id: u32,
    temp_mask_id: u32,
}

/// Assigns mask ids so a group can tell whether the pending mask is the one defined for it.
///
/// A completed mask becomes the current id; the next group takes it (or the temporary id of
/// a nested image mask) and clears it. Frames pushed at group and mask begin save the ids
/// and are restored at the matching end.
#[derive(Clone, Debug, Default)]
pub struct MaskIdTracker {
    ids: MaskIds,
    count: u32,
    frames: Vec<MaskIds>,
}

impl MaskIdTracker {
    /// Id for a beginning group; call before the group's frame is pushed.
    pub fn begin_group(&mut self) -> u32 {
        let id = self.current();
        if self.ids.temp_mask_id != 0 {
            self.ids.temp_mask_id = 0;
        } else {
            self.ids.mask_id = 0;
        }
        self.frames.push(self.ids);
        id
    }

    pub fn end_group(&mut self) -> LaminaResult<()> {
        self.pop_frame()
    }

    /// Allocates the id of a beginning mask. The id becomes current only when the mask ends,
    /// so groups inside the mask see the ids from before it.
    pub fn begin_mask(&mut self, replacing: bool) -> u32 {
        let saved = self.ids;
        self.count = self.count.wrapping_add(1);
        if self.ids.mask_id == 0 || replacing {
            self.ids.mask_id = self.count;
        } else {
            self.ids.temp_mask_id = self.count;
        }
        let id = self.current();
        self.frames.push(self.ids);
        self.ids = saved;
        id
    }

    pub fn end_mask(&mut self) -> LaminaResult<()> {
        self.pop_frame()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// A completed mask is waiting for the group that will use it.
    pub fn has_pending(&self) -> bool {
        self.current() != 0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn current(&self) -> u32 {
        if self.ids.temp_mask_id != 0 {
            self.ids.temp_mask_id
        } else {
            self.ids.mask_id
        }
    }

    fn pop_frame(&mut self) -> LaminaResult<()> {
        self.ids = self
            .frames
            .pop()
            .ok_or_else(|| LaminaError::invalid_state("group/mask end without a begin"))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/params.rs"]
mod tests;
