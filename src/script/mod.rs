//! JSON page scripts: a page size plus a list of drawing operations mirroring [`Device`].
//!
//! ```json
//! { "width": 100, "height": 100, "color_model": "rgb",
//!   "ops": [ { "op": "push_device" },
//!            { "op": "begin_group", "bbox": { "x0": 0, "y0": 0, "x1": 50, "y1": 50 } },
//!            { "op": "fill_rect", "rect": [0, 0, 100, 100], "color": { "rgb": [1, 0, 0] } },
//!            { "op": "end_group" },
//!            { "op": "pop_device" } ] }
//! ```
//!
//! Colors are client colors and are mapped into whatever color model is current when the
//! operation is played, so the same script works inside groups with their own color space.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::color::{ClientColor, ColorModel};
use crate::compositor::{BlendParamsUpdate, GroupParams, MaskParams};
use crate::device::Device;
use crate::foundation::core::{BezPath, IntRect};
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::raster::{FillRule, ImageHeader, MonoBitmap, Raster, StrokeStyle};

/// One drawing operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    PushDevice {
        #[serde(default)]
        spot_color_count: u32,
    },
    PopDevice,
    SetBlendParams(BlendParamsUpdate),
    BeginGroup(GroupParams),
    EndGroup,
    BeginMask(MaskParams),
    EndMask,
    /// `rect` is `[x0, y0, x1, y1]` in device pixels.
    FillRect {
        rect: [i32; 4],
        color: ClientColor,
    },
    /// `path` is SVG path data in device space.
    FillPath {
        path: String,
        #[serde(default)]
        rule: FillRule,
        color: ClientColor,
    },
    StrokePath {
        path: String,
        #[serde(default)]
        style: StrokeStyle,
        color: ClientColor,
    },
    /// A whole image in one call; `data` holds `height` rows of `width * n_comps` samples.
    Image {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        n_comps: u8,
        data: Vec<u8>,
    },
    /// A glyph-like bitmap given as rows of `#` (set) and any other character (clear).
    CopyMono {
        x: i32,
        y: i32,
        rows: Vec<String>,
        color: ClientColor,
    },
}

fn parse_path(d: &str) -> LaminaResult<BezPath> {
    BezPath::from_svg(d).map_err(|e| LaminaError::serde(format!("invalid svg path data: {e}")))
}

impl ScriptOp {
    /// Issues this operation on `dev`.
    pub fn apply(&self, dev: &mut dyn Device) -> LaminaResult<()> {
        match self {
            Self::PushDevice { spot_color_count } => dev.push_device(*spot_color_count),
            Self::PopDevice => dev.pop_device(),
            Self::SetBlendParams(u) => dev.set_blend_params(u),
            Self::BeginGroup(p) => dev.begin_group(p),
            Self::EndGroup => dev.end_group(),
            Self::BeginMask(p) => dev.begin_mask(p),
            Self::EndMask => dev.end_mask(),
            Self::FillRect { rect, color } => {
                let [x0, y0, x1, y1] = *rect;
                let c = dev.map_color(color);
                dev.fill_rectangle(IntRect::new(x0, y0, x1, y1), c)
            }
            Self::FillPath { path, rule, color } => {
                let path = parse_path(path)?;
                let c = dev.map_color(color);
                dev.fill_path(&path, *rule, c)
            }
            Self::StrokePath { path, style, color } => {
                let path = parse_path(path)?;
                let c = dev.map_color(color);
                dev.stroke_path(&path, style, c)
            }
            Self::Image {
                x,
                y,
                width,
                height,
                n_comps,
                data,
            } => {
                let header = ImageHeader {
                    x: *x,
                    y: *y,
                    width: *width,
                    height: *height,
                    n_comps: *n_comps,
                };
                dev.begin_image(&header)?;
                dev.image_data(data, *height)?;
                dev.end_image()
            }
            Self::CopyMono { x, y, rows, color } => {
                let bitmap = MonoBitmap::from_rows(rows.as_slice())?;
                let c = dev.map_color(color);
                dev.copy_mono(&bitmap, *x, *y, c)
            }
        }
    }
}

/// A page description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageScript {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub color_model: ColorModel,
    /// Page color before any drawing; paper when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<ClientColor>,
    #[serde(default)]
    pub ops: Vec<ScriptOp>,
}

impl PageScript {
    pub fn from_json(s: &str) -> LaminaResult<Self> {
        let script: Self = serde_json::from_str(s)?;
        script.validate()?;
        Ok(script)
    }

    pub fn from_path(path: &Path) -> LaminaResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks page size, color model and every path and bitmap without drawing anything.
    pub fn validate(&self) -> LaminaResult<()> {
        if self.width == 0 || self.height == 0 || self.width > i32::MAX as u32 {
            return Err(LaminaError::range(format!(
                "page size {}x{}",
                self.width, self.height
            )));
        }
        self.color_model.validate()?;
        for (i, op) in self.ops.iter().enumerate() {
            let checked = match op {
                ScriptOp::FillPath { path, .. } | ScriptOp::StrokePath { path, .. } => {
                    parse_path(path).map(drop)
                }
                ScriptOp::CopyMono { rows, .. } => {
                    MonoBitmap::from_rows(rows.as_slice()).map(drop)
                }
                _ => Ok(()),
            };
            checked.map_err(|e| LaminaError::serde(format!("op {i}: {e}")))?;
        }
        Ok(())
    }

    pub fn rect(&self) -> IntRect {
        IntRect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Whether any operation starts transparency compositing.
    pub fn uses_transparency(&self) -> bool {
        self.ops
            .iter()
            .any(|op| matches!(op, ScriptOp::PushDevice { .. }))
    }

    /// The blank page the script draws on.
    pub fn page_raster(&self) -> LaminaResult<Raster> {
        match &self.background {
            Some(bg) => {
                let colors = self.color_model.map_color(bg);
                Raster::filled(self.rect(), self.color_model, &colors)
            }
            None => Raster::new(self.rect(), self.color_model),
        }
    }

    /// Plays every operation on `dev`, stopping at the first error.
    #[tracing::instrument(level = "debug", skip_all, fields(ops = self.ops.len()))]
    pub fn play(&self, dev: &mut dyn Device) -> LaminaResult<()> {
        for (i, op) in self.ops.iter().enumerate() {
            op.apply(dev).inspect_err(|e| tracing::debug!(op = i, %e, "op failed"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/script/mod.rs"]
mod tests;
