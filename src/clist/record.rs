//! Byte-coded log records: one opcode byte followed by fixed-layout operands.

use kurbo::PathEl;

use crate::blend::{BlendMode, MaskSubtype, TransferFn};
use crate::color::ColorIndex;
use crate::compositor::{BlendParamsUpdate, GroupColor, GroupParams, MaskParams};
use crate::foundation::core::{BezPath, Ctm, IntRect, Point, Rect};
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::raster::{FillRule, ImageHeader, LineCap, LineJoin, MonoBitmap, StrokeStyle};

use super::codec::{ByteOrder, Decoder, Encoder};

/// Largest compositor record, opcode included.
pub const MAX_COMPOSITOR_RECORD_SIZE: usize = 1280;
/// Largest drawing record, opcode included.
pub const MAX_DRAW_RECORD_SIZE: usize = 16 << 10;

const GROUP_ISOLATED: u8 = 1;
const GROUP_KNOCKOUT: u8 = 2;
const GROUP_IDLE: u8 = 4;
const MASK_IDLE: u32 = 1 << 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    PushDevice = 0x01,
    PopDevice = 0x02,
    BeginGroup = 0x03,
    EndGroup = 0x04,
    BeginMask = 0x05,
    EndMask = 0x06,
    SetBlendParams = 0x07,
    FillRect = 0x10,
    FillPath = 0x11,
    StrokePath = 0x12,
    BeginImage = 0x13,
    ImageRows = 0x14,
    EndImage = 0x15,
    CopyMono = 0x16,
    SetTile = 0x17,
    CopyTile = 0x18,
    EndRun = 0xfe,
    EndPage = 0xff,
}

impl Opcode {
    pub fn from_u8(v: u8) -> LaminaResult<Self> {
        Ok(match v {
            0x01 => Self::PushDevice,
            0x02 => Self::PopDevice,
            0x03 => Self::BeginGroup,
            0x04 => Self::EndGroup,
            0x05 => Self::BeginMask,
            0x06 => Self::EndMask,
            0x07 => Self::SetBlendParams,
            0x10 => Self::FillRect,
            0x11 => Self::FillPath,
            0x12 => Self::StrokePath,
            0x13 => Self::BeginImage,
            0x14 => Self::ImageRows,
            0x15 => Self::EndImage,
            0x16 => Self::CopyMono,
            0x17 => Self::SetTile,
            0x18 => Self::CopyTile,
            0xfe => Self::EndRun,
            0xff => Self::EndPage,
            v => return Err(LaminaError::range(format!("unknown opcode {v:#04x}"))),
        })
    }

    pub fn is_compositor(self) -> bool {
        (self as u8) < 0x10
    }
}

/// One decoded log record.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    PushDevice {
        spot_color_count: u32,
    },
    PopDevice,
    BeginGroup(GroupParams),
    EndGroup,
    BeginMask(MaskParams),
    EndMask,
    SetBlendParams(BlendParamsUpdate),
    FillRect {
        rect: IntRect,
        color: ColorIndex,
    },
    FillPath {
        rule: FillRule,
        color: ColorIndex,
        path: BezPath,
    },
    StrokePath {
        style: StrokeStyle,
        color: ColorIndex,
        path: BezPath,
    },
    BeginImage(ImageHeader),
    /// Rows `first_row..first_row + n_rows` of the open image.
    ImageRows {
        first_row: u32,
        n_rows: u32,
        data: Vec<u8>,
    },
    EndImage,
    CopyMono {
        x: i32,
        y: i32,
        color: ColorIndex,
        bitmap: MonoBitmap,
    },
    SetTile {
        id: u32,
        bitmap: MonoBitmap,
    },
    CopyTile {
        id: u32,
        x: i32,
        y: i32,
        color: ColorIndex,
    },
    EndRun,
    EndPage,
}

impl Record {
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::PushDevice { .. } => Opcode::PushDevice,
            Self::PopDevice => Opcode::PopDevice,
            Self::BeginGroup(_) => Opcode::BeginGroup,
            Self::EndGroup => Opcode::EndGroup,
            Self::BeginMask(_) => Opcode::BeginMask,
            Self::EndMask => Opcode::EndMask,
            Self::SetBlendParams(_) => Opcode::SetBlendParams,
            Self::FillRect { .. } => Opcode::FillRect,
            Self::FillPath { .. } => Opcode::FillPath,
            Self::StrokePath { .. } => Opcode::StrokePath,
            Self::BeginImage(_) => Opcode::BeginImage,
            Self::ImageRows { .. } => Opcode::ImageRows,
            Self::EndImage => Opcode::EndImage,
            Self::CopyMono { .. } => Opcode::CopyMono,
            Self::SetTile { .. } => Opcode::SetTile,
            Self::CopyTile { .. } => Opcode::CopyTile,
            Self::EndRun => Opcode::EndRun,
            Self::EndPage => Opcode::EndPage,
        }
    }

    /// Serializes the record. `color_bytes` is the width of color operands under the color
    /// model active where the record is written.
    pub fn encode(&self, order: ByteOrder, color_bytes: usize) -> LaminaResult<Vec<u8>> {
        let mut e = Encoder::new(order);
        let op = self.opcode();
        e.put_u8(op as u8);
        match self {
            Self::PushDevice { spot_color_count } => e.put_u32(*spot_color_count),
            Self::PopDevice
            | Self::EndGroup
            | Self::EndMask
            | Self::EndImage
            | Self::EndRun
            | Self::EndPage => {}
            Self::BeginGroup(p) => encode_group(&mut e, p),
            Self::BeginMask(p) => encode_mask(&mut e, p)?,
            Self::SetBlendParams(u) => encode_blend_params(&mut e, u),
            Self::FillRect { rect, color } => {
                put_int_rect(&mut e, rect);
                e.put_color(*color, color_bytes);
            }
            Self::FillPath { rule, color, path } => {
                e.put_u8(rule.as_u8());
                e.put_color(*color, color_bytes);
                put_path(&mut e, path)?;
            }
            Self::StrokePath { style, color, path } => {
                e.put_f64(style.width);
                e.put_u8(style.cap.as_u8());
                e.put_u8(style.join.as_u8());
                e.put_f64(style.miter_limit);
                e.put_color(*color, color_bytes);
                put_path(&mut e, path)?;
            }
            Self::BeginImage(h) => {
                e.put_i32(h.x);
                e.put_i32(h.y);
                e.put_u32(h.width);
                e.put_u32(h.height);
                e.put_u8(h.n_comps);
            }
            Self::ImageRows {
                first_row,
                n_rows,
                data,
            } => {
                e.put_u32(*first_row);
                e.put_u32(*n_rows);
                put_len(&mut e, data.len())?;
                e.put_bytes(data);
            }
            Self::CopyMono {
                x,
                y,
                color,
                bitmap,
            } => {
                e.put_i32(*x);
                e.put_i32(*y);
                e.put_color(*color, color_bytes);
                put_bitmap(&mut e, bitmap);
            }
            Self::SetTile { id, bitmap } => {
                e.put_u32(*id);
                put_bitmap(&mut e, bitmap);
            }
            Self::CopyTile { id, x, y, color } => {
                e.put_u32(*id);
                e.put_i32(*x);
                e.put_i32(*y);
                e.put_color(*color, color_bytes);
            }
        }

        let need = e.len();
        if op.is_compositor() {
            if need + 3 > MAX_COMPOSITOR_RECORD_SIZE {
                return Err(LaminaError::range(format!(
                    "{op:?} record of {need} bytes exceeds {MAX_COMPOSITOR_RECORD_SIZE}"
                )));
            }
        } else if need > MAX_DRAW_RECORD_SIZE {
            return Err(LaminaError::range(format!(
                "{op:?} record of {need} bytes exceeds {MAX_DRAW_RECORD_SIZE}"
            )));
        }
        Ok(e.into_bytes())
    }

    pub fn decode(d: &mut Decoder<'_>, color_bytes: usize) -> LaminaResult<Self> {
        let op = Opcode::from_u8(d.get_u8()?)?;
        Ok(match op {
            Opcode::PushDevice => Self::PushDevice {
                spot_color_count: d.get_u32()?,
            },
            Opcode::PopDevice => Self::PopDevice,
            Opcode::BeginGroup => Self::BeginGroup(decode_group(d)?),
            Opcode::EndGroup => Self::EndGroup,
            Opcode::BeginMask => Self::BeginMask(decode_mask(d)?),
            Opcode::EndMask => Self::EndMask,
            Opcode::SetBlendParams => Self::SetBlendParams(decode_blend_params(d)?),
            Opcode::FillRect => Self::FillRect {
                rect: get_int_rect(d)?,
                color: d.get_color(color_bytes)?,
            },
            Opcode::FillPath => Self::FillPath {
                rule: FillRule::from_u8(d.get_u8()?)?,
                color: d.get_color(color_bytes)?,
                path: get_path(d)?,
            },
            Opcode::StrokePath => {
                let width = d.get_f64()?;
                let cap = LineCap::from_u8(d.get_u8()?)?;
                let join = LineJoin::from_u8(d.get_u8()?)?;
                let miter_limit = d.get_f64()?;
                Self::StrokePath {
                    style: StrokeStyle {
                        width,
                        cap,
                        join,
                        miter_limit,
                    },
                    color: d.get_color(color_bytes)?,
                    path: get_path(d)?,
                }
            }
            Opcode::BeginImage => Self::BeginImage(ImageHeader {
                x: d.get_i32()?,
                y: d.get_i32()?,
                width: d.get_u32()?,
                height: d.get_u32()?,
                n_comps: d.get_u8()?,
            }),
            Opcode::ImageRows => {
                let first_row = d.get_u32()?;
                let n_rows = d.get_u32()?;
                let len = d.get_u32()? as usize;
                Self::ImageRows {
                    first_row,
                    n_rows,
                    data: d.take(len)?.to_vec(),
                }
            }
            Opcode::EndImage => Self::EndImage,
            Opcode::CopyMono => Self::CopyMono {
                x: d.get_i32()?,
                y: d.get_i32()?,
                color: d.get_color(color_bytes)?,
                bitmap: get_bitmap(d)?,
            },
            Opcode::SetTile => Self::SetTile {
                id: d.get_u32()?,
                bitmap: get_bitmap(d)?,
            },
            Opcode::CopyTile => Self::CopyTile {
                id: d.get_u32()?,
                x: d.get_i32()?,
                y: d.get_i32()?,
                color: d.get_color(color_bytes)?,
            },
            Opcode::EndRun => Self::EndRun,
            Opcode::EndPage => Self::EndPage,
        })
    }

    /// One-line description for log listings.
    pub fn summary(&self) -> String {
        match self {
            Self::PushDevice { spot_color_count } => format!("push_device spots={spot_color_count}"),
            Self::BeginGroup(p) => format!(
                "begin_group bbox={:?} isolated={} knockout={} mode={:?} color={:?} opacity={} mask_id={}",
                p.bbox, p.isolated, p.knockout, p.blend_mode, p.group_color, p.opacity, p.mask_id
            ),
            Self::BeginMask(p) => format!(
                "begin_mask bbox={:?} subtype={:?} replacing={} mask_id={} identity_tf={}",
                p.bbox,
                p.subtype,
                p.replacing,
                p.mask_id,
                p.transfer_fn.is_identity()
            ),
            Self::SetBlendParams(u) => format!("set_blend_params {u:?}"),
            Self::FillRect { rect, color } => format!("fill_rect {rect:?} color={:#x}", color.0),
            Self::FillPath { rule, color, path } => format!(
                "fill_path {rule:?} color={:#x} elements={}",
                color.0,
                path.elements().len()
            ),
            Self::StrokePath { style, color, path } => format!(
                "stroke_path width={} color={:#x} elements={}",
                style.width,
                color.0,
                path.elements().len()
            ),
            Self::BeginImage(h) => format!("begin_image {h:?}"),
            Self::ImageRows {
                first_row, n_rows, ..
            } => format!("image_rows {first_row}+{n_rows}"),
            Self::CopyMono { x, y, color, bitmap } => format!(
                "copy_mono at ({x}, {y}) {}x{} color={:#x}",
                bitmap.width(),
                bitmap.height(),
                color.0
            ),
            Self::SetTile { id, bitmap } => {
                format!("set_tile id={id} {}x{}", bitmap.width(), bitmap.height())
            }
            Self::CopyTile { id, x, y, color } => {
                format!("copy_tile id={id} at ({x}, {y}) color={:#x}", color.0)
            }
            other => format!("{:?}", other.opcode()).to_lowercase(),
        }
    }
}

fn put_ctm(e: &mut Encoder, ctm: &Ctm) {
    for v in ctm.0 {
        e.put_f32(v);
    }
}

fn get_ctm(d: &mut Decoder<'_>) -> LaminaResult<Ctm> {
    let mut m = [0f32; 6];
    for v in &mut m {
        *v = d.get_f32()?;
    }
    Ok(Ctm(m))
}

fn put_rect(e: &mut Encoder, r: &Rect) {
    e.put_f64(r.x0);
    e.put_f64(r.y0);
    e.put_f64(r.x1);
    e.put_f64(r.y1);
}

fn get_rect(d: &mut Decoder<'_>) -> LaminaResult<Rect> {
    Ok(Rect::new(d.get_f64()?, d.get_f64()?, d.get_f64()?, d.get_f64()?))
}

fn put_int_rect(e: &mut Encoder, r: &IntRect) {
    e.put_i32(r.x0);
    e.put_i32(r.y0);
    e.put_i32(r.x1);
    e.put_i32(r.y1);
}

fn get_int_rect(d: &mut Decoder<'_>) -> LaminaResult<IntRect> {
    Ok(IntRect::new(d.get_i32()?, d.get_i32()?, d.get_i32()?, d.get_i32()?))
}

fn put_len(e: &mut Encoder, len: usize) -> LaminaResult<()> {
    let len = u32::try_from(len).map_err(|_| LaminaError::range("operand longer than 4 GiB"))?;
    e.put_u32(len);
    Ok(())
}

fn encode_group(e: &mut Encoder, p: &GroupParams) {
    put_ctm(e, &p.ctm);
    let mut flags = 0;
    if p.isolated {
        flags |= GROUP_ISOLATED;
    }
    if p.knockout {
        flags |= GROUP_KNOCKOUT;
    }
    if p.idle {
        flags |= GROUP_IDLE;
    }
    e.put_u8(flags);
    e.put_u8(p.blend_mode.as_u8());
    e.put_u8(p.group_color as u8);
    e.put_u32(p.n_color_comps);
    e.put_f32(p.opacity);
    e.put_f32(p.shape);
    put_rect(e, &p.bbox);
    e.put_u32(p.mask_id);
}

fn decode_group(d: &mut Decoder<'_>) -> LaminaResult<GroupParams> {
    let ctm = get_ctm(d)?;
    let flags = d.get_u8()?;
    Ok(GroupParams {
        ctm,
        isolated: flags & GROUP_ISOLATED != 0,
        knockout: flags & GROUP_KNOCKOUT != 0,
        idle: flags & GROUP_IDLE != 0,
        blend_mode: BlendMode::from_u8(d.get_u8()?)?,
        group_color: GroupColor::from_u8(d.get_u8()?)?,
        n_color_comps: d.get_u32()?,
        opacity: d.get_f32()?,
        shape: d.get_f32()?,
        bbox: get_rect(d)?,
        mask_id: d.get_u32()?,
    })
}

fn encode_mask(e: &mut Encoder, p: &MaskParams) -> LaminaResult<()> {
    put_ctm(e, &p.ctm);
    let mut subtype = p.subtype as u32;
    if p.idle {
        subtype |= MASK_IDLE;
    }
    e.put_u32(subtype);
    e.put_u8(p.group_color as u8);
    e.put_u32(p.n_color_comps);
    e.put_bool(p.replacing);
    let identity = p.transfer_fn.is_identity();
    e.put_bool(identity);
    let n_bg = u8::try_from(p.background.len()).map_err(|_| {
        LaminaError::range(format!("{} mask background components", p.background.len()))
    })?;
    e.put_u8(n_bg);
    put_rect(e, &p.bbox);
    e.put_u32(p.mask_id);
    if n_bg > 0 {
        for &v in &p.background {
            e.put_f32(v);
        }
        e.put_f32(p.gray_background);
    }
    if !identity {
        e.put_bytes(&p.transfer_fn.0);
    }
    Ok(())
}

fn decode_mask(d: &mut Decoder<'_>) -> LaminaResult<MaskParams> {
    let ctm = get_ctm(d)?;
    let subtype_word = d.get_u32()?;
    let group_color = GroupColor::from_u8(d.get_u8()?)?;
    let n_color_comps = d.get_u32()?;
    let replacing = d.get_bool()?;
    let identity = d.get_bool()?;
    let n_bg = d.get_u8()?;
    let bbox = get_rect(d)?;
    let mask_id = d.get_u32()?;
    let mut background = Vec::with_capacity(usize::from(n_bg));
    let mut gray_background = 0.0;
    if n_bg > 0 {
        for _ in 0..n_bg {
            background.push(d.get_f32()?);
        }
        gray_background = d.get_f32()?;
    }
    let transfer_fn = if identity {
        TransferFn::identity()
    } else {
        let mut t = [0u8; 256];
        t.copy_from_slice(d.take(256)?);
        TransferFn(t)
    };
    Ok(MaskParams {
        ctm,
        bbox,
        subtype: MaskSubtype::from_u32(subtype_word & 0xff)?,
        group_color,
        n_color_comps,
        replacing,
        transfer_fn,
        background,
        gray_background,
        mask_id,
        idle: subtype_word & MASK_IDLE != 0,
    })
}

fn encode_blend_params(e: &mut Encoder, u: &BlendParamsUpdate) {
    e.put_u8(u.changed_bits());
    if let Some(v) = u.blend_mode {
        e.put_u8(v.as_u8());
    }
    if let Some(v) = u.text_knockout {
        e.put_bool(v);
    }
    if let Some(v) = u.opacity {
        e.put_f32(v);
    }
    if let Some(v) = u.shape {
        e.put_f32(v);
    }
    if let Some(v) = u.overprint {
        e.put_bool(v);
    }
    if let Some(v) = u.overprint_mode {
        e.put_u8(v);
    }
}

fn decode_blend_params(d: &mut Decoder<'_>) -> LaminaResult<BlendParamsUpdate> {
    let bits = d.get_u8()?;
    let has = |bit: u8| bits & bit != 0;
    let mut u = BlendParamsUpdate::default();
    if has(BlendParamsUpdate::BLEND_MODE) {
        u.blend_mode = Some(BlendMode::from_u8(d.get_u8()?)?);
    }
    if has(BlendParamsUpdate::TEXT_KNOCKOUT) {
        u.text_knockout = Some(d.get_bool()?);
    }
    if has(BlendParamsUpdate::OPACITY) {
        u.opacity = Some(d.get_f32()?);
    }
    if has(BlendParamsUpdate::SHAPE) {
        u.shape = Some(d.get_f32()?);
    }
    if has(BlendParamsUpdate::OVERPRINT) {
        u.overprint = Some(d.get_bool()?);
    }
    if has(BlendParamsUpdate::OVERPRINT_MODE) {
        u.overprint_mode = Some(d.get_u8()?);
    }
    Ok(u)
}

const EL_MOVE: u8 = 0;
const EL_LINE: u8 = 1;
const EL_QUAD: u8 = 2;
const EL_CURVE: u8 = 3;
const EL_CLOSE: u8 = 4;

fn put_point(e: &mut Encoder, p: Point) {
    e.put_f64(p.x);
    e.put_f64(p.y);
}

fn get_point(d: &mut Decoder<'_>) -> LaminaResult<Point> {
    Ok(Point::new(d.get_f64()?, d.get_f64()?))
}

fn put_path(e: &mut Encoder, path: &BezPath) -> LaminaResult<()> {
    put_len(e, path.elements().len())?;
    for el in path.iter() {
        match el {
            PathEl::MoveTo(p) => {
                e.put_u8(EL_MOVE);
                put_point(e, p);
            }
            PathEl::LineTo(p) => {
                e.put_u8(EL_LINE);
                put_point(e, p);
            }
            PathEl::QuadTo(a, b) => {
                e.put_u8(EL_QUAD);
                put_point(e, a);
                put_point(e, b);
            }
            PathEl::CurveTo(a, b, c) => {
                e.put_u8(EL_CURVE);
                put_point(e, a);
                put_point(e, b);
                put_point(e, c);
            }
            PathEl::ClosePath => e.put_u8(EL_CLOSE),
        }
    }
    Ok(())
}

fn get_path(d: &mut Decoder<'_>) -> LaminaResult<BezPath> {
    let n = d.get_u32()? as usize;
    // Every element takes at least its tag byte.
    if n > d.remaining() {
        return Err(LaminaError::range(format!("path of {n} elements is truncated")));
    }
    let mut path = BezPath::new();
    for _ in 0..n {
        let el = match d.get_u8()? {
            EL_MOVE => PathEl::MoveTo(get_point(d)?),
            EL_LINE => PathEl::LineTo(get_point(d)?),
            EL_QUAD => PathEl::QuadTo(get_point(d)?, get_point(d)?),
            EL_CURVE => PathEl::CurveTo(get_point(d)?, get_point(d)?, get_point(d)?),
            EL_CLOSE => PathEl::ClosePath,
            t => return Err(LaminaError::range(format!("path element tag {t}"))),
        };
        path.push(el);
    }
    Ok(path)
}

fn put_bitmap(e: &mut Encoder, bm: &MonoBitmap) {
    e.put_u32(bm.width());
    e.put_u32(bm.height());
    e.put_bytes(bm.data());
}

fn get_bitmap(d: &mut Decoder<'_>) -> LaminaResult<MonoBitmap> {
    let width = d.get_u32()?;
    let height = d.get_u32()?;
    let len = (width as usize)
        .div_ceil(8)
        .checked_mul(height as usize)
        .ok_or_else(|| LaminaError::range("bitmap size overflow"))?;
    MonoBitmap::new(width, height, d.take(len)?.to_vec())
}

#[cfg(test)]
#[path = "../../tests/unit/clist/record.rs"]
mod tests;
