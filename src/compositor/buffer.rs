use crate::blend::{BlendMode, MaskSubtype, TransferFn};
use crate::color::ColorModel;
use crate::foundation::core::IntRect;
use crate::foundation::error::{LaminaError, LaminaResult};
use crate::foundation::math::align4;

/// Soft-mask specific state carried by a mask buffer.
#[derive(Clone, Debug)]
pub struct MaskInfo {
    pub subtype: MaskSubtype,
    pub is_cie: bool,
    pub transfer_fn: TransferFn,
    /// Value of pixels no fill touched, before the transfer function.
    pub bg_alpha: u8,
}

/// A mask waiting to be consumed by the next group push.
#[derive(Debug, Default)]
pub enum PendingMask {
    #[default]
    None,
    Ready(Box<PlaneBuffer>),
    /// The mask with this id collapsed without any data in the current rect. The mask it
    /// had saved is kept so scoping stays the same as for a mask with data.
    Vacant(u32, Box<PendingMask>),
}

impl PendingMask {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn mask_id(&self) -> Option<u32> {
        match self {
            Self::None => None,
            Self::Ready(m) => Some(m.mask_id),
            Self::Vacant(id, _) => Some(*id),
        }
    }
}

/// Planar 8-bit pixel buffer for one group or mask level.
///
/// Plane order: colorants, alpha, then shape and group alpha when present. Colorant planes
/// hold device values (ink amounts for subtractive models) without premultiplication.
#[derive(Debug)]
pub struct PlaneBuffer {
    pub rect: IntRect,
    /// Union of everything painted so far; starts reversed.
    pub bbox: IntRect,
    pub model: ColorModel,
    /// Colorants plus alpha; 1 once a mask has been collapsed.
    pub n_chan: usize,
    pub n_planes: usize,
    pub has_shape: bool,
    pub has_alpha_g: bool,
    pub rowstride: usize,
    pub planestride: usize,
    pub data: Option<Vec<u8>>,
    pub isolated: bool,
    pub knockout: bool,
    pub idle: bool,
    pub alpha: u8,
    pub shape: u8,
    pub blend_mode: BlendMode,
    pub mask_id: u32,
    /// Attached mask for groups; the saved enclosing mask for masks.
    pub mask: PendingMask,
    pub mask_info: Option<MaskInfo>,
    /// Set when the group's mask collapsed to nothing: the group composites to nothing.
    pub masked_out: bool,
}

impl PlaneBuffer {
    /// Allocates a zero-filled buffer, or an empty one when `rect` has no area or `idle` is set.
    pub fn new(
        rect: IntRect,
        model: ColorModel,
        n_chan: usize,
        has_alpha_g: bool,
        has_shape: bool,
        idle: bool,
    ) -> LaminaResult<Self> {
        let rect = rect.normalized();
        let rowstride = align4(rect.width() as usize);
        let height = rect.height() as usize;
        let n_planes = n_chan + usize::from(has_shape) + usize::from(has_alpha_g);
        let planestride = rowstride
            .checked_mul(height)
            .ok_or_else(|| LaminaError::out_of_memory("plane size overflow"))?;
        let data = if idle || planestride == 0 {
            None
        } else {
            let len = planestride
                .checked_mul(n_planes)
                .filter(|&n| n <= u32::MAX as usize)
                .ok_or_else(|| LaminaError::out_of_memory("plane buffer larger than 4 GiB"))?;
            let mut v = Vec::new();
            v.try_reserve_exact(len).map_err(|_| {
                LaminaError::out_of_memory(format!("plane buffer of {len} bytes"))
            })?;
            v.resize(len, 0);
            Some(v)
        };
        Ok(Self {
            rect,
            bbox: IntRect::reversed(),
            model,
            n_chan,
            n_planes,
            has_shape,
            has_alpha_g,
            rowstride,
            planestride,
            data,
            isolated: false,
            knockout: false,
            idle,
            alpha: 255,
            shape: 255,
            blend_mode: BlendMode::Normal,
            mask_id: 0,
            mask: PendingMask::None,
            mask_info: None,
            masked_out: false,
        })
    }

    /// Bytes a buffer of this geometry would allocate.
    pub fn projected_len(rect: IntRect, n_planes: usize) -> usize {
        let rect = rect.normalized();
        align4(rect.width() as usize)
            .saturating_mul(rect.height() as usize)
            .saturating_mul(n_planes)
    }

    pub fn byte_len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn n_colorants(&self) -> usize {
        self.n_chan.saturating_sub(1)
    }

    pub fn shape_plane(&self) -> Option<usize> {
        self.has_shape.then_some(self.n_chan)
    }

    pub fn alpha_g_plane(&self) -> Option<usize> {
        self.has_alpha_g
            .then_some(self.n_chan + usize::from(self.has_shape))
    }

    /// Byte offset of `(x, y)` within plane 0; add `plane * planestride` for other planes.
    #[inline]
    pub fn offset(&self, x: i32, y: i32) -> usize {
        (y - self.rect.y0) as usize * self.rowstride + (x - self.rect.x0) as usize
    }

    #[inline]
    pub fn get(&self, plane: usize, x: i32, y: i32) -> u8 {
        match &self.data {
            Some(d) => d[plane * self.planestride + self.offset(x, y)],
            None => 0,
        }
    }

    /// Zeroes the given planes over the whole buffer.
    pub fn clear_planes(&mut self, planes: std::ops::Range<usize>) {
        let stride = self.planestride;
        if let Some(d) = self.data.as_mut() {
            d[planes.start * stride..planes.end * stride].fill(0);
        }
    }

    pub fn grow_bbox(&mut self, r: &IntRect) {
        if !r.is_empty() {
            self.bbox = self.bbox.union(r);
        }
    }

    /// Row slice of one plane covering `x0..x1` at `y`.
    pub fn row(&self, plane: usize, y: i32, x0: i32, x1: i32) -> &[u8] {
        match &self.data {
            Some(d) => {
                let start = plane * self.planestride + self.offset(x0, y);
                &d[start..start + (x1 - x0) as usize]
            }
            None => &[],
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/buffer.rs"]
mod tests;
