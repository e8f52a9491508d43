use serde::{Deserialize, Serialize};

pub use kurbo::{Affine, BezPath, Point, Rect};

/// Half-open integer rectangle in page (device) space: `x0 <= x < x1`, `y0 <= y < y1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl IntRect {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub const fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x.saturating_add(w),
            y1: y.saturating_add(h),
        }
    }

    /// A reversed rectangle that any `union` replaces; used to start dirty-box accumulation.
    pub const fn reversed() -> Self {
        Self {
            x0: i32::MAX,
            y0: i32::MAX,
            x1: i32::MIN,
            y1: i32::MIN,
        }
    }

    pub fn width(&self) -> i32 {
        (self.x1 - self.x0).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y1 - self.y0).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    pub fn intersect(&self, other: &IntRect) -> IntRect {
        IntRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    pub fn union(&self, other: &IntRect) -> IntRect {
        IntRect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Clamps an inverted result of `intersect` to a zero-area rectangle anchored at `x0,y0`.
    pub fn normalized(&self) -> IntRect {
        IntRect {
            x0: self.x0,
            y0: self.y0,
            x1: self.x1.max(self.x0),
            y1: self.y1.max(self.y0),
        }
    }

    /// Smallest integer rectangle covering `r`: floor the minimum corner, ceil the maximum.
    pub fn cover(r: Rect) -> IntRect {
        let clamp = |v: f64| v.clamp(i32::MIN as f64, i32::MAX as f64) as i32;
        IntRect {
            x0: clamp(r.x0.min(r.x1).floor()),
            y0: clamp(r.y0.min(r.y1).floor()),
            x1: clamp(r.x0.max(r.x1).ceil()),
            y1: clamp(r.y0.max(r.y1).ceil()),
        }
    }
}

/// Device-space affine matrix as carried in log records (single precision, PostScript order).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ctm(pub [f32; 6]);

impl Default for Ctm {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Ctm {
    pub const IDENTITY: Ctm = Ctm([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn to_affine(self) -> Affine {
        let [a, b, c, d, e, f] = self.0;
        Affine::new([
            f64::from(a),
            f64::from(b),
            f64::from(c),
            f64::from(d),
            f64::from(e),
            f64::from(f),
        ])
    }

    /// Device rectangle covered by `bbox` (user space) under this matrix.
    pub fn device_rect(self, bbox: Rect) -> IntRect {
        IntRect::cover(self.to_affine().transform_rect_bbox(bbox))
    }
}
