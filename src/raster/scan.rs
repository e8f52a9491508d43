//! Scan conversion of kurbo paths into pixel spans.
//!
//! A pixel is inside when its centre is, so a row's spans depend only on the path and the
//! row. Band boundaries therefore never change which pixels a fill touches.

use kurbo::{PathEl, Shape};
use serde::{Deserialize, Serialize};

use crate::foundation::core::{BezPath, IntRect, Point};
use crate::foundation::error::{LaminaError, LaminaResult};

const FLATTEN_TOLERANCE: f64 = 0.05;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

impl FillRule {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::NonZero => 0,
            Self::EvenOdd => 1,
        }
    }

    pub fn from_u8(v: u8) -> LaminaResult<Self> {
        match v {
            0 => Ok(Self::NonZero),
            1 => Ok(Self::EvenOdd),
            v => Err(LaminaError::range(format!("fill rule {v} out of range"))),
        }
    }

    fn inside(self, winding: i32) -> bool {
        match self {
            Self::NonZero => winding != 0,
            Self::EvenOdd => winding % 2 != 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineCap {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> LaminaResult<Self> {
        match v {
            0 => Ok(Self::Butt),
            1 => Ok(Self::Round),
            2 => Ok(Self::Square),
            v => Err(LaminaError::range(format!("line cap {v} out of range"))),
        }
    }
}

impl LineJoin {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> LaminaResult<Self> {
        match v {
            0 => Ok(Self::Miter),
            1 => Ok(Self::Round),
            2 => Ok(Self::Bevel),
            v => Err(LaminaError::range(format!("line join {v} out of range"))),
        }
    }
}

/// Stroke geometry in device units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeStyle {
    pub width: f64,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f64,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            width: 1.0,
            cap: LineCap::Butt,
            join: LineJoin::Miter,
            miter_limit: 10.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    dir: i32,
}

impl Edge {
    fn new(a: Point, b: Point) -> Option<Self> {
        if a.y == b.y {
            return None;
        }
        let (top, bottom, dir) = if a.y < b.y { (a, b, 1) } else { (b, a, -1) };
        Some(Self {
            x0: top.x,
            y0: top.y,
            x1: bottom.x,
            y1: bottom.y,
            dir,
        })
    }

    fn x_at(&self, y: f64) -> f64 {
        self.x0 + (y - self.y0) * (self.x1 - self.x0) / (self.y1 - self.y0)
    }
}

fn edges(path: &BezPath) -> Vec<Edge> {
    let mut out = Vec::new();
    let mut start = Point::ZERO;
    let mut last = Point::ZERO;
    let mut open = false;
    kurbo::flatten(path.iter(), FLATTEN_TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            if open {
                out.extend(Edge::new(last, start));
            }
            start = p;
            last = p;
            open = true;
        }
        PathEl::LineTo(p) => {
            out.extend(Edge::new(last, p));
            last = p;
        }
        PathEl::ClosePath => {
            out.extend(Edge::new(last, start));
            last = start;
            open = false;
        }
        // flatten only emits the three element kinds above.
        PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
    });
    if open {
        out.extend(Edge::new(last, start));
    }
    out
}

/// Calls `emit(y, x0, x1)` for every run of pixels inside `path` and `clip`.
/// Subpaths are closed implicitly.
pub fn fill_spans(
    path: &BezPath,
    rule: FillRule,
    clip: IntRect,
    mut emit: impl FnMut(i32, i32, i32),
) {
    let edges = edges(path);
    if edges.is_empty() || clip.is_empty() {
        return;
    }
    let (mut ymin, mut ymax) = (f64::INFINITY, f64::NEG_INFINITY);
    for e in &edges {
        ymin = ymin.min(e.y0);
        ymax = ymax.max(e.y1);
    }
    let y_start = clip.y0.max(ymin.floor() as i32);
    let y_end = clip.y1.min(ymax.ceil() as i32);

    let mut crossings: Vec<(f64, i32)> = Vec::new();
    for y in y_start..y_end {
        let yc = f64::from(y) + 0.5;
        crossings.clear();
        crossings.extend(
            edges
                .iter()
                .filter(|e| e.y0 <= yc && yc < e.y1)
                .map(|e| (e.x_at(yc), e.dir)),
        );
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut winding = 0;
        for pair in crossings.windows(2) {
            winding += pair[0].1;
            if !rule.inside(winding) {
                continue;
            }
            let x0 = ((pair[0].0 - 0.5).ceil() as i32).max(clip.x0);
            let x1 = ((pair[1].0 - 0.5).ceil() as i32).min(clip.x1);
            if x0 < x1 {
                emit(y, x0, x1);
            }
        }
    }
}

/// Outline of `path` stroked with `style`, to be filled with the nonzero rule.
pub fn stroke_outline(path: &BezPath, style: &StrokeStyle) -> BezPath {
    let cap = match style.cap {
        LineCap::Butt => kurbo::Cap::Butt,
        LineCap::Round => kurbo::Cap::Round,
        LineCap::Square => kurbo::Cap::Square,
    };
    let join = match style.join {
        LineJoin::Miter => kurbo::Join::Miter,
        LineJoin::Round => kurbo::Join::Round,
        LineJoin::Bevel => kurbo::Join::Bevel,
    };
    let stroke = kurbo::Stroke::new(style.width)
        .with_caps(cap)
        .with_join(join)
        .with_miter_limit(style.miter_limit);
    kurbo::stroke(
        path.iter(),
        &stroke,
        &kurbo::StrokeOpts::default(),
        FLATTEN_TOLERANCE,
    )
}

/// Device pixels a fill of `path` may touch.
pub fn path_bounds(path: &BezPath) -> IntRect {
    if path.elements().is_empty() {
        return IntRect::default();
    }
    IntRect::cover(path.bounding_box())
}

#[cfg(test)]
#[path = "../../tests/unit/raster/scan.rs"]
mod tests;
