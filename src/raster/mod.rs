//! Page rasters and the small set of draw primitives devices paint with.

pub mod image;
pub mod mono;
pub mod scan;
pub mod surface;

pub use image::{ImageCursor, ImageHeader};
pub use mono::MonoBitmap;
pub use scan::{FillRule, LineCap, LineJoin, StrokeStyle, fill_spans, path_bounds, stroke_outline};
pub use surface::Raster;
