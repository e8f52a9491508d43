//! Lamina renders pages through a transparency compositor, either straight into a page raster
//! or through a banded command list that bounds working memory.
//!
//! - Describe a page as a [`PageScript`] (or drive a [`Device`] yourself)
//! - Render it with [`render_script`] into a [`PageSink`]
//! - Or record it into a [`PageLog`] and play the bands back with a [`Player`]
#![forbid(unsafe_code)]

pub mod blend;
pub mod clist;
pub mod color;
pub mod compositor;
pub mod device;
pub mod encode;
mod foundation;
pub mod raster;
pub mod script;
pub mod session;

pub use crate::foundation::core::{Affine, BezPath, Ctm, IntRect, Point, Rect};
pub use crate::foundation::error::{LaminaError, LaminaResult};

pub use crate::blend::BlendMode;
pub use crate::clist::{
    BandOpts, ClistDevice, ClistStats, Inspector, MemoryPool, PageGeometry, PageLog, Player,
    Recorder,
};
pub use crate::color::{ClientColor, ColorIndex, ColorModel};
pub use crate::compositor::{BlendParamsUpdate, CompositorOpts, GroupParams, MaskParams};
pub use crate::device::{Device, PageDevice};
pub use crate::encode::{InMemorySink, PageImage, PageSink, PngSink, PngSinkOpts, SinkConfig};
pub use crate::raster::{FillRule, ImageHeader, MonoBitmap, Raster, StrokeStyle};
pub use crate::script::{PageScript, ScriptOp};
pub use crate::session::{
    RenderMode, RenderOpts, RenderStats, direct_page, record_page, render_script, render_scripts,
};
