//! Process color models and the saved color-model stack threaded through the compositor.

pub mod context;
pub mod model;

pub use context::{ColorInfo, ColorModelContext};
pub use model::{ClientColor, ColorIndex, ColorModel, Colorants, MAX_COLORANTS, Polarity};
