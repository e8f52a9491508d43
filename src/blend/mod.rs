//! Stateless per-pixel compositing math.
//!
//! Pixels are slices of `n_chan` color bytes followed by one alpha byte. Color bytes are in
//! additive form: callers complement subtractive colorants before calling in and after
//! reading results back. Nothing here allocates or fails.

pub mod modes;
mod nonsep;
pub mod pixel;
pub mod smask;

pub use modes::BlendMode;
pub use pixel::{
    MAX_CHANNELS, composite_group, composite_pixel_alpha, knockout_isolated, knockout_simple,
    overprint_write_back, recomposite_group,
};
pub use smask::{MaskSubtype, TransferFn};
