//! Group and soft-mask compositing: plane buffers, the compositing stack and the controller
//! that drives it from device-level calls.

pub mod buffer;
mod compose;
pub mod controller;
pub mod params;
pub mod stack;

pub use buffer::{MaskInfo, PendingMask, PlaneBuffer};
pub use controller::Compositor;
pub use params::{
    BlendParams, BlendParamsUpdate, GroupColor, GroupParams, MaskIdTracker, MaskParams,
};
pub use stack::{CompositingStack, CompositorOpts, PushGroup, PushMask};
