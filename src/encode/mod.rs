//! Output sinks for finished pages.
//!
//! Sinks receive pages in page order from `render_script` and friends.

/// PNG files, one per page.
pub mod png;
/// Sink trait, page images and the in-memory sink.
pub mod sink;

pub use png::{PngSink, PngSinkOpts};
pub use sink::{InMemorySink, PageImage, PageSink, SinkConfig};
