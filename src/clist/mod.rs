//! Banded command lists: recording a page into a byte-coded log, replaying it band by band,
//! and recovering when the log outgrows its memory.

pub mod band;
pub mod codec;
pub mod reader;
pub mod record;
pub mod recovery;
pub mod stream;
pub mod tile;
pub mod writer;

pub use band::{BandLayout, BandOpts, PageGeometry, partition};
pub use codec::ByteOrder;
pub use reader::{Inspector, PlaybackStats, Player, build_thread_pool};
pub use record::{MAX_COMPOSITOR_RECORD_SIZE, MAX_DRAW_RECORD_SIZE, Opcode, Record};
pub use recovery::{ClistDevice, ClistStats, PageQueue};
pub use stream::{BandState, IndexEntry, MemoryPool, PageLog, PoolCharge};
pub use tile::TileCache;
pub use writer::{PageState, Recorder, RecorderStats};
