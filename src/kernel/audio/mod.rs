pub mod assembler;
pub mod clock;
pub mod player;
pub mod segment;

pub use assembler::WindowAssembler;
pub use clock::{PlaybackClock, PlaybackStatus};
pub use player::{AudioStreamPlayer, PlayerSnapshot};
pub use segment::{PcmBlock, RateLock, SegmentQueue, SegmentReceiver, SegmentSender, Window};
