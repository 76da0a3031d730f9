use serde::{Deserialize, Serialize};

use crate::kernel::audio::clock::PlaybackStatus;

// Allowed: positions, durations, counts, enums.
// Forbidden: audio samples, descriptors, URLs.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    BlockDecoded {
        samples: usize,
        sample_rate: u32,
    },

    DecodeFailed {
        bytes: usize,
    },

    WindowEmitted {
        count: usize,
    },

    WindowSkipped {
        window_index: u64,
    },

    TriggerDetected {
        window_index: u64,
        offset_ms: u64,
        skip: usize,
    },

    SegmentExtracted {
        data_position_ms: u64,
        duration_ms: u64,
    },

    Resolution {
        data_position_ms: u64,
        outcome: ResolutionKind,
        latency_ms: u64,
    },

    TagFired {
        data_position_ms: u64,
        /// Playback position minus tag position at fire time.
        lateness_ms: u64,
        silent: bool,
    },

    TagMissed {
        data_position_ms: u64,
        lateness_ms: u64,
    },

    Playback {
        from: PlaybackStatus,
        to: PlaybackStatus,
        position_ms: u64,
    },

    Lifecycle(LifecycleEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionKind {
    Resolved,
    /// Search answered but nothing actionable.
    Empty,
    ExtractFailed,
    SearchFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    SessionStarted,
    StreamEnded,
    SessionStopped,
}
