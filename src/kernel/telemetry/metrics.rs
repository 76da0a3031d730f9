use std::collections::VecDeque;

use super::event::{LifecycleEvent, ResolutionKind, TelemetryEvent};
use crate::kernel::audio::clock::PlaybackStatus;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub decode: DecodeStats,
    pub detection: DetectionStats,
    pub resolution: ResolutionStats,
    pub scheduling: SchedulingStats,
    pub playback: PlaybackStats,
    pub stream_ended: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeStats {
    pub blocks: u64,
    pub samples: u64,
    pub failures: u64,
    pub windows: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionStats {
    pub windows_skipped: u64,
    pub triggers: u64,
    pub extractions: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionStats {
    pub resolved: u64,
    pub empty: u64,
    pub failed: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulingStats {
    pub fired: u64,
    pub silent_calls: u64,
    pub missed: u64,
    pub avg_lateness_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackStats {
    pub starts: u64,
    pub pauses: u64,
    pub stalls: u64,
    pub last_position_ms: u64,
}

pub fn compute_stats(events: &VecDeque<TelemetryEvent>) -> PipelineStats {
    let mut stats = PipelineStats::default();

    let mut resolution_latency = 0u64;
    let mut resolutions = 0u64;
    let mut lateness = 0u64;

    for event in events {
        match event {
            TelemetryEvent::BlockDecoded { samples, .. } => {
                stats.decode.blocks += 1;
                stats.decode.samples += *samples as u64;
            }
            TelemetryEvent::DecodeFailed { .. } => stats.decode.failures += 1,
            TelemetryEvent::WindowEmitted { count } => stats.decode.windows += *count as u64,
            TelemetryEvent::WindowSkipped { .. } => stats.detection.windows_skipped += 1,
            TelemetryEvent::TriggerDetected { .. } => stats.detection.triggers += 1,
            TelemetryEvent::SegmentExtracted { .. } => stats.detection.extractions += 1,
            TelemetryEvent::Resolution { outcome, latency_ms, .. } => {
                match outcome {
                    ResolutionKind::Resolved => stats.resolution.resolved += 1,
                    ResolutionKind::Empty => stats.resolution.empty += 1,
                    ResolutionKind::ExtractFailed | ResolutionKind::SearchFailed => {
                        stats.resolution.failed += 1
                    }
                }
                resolution_latency += latency_ms;
                resolutions += 1;
            }
            TelemetryEvent::TagFired { lateness_ms, silent, .. } => {
                stats.scheduling.fired += 1;
                if *silent {
                    stats.scheduling.silent_calls += 1;
                }
                lateness += lateness_ms;
            }
            TelemetryEvent::TagMissed { .. } => stats.scheduling.missed += 1,
            TelemetryEvent::Playback { from, to, position_ms } => {
                match (from, to) {
                    (_, PlaybackStatus::Playing) => stats.playback.starts += 1,
                    (_, PlaybackStatus::Paused) => stats.playback.pauses += 1,
                    (PlaybackStatus::Playing, PlaybackStatus::Stopped) => stats.playback.stalls += 1,
                    _ => {}
                }
                stats.playback.last_position_ms = *position_ms;
            }
            TelemetryEvent::Lifecycle(LifecycleEvent::StreamEnded) => stats.stream_ended = true,
            TelemetryEvent::Lifecycle(_) => {}
        }
    }

    if resolutions > 0 {
        stats.resolution.avg_latency_ms = resolution_latency as f64 / resolutions as f64;
    }
    if stats.scheduling.fired > 0 {
        stats.scheduling.avg_lateness_ms = lateness as f64 / stats.scheduling.fired as f64;
    }

    stats
}
