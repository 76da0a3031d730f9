use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
}

/// Cumulative playback time of the player.
///
/// `total_play_time` only grows while `Playing`; a pause freezes it and a
/// resume restarts sampling from the resume instant, so wall-clock gaps
/// spent paused never count.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    status: PlaybackStatus,
    total_play_time: Duration,
    /// Instant of the last fold into `total_play_time` while playing.
    started_play_time: Option<Instant>,
    /// Sample offset into the current buffer at the moment of pause.
    paused_at: Option<usize>,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            total_play_time: Duration::ZERO,
            started_play_time: None,
            paused_at: None,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.status == PlaybackStatus::Paused
    }

    pub fn paused_at(&self) -> Option<usize> {
        self.paused_at
    }

    /// Begin (or continue after a stall) accumulating from `now`.
    pub fn play(&mut self, now: Instant) {
        if self.status == PlaybackStatus::Playing {
            return;
        }
        self.status = PlaybackStatus::Playing;
        self.started_play_time = Some(now);
        self.paused_at = None;
    }

    /// Fold elapsed time since the last sample. Returns the delta folded in.
    pub fn tick(&mut self, now: Instant) -> Duration {
        if self.status != PlaybackStatus::Playing {
            return Duration::ZERO;
        }
        let Some(last) = self.started_play_time else {
            return Duration::ZERO;
        };
        let delta = now.saturating_duration_since(last);
        self.total_play_time += delta;
        self.started_play_time = Some(now);
        delta
    }

    /// Freeze accumulation, remembering the buffer offset to resume from.
    pub fn pause(&mut self, now: Instant, buffer_offset: usize) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        self.tick(now);
        self.status = PlaybackStatus::Paused;
        self.started_play_time = None;
        self.paused_at = Some(buffer_offset);
    }

    /// Resume from a pause. Returns the buffer offset recorded at pause time.
    pub fn resume(&mut self, now: Instant) -> Option<usize> {
        if self.status != PlaybackStatus::Paused {
            return None;
        }
        let offset = self.paused_at.take();
        self.status = PlaybackStatus::Playing;
        self.started_play_time = Some(now);
        offset
    }

    /// Take back time folded in by `tick` that produced no audio.
    pub fn rewind(&mut self, unplayed: Duration) {
        self.total_play_time = self.total_play_time.saturating_sub(unplayed);
    }

    /// Starved: stop accumulating but stay resumable by `play`.
    pub fn stall(&mut self, now: Instant) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        self.tick(now);
        self.status = PlaybackStatus::Stopped;
        self.started_play_time = None;
    }

    pub fn stop(&mut self, now: Instant) {
        self.tick(now);
        self.status = PlaybackStatus::Stopped;
        self.started_play_time = None;
        self.paused_at = None;
    }

    pub fn total_play_time(&self) -> Duration {
        self.total_play_time
    }

    pub fn total_play_time_ms(&self) -> u64 {
        self.total_play_time.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_gap_is_not_counted() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();
        clock.play(t0);
        clock.tick(t0 + Duration::from_millis(3000));
        clock.pause(t0 + Duration::from_millis(3000), 1234);
        assert!(clock.is_paused());
        assert_eq!(clock.paused_at(), Some(1234));

        // 5 s of wall clock pass while paused.
        clock.tick(t0 + Duration::from_millis(8000));
        assert_eq!(clock.total_play_time_ms(), 3000);

        assert_eq!(clock.resume(t0 + Duration::from_millis(8000)), Some(1234));
        clock.tick(t0 + Duration::from_millis(8500));
        assert_eq!(clock.total_play_time_ms(), 3500);
    }

    #[test]
    fn ticks_accumulate_deltas() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();
        clock.play(t0);
        for i in 1..=100 {
            clock.tick(t0 + Duration::from_millis(10 * i));
        }
        assert_eq!(clock.total_play_time_ms(), 1000);
    }

    #[test]
    fn stalled_clock_resumes_on_play() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();
        clock.play(t0);
        clock.stall(t0 + Duration::from_millis(200));
        clock.tick(t0 + Duration::from_millis(900));
        assert_eq!(clock.total_play_time_ms(), 200);
        clock.play(t0 + Duration::from_millis(1000));
        clock.tick(t0 + Duration::from_millis(1100));
        assert_eq!(clock.total_play_time_ms(), 300);
    }

    #[test]
    fn rewind_never_goes_below_zero() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::new();
        clock.play(t0);
        clock.tick(t0 + Duration::from_millis(30));
        clock.rewind(Duration::from_millis(10));
        assert_eq!(clock.total_play_time_ms(), 20);
        clock.rewind(Duration::from_secs(1));
        assert_eq!(clock.total_play_time(), Duration::ZERO);
    }
}
