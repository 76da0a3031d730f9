use ringbuf::traits::Producer;
use ringbuf::HeapProd;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::clock::{PlaybackClock, PlaybackStatus};
use super::segment::PcmBlock;

/// What the player looked like after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSnapshot {
    pub position_ms: u64,
    pub status: PlaybackStatus,
    pub buffered_ms: u64,
    /// Upstream finished and every queued sample has been played.
    pub ended: bool,
}

/// Gapless queue of decoded segments driven by the playback clock.
///
/// Each tick advances the read cursor by the clock delta. Rendered samples go
/// to the output ring when one is attached; without one playback is purely
/// clock-driven.
pub struct AudioStreamPlayer {
    clock: PlaybackClock,
    queue: VecDeque<PcmBlock>,
    current: Option<PcmBlock>,
    cursor: usize,
    /// Fractional samples owed from previous ticks.
    carry: f64,
    lead: Duration,
    is_first_play: bool,
    user_paused: bool,
    upstream_closed: bool,
    ended: bool,
    output: Option<HeapProd<f32>>,
}

impl AudioStreamPlayer {
    pub fn new(lead: Duration) -> Self {
        Self {
            clock: PlaybackClock::new(),
            queue: VecDeque::new(),
            current: None,
            cursor: 0,
            carry: 0.0,
            lead,
            is_first_play: true,
            user_paused: false,
            upstream_closed: false,
            ended: false,
            output: None,
        }
    }

    pub fn with_output(mut self, output: HeapProd<f32>) -> Self {
        self.attach_output(output);
        self
    }

    pub fn attach_output(&mut self, output: HeapProd<f32>) {
        self.output = Some(output);
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    /// Queue a freshly decoded segment and re-trigger playback if it was waiting.
    pub fn enqueue(&mut self, block: PcmBlock, now: Instant) {
        if block.is_empty() {
            return;
        }
        self.queue.push_back(block);
        self.try_start(now);
    }

    /// No more segments will arrive.
    pub fn close_upstream(&mut self, now: Instant) {
        self.upstream_closed = true;
        self.try_start(now);
    }

    /// Buffered audio not yet played.
    pub fn buffered(&self) -> Duration {
        let queued: f64 = self.queue.iter().map(PcmBlock::duration).sum();
        let current = self
            .current
            .as_ref()
            .map(|b| (b.len() - self.cursor) as f64 / b.sample_rate().max(1) as f64)
            .unwrap_or(0.0);
        Duration::from_secs_f64(queued + current)
    }

    /// User play. Resumes from the paused sample offset when paused.
    pub fn play(&mut self, now: Instant) {
        self.user_paused = false;
        if self.clock.is_paused() {
            if let Some(offset) = self.clock.resume(now) {
                self.cursor = offset;
            }
            info!("Player: resumed at {}ms", self.clock.total_play_time_ms());
            return;
        }
        self.try_start(now);
    }

    /// User pause. Records the current buffer offset.
    pub fn pause(&mut self, now: Instant) {
        if self.clock.is_paused() {
            return;
        }
        self.user_paused = true;
        if self.clock.is_playing() {
            self.advance(now);
            self.clock.pause(now, self.cursor);
            info!("Player: paused at {}ms", self.clock.total_play_time_ms());
        }
    }

    pub fn stop(&mut self, now: Instant) {
        self.clock.stop(now);
        self.queue.clear();
        self.current = None;
        self.cursor = 0;
        self.ended = true;
    }

    pub fn tick(&mut self, now: Instant) -> PlayerSnapshot {
        if self.clock.is_playing() {
            self.advance(now);
        } else if !self.user_paused {
            self.try_start(now);
        }

        if !self.ended && self.upstream_closed && self.is_drained() && !self.clock.is_paused() {
            self.clock.stop(now);
            self.ended = true;
            info!("Player: stream ended at {}ms", self.clock.total_play_time_ms());
        }

        self.snapshot()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            position_ms: self.clock.total_play_time_ms(),
            status: self.clock.status(),
            buffered_ms: self.buffered().as_millis() as u64,
            ended: self.ended,
        }
    }

    fn is_drained(&self) -> bool {
        self.queue.is_empty()
            && self.current.as_ref().map_or(true, |b| self.cursor >= b.len())
    }

    fn try_start(&mut self, now: Instant) {
        if self.user_paused || self.ended || self.clock.is_playing() || self.clock.is_paused() {
            return;
        }
        if self.is_drained() {
            return;
        }
        if self.is_first_play && !self.upstream_closed && self.buffered() < self.lead {
            debug!(
                "Player: waiting for lead ({}ms of {}ms buffered)",
                self.buffered().as_millis(),
                self.lead.as_millis()
            );
            return;
        }
        self.is_first_play = false;
        self.clock.play(now);
        info!("Player: playing with {}ms buffered", self.buffered().as_millis());
    }

    /// Render the samples covered by the clock delta since the last tick.
    fn advance(&mut self, now: Instant) {
        let delta = self.clock.tick(now);
        let rate = match self.current.as_ref().or_else(|| self.queue.front()) {
            Some(block) => block.sample_rate().max(1),
            None => {
                self.clock.rewind(delta);
                self.clock.stall(now);
                return;
            }
        };

        let owed = delta.as_secs_f64() * rate as f64 + self.carry;
        let mut remaining = owed.floor() as usize;
        self.carry = owed - owed.floor();

        while remaining > 0 {
            let exhausted = self.current.as_ref().map_or(true, |b| self.cursor >= b.len());
            if exhausted {
                match self.queue.pop_front() {
                    Some(next) => {
                        self.current = Some(next);
                        self.cursor = 0;
                    }
                    None => {
                        debug!("Player: buffer exhausted, stalling");
                        // Only the samples actually rendered count as played.
                        let unplayed = (remaining as f64 + self.carry) * 1e9 / rate as f64;
                        self.clock.rewind(Duration::from_nanos(unplayed.round() as u64));
                        self.carry = 0.0;
                        self.clock.stall(now);
                        return;
                    }
                }
            }
            let Some(block) = self.current.as_ref() else {
                return;
            };
            let take = remaining.min(block.len() - self.cursor);
            if let Some(output) = self.output.as_mut() {
                // Lossy when the device falls behind.
                output.push_slice(&block.samples()[self.cursor..self.cursor + take]);
            }
            self.cursor += take;
            remaining -= take;
        }
    }
}
