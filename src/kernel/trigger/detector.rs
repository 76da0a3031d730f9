use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

use super::fingerprint::{TriggerFingerprint, TriggerMatch};
use super::matcher::TriggerMatcher;
use crate::kernel::audio::segment::{PcmBlock, Window};
use crate::kernel::time::{ms_to_samples, samples_to_ms};

/// A confirmed trigger occurrence with the audio that follows it.
#[derive(Debug, Clone)]
pub struct TriggerHit {
    /// Tag audio: `extraction_ms` starting at the trigger.
    pub segment: PcmBlock,
    /// Trigger start relative to the first window of the hit.
    pub trigger_offset_ms: u64,
    /// Absolute stream time of the first window of the hit.
    pub window_offset_ms: u64,
    pub matched: TriggerMatch,
    /// Window index of the first window of the hit.
    pub index: u64,
}

impl TriggerHit {
    /// Absolute stream time of the trigger.
    pub fn data_position_ms(&self) -> u64 {
        self.window_offset_ms + self.trigger_offset_ms
    }
}

#[derive(Debug)]
pub enum DetectorStep {
    /// Not enough windows buffered.
    Waiting,
    /// No match; one window dropped.
    Advanced,
    /// Match found; extraction deferred until `skip` windows are buffered.
    Armed { skip: usize, offset_ms: u64 },
    Extracted(TriggerHit),
}

/// Scans consecutive window pairs for the trigger and extracts the audio
/// following each hit.
///
/// Windows are owned here from the moment the assembler emits them until they
/// are scanned past or consumed by an extraction.
pub struct TriggerDetector {
    reference: Arc<TriggerFingerprint>,
    matcher: Arc<dyn TriggerMatcher>,
    windows: VecDeque<Window>,
    /// Windows covered by an armed hit, pending extraction and removal.
    skip_count: usize,
    carry: Option<TriggerMatch>,
    index_data_entry: u64,
    /// Samples in every window scanned past or extracted so far.
    consumed_samples: u64,
    extraction_ms: u64,
}

impl TriggerDetector {
    pub fn new(
        reference: Arc<TriggerFingerprint>,
        matcher: Arc<dyn TriggerMatcher>,
        extraction_ms: u64,
    ) -> Self {
        Self {
            reference,
            matcher,
            windows: VecDeque::new(),
            skip_count: 0,
            carry: None,
            index_data_entry: 0,
            consumed_samples: 0,
            extraction_ms,
        }
    }

    pub fn push_window(&mut self, window: Window) {
        self.windows.push_back(window);
    }

    pub fn buffered(&self) -> usize {
        self.windows.len()
    }

    pub fn skip_count(&self) -> usize {
        self.skip_count
    }

    pub fn index(&self) -> u64 {
        self.index_data_entry
    }

    fn window_offset_ms(&self, sample_rate: u32) -> u64 {
        if sample_rate == 0 {
            return 0;
        }
        self.consumed_samples * 1000 / sample_rate as u64
    }

    /// Length of the front window in milliseconds, unrounded.
    fn front_window_ms(&self) -> f64 {
        match self.windows.front() {
            Some(w) if w.sample_rate() > 0 => w.len() as f64 * 1000.0 / w.sample_rate() as f64,
            _ => 0.0,
        }
    }

    fn consume(&mut self, count: usize) {
        let count = count.min(self.windows.len());
        let samples: usize = self.windows.drain(..count).map(|w| w.len()).sum();
        self.consumed_samples += samples as u64;
        self.index_data_entry += count as u64;
    }

    fn concat(&self, count: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.windows.iter().take(count).map(Window::len).sum());
        for window in self.windows.iter().take(count) {
            out.extend_from_slice(window.samples());
        }
        out
    }

    /// One detection pass. Never removes more windows than are buffered.
    pub fn step(&mut self) -> DetectorStep {
        // 1. Armed hit: extract once every covered window has arrived.
        if self.skip_count > 0 {
            if self.windows.len() < self.skip_count {
                debug!(
                    "Detector: waiting for {} window(s), have {}",
                    self.skip_count,
                    self.windows.len()
                );
                return DetectorStep::Waiting;
            }
            let Some(matched) = self.carry.take() else {
                self.skip_count = 0;
                return DetectorStep::Waiting;
            };

            let sample_rate = self.windows[0].sample_rate();
            let joined = self.concat(self.skip_count);
            let start = matched.offset_samples.min(joined.len());
            let end = (start + ms_to_samples(self.extraction_ms, sample_rate)).min(joined.len());

            let hit = TriggerHit {
                segment: PcmBlock::new(joined[start..end].to_vec(), sample_rate),
                trigger_offset_ms: matched.offset_ms,
                window_offset_ms: self.window_offset_ms(sample_rate),
                matched,
                index: self.index_data_entry,
            };

            self.consume(self.skip_count);
            self.skip_count = 0;

            info!(
                "Detector: extracted {}ms of tag audio at {}ms",
                samples_to_ms(hit.segment.len(), sample_rate),
                hit.data_position_ms()
            );
            return DetectorStep::Extracted(hit);
        }

        // 2. Compare the next pair against the reference.
        if self.windows.len() < 2 {
            return DetectorStep::Waiting;
        }

        let sample_rate = self.windows[0].sample_rate();
        let joined = self.concat(2);
        match self.matcher.compare(&self.reference, &joined, sample_rate) {
            Some(matched) => {
                let covered = (matched.offset_ms + self.extraction_ms) as f64;
                let window_ms = self.front_window_ms().max(1.0);
                let skip = ((covered / window_ms).ceil() as usize).max(1);
                info!(
                    "Detector: trigger at +{}ms in window {} (similarity {:.3}), covering {} window(s)",
                    matched.offset_ms, self.index_data_entry, matched.similarity, skip
                );
                self.skip_count = skip;
                self.carry = Some(matched);
                DetectorStep::Armed {
                    skip,
                    offset_ms: matched.offset_ms,
                }
            }
            None => {
                self.consume(1);
                DetectorStep::Advanced
            }
        }
    }
}
