/// Playback clock sampling interval.
pub const PLAYBACK_TICK_MS: u64 = 10;

/// Tag scheduler cadence.
pub const SCHEDULER_TICK_MS: u64 = 100;

/// Number of samples covering `ms` at `sample_rate`, truncated.
pub fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}

/// Duration in milliseconds of `samples` at `sample_rate`, truncated.
pub fn samples_to_ms(samples: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    samples as u64 * 1000 / sample_rate as u64
}

/// Window length in samples for a window of `seconds`.
pub fn window_samples(seconds: f64, sample_rate: u32) -> usize {
    (seconds * sample_rate as f64).round() as usize
}
