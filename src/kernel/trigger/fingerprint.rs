use serde::{Deserialize, Serialize};

/// Amplitude scale of the envelope.
pub const AMPLITUDE_SIZE: f32 = 512.0;

/// Decimated, amplitude-normalized view of a mono signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeEnvelope {
    pub values: Vec<f32>,
    /// Source rate divided by the decimation step.
    pub rate: u32,
    /// Decimation step applied to the source samples.
    pub step: usize,
}

impl AmplitudeEnvelope {
    /// Decimate by `floor(sample_rate / target_rate)` (at least 1) and scale
    /// every kept sample by `AMPLITUDE_SIZE / (0.01 + max - min)`.
    pub fn from_samples(samples: &[f32], sample_rate: u32, target_rate: u32) -> Self {
        let step = if target_rate == 0 {
            1
        } else {
            ((sample_rate / target_rate) as usize).max(1)
        };

        let (min, max) = samples
            .iter()
            .fold((0.0f32, 0.0f32), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let divider = 0.01 + max - min;

        let values = samples
            .iter()
            .step_by(step)
            .map(|&v| v * AMPLITUDE_SIZE / divider)
            .collect();

        Self {
            values,
            rate: sample_rate / step as u32,
            step,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.rate == 0 {
            return 0;
        }
        self.values.len() as u64 * 1000 / self.rate as u64
    }

    /// Linearly re-stretch to `rate`.
    pub fn at_rate(&self, rate: u32) -> AmplitudeEnvelope {
        if rate == self.rate || self.values.len() < 2 || self.rate == 0 {
            return self.clone();
        }
        let ratio = self.rate as f64 / rate as f64;
        let out_len = ((self.values.len() as f64) / ratio).floor() as usize;
        let last = self.values.len() - 1;
        let values = (0..out_len)
            .map(|i| {
                let pos = i as f64 * ratio;
                let idx = pos.floor() as usize;
                if idx >= last {
                    return self.values[last];
                }
                let frac = (pos - idx as f64) as f32;
                self.values[idx] * (1.0 - frac) + self.values[idx + 1] * frac
            })
            .collect();
        AmplitudeEnvelope {
            values,
            rate,
            step: self.step,
        }
    }
}

/// Reference descriptor of the known trigger sound.
///
/// Carries the local envelope used for detection and the opaque descriptor
/// the extraction service returned for the same audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerFingerprint {
    pub envelope: AmplitudeEnvelope,
    pub descriptor: Option<serde_json::Value>,
}

impl TriggerFingerprint {
    pub fn from_samples(samples: &[f32], sample_rate: u32, fingerprint_rate: u32) -> Self {
        Self {
            envelope: AmplitudeEnvelope::from_samples(samples, sample_rate, fingerprint_rate),
            descriptor: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: serde_json::Value) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn duration_ms(&self) -> u64 {
        self.envelope.duration_ms()
    }
}

/// One positive comparison of a segment against the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerMatch {
    /// Offset of the trigger start from the start of the compared segment.
    pub offset_ms: u64,
    /// Same offset in source samples.
    pub offset_samples: usize,
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimates_by_integer_step() {
        let samples: Vec<f32> = (0..44100).map(|i| (i as f32 * 0.001).sin()).collect();
        let env = AmplitudeEnvelope::from_samples(&samples, 44100, 10240);
        assert_eq!(env.step, 4);
        assert_eq!(env.rate, 11025);
        assert_eq!(env.len(), 11025);
    }

    #[test]
    fn low_rates_are_not_decimated() {
        let env = AmplitudeEnvelope::from_samples(&[0.5, -0.5, 0.25], 8000, 10240);
        assert_eq!(env.step, 1);
        assert_eq!(env.rate, 8000);
        // divider = 0.01 + 0.5 - (-0.5)
        assert!((env.values[0] - 0.5 * 512.0 / 1.01).abs() < 1e-3);
    }

    #[test]
    fn restretch_halves_length() {
        let env = AmplitudeEnvelope {
            values: (0..100).map(|v| v as f32).collect(),
            rate: 2000,
            step: 1,
        };
        let half = env.at_rate(1000);
        assert_eq!(half.len(), 50);
        assert_eq!(half.values[10], 20.0);
    }
}
