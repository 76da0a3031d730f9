use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::error::DecodeError;

/// Mono sample-rate conversion.
pub trait Resample: Send + Sync {
    fn resample(&self, samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, DecodeError>;
}

/// Polynomial resampler over one whole buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RubatoResampler;

impl Resample for RubatoResampler {
    fn resample(&self, samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, DecodeError> {
        if from_rate == to_rate || samples.is_empty() {
            return Ok(samples.to_vec());
        }
        if from_rate == 0 || to_rate == 0 {
            return Err(DecodeError::Resample(format!("invalid rates {} -> {}", from_rate, to_rate)));
        }

        let mut resampler = FastFixedIn::<f32>::new(
            to_rate as f64 / from_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            samples.len(),
            1,
        )
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

        let mut planar = resampler
            .process(&[samples], None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;

        let out = planar.pop().unwrap_or_default();
        debug!(
            "Resampler: {} samples @{}Hz -> {} samples @{}Hz",
            samples.len(),
            from_rate,
            out.len(),
            to_rate
        );
        Ok(out)
    }
}

/// Float samples to 16-bit signed, clamped.
pub fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_a_copy() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(RubatoResampler.resample(&input, 8000, 8000).unwrap(), input);
    }

    #[test]
    fn upsampling_scales_length() {
        let input: Vec<f32> = (0..8000).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let out = RubatoResampler.resample(&input, 8000, 10240).unwrap();
        let expected = 10240.0;
        let ratio = out.len() as f64 / expected;
        assert!(ratio > 0.95 && ratio < 1.05, "got {} samples", out.len());
    }

    #[test]
    fn i16_conversion_clamps() {
        assert_eq!(to_i16(&[0.0, 1.5, -2.0]), vec![0, i16::MAX, -i16::MAX]);
    }
}
