use super::fingerprint::{AmplitudeEnvelope, TriggerFingerprint, TriggerMatch};

/// Similarity scoring of a stream segment against the trigger reference.
pub trait TriggerMatcher: Send + Sync {
    /// Best trigger occurrence inside `segment`, if any scores above threshold.
    fn compare(&self, reference: &TriggerFingerprint, segment: &[f32], sample_rate: u32) -> Option<TriggerMatch>;
}

/// Number of coarse candidates refined at sample resolution.
const REFINE_CANDIDATES: usize = 3;

/// Normalized cross-correlation over amplitude envelopes.
///
/// Coarse pass: correlate block-averaged magnitudes (one block per `hop`
/// envelope samples). Fine pass: correlate raw envelope values within one
/// hop of the best coarse candidates.
#[derive(Debug, Clone)]
pub struct AmplitudeMatcher {
    pub fingerprint_rate: u32,
    pub hop: usize,
    pub threshold: f32,
}

impl AmplitudeMatcher {
    pub fn new(fingerprint_rate: u32, hop: usize, threshold: f32) -> Self {
        Self {
            fingerprint_rate,
            hop: hop.max(1),
            threshold,
        }
    }

    fn best_position(&self, haystack: &[f32], needle: &[f32]) -> Option<(usize, f32)> {
        let max_pos = haystack.len().checked_sub(needle.len())?;
        let needle = Centered::new(needle)?;

        let hay_blocks = block_magnitudes(haystack, self.hop);
        let needle_blocks = block_magnitudes(needle.raw, self.hop);

        let candidates: Vec<usize> = match Centered::new(&needle_blocks) {
            Some(blocks) if hay_blocks.len() >= blocks.raw.len() => {
                let mut scored: Vec<(usize, f32)> = (0..=hay_blocks.len() - blocks.raw.len())
                    .map(|b| (b, blocks.ncc(&hay_blocks[b..b + blocks.raw.len()])))
                    .collect();
                scored.sort_by(|a, b| b.1.total_cmp(&a.1));
                scored
                    .into_iter()
                    .take(REFINE_CANDIDATES)
                    .map(|(b, _)| b * self.hop)
                    .collect()
            }
            // Reference too short for a coarse pass: scan everything.
            _ => return scan(&needle, haystack, 0, max_pos),
        };

        candidates
            .into_iter()
            .filter_map(|center| {
                let lo = center.saturating_sub(self.hop);
                let hi = (center + self.hop).min(max_pos);
                scan(&needle, haystack, lo, hi)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

impl TriggerMatcher for AmplitudeMatcher {
    fn compare(&self, reference: &TriggerFingerprint, segment: &[f32], sample_rate: u32) -> Option<TriggerMatch> {
        let envelope = AmplitudeEnvelope::from_samples(segment, sample_rate, self.fingerprint_rate);
        let needle = reference.envelope.at_rate(envelope.rate);
        if needle.len() < 2 || needle.len() > envelope.len() {
            return None;
        }

        let (pos, similarity) = self.best_position(&envelope.values, &needle.values)?;
        if similarity < self.threshold {
            return None;
        }

        let offset_samples = pos * envelope.step;
        Some(TriggerMatch {
            offset_ms: offset_samples as u64 * 1000 / sample_rate.max(1) as u64,
            offset_samples,
            similarity,
        })
    }
}

/// Zero-mean copy of a reference with its norm.
struct Centered<'a> {
    raw: &'a [f32],
    centered: Vec<f32>,
    norm: f32,
}

impl<'a> Centered<'a> {
    fn new(raw: &'a [f32]) -> Option<Self> {
        if raw.len() < 2 {
            return None;
        }
        let mean = raw.iter().sum::<f32>() / raw.len() as f32;
        let centered: Vec<f32> = raw.iter().map(|v| v - mean).collect();
        let norm = centered.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            return None;
        }
        Some(Self { raw, centered, norm })
    }

    fn ncc(&self, window: &[f32]) -> f32 {
        let mean = window.iter().sum::<f32>() / window.len() as f32;
        let mut dot = 0.0f32;
        let mut energy = 0.0f32;
        for (w, r) in window.iter().zip(&self.centered) {
            let w = w - mean;
            dot += w * r;
            energy += w * w;
        }
        let denom = energy.sqrt() * self.norm;
        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }
}

fn scan(needle: &Centered<'_>, haystack: &[f32], lo: usize, hi: usize) -> Option<(usize, f32)> {
    let n = needle.raw.len();
    (lo..=hi)
        .map(|pos| (pos, needle.ncc(&haystack[pos..pos + n])))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

fn block_magnitudes(values: &[f32], hop: usize) -> Vec<f32> {
    values
        .chunks_exact(hop)
        .map(|chunk| chunk.iter().map(|v| v.abs()).sum::<f32>() / hop as f32)
        .collect()
}
