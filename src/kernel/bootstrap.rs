use tracing::info;

use crate::audio::decode::AudioDecoder;
use crate::audio::resample::{to_i16, Resample};
use crate::error::SessionError;
use crate::kernel::trigger::TriggerFingerprint;
use crate::services::fingerprint::FingerprintService;

/// Build the reference fingerprint from the raw trigger sound.
///
/// Without it no hit can ever be detected, so every failure here is fatal.
pub async fn bootstrap_trigger(
    bytes: &[u8],
    decoder: &dyn AudioDecoder,
    resampler: &dyn Resample,
    service: &dyn FingerprintService,
    fingerprint_rate: u32,
) -> Result<TriggerFingerprint, SessionError> {
    // 1. Decode; channel 0 is the reference.
    let audio = decoder
        .decode(bytes)
        .map_err(|e| SessionError::Bootstrap(format!("decode trigger: {}", e)))?;
    let block = audio.into_block();
    if block.len() < 2 {
        return Err(SessionError::Bootstrap("trigger sound is empty".into()));
    }

    // 2. Local envelope for detection.
    let reference = TriggerFingerprint::from_samples(block.samples(), block.sample_rate(), fingerprint_rate);

    // 3. Register the same audio with the extraction service.
    let resampled = resampler
        .resample(block.samples(), block.sample_rate(), fingerprint_rate)
        .map_err(|e| SessionError::Bootstrap(format!("resample trigger: {}", e)))?;
    let descriptor = service
        .extract(&to_i16(&resampled))
        .await
        .map_err(|e| SessionError::Bootstrap(format!("extract trigger fingerprint: {}", e)))?;

    info!(
        "Bootstrap: trigger is {}ms ({} envelope samples at {}Hz)",
        reference.duration_ms(),
        reference.envelope.len(),
        reference.envelope.rate
    );
    Ok(reference.with_descriptor(descriptor.data))
}
