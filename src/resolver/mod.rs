pub mod selection;

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::resample::{to_i16, Resample};
use crate::kernel::tags::PendingTag;
use crate::kernel::telemetry::{ResolutionKind, SharedTelemetry, TelemetryEvent};
use crate::kernel::trigger::TriggerHit;
use crate::services::fingerprint::{FingerprintService, SearchOutcome};

pub use selection::{SeenCandidates, SelectionPolicy};

/// Turns extracted trigger audio into a pending tag via the remote services.
///
/// Every failure degrades to "no tag" and is logged; nothing here can stall
/// the detector.
pub struct TagResolver {
    service: Arc<dyn FingerprintService>,
    resampler: Arc<dyn Resample>,
    fingerprint_rate: u32,
    policy: SelectionPolicy,
    seen: Mutex<SeenCandidates>,
    telemetry: SharedTelemetry,
}

impl TagResolver {
    pub fn new(
        service: Arc<dyn FingerprintService>,
        resampler: Arc<dyn Resample>,
        fingerprint_rate: u32,
        policy: SelectionPolicy,
        telemetry: SharedTelemetry,
    ) -> Self {
        Self {
            service,
            resampler,
            fingerprint_rate,
            policy,
            seen: Mutex::new(SeenCandidates::new()),
            telemetry,
        }
    }

    fn record(&self, hit: &TriggerHit, outcome: ResolutionKind, started: Instant) {
        self.telemetry.record(TelemetryEvent::Resolution {
            data_position_ms: hit.data_position_ms(),
            outcome,
            latency_ms: started.elapsed().as_millis() as u64,
        });
    }

    pub async fn resolve(&self, hit: &TriggerHit) -> Option<PendingTag> {
        let started = Instant::now();
        let position = hit.data_position_ms();

        // 1. Reformat to the fingerprinting rate as 16-bit samples.
        let resampled = match self.resampler.resample(
            hit.segment.samples(),
            hit.segment.sample_rate(),
            self.fingerprint_rate,
        ) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Resolver: resample failed for hit at {}ms: {}", position, e);
                self.record(hit, ResolutionKind::ExtractFailed, started);
                return None;
            }
        };
        let pcm = to_i16(&resampled);

        // 2. Extract a descriptor.
        let descriptor = match self.service.extract(&pcm).await {
            Ok(d) => d,
            Err(e) => {
                warn!("Resolver: extraction failed for hit at {}ms: {}", position, e);
                self.record(hit, ResolutionKind::ExtractFailed, started);
                return None;
            }
        };

        // 3. Search.
        let candidates = match self.service.search(&descriptor).await {
            Ok(SearchOutcome::Found(candidates)) => candidates,
            Ok(SearchOutcome::Empty) => {
                debug!("Resolver: no match for hit at {}ms", position);
                self.record(hit, ResolutionKind::Empty, started);
                return None;
            }
            Ok(SearchOutcome::Malformed(reason)) => {
                warn!("Resolver: malformed search response for hit at {}ms: {}", position, reason);
                self.record(hit, ResolutionKind::SearchFailed, started);
                return None;
            }
            Err(e) => {
                warn!("Resolver: search failed for hit at {}ms: {}", position, e);
                self.record(hit, ResolutionKind::SearchFailed, started);
                return None;
            }
        };

        // 4. Select. Selection and marking seen happen under one lock.
        let picked = {
            let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
            seen.select(&candidates, &self.policy)
        };
        let Some((candidate, category)) = picked else {
            debug!(
                "Resolver: {} candidate(s) for hit at {}ms, none actionable",
                candidates.len(),
                position
            );
            self.record(hit, ResolutionKind::Empty, started);
            return None;
        };

        self.record(hit, ResolutionKind::Resolved, started);
        info!(
            "Resolver: tag {} ({}) at {}ms, match {}%",
            candidate.id, category, position, candidate.match_percentage
        );

        Some(PendingTag {
            id: candidate.id,
            name: candidate.name.unwrap_or_default(),
            description: candidate.description.unwrap_or_default(),
            info: candidate.info.unwrap_or_default(),
            category,
            match_percentage: candidate.match_percentage,
            similarity: hit.matched.similarity,
            data_position: position,
            index: hit.index,
        })
    }

    /// Resolve on a detached task and post the tag back.
    ///
    /// Results arriving after `cancel` fires are discarded.
    pub fn dispatch(
        self: &Arc<Self>,
        hit: TriggerHit,
        tx: mpsc::UnboundedSender<PendingTag>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            let tag = resolver.resolve(&hit).await;
            if cancel.is_cancelled() {
                debug!("Resolver: session ended, discarding result for {}ms", hit.data_position_ms());
                return;
            }
            if let Some(tag) = tag {
                let _ = tx.send(tag);
            }
        })
    }
}
