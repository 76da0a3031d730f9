#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tunetag::audio::decode::{AudioDecoder, DecodedAudio};
use tunetag::audio::resample::Resample;
use tunetag::error::{DecodeError, FetchError, ServiceError};
use tunetag::outputs::{ChannelTagSink, UiEvent};
use tunetag::services::fingerprint::{FingerprintDescriptor, FingerprintService, SearchOutcome};
use tunetag::{SessionConfig, SessionDeps};

pub const RATE: u32 = 8000;
pub const TRIGGER_LEN: usize = 3200;

/// Little-endian f32 mono at a fixed rate.
pub struct RawF32Decoder;

impl AudioDecoder for RawF32Decoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
        if bytes.len() % 4 != 0 {
            return Err(DecodeError::Codec("unaligned chunk".into()));
        }
        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(DecodedAudio {
            channels: vec![samples],
            sample_rate: RATE,
        })
    }
}

pub struct Passthrough;

impl Resample for Passthrough {
    fn resample(&self, samples: &[f32], _from: u32, _to: u32) -> Result<Vec<f32>, DecodeError> {
        Ok(samples.to_vec())
    }
}

/// In-process extraction + search.
pub struct MockService {
    pub search_body: String,
    pub fail_extract: bool,
    pub extracts: AtomicUsize,
    pub searches: AtomicUsize,
}

impl MockService {
    pub fn answering(search_body: serde_json::Value) -> Self {
        Self {
            search_body: search_body.to_string(),
            fail_extract: false,
            extracts: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn candidate(id: &str, kind: &str, pct: u32) -> serde_json::Value {
        json!([{
            "id": id,
            "name": "Summer offer",
            "description": "Tap to open",
            "type": kind,
            "info": "https://example.com/offer",
            "matchPercentage": pct,
        }])
    }
}

#[async_trait]
impl FingerprintService for MockService {
    async fn extract(&self, samples: &[i16]) -> Result<FingerprintDescriptor, ServiceError> {
        self.extracts.fetch_add(1, Ordering::SeqCst);
        if self.fail_extract {
            return Err(ServiceError::Status(500));
        }
        Ok(FingerprintDescriptor {
            data: json!({ "len": samples.len() }),
            size: Some(samples.len() as u64),
        })
    }

    async fn search(&self, _descriptor: &FingerprintDescriptor) -> Result<SearchOutcome, ServiceError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(SearchOutcome::parse(&self.search_body))
    }
}

pub fn chirp(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / RATE as f32;
            let envelope = (std::f32::consts::PI * i as f32 / len as f32).sin();
            0.8 * envelope * (2.0 * std::f32::consts::PI * (300.0 + 1500.0 * t) * t).sin()
        })
        .collect()
}

pub fn noise(len: usize, seed: u32) -> Vec<f32> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((state >> 8) as f32 / (1u32 << 24) as f32 - 0.5) * 0.1
        })
        .collect()
}

/// `seconds` of noise with the trigger starting at each of `at_seconds`.
pub fn broadcast(seconds: f64, at_seconds: &[f64]) -> Vec<f32> {
    let mut samples = noise((seconds * RATE as f64) as usize, 7);
    let trigger = chirp(TRIGGER_LEN);
    for at in at_seconds {
        let start = (at * RATE as f64) as usize;
        for (i, v) in trigger.iter().enumerate() {
            if let Some(slot) = samples.get_mut(start + i) {
                *slot += v;
            }
        }
    }
    samples
}

pub fn encode(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn trigger_bytes() -> Vec<u8> {
    encode(&chirp(TRIGGER_LEN))
}

/// Body split into half-second network reads.
pub fn byte_stream(samples: &[f32]) -> BoxStream<'static, Result<Bytes, FetchError>> {
    let bytes = encode(samples);
    let part = (RATE as usize / 2) * 4;
    let parts: Vec<Result<Bytes, FetchError>> = bytes
        .chunks(part)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    stream::iter(parts).boxed()
}

/// Same body, then the connection stays open forever.
pub fn endless_stream(samples: &[f32]) -> BoxStream<'static, Result<Bytes, FetchError>> {
    byte_stream(samples).chain(stream::pending()).boxed()
}

/// 1.5 s windows of 8 kHz f32: one fetch chunk is exactly one window.
pub fn test_config() -> SessionConfig {
    SessionConfig {
        stream_url: "http://radio.test/live".to_string(),
        window_seconds: 1.5,
        fetch_sample_rate: RATE,
        bytes_per_sample: 4,
        extraction_ms: 2000,
        fingerprint_sample_rate: RATE,
        playback_lead_seconds: 2.0,
        ..Default::default()
    }
}

pub fn test_deps(service: Arc<MockService>) -> (SessionDeps, tokio::sync::mpsc::UnboundedReceiver<UiEvent>) {
    let (sink, ui) = ChannelTagSink::new();
    let deps = SessionDeps {
        decoder: Arc::new(RawF32Decoder),
        resampler: Arc::new(Passthrough),
        service,
        matcher: None,
        sink: Arc::new(sink),
    };
    (deps, ui)
}

pub fn drain(ui: &mut tokio::sync::mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = ui.try_recv() {
        events.push(event);
    }
    events
}
