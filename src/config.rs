//! Session configuration.
//!
//! Every tunable of the pipeline lives here. Values come from an optional JSON
//! file, then `TUNETAG_*` environment overrides, then `validate()`.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::ConfigError;
use crate::kernel::tags::TagCategory;
use crate::kernel::time::{PLAYBACK_TICK_MS, SCHEDULER_TICK_MS};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub stream_url: String,
    /// Local path or http(s) URL of the trigger sound.
    pub trigger_source: String,

    /// STREAM_DURATION: length of one analysis window.
    pub window_seconds: f64,
    /// Nominal rate used to size fetch chunks (not the decoded rate).
    pub fetch_sample_rate: u32,
    pub bytes_per_sample: u32,

    /// Audio extracted after the trigger offset for fingerprinting.
    pub extraction_ms: u64,
    pub similarity_threshold: f32,
    /// Coarse search hop in envelope samples.
    pub match_hop: usize,
    pub fingerprint_sample_rate: u32,

    pub playback_lead_seconds: f64,
    /// Render to the default output device (needs the `device-output` feature).
    pub device_output: bool,
    pub playback_tick_ms: u64,
    pub scheduler_tick_ms: u64,
    pub arrival_window_ms: u64,

    pub extract_url: String,
    pub search_url: String,
    pub interaction_url: Option<String>,
    pub service_timeout_ms: u64,

    pub match_threshold: u32,
    /// Per stream host overrides of `match_threshold`.
    pub source_thresholds: HashMap<String, u32>,
    pub actionable: HashSet<TagCategory>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stream_url: "http://stream.radiojar.com/vzv0nkgsw7uvv".to_string(),
            trigger_source: "audio/10240-triggersound.wav".to_string(),
            window_seconds: 1.5,
            fetch_sample_rate: 11025,
            bytes_per_sample: 2,
            extraction_ms: 6000, // 1s trigger + 5s after
            similarity_threshold: 0.6,
            match_hop: 64,
            fingerprint_sample_rate: 10240,
            playback_lead_seconds: 16.0,
            device_output: false,
            playback_tick_ms: PLAYBACK_TICK_MS,
            scheduler_tick_ms: SCHEDULER_TICK_MS,
            arrival_window_ms: 1000,
            extract_url: "http://localhost:8281/dev/v3/extractFingerprint".to_string(),
            search_url: "http://localhost:8281/dev/search-fingerprint".to_string(),
            interaction_url: None,
            service_timeout_ms: 10_000,
            match_threshold: 0,
            source_thresholds: HashMap::new(),
            actionable: [TagCategory::OpenPage, TagCategory::SavePage, TagCategory::ApiCall]
                .into_iter()
                .collect(),
        }
    }
}

impl SessionConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: SessionConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Apply `TUNETAG_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TUNETAG_STREAM_URL") {
            self.stream_url = v;
        }
        if let Some(v) = lookup("TUNETAG_TRIGGER") {
            self.trigger_source = v;
        }
        if let Some(v) = lookup("TUNETAG_EXTRACT_URL") {
            self.extract_url = v;
        }
        if let Some(v) = lookup("TUNETAG_SEARCH_URL") {
            self.search_url = v;
        }
        if let Some(v) = lookup("TUNETAG_INTERACTION_URL") {
            self.interaction_url = Some(v);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_seconds.is_nan() || self.window_seconds <= 0.0 {
            return Err(ConfigError::Invalid("window_seconds must be positive".into()));
        }
        if self.fetch_sample_rate == 0 || self.bytes_per_sample == 0 {
            return Err(ConfigError::Invalid("fetch chunk size must be positive".into()));
        }
        if self.extraction_ms == 0 {
            return Err(ConfigError::Invalid("extraction_ms must be positive".into()));
        }
        if self.match_hop == 0 || self.fingerprint_sample_rate == 0 {
            return Err(ConfigError::Invalid("matcher parameters must be positive".into()));
        }
        if self.playback_tick_ms == 0 || self.scheduler_tick_ms == 0 {
            return Err(ConfigError::Invalid("tick intervals must be positive".into()));
        }
        if self.arrival_window_ms <= self.scheduler_tick_ms {
            return Err(ConfigError::Invalid(format!(
                "arrival_window_ms ({}) must exceed scheduler_tick_ms ({})",
                self.arrival_window_ms, self.scheduler_tick_ms
            )));
        }
        if self.extract_url.is_empty() || self.search_url.is_empty() {
            return Err(ConfigError::Invalid("service endpoints must be set".into()));
        }
        if self.actionable.is_empty() {
            return Err(ConfigError::Invalid("actionable category set is empty".into()));
        }
        Ok(())
    }

    /// Byte threshold that closes one fetch chunk.
    pub fn fetch_chunk_bytes(&self) -> usize {
        (self.fetch_sample_rate as f64 * self.window_seconds * self.bytes_per_sample as f64) as usize
    }

    pub fn window_ms(&self) -> u64 {
        (self.window_seconds * 1000.0).round() as u64
    }

    /// Match threshold for the configured stream, honoring per-host overrides.
    pub fn threshold_for_stream(&self) -> u32 {
        stream_host(&self.stream_url)
            .and_then(|host| self.source_thresholds.get(host).copied())
            .unwrap_or(self.match_threshold)
    }
}

fn stream_host(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.rsplit_once('@').map(|(_, h)| h).unwrap_or(host);
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}
