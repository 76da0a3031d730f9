use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::event::TelemetryEvent;
use super::metrics::{compute_stats, PipelineStats};

const MAX_EVENTS: usize = 10_000;

#[derive(Debug)]
pub struct TelemetryRecorder {
    buffer: VecDeque<TelemetryEvent>,
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    pub fn record(&mut self, event: TelemetryEvent) {
        if self.buffer.len() >= MAX_EVENTS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn snapshot(&self) -> PipelineStats {
        compute_stats(&self.buffer)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Recorder shared by every task of a session.
#[derive(Debug, Clone, Default)]
pub struct SharedTelemetry {
    inner: Arc<Mutex<TelemetryRecorder>>,
}

impl SharedTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: TelemetryEvent) {
        let mut recorder = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        recorder.record(event);
    }

    pub fn snapshot(&self) -> PipelineStats {
        let recorder = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        recorder.snapshot()
    }
}
