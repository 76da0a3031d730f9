//! Pipeline telemetry.
//!
//! Telemetry is a read-only side-effect layer: pipeline decisions never read it.
//! Events carry positions, counts and durations only, never audio, fingerprint
//! descriptors or tag destinations.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::{LifecycleEvent, ResolutionKind, TelemetryEvent};
pub use metrics::PipelineStats;
pub use recorder::{SharedTelemetry, TelemetryRecorder};
