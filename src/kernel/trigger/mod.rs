pub mod detector;
pub mod fingerprint;
pub mod matcher;

pub use detector::{DetectorStep, TriggerDetector, TriggerHit};
pub use fingerprint::{AmplitudeEnvelope, TriggerFingerprint, TriggerMatch};
pub use matcher::{AmplitudeMatcher, TriggerMatcher};
