pub mod client;
pub mod types;

pub use client::{FingerprintService, HttpFingerprintService};
pub use types::{FingerprintDescriptor, SearchCandidate, SearchOutcome};
