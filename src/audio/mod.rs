//! Capabilities at the edge of the pipeline: decoding, resampling, fetching
//! and (optionally) the output device.

pub mod decode;
pub mod fetch;
#[cfg(feature = "device-output")]
pub mod output;
pub mod resample;

pub use decode::{AudioDecoder, DecodedAudio, SymphoniaDecoder};
pub use fetch::{FetchSummary, StreamFetcher};
pub use resample::{Resample, RubatoResampler};
