use std::io::Cursor;
use symphonia::core::audio::Signal;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::kernel::audio::segment::PcmBlock;

/// Decoded audio, one sample vector per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Mono block from channel 0, the channel analysis and playback use.
    pub fn into_block(self) -> PcmBlock {
        let sample_rate = self.sample_rate;
        let samples = self.channels.into_iter().next().unwrap_or_default();
        PcmBlock::new(samples, sample_rate)
    }
}

/// Bytes to PCM. Must fail per call, never panic, on garbage input.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, DecodeError>;
}

/// Decoder for self-contained compressed or PCM byte chunks.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder {
    extension: Option<String>,
}

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format hint, e.g. "mp3" for a radio stream.
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: Some(extension.into()),
        }
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = self.extension.as_deref() {
            hint.with_extension(ext);
        }

        // 1. Probe the container.
        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::Probe(e.to_string()))?;
        let mut format = probed.format;

        // 2. First decodable track.
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoTrack)?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::Codec(e.to_string()))?;

        // 3. Decode every packet; a truncated tail ends the chunk.
        let mut channels: Vec<Vec<f32>> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    debug!("Decoder: stopping at packet error: {}", e);
                    break;
                }
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!("Decoder: skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => {
                    warn!("Decoder: codec failure: {}", e);
                    break;
                }
            };

            let mut buf = decoded.make_equivalent::<f32>();
            decoded.convert(&mut buf);
            sample_rate.get_or_insert(buf.spec().rate);

            let count = buf.spec().channels.count();
            if channels.len() < count {
                channels.resize(count, Vec::new());
            }
            for (ch, out) in channels.iter_mut().enumerate().take(count) {
                out.extend_from_slice(buf.chan(ch));
            }
        }

        let sample_rate = sample_rate.ok_or(DecodeError::MissingSampleRate)?;
        if channels.first().map_or(true, Vec::is_empty) {
            return Err(DecodeError::Empty);
        }

        Ok(DecodedAudio { channels, sample_rate })
    }
}
