use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::decode::AudioDecoder;
use crate::error::FetchError;
use crate::kernel::audio::segment::PcmBlock;
use crate::kernel::telemetry::{SharedTelemetry, TelemetryEvent};

/// What a finished fetch loop saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub bytes_read: usize,
    pub blocks: usize,
    pub decode_failures: usize,
    /// Bytes below the chunk threshold left when the stream ended.
    pub dropped_tail: usize,
}

/// Chunked fetch-and-decode of a live byte stream.
///
/// Bytes accumulate until `chunk_bytes`; the whole accumulation is then
/// decoded as one block. A chunk that fails to decode is logged and dropped.
pub struct StreamFetcher {
    client: Client,
    decoder: Arc<dyn AudioDecoder>,
    chunk_bytes: usize,
    telemetry: SharedTelemetry,
}

impl StreamFetcher {
    pub fn new(decoder: Arc<dyn AudioDecoder>, chunk_bytes: usize, telemetry: SharedTelemetry) -> Self {
        Self {
            client: Client::new(),
            decoder,
            chunk_bytes: chunk_bytes.max(1),
            telemetry,
        }
    }

    /// Open `url` and run the loop over its body.
    pub async fn run<F>(&self, url: &str, on_block: F, cancel: CancellationToken) -> Result<FetchSummary, FetchError>
    where
        F: FnMut(PcmBlock) -> bool,
    {
        info!("Fetcher: connecting to {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        let body = response.bytes_stream().map(|chunk| chunk.map_err(FetchError::from));
        self.run_stream(body, on_block, cancel).await
    }

    /// Run the loop over any byte stream. `on_block` returning false stops it.
    pub async fn run_stream<S, F>(
        &self,
        stream: S,
        mut on_block: F,
        cancel: CancellationToken,
    ) -> Result<FetchSummary, FetchError>
    where
        S: Stream<Item = Result<Bytes, FetchError>>,
        F: FnMut(PcmBlock) -> bool,
    {
        let mut stream = std::pin::pin!(stream);
        let mut summary = FetchSummary::default();
        let mut pending: Vec<u8> = Vec::with_capacity(self.chunk_bytes * 2);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Fetcher: cancelled");
                    return Ok(summary);
                }
                next = stream.next() => next,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    warn!("Fetcher: read failed after {} bytes: {}", summary.bytes_read, e);
                    return Err(e);
                }
                None => break,
            };
            summary.bytes_read += chunk.len();
            pending.extend_from_slice(&chunk);

            if pending.len() < self.chunk_bytes {
                continue;
            }

            // Threshold reached: decode everything accumulated.
            let raw = std::mem::take(&mut pending);
            match self.decoder.decode(&raw) {
                Ok(audio) => {
                    let block = audio.into_block();
                    self.telemetry.record(TelemetryEvent::BlockDecoded {
                        samples: block.len(),
                        sample_rate: block.sample_rate(),
                    });
                    summary.blocks += 1;
                    if !on_block(block) {
                        debug!("Fetcher: consumer gone, stopping");
                        return Ok(summary);
                    }
                }
                Err(e) => {
                    warn!("Fetcher: dropping {} byte chunk: {}", raw.len(), e);
                    self.telemetry.record(TelemetryEvent::DecodeFailed { bytes: raw.len() });
                    summary.decode_failures += 1;
                }
            }
        }

        summary.dropped_tail = pending.len();
        info!(
            "Fetcher: stream ended ({} bytes, {} blocks, {} failed, {} tail bytes dropped)",
            summary.bytes_read, summary.blocks, summary.decode_failures, summary.dropped_tail
        );
        Ok(summary)
    }
}

/// Read a whole audio resource from a local path or an http(s) URL.
pub async fn read_source(source: &str) -> Result<Vec<u8>, FetchError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = Client::new().get(source).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    } else {
        Ok(tokio::fs::read(source).await?)
    }
}
