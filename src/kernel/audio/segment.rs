use tokio::sync::mpsc;

/// Decoded mono audio. Immutable once queued.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBlock {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl PcmBlock {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A fixed-length analysis window. Only the assembler constructs these, and
/// always with exactly one window length of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    block: PcmBlock,
}

impl Window {
    pub(crate) fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            block: PcmBlock::new(samples, sample_rate),
        }
    }

    pub fn samples(&self) -> &[f32] {
        self.block.samples()
    }

    pub fn sample_rate(&self) -> u32 {
        self.block.sample_rate()
    }

    pub fn len(&self) -> usize {
        self.block.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block.is_empty()
    }
}

/// Unbounded single-producer / single-consumer FIFO of decoded blocks.
pub struct SegmentQueue;

impl SegmentQueue {
    pub fn channel() -> (SegmentSender, SegmentReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SegmentSender { tx }, SegmentReceiver { rx })
    }
}

#[derive(Debug)]
pub struct SegmentSender {
    tx: mpsc::UnboundedSender<PcmBlock>,
}

impl SegmentSender {
    /// Returns false once the consumer is gone.
    pub fn push(&self, block: PcmBlock) -> bool {
        self.tx.send(block).is_ok()
    }
}

#[derive(Debug)]
pub struct SegmentReceiver {
    rx: mpsc::UnboundedReceiver<PcmBlock>,
}

impl SegmentReceiver {
    /// Next block, or None when the producer has finished and the queue is drained.
    pub async fn pop(&mut self) -> Option<PcmBlock> {
        self.rx.recv().await
    }

    pub fn try_pop(&mut self) -> Option<PcmBlock> {
        self.rx.try_recv().ok()
    }
}

/// Pins a stream to the rate of its first decoded block.
///
/// Blocks at any other rate are rejected before they reach the player or the
/// assembler, so both consumers see the same samples.
#[derive(Debug, Default, Clone, Copy)]
pub struct RateLock {
    rate: Option<u32>,
}

impl RateLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate(&self) -> Option<u32> {
        self.rate
    }

    pub fn admit(&mut self, block: &PcmBlock) -> bool {
        match self.rate {
            None => {
                self.rate = Some(block.sample_rate());
                true
            }
            Some(rate) => rate == block.sample_rate(),
        }
    }
}
