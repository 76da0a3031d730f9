use super::segment::{PcmBlock, Window};
use tracing::{debug, warn};

/// Re-segments irregular decoded blocks into fixed-length windows.
///
/// Invariant: every sample handed to `push` ends up in exactly one emitted
/// window or in the remainder. No short window is ever emitted.
pub struct WindowAssembler {
    window_len: usize,
    sample_rate: u32,
    remainder: Vec<f32>,
}

impl WindowAssembler {
    pub fn new(window_len: usize, sample_rate: u32) -> Self {
        Self {
            window_len: window_len.max(1),
            sample_rate,
            remainder: Vec::with_capacity(window_len),
        }
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn remainder_len(&self) -> usize {
        self.remainder.len()
    }

    /// Samples held back waiting for the next block.
    pub fn remainder(&self) -> &[f32] {
        &self.remainder
    }

    /// Consume one block, returning every full window it completes.
    pub fn push(&mut self, block: PcmBlock) -> Vec<Window> {
        if block.sample_rate() != self.sample_rate {
            // Mixed rates would break the sample accounting downstream.
            warn!(
                "Assembler: block at {}Hz does not match stream rate {}Hz, dropping {} samples",
                block.sample_rate(),
                self.sample_rate,
                block.len()
            );
            return Vec::new();
        }

        let incoming = block.into_samples();

        // 1. Not enough for a window yet: hold everything.
        if self.remainder.len() + incoming.len() < self.window_len {
            self.remainder.extend_from_slice(&incoming);
            return Vec::new();
        }

        // 2. Complete the first window from remainder + head of the block.
        let mut windows = Vec::new();
        let needed = self.window_len - self.remainder.len();
        let mut first = std::mem::replace(&mut self.remainder, Vec::with_capacity(self.window_len));
        first.extend_from_slice(&incoming[..needed]);
        windows.push(Window::new(first, self.sample_rate));

        // 3. Carve as many whole windows as the rest of the block holds.
        let mut rest = &incoming[needed..];
        while rest.len() >= self.window_len {
            let (head, tail) = rest.split_at(self.window_len);
            windows.push(Window::new(head.to_vec(), self.sample_rate));
            rest = tail;
        }

        // 4. Leftover (possibly empty) becomes the new remainder.
        self.remainder.extend_from_slice(rest);

        debug!(
            "Assembler: emitted {} window(s), remainder {} samples",
            windows.len(),
            self.remainder.len()
        );
        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: usize, len: usize) -> PcmBlock {
        PcmBlock::new((start..start + len).map(|v| v as f32).collect(), 100)
    }

    #[test]
    fn short_blocks_are_held() {
        let mut asm = WindowAssembler::new(10, 100);
        assert!(asm.push(ramp(0, 4)).is_empty());
        assert!(asm.push(ramp(4, 5)).is_empty());
        assert_eq!(asm.remainder_len(), 9);
    }

    #[test]
    fn exact_fill_leaves_empty_remainder() {
        let mut asm = WindowAssembler::new(10, 100);
        asm.push(ramp(0, 6));
        let windows = asm.push(ramp(6, 4));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].samples(), ramp(0, 10).samples());
        assert_eq!(asm.remainder_len(), 0);
    }

    #[test]
    fn large_block_yields_multiple_windows() {
        let mut asm = WindowAssembler::new(10, 100);
        asm.push(ramp(0, 3));
        let windows = asm.push(ramp(3, 35));
        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| w.len() == 10));
        assert_eq!(windows[2].samples()[0], 20.0);
        assert_eq!(asm.remainder(), &[30.0, 31.0, 32.0, 33.0, 34.0, 35.0, 36.0, 37.0]);
    }

    #[test]
    fn mismatched_rate_is_dropped() {
        let mut asm = WindowAssembler::new(10, 100);
        asm.push(ramp(0, 3));
        let windows = asm.push(PcmBlock::new(vec![0.0; 20], 200));
        assert!(windows.is_empty());
        assert_eq!(asm.remainder_len(), 3);
    }
}
