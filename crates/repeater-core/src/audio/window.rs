//! Fixed-size analysis windows from arbitrary capture chunks
//!
//! Audio I/O delivers callbacks of whatever size the device chooses. The
//! decoder needs exact, non-overlapping windows in arrival order, so samples
//! are staged in a ring buffer and drained one window at a time.

use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;

/// Number of windows the ring can hold before dropping input
const RING_WINDOWS: usize = 8;

/// Accumulates samples and yields complete windows
pub struct WindowAssembler {
    window_size: usize,
    ring: HeapRb<f32>,
    /// Samples dropped because the ring was full
    dropped: u64,
}

impl WindowAssembler {
    /// Create an assembler producing windows of `window_size` samples
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            ring: HeapRb::new(window_size * RING_WINDOWS),
            dropped: 0,
        }
    }

    /// Stage normalized samples and return every complete window
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        let mut windows = Vec::new();
        let mut remaining = samples;

        while !remaining.is_empty() {
            let pushed = self.ring.push_slice(remaining);
            remaining = &remaining[pushed..];

            let drained = self.drain_into(&mut windows);
            if pushed == 0 && !drained {
                // Ring full with no complete window to drain
                self.dropped += remaining.len() as u64;
                tracing::warn!(dropped = remaining.len(), "window_ring_overflow");
                break;
            }
        }
        windows
    }

    /// Stage PCM16 samples
    pub fn push_i16(&mut self, samples: &[i16]) -> Vec<Vec<f32>> {
        let converted: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();
        self.push(&converted)
    }

    fn drain_into(&mut self, windows: &mut Vec<Vec<f32>>) -> bool {
        let mut any = false;
        while self.ring.occupied_len() >= self.window_size {
            let mut window = vec![0.0f32; self.window_size];
            let read = self.ring.pop_slice(&mut window);
            debug_assert_eq!(read, self.window_size);
            windows.push(window);
            any = true;
        }
        any
    }

    /// Samples waiting for the next window
    pub fn pending(&self) -> usize {
        self.ring.occupied_len()
    }

    /// Samples dropped on overflow
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Window size in samples
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Discard staged samples
    pub fn clear(&mut self) {
        self.ring.clear();
    }
}
