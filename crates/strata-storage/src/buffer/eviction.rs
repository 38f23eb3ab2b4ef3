//! Clock eviction policy for buffer pool.
//!
//! The Clock algorithm approximates LRU with a reference bit per frame:
//! 1. Each frame's reference bit is set when it is pinned
//! 2. A clock hand sweeps through frames looking for eviction candidates
//! 3. If a frame's reference bit is set, clear it and move on
//! 4. If a frame's reference bit is clear, evict it

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::frame::{BufferFrame, FrameId};

/// Clock-based page replacement algorithm.
///
/// Only unpinned frames holding a page are candidates for eviction.
pub struct ClockReplacer {
    /// Number of frames in the buffer pool.
    num_frames: usize,
    /// Current position of the clock hand.
    clock_hand: AtomicUsize,
}

impl ClockReplacer {
    /// Creates a new clock replacer for the given number of frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            num_frames,
            clock_hand: AtomicUsize::new(0),
        }
    }

    /// Finds a frame to evict using the clock algorithm.
    ///
    /// Returns `None` if every frame is pinned or empty. The sweep covers
    /// each frame at most twice so reference bits get one chance to clear.
    pub fn find_victim(&self, frames: &[Arc<BufferFrame>]) -> Option<FrameId> {
        let max_sweeps = 2 * self.num_frames;

        for _ in 0..max_sweeps {
            let pos = self.advance_hand();
            let frame = &frames[pos];

            if frame.is_pinned() || frame.is_empty() {
                continue;
            }

            if frame.ref_bit() {
                frame.clear_ref_bit();
                continue;
            }

            return Some(FrameId::new(pos));
        }

        None
    }

    /// Finds a free (empty) frame.
    pub fn find_free_frame(&self, frames: &[Arc<BufferFrame>]) -> Option<FrameId> {
        let start = self.clock_hand.load(Ordering::Relaxed);

        (0..self.num_frames)
            .map(|i| (start + i) % self.num_frames)
            .find(|&pos| frames[pos].is_empty() && !frames[pos].is_pinned())
            .map(FrameId::new)
    }

    /// Advances the clock hand and returns the previous position.
    #[inline]
    fn advance_hand(&self) -> usize {
        loop {
            let current = self.clock_hand.load(Ordering::Relaxed);
            let next = (current + 1) % self.num_frames;
            if self
                .clock_hand
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return current;
            }
        }
    }

    /// Returns the current clock hand position.
    #[inline]
    pub fn hand_position(&self) -> usize {
        self.clock_hand.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ClockReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockReplacer")
            .field("num_frames", &self.num_frames)
            .field("clock_hand", &self.hand_position())
            .finish()
    }
}
