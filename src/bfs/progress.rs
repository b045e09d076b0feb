//! Queue-length bookkeeping shared by the host and the workers.
//!
//! Every phase gets a monotonically increasing *queue index* `q`. The table
//! keeps four slots; phase `q` reads `length[q & 3]`, appends to
//! `length[(q + 1) & 3]`, and its group 0 clears slot `(q + 2) & 3` for the
//! phase after next. A slot is never cleared while a phase can still read or
//! append to it.

use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

const SLOTS: usize = 4;

#[inline]
fn slot(queue_index: u64) -> usize {
    (queue_index & (SLOTS as u64 - 1)) as usize
}

#[derive(Default)]
struct Slot {
    length: AtomicUsize,
    steal: AtomicUsize,
    finished: AtomicUsize,
}

/// Per-phase queue lengths, steal counters and group-completion counters.
pub struct WorkProgress {
    slots: [CachePadded<Slot>; SLOTS],
}

impl Default for WorkProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkProgress {
    /// A table in the initial search state: the edge frontier of phase 0
    /// holds exactly the source.
    pub fn new() -> Self {
        let progress = Self {
            slots: core::array::from_fn(|_| CachePadded::new(Slot::default())),
        };
        progress.reset();
        progress
    }

    /// Returns the table to the initial search state.
    pub fn reset(&self) {
        for s in &self.slots {
            s.length.store(0, Ordering::Relaxed);
            s.steal.store(0, Ordering::Relaxed);
            s.finished.store(0, Ordering::Relaxed);
        }
        self.slots[0].length.store(1, Ordering::Release);
    }

    /// Input length of phase `queue_index`.
    #[inline]
    pub fn queue_length(&self, queue_index: u64) -> usize {
        self.slots[slot(queue_index)].length.load(Ordering::Acquire)
    }

    /// Reserves `count` output positions in the frontier read by phase
    /// `queue_index`; returns the first one.
    #[inline]
    pub(crate) fn enqueue(&self, queue_index: u64, count: usize) -> usize {
        self.slots[slot(queue_index)]
            .length
            .fetch_add(count, Ordering::AcqRel)
    }

    /// Claims `count` input positions of phase `queue_index`; returns the first.
    #[inline]
    pub(crate) fn steal(&self, queue_index: u64, count: usize) -> usize {
        self.slots[slot(queue_index)]
            .steal
            .fetch_add(count, Ordering::Relaxed)
    }

    /// Marks one group of phase `queue_index` finished; true for the last of `grid`.
    #[inline]
    pub(crate) fn finish_group(&self, queue_index: u64, grid: usize) -> bool {
        self.slots[slot(queue_index)]
            .finished
            .fetch_add(1, Ordering::AcqRel)
            + 1
            == grid
    }

    /// Clears every counter of slot `queue_index`.
    #[inline]
    pub(crate) fn reset_slot(&self, queue_index: u64) {
        let s = &self.slots[slot(queue_index)];
        s.length.store(0, Ordering::Relaxed);
        s.steal.store(0, Ordering::Relaxed);
        s.finished.store(0, Ordering::Relaxed);
    }
}
