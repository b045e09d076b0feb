//! Host/worker handshake: the done flag and the iteration counter.

use core::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Value of the done flag while the search is still running.
pub const NOT_DONE: u64 = u64::MAX;

/// Shared flags the host polls between dispatches.
///
/// `done` holds the iteration of the contract that produced an empty vertex
/// frontier. The first writer wins, so speculatively issued phases that also
/// find nothing cannot move it.
pub struct Handshake {
    done: CachePadded<AtomicU64>,
    iteration: CachePadded<AtomicU64>,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

impl Handshake {
    /// A handshake in the "running, iteration 0" state.
    pub fn new() -> Self {
        Self {
            done: CachePadded::new(AtomicU64::new(NOT_DONE)),
            iteration: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Returns to the "running, iteration 0" state.
    pub fn reset(&self) {
        self.done.store(NOT_DONE, Ordering::Relaxed);
        self.iteration.store(0, Ordering::Release);
    }

    /// Iteration of the terminating contract, once some worker has seen it.
    #[inline]
    pub fn done(&self) -> Option<u64> {
        match self.done.load(Ordering::Acquire) {
            NOT_DONE => None,
            iteration => Some(iteration),
        }
    }

    /// Records termination at `iteration`. Returns false if already recorded.
    #[inline]
    pub fn signal_done(&self, iteration: u64) -> bool {
        self.done
            .compare_exchange(NOT_DONE, iteration, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Current iteration.
    #[inline]
    pub fn iteration(&self) -> u64 {
        self.iteration.load(Ordering::Acquire)
    }

    /// Overwrites the iteration counter.
    #[inline]
    pub fn set_iteration(&self, iteration: u64) {
        self.iteration.store(iteration, Ordering::Release);
    }

    /// Advances to the next iteration and returns it.
    #[inline]
    pub fn advance(&self) -> u64 {
        self.iteration.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_done_signal_wins() {
        let h = Handshake::new();
        assert_eq!(h.done(), None);
        assert!(h.signal_done(4));
        assert!(!h.signal_done(5));
        assert_eq!(h.done(), Some(4));
        h.reset();
        assert_eq!(h.done(), None);
    }

    #[test]
    fn iteration_counter() {
        let h = Handshake::new();
        assert_eq!(h.advance(), 1);
        assert_eq!(h.advance(), 2);
        h.set_iteration(7);
        assert_eq!(h.iteration(), 7);
        h.reset();
        assert_eq!(h.iteration(), 0);
    }
}
