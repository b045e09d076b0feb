//! A software global barrier across co-resident worker groups.
//!
//! The fused search synchronizes *every* worker group between its contract and
//! expand phases without leaving the dispatch. The barrier is a generation
//! counter: the last group to arrive resets the arrival count and bumps the
//! generation; everyone else spins (with backoff) until the generation moves.
//!
//! A group that has not been scheduled can never arrive, so the barrier is only
//! valid when every participant is guaranteed to be running concurrently. The
//! enactor checks that before dispatch; this type cannot.

use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

use crate::error::{ConfigError, EnactError};

struct BarrierState {
    participants: usize,
    arrived: CachePadded<AtomicUsize>,
    generation: CachePadded<AtomicUsize>,
}

/// Owner of the barrier state, allocated lazily and reused across searches.
#[derive(Default)]
pub struct GlobalBarrierLifetime {
    state: Option<Box<BarrierState>>,
}

impl GlobalBarrierLifetime {
    /// Creates an empty lifetime; nothing is allocated until [`setup`](Self::setup).
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the barrier for exactly `groups` participants.
    ///
    /// Re-uses the existing allocation when the participant count matches,
    /// otherwise replaces it. Either way the arrival count starts at zero.
    ///
    /// # Errors
    /// `InvalidConfiguration(EmptyGrid)` if `groups == 0`.
    pub fn setup(&mut self, groups: usize) -> Result<(), EnactError> {
        if groups == 0 {
            return Err(EnactError::InvalidConfiguration(ConfigError::EmptyGrid));
        }
        match &mut self.state {
            Some(state) if state.participants == groups => {
                state.arrived.store(0, Ordering::Relaxed);
            }
            slot => {
                tracing::trace!(groups, "allocating global barrier");
                *slot = Some(Box::new(BarrierState {
                    participants: groups,
                    arrived: CachePadded::new(AtomicUsize::new(0)),
                    generation: CachePadded::new(AtomicUsize::new(0)),
                }));
            }
        }
        Ok(())
    }

    /// Returns a handle for the workers, if [`setup`](Self::setup) has run.
    pub fn barrier(&self) -> Option<GlobalBarrier<'_>> {
        self.state.as_deref().map(|state| GlobalBarrier { state })
    }

    /// Whether barrier state is currently allocated.
    pub fn is_allocated(&self) -> bool {
        self.state.is_some()
    }

    /// Releases the barrier state.
    pub fn release(&mut self) {
        self.state = None;
    }
}

/// Worker-side handle to an allocated barrier.
#[derive(Clone, Copy)]
pub struct GlobalBarrier<'a> {
    state: &'a BarrierState,
}

impl GlobalBarrier<'_> {
    /// Number of groups that must arrive before anyone proceeds.
    pub fn participants(&self) -> usize {
        self.state.participants
    }

    /// Blocks until all participants have arrived.
    ///
    /// Everything a group wrote before calling `sync` is visible to every
    /// group after `sync` returns.
    pub fn sync(&self) {
        let state = self.state;
        // Must be read before arriving: the generation cannot advance until we do.
        let generation = state.generation.load(Ordering::Acquire);
        if state.arrived.fetch_add(1, Ordering::AcqRel) + 1 == state.participants {
            state.arrived.store(0, Ordering::Relaxed);
            state.generation.fetch_add(1, Ordering::Release);
        } else {
            let backoff = Backoff::new();
            while state.generation.load(Ordering::Acquire) == generation {
                backoff.snooze();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_rejects_empty_grid() {
        let mut lifetime = GlobalBarrierLifetime::new();
        assert!(lifetime.setup(0).is_err());
        assert!(!lifetime.is_allocated());
    }

    #[test]
    fn phases_never_overlap() {
        const GROUPS: usize = 6;
        const ROUNDS: usize = 200;
        let mut lifetime = GlobalBarrierLifetime::new();
        lifetime.setup(GROUPS).unwrap();
        let barrier = lifetime.barrier().unwrap();
        let counter = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..GROUPS {
                s.spawn(|| {
                    for round in 0..ROUNDS {
                        counter.fetch_add(1, Ordering::Relaxed);
                        barrier.sync();
                        // Every group has incremented exactly `round + 1` times.
                        assert_eq!(counter.load(Ordering::Relaxed), GROUPS * (round + 1));
                        barrier.sync();
                    }
                });
            }
        });
        assert_eq!(counter.load(Ordering::Relaxed), GROUPS * ROUNDS);
    }

    #[test]
    fn setup_reuses_matching_allocation() {
        let mut lifetime = GlobalBarrierLifetime::new();
        lifetime.setup(2).unwrap();
        let first = lifetime.barrier().unwrap().state as *const BarrierState;
        lifetime.setup(2).unwrap();
        let second = lifetime.barrier().unwrap().state as *const BarrierState;
        assert_eq!(first, second);
        lifetime.setup(3).unwrap();
        assert_eq!(lifetime.barrier().unwrap().participants(), 3);
    }
}
