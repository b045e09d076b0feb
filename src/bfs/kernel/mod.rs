//! The two BFS phases and the machinery they share.
//!
//! A phase runs as a grid of worker groups. Each group processes its share of
//! the input frontier in tiles and appends results to the output frontier
//! with one reservation per batch. In the iterative search every phase is its
//! own dispatch over a rayon pool; in the fused search the same phase bodies
//! run on persistent threads separated by a global barrier.

pub(crate) mod contract;
pub(crate) mod distribution;
pub(crate) mod expand;

use core::sync::atomic::Ordering;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use std::time::Instant;

use rayon::prelude::*;

use crate::bfs::handshake::Handshake;
use crate::bfs::progress::WorkProgress;
use crate::bfs::stats::{GroupTimer, KernelStatsLifetime};
use crate::concurrency::sync::GlobalBarrier;
use crate::device::stream::panic_message;
use crate::device::{RowOffsetsView, VisitedView};
use crate::error::{ConfigError, EnactError};
use crate::graph::problem::selector;
use crate::graph::{BfsProblem, VertexId};

/// Device-side bindings for one search, produced by
/// [`Enactor::setup`](crate::Enactor::setup).
///
/// Holds the bound lookup views and shared references to the enactor's
/// handshake, progress table, statistics and barrier.
pub struct SearchState<'a, 'g, 'brand> {
    pub(crate) problem: &'a BfsProblem<'g, 'brand>,
    pub(crate) row_offsets: RowOffsetsView<'a>,
    pub(crate) visited: VisitedView<'a, 'brand>,
    pub(crate) progress: &'a WorkProgress,
    pub(crate) handshake: &'a Handshake,
    pub(crate) stats: &'a KernelStatsLifetime,
    pub(crate) barrier: Option<GlobalBarrier<'a>>,
    pub(crate) warp_lanes: usize,
}

impl SearchState<'_, '_, '_> {
    /// The progress table.
    pub fn progress(&self) -> &WorkProgress {
        self.progress
    }

    /// The handshake flags.
    pub fn handshake(&self) -> &Handshake {
        self.handshake
    }
}

/// What one group needs to know about the phase it is running.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PhaseArgs {
    pub queue_index: u64,
    pub iteration: u64,
    pub grid: usize,
    pub group: usize,
}

impl PhaseArgs {
    pub(crate) fn for_group(self, group: usize) -> Self {
        Self { group, ..self }
    }
}

/// Appends `items` (key, predecessor) to the frontier read by phase
/// `queue_index` with a single reservation.
///
/// # Errors
/// `QueueOverflow` if the reservation ends past the buffer's capacity.
pub(crate) fn emit(
    state: &SearchState<'_, '_, '_>,
    queue_index: u64,
    items: &[(VertexId, VertexId)],
) -> Result<usize, EnactError> {
    if items.is_empty() {
        return Ok(0);
    }
    let queues = state.problem.queues();
    let sel = selector(queue_index);
    let capacity = queues.capacity(sel);
    let base = state.progress.enqueue(queue_index, items.len());
    let end = base + items.len();
    if end > capacity {
        return Err(ConfigError::QueueOverflow {
            queue: queues.kind(sel),
            capacity,
            requested: end,
        }
        .into());
    }
    for (cell, &(key, _)) in queues.keys(sel)[base..end].iter().zip(items) {
        cell.store(key, Ordering::Relaxed);
    }
    if let Some(preds) = queues.preds(sel) {
        for (cell, &(_, pred)) in preds[base..end].iter().zip(items) {
            cell.store(pred, Ordering::Relaxed);
        }
    }
    Ok(items.len())
}

/// Runs `body` for every group of a `grid`-sized dispatch on the rayon pool,
/// timing each group.
pub(crate) fn dispatch_grid<F>(
    stats: &KernelStatsLifetime,
    grid: usize,
    body: F,
) -> Result<(), EnactError>
where
    F: Fn(usize) -> Result<(), EnactError> + Sync,
{
    let epoch = Instant::now();
    (0..grid).into_par_iter().try_for_each(|group| {
        let timer = GroupTimer::start(stats, group);
        let outcome = body(group);
        timer.stop(epoch);
        outcome
    })
}

/// First failure raised by any group of a fused dispatch.
#[derive(Default)]
pub(crate) struct FaultSlot(OnceLock<EnactError>);

impl FaultSlot {
    pub(crate) fn record(&self, fault: EnactError) {
        if self.0.set(fault).is_ok() {
            tracing::debug!("fused dispatch recorded a fault");
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.get().is_some()
    }

    pub(crate) fn into_result(self) -> Result<(), EnactError> {
        self.0.into_inner().map_or(Ok(()), Err)
    }

    /// Runs one phase body, recording an error or a panic instead of
    /// unwinding past the caller's next barrier.
    pub(crate) fn guard(&self, kernel: &'static str, body: impl FnOnce() -> Result<(), EnactError>) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|payload| {
            Err(EnactError::LaunchFailure {
                kernel,
                reason: panic_message(payload.as_ref()),
            })
        });
        if let Err(fault) = outcome {
            self.record(fault);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_slot_keeps_the_first_fault() {
        let slot = FaultSlot::default();
        slot.guard("a", || Ok(()));
        assert!(!slot.is_set());
        slot.guard("b", || panic!("first"));
        slot.guard("c", || Err(EnactError::SynchronizationFailure { reason: "second".into() }));
        assert_eq!(
            slot.into_result(),
            Err(EnactError::LaunchFailure { kernel: "b", reason: "first".into() })
        );
    }
}
