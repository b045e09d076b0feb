//! Contract: edge frontier in, deduplicated vertex frontier out.
//!
//! Every candidate is first culled against the bound visited view, then
//! claimed with an atomic test-and-set on the visited mask. Exactly one claim
//! per vertex succeeds; the winner writes the vertex's label (and predecessor)
//! and keeps it in the output frontier.

use core::sync::atomic::Ordering;

use crate::bfs::kernel::distribution::for_each_tile;
use crate::bfs::kernel::{emit, PhaseArgs, SearchState};
use crate::bfs::policy::KernelPolicy;
use crate::error::EnactError;
use crate::graph::problem::selector;
use crate::graph::{VertexId, INVALID_PREDECESSOR};

pub(crate) const NAME: &str = "contract";

/// One group's share of a contract phase.
pub(crate) fn sweep(
    state: &SearchState<'_, '_, '_>,
    policy: &KernelPolicy,
    args: PhaseArgs,
) -> Result<(), EnactError> {
    let q = args.queue_index;
    if args.group == 0 {
        state.progress.reset_slot(q + 2);
    }

    let queues = state.problem.queues();
    let input = selector(q);
    let len = state.progress.queue_length(q).min(queues.capacity(input));
    let keys = queues.keys(input);
    let in_preds = queues.preds(input);
    let labels = state.problem.label_cells();
    let preds = state.problem.pred_cells();
    let mask = state.problem.visited();
    // Levels never exceed the vertex count, which fits a label.
    #[allow(clippy::cast_possible_truncation)]
    let label = args.iteration as u32;

    let mut survivors: Vec<(VertexId, VertexId)> = Vec::with_capacity(policy.tile_elements());
    for_each_tile(policy, state.progress, q, len, args.grid, args.group, |tile| {
        survivors.clear();
        for i in tile {
            let vertex = keys[i].load(Ordering::Relaxed);
            if state.visited.probably_visited(vertex) {
                continue;
            }
            if !mask.test_and_set(vertex as usize, Ordering::AcqRel) {
                continue;
            }
            labels[vertex as usize].store(label, Ordering::Relaxed);
            let pred = in_preds.map_or(INVALID_PREDECESSOR, |p| p[i].load(Ordering::Relaxed));
            if let Some(preds) = preds {
                preds[vertex as usize].store(pred, Ordering::Relaxed);
            }
            survivors.push((vertex, pred));
        }
        emit(state, q + 1, &survivors).map(drop)
    })
}

/// A contract phase as its own dispatch.
///
/// The last group to finish checks the output length and raises the done
/// flag when nothing new was discovered.
pub(crate) fn run(
    state: &SearchState<'_, '_, '_>,
    policy: &KernelPolicy,
    args: PhaseArgs,
) -> Result<(), EnactError> {
    sweep(state, policy, args)?;
    let q = args.queue_index;
    if state.progress.finish_group(q, args.grid) && state.progress.queue_length(q + 1) == 0 {
        state.handshake.signal_done(args.iteration);
    }
    Ok(())
}
