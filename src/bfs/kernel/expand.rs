//! Expand: vertex frontier in, edge frontier of candidate neighbors out.
//!
//! Adjacency lists are gathered at one of three granularities depending on
//! their length. Long lists are split into strips as wide as the group, medium
//! lists into warp-wide strips, and each strip is reserved and written on its
//! own. Short lists are staged for the whole tile and written with a single
//! reservation. Neighbors the visited view already shows are dropped.

use core::sync::atomic::Ordering;

use crate::bfs::kernel::distribution::for_each_tile;
use crate::bfs::kernel::{emit, PhaseArgs, SearchState};
use crate::bfs::policy::KernelPolicy;
use crate::error::EnactError;
use crate::graph::problem::selector;
use crate::graph::VertexId;

pub(crate) const NAME: &str = "expand";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gather {
    Group,
    Warp,
    Scan,
}

fn classify(degree: usize, policy: &KernelPolicy) -> Gather {
    if degree >= policy.cta_gather_threshold {
        Gather::Group
    } else if degree >= policy.warp_gather_threshold {
        Gather::Warp
    } else {
        Gather::Scan
    }
}

fn collect(
    state: &SearchState<'_, '_, '_>,
    neighbors: &[VertexId],
    parent: VertexId,
    out: &mut Vec<(VertexId, VertexId)>,
) {
    out.extend(
        neighbors
            .iter()
            .filter(|&&n| !state.visited.probably_visited(n))
            .map(|&n| (n, parent)),
    );
}

/// One group's share of an expand phase.
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
    let columns = state.problem.graph().column_indices();

    let mut staged = Vec::with_capacity(policy.tile_elements());
    let mut strip = Vec::with_capacity(policy.threads().max(state.warp_lanes));
    let mut emitted = 0usize;
    for_each_tile(policy, state.progress, q, len, args.grid, args.group, |tile| {
        staged.clear();
        for i in tile {
            let vertex = keys[i].load(Ordering::Relaxed);
            let (begin, end) = state.row_offsets.row(vertex);
            let row = &columns[begin..end];
            let width = match classify(row.len(), policy) {
                Gather::Group => policy.threads(),
                Gather::Warp => state.warp_lanes,
                Gather::Scan => {
                    collect(state, row, vertex, &mut staged);
                    continue;
                }
            };
            for chunk in row.chunks(width.max(1)) {
                strip.clear();
                collect(state, chunk, vertex, &mut strip);
                emitted += emit(state, q + 1, &strip)?;
            }
        }
        emitted += emit(state, q + 1, &staged)?;
        Ok(())
    })?;

    state.stats.add_queued(args.group, emitted);
    Ok(())
}
