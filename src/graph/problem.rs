//! Per-search storage for one BFS problem.
//!
//! A [`BfsProblem`] owns everything a traversal mutates: the visited mask, the
//! label and predecessor arrays, and the ping-pong frontier buffers. All of it
//! is branded; searches need `&mut GhostToken<'brand>` and snapshots need
//! `&GhostToken<'brand>`.

use core::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};

use crate::concurrency::atomic::{GhostAtomicBitset, GhostAtomicU32};
use crate::error::{ConfigError, EnactError};
use crate::graph::csr::{CsrGraph, VertexId};
use crate::token::GhostBorrow;

/// Label of a vertex the search has not reached.
pub const UNVISITED: u32 = u32::MAX;
/// Predecessor of the source and of unreached vertices.
pub const INVALID_PREDECESSOR: VertexId = VertexId::MAX;

/// Sizing and output options for a problem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemConfig {
    /// Edge-frontier capacity as a multiple of the graph's edge count.
    pub queue_sizing: f64,
    /// Also record a BFS-tree parent for every reached vertex.
    pub mark_predecessors: bool,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            queue_sizing: 1.0,
            mark_predecessors: false,
        }
    }
}

impl ProblemConfig {
    /// Sets [`queue_sizing`](Self::queue_sizing).
    pub fn with_queue_sizing(mut self, queue_sizing: f64) -> Self {
        self.queue_sizing = queue_sizing;
        self
    }

    /// Enables predecessor marking.
    pub fn with_predecessors(mut self) -> Self {
        self.mark_predecessors = true;
        self
    }
}

type Cells<'brand> = Box<[GhostAtomicU32<'brand>]>;

fn alloc_cells<'brand>(what: &'static str, len: usize, init: u32) -> Result<Cells<'brand>, EnactError> {
    let mut cells = Vec::new();
    cells
        .try_reserve_exact(len)
        .map_err(|_| EnactError::AllocationFailure { what, requested: len })?;
    cells.extend((0..len).map(|_| GhostAtomicU32::new(init)));
    Ok(cells.into_boxed_slice())
}

/// Which half of the ping-pong pair a phase touches.
///
/// Phase `q` reads buffer `q & 1` and writes buffer `(q + 1) & 1`. Even phases
/// (contract) read the edge frontier and write the vertex frontier; odd phases
/// (expand) do the opposite.
#[inline]
pub(crate) fn selector(queue_index: u64) -> usize {
    (queue_index & 1) as usize
}

/// The double-buffered frontier: keys and, optionally, predecessor edges.
pub struct FrontierQueues<'brand> {
    keys: [Cells<'brand>; 2],
    preds: Option<[Cells<'brand>; 2]>,
}

impl<'brand> FrontierQueues<'brand> {
    const KINDS: [&'static str; 2] = ["edge", "vertex"];

    fn new(edge_capacity: usize, vertex_capacity: usize, mark_predecessors: bool) -> Result<Self, EnactError> {
        let keys = [
            alloc_cells("edge frontier", edge_capacity, 0)?,
            alloc_cells("vertex frontier", vertex_capacity, 0)?,
        ];
        let preds = if mark_predecessors {
            Some([
                alloc_cells("predecessor edge frontier", edge_capacity, INVALID_PREDECESSOR)?,
                alloc_cells("predecessor vertex frontier", vertex_capacity, INVALID_PREDECESSOR)?,
            ])
        } else {
            None
        };
        Ok(Self { keys, preds })
    }

    /// Capacity of buffer `selector`.
    pub fn capacity(&self, selector: usize) -> usize {
        self.keys[selector].len()
    }

    /// Name of the frontier stored in buffer `selector`.
    pub fn kind(&self, selector: usize) -> &'static str {
        Self::KINDS[selector]
    }

    pub(crate) fn keys(&self, selector: usize) -> &[GhostAtomicU32<'brand>] {
        &self.keys[selector]
    }

    pub(crate) fn preds(&self, selector: usize) -> Option<&[GhostAtomicU32<'brand>]> {
        self.preds.as_ref().map(|p| &*p[selector])
    }
}

/// Everything one search over `graph` reads and writes.
pub struct BfsProblem<'g, 'brand> {
    graph: &'g CsrGraph,
    config: ProblemConfig,
    visited: GhostAtomicBitset<'brand>,
    labels: Cells<'brand>,
    preds: Option<Cells<'brand>>,
    queues: FrontierQueues<'brand>,
}

impl<'g, 'brand> BfsProblem<'g, 'brand> {
    /// Allocates problem storage for `graph`.
    ///
    /// # Errors
    /// `AllocationFailure` if any array cannot be reserved.
    pub fn new(graph: &'g CsrGraph, config: ProblemConfig) -> Result<Self, EnactError> {
        let nodes = graph.node_count();
        // Truncation is intended: sizing is a fraction of the edge count.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let edge_capacity = ((graph.edge_count() as f64) * config.queue_sizing.max(0.0)).ceil() as usize;
        let edge_capacity = edge_capacity.max(1);
        let vertex_capacity = nodes.max(1);

        let visited = GhostAtomicBitset::try_new(nodes).map_err(|_| EnactError::AllocationFailure {
            what: "visited mask",
            requested: nodes,
        })?;
        let labels = alloc_cells("labels", nodes, UNVISITED)?;
        let preds = if config.mark_predecessors {
            Some(alloc_cells("predecessors", nodes, INVALID_PREDECESSOR)?)
        } else {
            None
        };
        let queues = FrontierQueues::new(edge_capacity, vertex_capacity, config.mark_predecessors)?;

        Ok(Self {
            graph,
            config,
            visited,
            labels,
            preds,
            queues,
        })
    }

    /// The graph being searched.
    pub fn graph(&self) -> &'g CsrGraph {
        self.graph
    }

    /// The configuration used at construction.
    pub fn config(&self) -> &ProblemConfig {
        &self.config
    }

    /// The frontier buffers.
    pub fn queues(&self) -> &FrontierQueues<'brand> {
        &self.queues
    }

    pub(crate) fn visited(&self) -> &GhostAtomicBitset<'brand> {
        &self.visited
    }

    pub(crate) fn label_cells(&self) -> &[GhostAtomicU32<'brand>] {
        &self.labels
    }

    pub(crate) fn pred_cells(&self) -> Option<&[GhostAtomicU32<'brand>]> {
        self.preds.as_deref()
    }

    /// Clears all per-search state and seeds the edge frontier with `source`.
    ///
    /// Only the enactor calls this, while it holds the exclusive token.
    pub(crate) fn reset(&self, source: VertexId) -> Result<(), EnactError> {
        let nodes = self.graph.node_count();
        if source as usize >= nodes {
            return Err(ConfigError::SourceOutOfRange { vertex: source, nodes }.into());
        }
        self.visited.clear_all();
        for label in self.labels.iter() {
            label.store(UNVISITED, Ordering::Relaxed);
        }
        if let Some(preds) = &self.preds {
            for pred in preds.iter() {
                pred.store(INVALID_PREDECESSOR, Ordering::Relaxed);
            }
        }
        self.queues.keys(0)[0].store(source, Ordering::Relaxed);
        if let Some(preds) = self.queues.preds(0) {
            preds[0].store(INVALID_PREDECESSOR, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Snapshot of the label array.
    pub fn labels<T: GhostBorrow<'brand>>(&self, token: &T) -> Vec<u32> {
        let _ = token;
        self.labels.iter().map(|l| l.load(Ordering::Acquire)).collect()
    }

    /// Snapshot of the predecessor array, if predecessors are marked.
    pub fn predecessors<T: GhostBorrow<'brand>>(&self, token: &T) -> Option<Vec<VertexId>> {
        let _ = token;
        self.preds
            .as_ref()
            .map(|p| p.iter().map(|c| c.load(Ordering::Acquire)).collect())
    }

    /// Number of vertices the last search reached.
    pub fn visited_count<T: GhostBorrow<'brand>>(&self, token: &T) -> usize {
        let _ = token;
        self.visited.count_ones()
    }
}
