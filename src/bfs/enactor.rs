//! The enactor: owns the per-device resources a search needs and drives the
//! iterative two-phase loop.
//!
//! The control thread enqueues contract and expand dispatches on an in-order
//! [`Stream`] and only blocks where it must: at the throttle point, after
//! every phase when instrumenting or debugging, and once at the end. The
//! fused single-dispatch variant lives in [`super::fused`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::bfs::handshake::Handshake;
use crate::bfs::kernel::{contract, dispatch_grid, expand, PhaseArgs, SearchState};
use crate::bfs::policy::{TuningPolicy, TuningRegistry};
use crate::bfs::progress::WorkProgress;
use crate::bfs::stats::{Accumulated, EnactorStats, KernelStatsLifetime, LevelStats};
use crate::concurrency::sync::GlobalBarrierLifetime;
use crate::device::{Device, Event, RowOffsetsView, Stream, VisitedView};
use crate::error::{ConfigError, EnactResult, Status};
use crate::graph::{BfsProblem, VertexId};
use crate::token::GhostBorrowMut;

/// Host-side behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnactorConfig {
    /// Synchronize and log after every dispatch.
    pub debug: bool,
    /// Synchronize after every phase and keep per-level statistics.
    pub instrument: bool,
    /// Let the host run up to a level ahead of the workers. When off, the
    /// host synchronizes after every contract.
    pub throttle: bool,
}

impl Default for EnactorConfig {
    fn default() -> Self {
        Self {
            debug: false,
            instrument: false,
            throttle: true,
        }
    }
}

impl EnactorConfig {
    /// Sets [`debug`](Self::debug).
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets [`instrument`](Self::instrument).
    pub fn with_instrument(mut self, instrument: bool) -> Self {
        self.instrument = instrument;
        self
    }

    /// Sets [`throttle`](Self::throttle).
    pub fn with_throttle(mut self, throttle: bool) -> Self {
        self.throttle = throttle;
        self
    }
}

/// What a finished search leaves behind for [`Enactor::statistics`].
#[derive(Debug, Default)]
pub(crate) struct SearchOutcome {
    pub iteration: u64,
    pub queue_index: u64,
    /// Phases put on the stream, including speculative ones past `done`.
    pub issued: u64,
    pub totals: Accumulated,
    pub history: Vec<LevelStats>,
}

/// Drives BFS searches over [`BfsProblem`]s.
///
/// Handshake flags, the work-progress table, statistics slots and the global
/// barrier are allocated on first use and reused by later searches; they are
/// released when the enactor is dropped.
pub struct Enactor {
    pub(crate) config: EnactorConfig,
    pub(crate) device: Device,
    pub(crate) registry: TuningRegistry,
    handshake: Option<Box<Handshake>>,
    progress: Option<Box<WorkProgress>>,
    stats: KernelStatsLifetime,
    barrier: GlobalBarrierLifetime,
    outcome: SearchOutcome,
    last_status: Status,
}

impl Enactor {
    /// An enactor for the host device with the built-in tuning registry.
    pub fn new(debug: bool) -> Self {
        Self::with_config(EnactorConfig::default().with_debug(debug))
    }

    /// An enactor with explicit host-side settings.
    pub fn with_config(config: EnactorConfig) -> Self {
        Self {
            config,
            device: Device::host(),
            registry: TuningRegistry::builtin(),
            handshake: None,
            progress: None,
            stats: KernelStatsLifetime::new(),
            barrier: GlobalBarrierLifetime::new(),
            outcome: SearchOutcome::default(),
            last_status: Status::Success,
        }
    }

    /// Replaces the device description.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Replaces the tuning registry.
    pub fn with_registry(mut self, registry: TuningRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Host-side settings.
    pub fn config(&self) -> &EnactorConfig {
        &self.config
    }

    /// The device searches are sized for.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The tuning registry.
    pub fn registry(&self) -> &TuningRegistry {
        &self.registry
    }

    /// Status of the most recent search.
    pub fn last_status(&self) -> Status {
        self.last_status
    }

    /// Prepares resources for a search over `problem`.
    ///
    /// Allocates the handshake, work-progress table, statistics slots (for
    /// `max(primary_grid, secondary_grid)` groups) and a global barrier for
    /// `primary_grid` groups on first use; later calls reuse them. Every call
    /// resets the handshake, the progress table and the search totals, and
    /// binds the row offsets and visited mask as lookup views.
    ///
    /// # Errors
    /// - `InvalidConfiguration(EmptyGrid)` if `primary_grid == 0`;
    /// - `AllocationFailure` if statistics slots cannot be reserved;
    /// - `BindingFailure` if a lookup view exceeds the device's limit.
    pub fn setup<'a, 'g, 'brand>(
        &'a mut self,
        problem: &'a BfsProblem<'g, 'brand>,
        primary_grid: usize,
        secondary_grid: usize,
    ) -> EnactResult<SearchState<'a, 'g, 'brand>> {
        if primary_grid == 0 {
            return Err(ConfigError::EmptyGrid.into());
        }
        let Self {
            device,
            handshake,
            progress,
            stats,
            barrier,
            outcome,
            ..
        } = self;

        let handshake: &'a Handshake = handshake.get_or_insert_with(|| {
            trace!("allocating handshake");
            Box::new(Handshake::new())
        });
        handshake.reset();
        let progress: &'a WorkProgress = progress.get_or_insert_with(|| {
            trace!("allocating work-progress table");
            Box::new(WorkProgress::new())
        });
        progress.reset();
        stats.setup(primary_grid.max(secondary_grid))?;
        barrier.setup(primary_grid)?;
        *outcome = SearchOutcome::default();

        let props = device.props();
        let row_offsets = RowOffsetsView::bind(problem.graph().row_offsets(), props)?;
        let visited = VisitedView::bind(problem.visited(), props)?;
        let warp_lanes = props.warp_lanes;

        let stats: &'a KernelStatsLifetime = stats;
        let barrier: &'a GlobalBarrierLifetime = barrier;
        Ok(SearchState {
            problem,
            row_offsets,
            visited,
            progress,
            handshake,
            stats,
            barrier: barrier.barrier(),
            warp_lanes,
        })
    }

    /// Runs a BFS from `source` as a sequence of contract and expand
    /// dispatches.
    ///
    /// `max_grid_size` caps the groups per dispatch (`0` for the device
    /// default). Labels are readable through the token once this returns.
    ///
    /// # Errors
    /// Configuration errors are reported before anything is dispatched.
    /// The first dispatch failure aborts the search and is returned.
    pub fn enact_iterative_search<'brand, T: GhostBorrowMut<'brand>>(
        &mut self,
        token: &mut T,
        problem: &BfsProblem<'_, 'brand>,
        source: VertexId,
        max_grid_size: usize,
    ) -> EnactResult<()> {
        let _ = token;
        let result = self.iterative_search(problem, source, max_grid_size);
        self.record(result)
    }

    fn iterative_search(
        &mut self,
        problem: &BfsProblem<'_, '_>,
        source: VertexId,
        max_grid_size: usize,
    ) -> EnactResult<()> {
        let policy = self.registry.select(self.device.props().arch, self.config.instrument)?;
        let contract_grid = self.device.grid_size(policy.contract.cta_occupancy, max_grid_size);
        let expand_grid = self.device.grid_size(policy.expand.cta_occupancy, max_grid_size);
        problem.reset(source)?;
        info!(
            source,
            contract_grid,
            expand_grid,
            arch = %policy.arch,
            instrument = policy.instrument,
            "starting iterative search"
        );

        let config = self.config;
        let state = self.setup(problem, contract_grid, expand_grid)?;
        let outcome = run_iterative(&state, &policy, config, contract_grid, expand_grid)?;
        self.finish("iterative", outcome);
        Ok(())
    }

    pub(crate) fn finish(&mut self, variant: &'static str, outcome: SearchOutcome) {
        self.outcome = outcome;
        let stats = self.statistics();
        info!(
            variant,
            depth = stats.search_depth,
            total_queued = stats.total_queued,
            avg_duty = stats.avg_duty,
            "search complete"
        );
    }

    pub(crate) fn record(&mut self, result: EnactResult<()>) -> EnactResult<()> {
        self.last_status = Status::from_result(&result);
        if let Err(error) = &result {
            warn!(%error, status = ?self.last_status, "search failed");
        }
        result
    }

    /// Summary of the most recent successful search.
    ///
    /// Searches return only after every dispatch has completed, so the
    /// numbers are final.
    pub fn statistics(&self) -> EnactorStats {
        EnactorStats::from_totals(self.outcome.iteration, self.outcome.totals)
    }

    /// Per-level records of the most recent instrumented search.
    pub fn level_history(&self) -> &[LevelStats] {
        &self.outcome.history
    }

    /// Queue index reached by the most recent search.
    pub fn queue_index(&self) -> u64 {
        self.outcome.queue_index
    }

    /// Iteration at which the most recent search terminated.
    pub fn iteration(&self) -> u64 {
        self.outcome.iteration
    }

    /// Frees every device-side resource. The next setup allocates afresh.
    pub fn release(&mut self) {
        let allocated = self.handshake.is_some()
            || self.progress.is_some()
            || self.stats.capacity() > 0
            || self.barrier.is_allocated();
        if self.last_status != Status::Success {
            warn!(status = ?self.last_status, "releasing enactor after a failed search");
        }
        self.handshake = None;
        self.progress = None;
        self.stats.release();
        self.barrier.release();
        if allocated {
            debug!("enactor resources released");
        }
    }
}

impl Default for Enactor {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Drop for Enactor {
    fn drop(&mut self) {
        self.release();
    }
}

fn run_iterative(
    state: &SearchState<'_, '_, '_>,
    policy: &TuningPolicy,
    config: EnactorConfig,
    contract_grid: usize,
    expand_grid: usize,
) -> EnactResult<SearchOutcome> {
    Stream::scoped(|stream| {
        let mut outcome = SearchOutcome::default();
        let mut queue_index = 0u64;
        let mut iteration = 0u64;
        let mut throttle: Option<Event> = None;
        let sync_every_phase = policy.instrument || config.debug;

        loop {
            let contract_args = PhaseArgs {
                queue_index,
                iteration,
                grid: contract_grid,
                group: 0,
            };
            let kernel = &policy.contract;
            stream.launch(contract::NAME, move || {
                dispatch_grid(state.stats, contract_grid, |group| {
                    contract::run(state, kernel, contract_args.for_group(group))
                })
            })?;
            queue_index += 1;

            let mut level = None;
            if sync_every_phase {
                stream.synchronize()?;
            }
            if policy.instrument {
                let phase = state.stats.accumulate(contract_grid);
                outcome.totals += phase;
                level = Some(LevelStats {
                    level: iteration,
                    queue_index: contract_args.queue_index,
                    vertices: state.progress.queue_length(queue_index),
                    edges: 0,
                    busy_ns: phase.busy_ns,
                    elapsed_ns: phase.elapsed_ns,
                });
            } else if !config.throttle {
                stream.synchronize()?;
            } else if let Some(previous) = throttle.replace(stream.record()) {
                // Blocks on the contract one level back; at most one level is
                // ever in flight past a contract that found an empty frontier.
                stream.wait(previous)?;
            }

            if let Some(done) = state.handshake.done() {
                iteration = done;
                break;
            }

            let expand_args = PhaseArgs {
                queue_index,
                iteration,
                grid: expand_grid,
                group: 0,
            };
            let kernel = &policy.expand;
            stream.launch(expand::NAME, move || {
                dispatch_grid(state.stats, expand_grid, |group| {
                    expand::sweep(state, kernel, expand_args.for_group(group))
                })
            })?;
            queue_index += 1;

            if sync_every_phase {
                stream.synchronize()?;
            }
            if let Some(mut level) = level {
                let phase = state.stats.accumulate(expand_grid);
                outcome.totals += phase;
                level.edges = state.progress.queue_length(queue_index);
                level.busy_ns += phase.busy_ns;
                level.elapsed_ns += phase.elapsed_ns;
                outcome.history.push(level);
            }
            if config.debug {
                debug!(
                    level = iteration,
                    queue_index = contract_args.queue_index,
                    vertices = state.progress.queue_length(expand_args.queue_index),
                    edges = state.progress.queue_length(queue_index),
                    "level complete"
                );
            }

            iteration = state.handshake.advance();
        }

        stream.synchronize()?;
        if !policy.instrument {
            outcome.totals += state.stats.accumulate(contract_grid.max(expand_grid));
        }
        state.handshake.set_iteration(iteration);
        outcome.iteration = iteration;
        outcome.queue_index = 2 * iteration + 1;
        outcome.issued = queue_index;
        Ok(outcome)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CsrGraph, ProblemConfig};
    use crate::GhostToken;

    #[test]
    fn config_defaults_and_serde() {
        let config = EnactorConfig::default();
        assert!(config.throttle);
        assert!(!config.debug && !config.instrument);
        let parsed: EnactorConfig = serde_json::from_str(r#"{"instrument": true}"#).unwrap();
        assert_eq!(parsed, EnactorConfig::default().with_instrument(true));
    }

    #[test]
    fn setup_is_idempotent_and_rejects_empty_grid() {
        GhostToken::new(|_token| {
            let g = CsrGraph::from_undirected_edges(3, &[(0, 1), (1, 2)]);
            let p = BfsProblem::new(&g, ProblemConfig::default()).unwrap();
            let mut enactor = Enactor::new(false);
            assert!(enactor.setup(&p, 0, 4).is_err());
            for _ in 0..2 {
                let state = enactor.setup(&p, 2, 4).unwrap();
                assert_eq!(state.progress().queue_length(0), 1);
                assert_eq!(state.handshake().done(), None);
                assert_eq!(state.handshake().iteration(), 0);
            }
            assert_eq!(enactor.stats.capacity(), 4);
            assert!(enactor.barrier.is_allocated());
            enactor.release();
            assert!(enactor.handshake.is_none());
        });
    }

    #[test]
    fn path_graph_levels() {
        GhostToken::new(|mut token| {
            let g = CsrGraph::from_undirected_edges(4, &[(0, 1), (1, 2), (2, 3)]);
            let p = BfsProblem::new(&g, ProblemConfig::default()).unwrap();
            let mut enactor = Enactor::with_config(EnactorConfig::default().with_throttle(false));
            enactor.enact_iterative_search(&mut token, &p, 0, 2).unwrap();
            assert_eq!(p.labels(&token), vec![0, 1, 2, 3]);
            assert_eq!(enactor.statistics().search_depth, 3);
            assert_eq!(enactor.iteration(), 4);
            assert_eq!(enactor.queue_index(), 9);
            assert_eq!(enactor.last_status(), Status::Success);
        });
    }

    #[test]
    fn throttled_search_runs_at_most_one_level_ahead() {
        let edges: Vec<(u32, u32)> = (0..63).map(|v| (v, v + 1)).collect();
        let g = CsrGraph::from_undirected_edges(64, &edges);
        GhostToken::new(|mut token| {
            let p = BfsProblem::new(&g, ProblemConfig::default()).unwrap();
            let mut enactor = Enactor::with_config(EnactorConfig::default());
            for _ in 0..20 {
                enactor.enact_iterative_search(&mut token, &p, 0, 0).unwrap();
                assert_eq!(enactor.iteration(), 64);
                assert_eq!(enactor.queue_index(), 129);
                // Contract 64 found nothing; only expand 64 and contract 65
                // may have been issued behind it.
                assert!(enactor.outcome.issued <= 2 * 64 + 3, "issued {}", enactor.outcome.issued);
                assert_eq!(enactor.statistics().search_depth, 63);
                assert_eq!(p.labels(&token)[63], 63);
            }
        });
    }
}
