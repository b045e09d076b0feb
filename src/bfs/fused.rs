//! Fused search: the whole BFS in one dispatch.
//!
//! Every worker group runs on its own thread for the lifetime of the search
//! and loops over levels, separated by the software global barrier:
//!
//! ```text
//! contract(q) -> barrier -> empty? stop -> expand(q + 1) -> barrier -> q += 2
//! ```
//!
//! The barrier is only sound when all groups are running at once, so the
//! requested grid is checked against the device's residency limit before
//! anything is launched.

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use crossbeam_utils::Backoff;
use tracing::{debug, info};

use crate::bfs::enactor::{Enactor, EnactorConfig, SearchOutcome};
use crate::bfs::kernel::{contract, expand, FaultSlot, PhaseArgs, SearchState};
use crate::bfs::policy::TuningPolicy;
use crate::bfs::stats::{GroupTimer, LevelStats};
use crate::concurrency::sync::GlobalBarrier;
use crate::device::Stream;
use crate::error::{ConfigError, EnactError, EnactResult};
use crate::graph::{BfsProblem, VertexId};
use crate::token::GhostBorrowMut;

const NAME: &str = "fused";

impl Enactor {
    /// Runs a BFS from `source` as a single dispatch of co-resident groups.
    ///
    /// `max_grid_size` is the number of groups (`0` for the device default,
    /// which is the residency limit of the fused policy).
    ///
    /// # Errors
    /// `InvalidConfiguration(Oversubscribed)` if `max_grid_size` exceeds the
    /// number of groups that can be resident at once; otherwise as
    /// [`enact_iterative_search`](Self::enact_iterative_search).
    pub fn enact_fused_search<'brand, T: GhostBorrowMut<'brand>>(
        &mut self,
        token: &mut T,
        problem: &BfsProblem<'_, 'brand>,
        source: VertexId,
        max_grid_size: usize,
    ) -> EnactResult<()> {
        let _ = token;
        let result = self.fused_search(problem, source, max_grid_size);
        self.record(result)
    }

    fn fused_search(
        &mut self,
        problem: &BfsProblem<'_, '_>,
        source: VertexId,
        max_grid_size: usize,
    ) -> EnactResult<()> {
        let policy = self.registry.select(self.device.props().arch, self.config.instrument)?;
        let limit = self.device.residency_limit(policy.fused.cta_occupancy);
        if max_grid_size > limit {
            return Err(ConfigError::Oversubscribed {
                requested: max_grid_size,
                limit,
            }
            .into());
        }
        let grid = self.device.grid_size(policy.fused.cta_occupancy, max_grid_size);
        problem.reset(source)?;
        info!(
            source,
            grid,
            arch = %policy.arch,
            instrument = policy.instrument,
            "starting fused search"
        );

        let config = self.config;
        let state = self.setup(problem, grid, 0)?;
        let outcome = run_fused(&state, &policy, config, grid)?;
        self.finish(NAME, outcome);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct GroupReport {
    iteration: u64,
    queue_index: u64,
    history: Vec<LevelStats>,
}

fn run_fused(
    state: &SearchState<'_, '_, '_>,
    policy: &TuningPolicy,
    config: EnactorConfig,
    grid: usize,
) -> EnactResult<SearchOutcome> {
    let barrier = state
        .barrier
        .filter(|b| b.participants() == grid)
        .ok_or_else(|| EnactError::SynchronizationFailure {
            reason: format!("global barrier is not set up for {grid} groups"),
        })?;

    let report = OnceLock::new();
    Stream::scoped(|stream| {
        let report = &report;
        stream.launch(NAME, move || {
            let r = dispatch(state, policy, config, grid, barrier)?;
            let _ = report.set(r);
            Ok(())
        })?;
        stream.synchronize()
    })?;
    let report: GroupReport = report.into_inner().ok_or_else(|| EnactError::SynchronizationFailure {
        reason: "fused dispatch completed without a report".to_owned(),
    })?;

    let iteration = state.handshake.done().unwrap_or(report.iteration);
    state.handshake.set_iteration(iteration);
    Ok(SearchOutcome {
        iteration,
        queue_index: report.queue_index,
        issued: report.queue_index,
        totals: state.stats.accumulate(grid),
        history: report.history,
    })
}

/// Start gate for the fused groups. Nobody enters the level loop until every
/// group thread exists, so a failed spawn cannot strand the others at a
/// barrier.
struct StartGate(AtomicU8);

impl StartGate {
    const PENDING: u8 = 0;
    const GO: u8 = 1;
    const ABORT: u8 = 2;

    fn new() -> Self {
        Self(AtomicU8::new(Self::PENDING))
    }

    fn open(&self, go: bool) {
        let state = if go { Self::GO } else { Self::ABORT };
        self.0.store(state, Ordering::Release);
    }

    fn wait(&self) -> bool {
        let backoff = Backoff::new();
        loop {
            match self.0.load(Ordering::Acquire) {
                Self::PENDING => backoff.snooze(),
                state => return state == Self::GO,
            }
        }
    }
}

fn dispatch(
    state: &SearchState<'_, '_, '_>,
    policy: &TuningPolicy,
    config: EnactorConfig,
    grid: usize,
    barrier: GlobalBarrier<'_>,
) -> EnactResult<GroupReport> {
    let fault = FaultSlot::default();
    let gate = StartGate::new();
    let epoch = Instant::now();

    let reports = std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(grid);
        let mut spawn_error = None;
        for group in 0..grid {
            let (fault, gate) = (&fault, &gate);
            let spawned = std::thread::Builder::new()
                .name(format!("bfs-group-{group}"))
                .spawn_scoped(scope, move || {
                    if !gate.wait() {
                        return GroupReport::default();
                    }
                    run_group(state, policy, config, barrier, fault, grid, group, epoch)
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    spawn_error = Some(EnactError::LaunchFailure {
                        kernel: NAME,
                        reason: format!("could not start group {group}: {e}"),
                    });
                    break;
                }
            }
        }
        gate.open(spawn_error.is_none());
        let joined: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
        (spawn_error, joined)
    });

    let (spawn_error, joined) = reports;
    if let Some(e) = spawn_error {
        return Err(e);
    }
    let mut group_zero = None;
    for (group, report) in joined.into_iter().enumerate() {
        match report {
            Ok(r) if group == 0 => group_zero = Some(r),
            Ok(_) => {}
            Err(_) => fault.record(EnactError::LaunchFailure {
                kernel: NAME,
                reason: format!("group {group} terminated abnormally"),
            }),
        }
    }
    fault.into_result()?;
    group_zero.ok_or_else(|| EnactError::LaunchFailure {
        kernel: NAME,
        reason: "group 0 produced no report".to_owned(),
    })
}

#[allow(clippy::too_many_arguments)]
fn run_group(
    state: &SearchState<'_, '_, '_>,
    policy: &TuningPolicy,
    config: EnactorConfig,
    barrier: GlobalBarrier<'_>,
    fault: &FaultSlot,
    grid: usize,
    group: usize,
    epoch: Instant,
) -> GroupReport {
    let kernel = &policy.fused;
    let mut report = GroupReport::default();
    let mut queue_index = 0u64;
    let mut iteration = 0u64;

    loop {
        let args = PhaseArgs {
            queue_index,
            iteration,
            grid,
            group,
        };
        let timer = GroupTimer::start(state.stats, group);
        fault.guard(NAME, || contract::sweep(state, kernel, args));
        timer.stop_busy();
        barrier.sync();
        if fault.is_set() {
            break;
        }

        let vertices = state.progress.queue_length(queue_index + 1);
        if vertices == 0 {
            if group == 0 {
                state.handshake.signal_done(iteration);
            }
            break;
        }

        let args = PhaseArgs {
            queue_index: queue_index + 1,
            ..args
        };
        let timer = GroupTimer::start(state.stats, group);
        fault.guard(NAME, || expand::sweep(state, kernel, args));
        timer.stop_busy();
        barrier.sync();
        if fault.is_set() {
            break;
        }

        if group == 0 {
            let edges = state.progress.queue_length(queue_index + 2);
            if policy.instrument {
                report.history.push(LevelStats {
                    level: iteration,
                    queue_index,
                    vertices,
                    edges,
                    busy_ns: 0,
                    elapsed_ns: 0,
                });
            }
            if config.debug {
                debug!(level = iteration, queue_index, vertices, edges, "fused level complete");
            }
            state.handshake.advance();
        }
        queue_index += 2;
        iteration += 1;
    }

    state.stats.add_elapsed(group, epoch.elapsed());
    report.iteration = iteration;
    report.queue_index = queue_index + 1;
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_gate_releases_or_aborts() {
        let gate = StartGate::new();
        std::thread::scope(|s| {
            let waiter = s.spawn(|| gate.wait());
            gate.open(true);
            assert!(waiter.join().unwrap());
        });
        let gate = StartGate::new();
        gate.open(false);
        assert!(!gate.wait());
    }
}
