//! Per-group timing and queue counters, and the summaries built from them.
//!
//! Each worker group owns one padded slot. Groups add to their slot while a
//! dispatch runs; the host drains the slots with
//! [`accumulate`](KernelStatsLifetime::accumulate) once the dispatch is known
//! to be complete.

use core::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use serde::Serialize;

use crate::error::EnactError;

#[inline]
fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[derive(Default)]
struct GroupSlot {
    busy: AtomicU64,
    elapsed: AtomicU64,
    queued: AtomicU64,
}

/// Totals drained from the per-group slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accumulated {
    /// Nanoseconds groups spent doing work.
    pub busy_ns: u64,
    /// Nanoseconds from dispatch start to each group's exit, summed.
    pub elapsed_ns: u64,
    /// Frontier elements the groups appended.
    pub queued: u64,
}

impl core::ops::AddAssign for Accumulated {
    fn add_assign(&mut self, rhs: Self) {
        self.busy_ns = self.busy_ns.saturating_add(rhs.busy_ns);
        self.elapsed_ns = self.elapsed_ns.saturating_add(rhs.elapsed_ns);
        self.queued = self.queued.saturating_add(rhs.queued);
    }
}

/// Owner of the per-group counters, grown on demand and reused across searches.
#[derive(Default)]
pub struct KernelStatsLifetime {
    slots: Vec<CachePadded<GroupSlot>>,
}

impl KernelStatsLifetime {
    /// Creates an empty lifetime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes room for `groups` groups and zeroes every slot.
    ///
    /// # Errors
    /// `AllocationFailure` if the slots cannot be reserved.
    pub fn setup(&mut self, groups: usize) -> Result<(), EnactError> {
        if groups > self.slots.len() {
            let extra = groups - self.slots.len();
            self.slots
                .try_reserve_exact(extra)
                .map_err(|_| EnactError::AllocationFailure {
                    what: "kernel statistics",
                    requested: groups,
                })?;
            self.slots
                .extend((0..extra).map(|_| CachePadded::new(GroupSlot::default())));
        }
        for s in &self.slots {
            s.busy.store(0, Ordering::Relaxed);
            s.elapsed.store(0, Ordering::Relaxed);
            s.queued.store(0, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Number of groups the lifetime can record.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Adds `d` to the busy time of `group`.
    #[inline]
    pub fn add_busy(&self, group: usize, d: Duration) {
        if let Some(s) = self.slots.get(group) {
            s.busy.fetch_add(nanos(d), Ordering::Relaxed);
        }
    }

    /// Adds `d` to the elapsed time of `group`.
    #[inline]
    pub fn add_elapsed(&self, group: usize, d: Duration) {
        if let Some(s) = self.slots.get(group) {
            s.elapsed.fetch_add(nanos(d), Ordering::Relaxed);
        }
    }

    /// Adds `count` appended elements to `group`.
    #[inline]
    pub fn add_queued(&self, group: usize, count: usize) {
        if let Some(s) = self.slots.get(group) {
            s.queued.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    /// Drains the first `groups` slots.
    ///
    /// Only meaningful once every dispatch that wrote to the slots is complete.
    pub fn accumulate(&self, groups: usize) -> Accumulated {
        let mut total = Accumulated::default();
        for s in self.slots.iter().take(groups) {
            total += Accumulated {
                busy_ns: s.busy.swap(0, Ordering::Relaxed),
                elapsed_ns: s.elapsed.swap(0, Ordering::Relaxed),
                queued: s.queued.swap(0, Ordering::Relaxed),
            };
        }
        total
    }

    /// Releases the slots.
    pub fn release(&mut self) {
        self.slots = Vec::new();
    }
}

/// Times one group's work inside a dispatch that started at `epoch`.
pub(crate) struct GroupTimer<'a> {
    stats: &'a KernelStatsLifetime,
    group: usize,
    start: Instant,
}

impl<'a> GroupTimer<'a> {
    pub(crate) fn start(stats: &'a KernelStatsLifetime, group: usize) -> Self {
        Self {
            stats,
            group,
            start: Instant::now(),
        }
    }

    /// Records busy time only.
    pub(crate) fn stop_busy(self) {
        self.stats.add_busy(self.group, self.start.elapsed());
    }

    /// Records busy time and the time since `epoch`.
    pub(crate) fn stop(self, epoch: Instant) {
        let now = Instant::now();
        self.stats.add_busy(self.group, now - self.start);
        self.stats.add_elapsed(self.group, now - epoch);
    }
}

/// Summary of the most recent search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnactorStats {
    /// Edge-frontier elements emitted by all expand phases.
    pub total_queued: u64,
    /// Largest label assigned (levels minus one).
    pub search_depth: u64,
    /// Fraction of group lifetime spent working, in `[0, 1]`.
    pub avg_duty: f64,
}

impl EnactorStats {
    pub(crate) fn from_totals(iteration: u64, totals: Accumulated) -> Self {
        // Precision loss only matters past 2^53 ns.
        #[allow(clippy::cast_precision_loss)]
        let avg_duty = if totals.elapsed_ns == 0 {
            0.0
        } else {
            (totals.busy_ns as f64 / totals.elapsed_ns as f64).min(1.0)
        };
        Self {
            total_queued: totals.queued,
            search_depth: iteration.saturating_sub(1),
            avg_duty,
        }
    }
}

/// Per-level record collected in instrumented mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelStats {
    /// BFS level (label value of the vertices discovered).
    pub level: u64,
    /// Queue index of the level's contract phase.
    pub queue_index: u64,
    /// Vertices newly discovered at this level.
    pub vertices: usize,
    /// Edge-frontier elements emitted while expanding them.
    pub edges: usize,
    /// Group busy time for the level.
    pub busy_ns: u64,
    /// Group elapsed time for the level.
    pub elapsed_ns: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_drains_slots() {
        let mut stats = KernelStatsLifetime::new();
        stats.setup(3).unwrap();
        stats.add_busy(0, Duration::from_nanos(10));
        stats.add_elapsed(0, Duration::from_nanos(40));
        stats.add_queued(2, 5);
        stats.add_queued(9, 5);
        let totals = stats.accumulate(3);
        assert_eq!(
            totals,
            Accumulated { busy_ns: 10, elapsed_ns: 40, queued: 5 }
        );
        assert_eq!(stats.accumulate(3), Accumulated::default());
    }

    #[test]
    fn setup_grows_and_zeroes() {
        let mut stats = KernelStatsLifetime::new();
        stats.setup(2).unwrap();
        stats.add_queued(1, 3);
        stats.setup(4).unwrap();
        assert_eq!(stats.capacity(), 4);
        assert_eq!(stats.accumulate(4).queued, 0);
    }

    #[test]
    fn duty_and_depth() {
        let s = EnactorStats::from_totals(4, Accumulated { busy_ns: 25, elapsed_ns: 100, queued: 7 });
        assert_eq!(s.search_depth, 3);
        assert_eq!(s.total_queued, 7);
        assert!((s.avg_duty - 0.25).abs() < f64::EPSILON);
        assert_eq!(EnactorStats::from_totals(0, Accumulated::default()).avg_duty, 0.0);
    }
}
