//! How a phase's input is divided among worker groups.
//!
//! Even-share: the input is cut into scheduling grains and every group gets a
//! contiguous run of `total / grid` grains, the first `total % grid` groups one
//! extra. Work stealing: groups claim one tile at a time from a shared counter
//! until the input is exhausted.

use core::ops::Range;

use crate::bfs::policy::KernelPolicy;
use crate::bfs::progress::WorkProgress;
use crate::error::EnactError;

/// A static partition of `len` items over `grid` groups.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EvenShare {
    len: usize,
    granularity: usize,
    grains_per_group: usize,
    extra_grains: usize,
}

impl EvenShare {
    pub(crate) fn new(len: usize, grid: usize, granularity: usize) -> Self {
        let grid = grid.max(1);
        let granularity = granularity.max(1);
        let total_grains = len.div_ceil(granularity);
        Self {
            len,
            granularity,
            grains_per_group: total_grains / grid,
            extra_grains: total_grains % grid,
        }
    }

    pub(crate) fn range(&self, group: usize) -> Range<usize> {
        let grains = self.grains_per_group + usize::from(group < self.extra_grains);
        let first = group * self.grains_per_group + group.min(self.extra_grains);
        let begin = (first * self.granularity).min(self.len);
        let end = ((first + grains) * self.granularity).min(self.len);
        begin..end
    }
}

/// Calls `f` on each tile of phase `queue_index`'s input that `group` owns.
pub(crate) fn for_each_tile<F>(
    policy: &KernelPolicy,
    progress: &WorkProgress,
    queue_index: u64,
    len: usize,
    grid: usize,
    group: usize,
    mut f: F,
) -> Result<(), EnactError>
where
    F: FnMut(Range<usize>) -> Result<(), EnactError>,
{
    let tile = policy.tile_elements();
    if policy.work_stealing {
        loop {
            let begin = progress.steal(queue_index, tile);
            if begin >= len {
                return Ok(());
            }
            f(begin..(begin + tile).min(len))?;
        }
    }

    let share = EvenShare::new(len, grid, policy.schedule_granularity()).range(group);
    let mut begin = share.start;
    while begin < share.end {
        let end = (begin + tile).min(share.end);
        f(begin..end)?;
        begin = end;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bfs::policy::TuningRegistry;
    use crate::device::SmVersion;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn even_share_partitions_the_input(len in 0usize..5000, grid in 1usize..64, log_grain in 0u32..8) {
            let share = EvenShare::new(len, grid, 1 << log_grain);
            let mut next = 0;
            for group in 0..grid {
                let r = share.range(group);
                prop_assert_eq!(r.start, next);
                prop_assert!(r.end >= r.start);
                next = r.end;
            }
            prop_assert_eq!(next, len);
        }
    }

    #[test]
    fn stealing_claims_every_tile_once() {
        let mut policy = TuningRegistry::builtin()
            .select(SmVersion::SM20, false)
            .unwrap()
            .expand;
        policy.log_threads = 2;
        assert!(policy.work_stealing);
        let progress = WorkProgress::new();
        let mut seen = Vec::new();
        for group in 0..3 {
            for_each_tile(&policy, &progress, 1, 10, 3, group, |r| {
                seen.extend(r);
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn even_share_tiles_stay_inside_the_share() {
        let mut policy = TuningRegistry::builtin()
            .select(SmVersion::SM13, false)
            .unwrap()
            .contract;
        policy.log_threads = 1;
        policy.log_load_vec_size = 0;
        policy.log_schedule_granularity = 2;
        let progress = WorkProgress::new();
        let mut tiles = Vec::new();
        for_each_tile(&policy, &progress, 0, 11, 2, 1, |r| {
            tiles.push(r);
            Ok(())
        })
        .unwrap();
        // 3 grains over 2 groups: group 1 owns grain 2, items 8..11.
        assert_eq!(tiles, vec![8..10, 10..11]);
    }
}
