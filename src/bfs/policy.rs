//! Tuning policies keyed by hardware generation.
//!
//! A [`TuningPolicy`] is an immutable bundle of launch parameters for the
//! contract, expand and fused kernels. Policies are looked up once per search
//! from a [`TuningRegistry`]. A generation that is not in the registry is a
//! configuration error; there is no best-effort fallback.

use serde::{Deserialize, Serialize};

use crate::device::SmVersion;
use crate::error::ConfigError;

/// Cache behavior hint for a kernel's global loads or stores.
///
/// The host backend treats these as advisory: they are recorded in the policy
/// and reported in logs, but every access goes through the same atomics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheModifier {
    /// Default caching.
    None,
    /// Cache at all levels.
    Ca,
    /// Cache at the global level only.
    Cg,
    /// Streaming, likely accessed once.
    Cs,
    /// Write back at all coherent levels.
    Wb,
}

/// Launch parameters for one kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelPolicy {
    /// Worker groups resident per compute unit.
    pub cta_occupancy: usize,
    /// log2 of lanes per group.
    pub log_threads: u32,
    /// log2 of consecutive items each lane loads at once.
    pub log_load_vec_size: u32,
    /// log2 of vector loads per lane per tile.
    pub log_loads_per_tile: u32,
    /// log2 of the even-share scheduling grain.
    pub log_schedule_granularity: u32,
    /// Hint for frontier reads.
    pub read_modifier: CacheModifier,
    /// Hint for frontier writes.
    pub write_modifier: CacheModifier,
    /// Claim tiles dynamically instead of using a static partition.
    pub work_stealing: bool,
    /// Adjacency lists at least this long are gathered a warp at a time.
    pub warp_gather_threshold: usize,
    /// Adjacency lists at least this long are gathered by the whole group.
    pub cta_gather_threshold: usize,
}

impl KernelPolicy {
    /// Lanes per group.
    pub fn threads(&self) -> usize {
        1 << self.log_threads
    }

    /// Items one group consumes per tile.
    pub fn tile_elements(&self) -> usize {
        1 << (self.log_threads + self.log_load_vec_size + self.log_loads_per_tile)
    }

    /// Even-share scheduling grain in items.
    pub fn schedule_granularity(&self) -> usize {
        1 << self.log_schedule_granularity
    }
}

/// Policies for one hardware generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningEntry {
    /// Generation these policies were tuned for.
    pub arch: SmVersion,
    /// Contract kernel.
    pub contract: KernelPolicy,
    /// Expand kernel.
    pub expand: KernelPolicy,
    /// Fused single-launch kernel.
    pub fused: KernelPolicy,
}

/// The policy selected for one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TuningPolicy {
    /// Generation the policy was selected for.
    pub arch: SmVersion,
    /// Collect per-phase statistics (synchronizes after every phase).
    pub instrument: bool,
    /// Contract kernel.
    pub contract: KernelPolicy,
    /// Expand kernel.
    pub expand: KernelPolicy,
    /// Fused single-launch kernel.
    pub fused: KernelPolicy,
}

/// Registry of tuned generations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TuningRegistry {
    entries: Vec<TuningEntry>,
}

impl Default for TuningRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TuningRegistry {
    /// An empty registry; every lookup fails.
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Policies tuned for SM 1.3 and SM 2.0 class hardware.
    pub fn builtin() -> Self {
        let sm20_contract = KernelPolicy {
            cta_occupancy: 8,
            log_threads: 7,
            log_load_vec_size: 0,
            log_loads_per_tile: 0,
            log_schedule_granularity: 7,
            read_modifier: CacheModifier::Cg,
            write_modifier: CacheModifier::Cg,
            work_stealing: false,
            warp_gather_threshold: 32,
            cta_gather_threshold: 512,
        };
        let sm20_expand = KernelPolicy {
            work_stealing: true,
            ..sm20_contract.clone()
        };
        let sm20_fused = KernelPolicy {
            cta_occupancy: 1,
            log_threads: 8,
            work_stealing: true,
            ..sm20_contract.clone()
        };

        let sm13_contract = KernelPolicy {
            cta_occupancy: 5,
            log_threads: 7,
            log_load_vec_size: 1,
            log_loads_per_tile: 0,
            log_schedule_granularity: 8,
            read_modifier: CacheModifier::None,
            write_modifier: CacheModifier::None,
            work_stealing: false,
            warp_gather_threshold: 32,
            cta_gather_threshold: 256,
        };
        let sm13_expand = sm13_contract.clone();
        let sm13_fused = KernelPolicy {
            cta_occupancy: 1,
            ..sm13_contract.clone()
        };

        Self {
            entries: vec![
                TuningEntry {
                    arch: SmVersion::SM20,
                    contract: sm20_contract,
                    expand: sm20_expand,
                    fused: sm20_fused,
                },
                TuningEntry {
                    arch: SmVersion::SM13,
                    contract: sm13_contract,
                    expand: sm13_expand,
                    fused: sm13_fused,
                },
            ],
        }
    }

    /// Parses a registry from a JSON array of [`TuningEntry`] values.
    ///
    /// # Errors
    /// Returns the parse error from `serde_json`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the registry as JSON.
    ///
    /// # Errors
    /// Returns the serialization error from `serde_json`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Adds or replaces the entry for `entry.arch`.
    pub fn insert(&mut self, entry: TuningEntry) {
        match self.entries.iter_mut().find(|e| e.arch == entry.arch) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Generations with a tuned entry.
    pub fn generations(&self) -> impl Iterator<Item = SmVersion> + '_ {
        self.entries.iter().map(|e| e.arch)
    }

    /// Selects the policy for `arch`.
    ///
    /// # Errors
    /// [`ConfigError::NotYetTuned`] if `arch` has no entry.
    pub fn select(&self, arch: SmVersion, instrument: bool) -> Result<TuningPolicy, ConfigError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.arch == arch)
            .ok_or(ConfigError::NotYetTuned(arch))?;
        Ok(TuningPolicy {
            arch,
            instrument,
            contract: entry.contract.clone(),
            expand: entry.expand.clone(),
            fused: entry.fused.clone(),
        })
    }
}
