//! Host emulation of a massively parallel device.
//!
//! The enactor is written against the shape of a GPU: dispatches of many
//! independent *worker groups*, each made of lock-step *lanes*, queued on an
//! asynchronous in-order [`stream`]. On the host, a worker group is a single
//! task that walks its lanes in order; iterative dispatches run their groups on
//! the rayon pool, and fused dispatches give every group its own OS thread so
//! that they are genuinely co-resident.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub mod stream;
pub mod texture;

pub use stream::{Event, Stream};
pub use texture::{RowOffsetsView, VisitedView};

/// Hardware generation, encoded as `major * 100 + minor * 10` (e.g. `200`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SmVersion(pub u32);

impl SmVersion {
    /// Compute capability 1.0.
    pub const SM10: SmVersion = SmVersion(100);
    /// Compute capability 1.3.
    pub const SM13: SmVersion = SmVersion(130);
    /// Compute capability 2.0.
    pub const SM20: SmVersion = SmVersion(200);
}

impl fmt::Display for SmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sm_{}", self.0)
    }
}

/// Capabilities the enactor needs from a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProps {
    /// Hardware generation used to select a tuning policy.
    pub arch: SmVersion,
    /// Number of compute units (multiprocessors).
    pub units: usize,
    /// Lanes per warp.
    pub warp_lanes: usize,
    /// Hard cap on worker groups resident on one unit.
    pub max_groups_per_unit: usize,
    /// Largest array that can be bound as a read-only lookup view.
    pub max_bound_elements: usize,
}

impl DeviceProps {
    /// Default bound element limit (the 1D linear texture limit).
    pub const DEFAULT_BOUND_ELEMENTS: usize = 1 << 27;
}

/// A device handle: capability probing and grid sizing.
#[derive(Debug, Clone)]
pub struct Device {
    props: DeviceProps,
}

impl Device {
    /// Builds a device from explicit properties.
    ///
    /// # Errors
    /// [`ConfigError::InvalidDevice`] if `units`, `warp_lanes` or
    /// `max_groups_per_unit` is zero.
    pub fn new(props: DeviceProps) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("units", props.units),
            ("warp_lanes", props.warp_lanes),
            ("max_groups_per_unit", props.max_groups_per_unit),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidDevice { field });
            }
        }
        Ok(Self { props })
    }

    /// Describes the current machine as an SM 2.0-class device with one unit
    /// per available hardware thread.
    pub fn host() -> Self {
        let units = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            props: DeviceProps {
                arch: SmVersion::SM20,
                units,
                warp_lanes: 32,
                max_groups_per_unit: 8,
                max_bound_elements: DeviceProps::DEFAULT_BOUND_ELEMENTS,
            },
        }
    }

    /// Device properties.
    pub fn props(&self) -> &DeviceProps {
        &self.props
    }

    /// How many groups of a kernel with `occupancy` groups per unit can be
    /// resident at the same time.
    pub fn residency_limit(&self, occupancy: usize) -> usize {
        self.props.units * occupancy.clamp(1, self.props.max_groups_per_unit)
    }

    /// Default grid size for a kernel: fill every unit to `occupancy`,
    /// optionally capped by `max_grid_size` (`0` means no cap).
    pub fn grid_size(&self, occupancy: usize, max_grid_size: usize) -> usize {
        let full = self.residency_limit(occupancy);
        if max_grid_size == 0 {
            full
        } else {
            full.min(max_grid_size)
        }
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::host()
    }
}
