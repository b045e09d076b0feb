//! Error and status types for the enactor.
//!
//! Every resource operation (allocation, binding, barrier setup, dispatch,
//! synchronization) reports through [`EnactError`]. The first failure aborts
//! the current setup or phase and is returned as-is; nothing retries.

use serde::Serialize;
use thiserror::Error;

use crate::device::SmVersion;

/// Configuration problems detected before or during a search.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The tuning registry has no policy for this hardware generation.
    #[error("no tuning policy for {0}: not yet tuned")]
    NotYetTuned(SmVersion),
    /// Fused search asked for more groups than can be co-resident.
    #[error("{requested} worker groups requested but only {limit} can be co-resident")]
    Oversubscribed {
        /// Requested group count.
        requested: usize,
        /// Concurrent residency limit for the selected policy.
        limit: usize,
    },
    /// The source vertex is not a vertex of the graph.
    #[error("source vertex {vertex} out of range for {nodes} nodes")]
    SourceOutOfRange {
        /// Requested source.
        vertex: u32,
        /// Vertex count of the graph.
        nodes: usize,
    },
    /// A phase tried to write past the capacity of its output frontier.
    #[error("{queue} frontier overflow: {requested} elements requested, capacity {capacity}")]
    QueueOverflow {
        /// Which frontier overflowed.
        queue: &'static str,
        /// Declared capacity of the buffer.
        capacity: usize,
        /// End offset the reservation needed.
        requested: usize,
    },
    /// A dispatch with zero worker groups.
    #[error("dispatch grid must contain at least one worker group")]
    EmptyGrid,
    /// A device description with a zero-sized execution resource.
    #[error("device {field} must be non-zero")]
    InvalidDevice {
        /// The offending [`DeviceProps`](crate::DeviceProps) field.
        field: &'static str,
    },
}

/// Errors returned by setup and by both search variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnactError {
    /// The requested configuration is not supported.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
    /// A device-side allocation could not be satisfied.
    #[error("failed to allocate {what} ({requested} elements)")]
    AllocationFailure {
        /// What was being allocated.
        what: &'static str,
        /// Element count requested.
        requested: usize,
    },
    /// A read-only lookup view could not be bound.
    #[error("failed to bind {what}: {len} elements, limit {limit}")]
    BindingFailure {
        /// Which array was being bound.
        what: &'static str,
        /// Its length.
        len: usize,
        /// The device's bound element limit.
        limit: usize,
    },
    /// A dispatch could not be launched or one of its groups failed.
    #[error("launch of {kernel} failed: {reason}")]
    LaunchFailure {
        /// Kernel name.
        kernel: &'static str,
        /// Description of the failure.
        reason: String,
    },
    /// Waiting for outstanding work failed.
    #[error("synchronization failed: {reason}")]
    SynchronizationFailure {
        /// Description of the failure.
        reason: String,
    },
}

impl EnactError {
    /// The coarse status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            EnactError::InvalidConfiguration(_) => Status::InvalidConfiguration,
            EnactError::AllocationFailure { .. } => Status::AllocationFailure,
            EnactError::BindingFailure { .. } => Status::BindingFailure,
            EnactError::LaunchFailure { .. } => Status::LaunchFailure,
            EnactError::SynchronizationFailure { .. } => Status::SynchronizationFailure,
        }
    }
}

/// Coarse outcome of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    /// The search ran to an empty frontier.
    Success,
    /// See [`EnactError::InvalidConfiguration`].
    InvalidConfiguration,
    /// See [`EnactError::AllocationFailure`].
    AllocationFailure,
    /// See [`EnactError::BindingFailure`].
    BindingFailure,
    /// See [`EnactError::LaunchFailure`].
    LaunchFailure,
    /// See [`EnactError::SynchronizationFailure`].
    SynchronizationFailure,
}

impl Status {
    /// Collapses a search result into a status code.
    pub fn from_result<T>(result: &Result<T, EnactError>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }
}

/// Result alias used throughout the crate.
pub type EnactResult<T> = Result<T, EnactError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_variants() {
        let cases = [
            (
                EnactError::from(ConfigError::EmptyGrid),
                Status::InvalidConfiguration,
            ),
            (
                EnactError::AllocationFailure { what: "labels", requested: 4 },
                Status::AllocationFailure,
            ),
            (
                EnactError::BindingFailure { what: "row offsets", len: 9, limit: 8 },
                Status::BindingFailure,
            ),
            (
                EnactError::LaunchFailure { kernel: "expand", reason: "x".into() },
                Status::LaunchFailure,
            ),
            (
                EnactError::SynchronizationFailure { reason: "x".into() },
                Status::SynchronizationFailure,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status);
            assert_eq!(Status::from_result::<()>(&Err(err)), status);
        }
        assert_eq!(Status::from_result(&Ok::<_, EnactError>(())), Status::Success);
    }

    #[test]
    fn messages_name_the_failure() {
        let err = EnactError::from(ConfigError::QueueOverflow {
            queue: "edge",
            capacity: 4,
            requested: 9,
        });
        assert_eq!(
            err.to_string(),
            "invalid configuration: edge frontier overflow: 9 elements requested, capacity 4"
        );
        assert_eq!(
            ConfigError::NotYetTuned(SmVersion(100)).to_string(),
            "no tuning policy for sm_100: not yet tuned"
        );
    }
}
