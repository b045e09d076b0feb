//! Synchronization primitives shared by worker groups.

pub mod global_barrier;

pub use global_barrier::{GlobalBarrier, GlobalBarrierLifetime};
