//! Concurrency building blocks for the enactor.
//!
//! Important: ghost branding enforces *who may observe* traversal state, not
//! synchronization. Ordering between worker groups comes from the stream (one
//! dispatch after another) or from the global barrier inside a fused dispatch.

pub mod atomic;
pub mod sync;
