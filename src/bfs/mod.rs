//! Two-phase breadth-first search.
//!
//! - [`policy`]: tuning policies and the per-generation registry.
//! - [`progress`]: queue lengths and steal counters indexed by queue index.
//! - [`handshake`]: the done flag and iteration counter the host polls.
//! - [`stats`]: per-group timing, search summaries, level history.
//! - [`enactor`]: resource lifetimes and the iterative dispatch loop.
//! - `fused`: the single-dispatch variant (methods on [`Enactor`]).

pub mod enactor;
mod fused;
pub mod handshake;
pub(crate) mod kernel;
pub mod policy;
pub mod progress;
pub mod stats;

pub use enactor::{Enactor, EnactorConfig};
pub use handshake::{Handshake, NOT_DONE};
pub use kernel::SearchState;
pub use policy::{CacheModifier, KernelPolicy, TuningEntry, TuningPolicy, TuningRegistry};
pub use progress::WorkProgress;
pub use stats::{Accumulated, EnactorStats, KernelStatsLifetime, LevelStats};
