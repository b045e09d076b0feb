//! Branded, lock-free atomic primitives.
//!
//! These types provide **concurrent writer** access using hardware atomics while
//! keeping the *ghost/brand* aspect purely compile-time (zero runtime borrow state).
//! Traversal workers write labels, predecessors and frontier slots through them;
//! the brand ties that storage to the token of the search that owns it.

/// Branded `AtomicU32`.
pub mod u32;
/// Branded `AtomicUsize`.
pub mod usize;
/// Branded atomic bitsets.
pub mod bitset;

pub use bitset::GhostAtomicBitset;
pub use u32::GhostAtomicU32;
pub use usize::GhostAtomicUsize;
