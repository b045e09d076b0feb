//! `GhostToken` - the capability that gates access to branded search state.
//!
//! A [`BfsProblem<'brand>`](crate::graph::BfsProblem) stores its labels,
//! predecessors, visited mask and frontier buffers as branded atomics. Workers
//! mutate them through atomics only; the token decides *who may observe them*:
//!
//! - running a search requires `&mut GhostToken<'brand>`;
//! - reading labels/predecessors requires `&GhostToken<'brand>`.
//!
//! Rust's borrow rules therefore make it impossible to read a half-written
//! label array while a traversal over the same brand is in flight.
//!
//! ## Core invariant (linearity)
//!
//! `GhostToken<'brand>` is intentionally **not** `Copy`/`Clone`, so at most one
//! `&mut GhostToken<'brand>` can be live at a time.

/// Invariant lifetime definitions for branding.
pub mod invariant;
/// Traits defining token capabilities (GhostBorrow/GhostBorrowMut).
pub mod traits;

pub use invariant::InvariantLifetime;
pub use traits::{GhostBorrow, GhostBorrowMut};

/// A zero-sized token that controls access to branded search state.
#[derive(Debug)]
pub struct GhostToken<'brand>(InvariantLifetime<'brand>);

impl<'brand> GhostToken<'brand> {
    /// Creates a new token and executes a closure with it.
    ///
    /// Every call produces a fresh, unnameable brand, so problems created in
    /// different closures can never be mixed up.
    ///
    /// # Example
    ///
    /// ```rust
    /// use halo_bfs::{BfsProblem, CsrGraph, Enactor, GhostToken, ProblemConfig};
    ///
    /// let graph = CsrGraph::from_undirected_edges(3, &[(0, 1), (1, 2)]);
    /// let labels = GhostToken::new(|mut token| {
    ///     let problem = BfsProblem::new(&graph, ProblemConfig::default()).unwrap();
    ///     let mut enactor = Enactor::new(false);
    ///     enactor
    ///         .enact_iterative_search(&mut token, &problem, 0, 0)
    ///         .unwrap();
    ///     problem.labels(&token)
    /// });
    /// assert_eq!(labels, vec![0, 1, 2]);
    /// ```
    pub fn new<F, R>(f: F) -> R
    where
        F: for<'new_brand> FnOnce(GhostToken<'new_brand>) -> R,
    {
        f(GhostToken(InvariantLifetime::default()))
    }
}
