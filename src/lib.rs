//! # `halo-bfs` - Two-phase breadth-first search with ghost-token gated state
//!
//! A level-synchronous BFS over CSR graphs, organized the way a data-parallel
//! device would run it: every level is a *contract* phase (cull and
//! deduplicate the edge frontier against the visited mask, label survivors)
//! followed by an *expand* phase (gather the neighbors of the new vertex
//! frontier). Worker groups cooperate through atomics only.
//!
//! Two drivers are provided:
//!
//! - [`Enactor::enact_iterative_search`]: one dispatch per phase on an
//!   in-order stream, with the host throttled so it never runs more than a
//!   level ahead of the workers.
//! - [`Enactor::enact_fused_search`]: a single dispatch of co-resident groups
//!   that step through levels together using a software global barrier.
//!
//! ## Ghost tokens
//!
//! All per-search state lives in a [`BfsProblem<'g, 'brand>`](BfsProblem).
//! Running a search requires `&mut GhostToken<'brand>`; reading labels needs
//! `&GhostToken<'brand>`. The borrow checker therefore rules out observing a
//! label array while a search over the same brand is in flight.
//!
//! ## Example
//!
//! ```rust
//! use halo_bfs::{BfsProblem, CsrGraph, Enactor, GhostToken, ProblemConfig};
//!
//! let graph = CsrGraph::from_undirected_edges(5, &[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4)]);
//! GhostToken::new(|mut token| {
//!     let problem = BfsProblem::new(&graph, ProblemConfig::default()).unwrap();
//!     let mut enactor = Enactor::new(false);
//!     enactor.enact_fused_search(&mut token, &problem, 0, 0).unwrap();
//!     assert_eq!(problem.labels(&token), vec![0, 1, 1, 2, 3]);
//!     assert_eq!(enactor.statistics().search_depth, 3);
//! });
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod bfs;
pub mod concurrency;
pub mod device;
pub mod error;
pub mod graph;
pub mod token;

pub use bfs::{
    Enactor, EnactorConfig, EnactorStats, KernelPolicy, LevelStats, TuningPolicy, TuningRegistry,
};
pub use device::{Device, DeviceProps, SmVersion};
pub use error::{ConfigError, EnactError, EnactResult, Status};
pub use graph::{BfsProblem, CsrGraph, ProblemConfig, VertexId, INVALID_PREDECESSOR, UNVISITED};
pub use token::GhostToken;

const _: () = {
    use core::mem;

    // Tokens are ZSTs.
    assert!(mem::size_of::<GhostToken<'static>>() == 0);

    // Branded atomics are exactly as large as the atomics they wrap.
    assert!(
        mem::size_of::<concurrency::atomic::GhostAtomicU32<'static>>()
            == mem::size_of::<core::sync::atomic::AtomicU32>()
    );
};
