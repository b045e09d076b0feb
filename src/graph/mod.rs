//! Graph inputs: the immutable CSR structure and per-search problem storage.

pub mod csr;
pub mod problem;

pub use csr::{CsrGraph, VertexId};
pub use problem::{BfsProblem, FrontierQueues, ProblemConfig, INVALID_PREDECESSOR, UNVISITED};
