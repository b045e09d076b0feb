//! A compact, immutable CSR (compressed sparse row) graph.
//!
//! Layout:
//! - `offsets`: `Vec<usize>` of length `n + 1`
//! - `columns`: `Vec<u32>` of length `m`, neighbors of `u` at `offsets[u]..offsets[u + 1]`
//!
//! The graph never changes while a search is running; all per-search state
//! lives in [`BfsProblem`](super::BfsProblem).

/// Vertex identifier.
pub type VertexId = u32;

/// An immutable CSR adjacency structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrGraph {
    offsets: Vec<usize>,
    columns: Vec<VertexId>,
}

impl CsrGraph {
    /// Builds a CSR graph from an adjacency list.
    ///
    /// # Panics
    ///
    /// Panics if any edge references a node index out of bounds, or if the
    /// vertex count does not fit a [`VertexId`].
    pub fn from_adjacency(adjacency: &[Vec<VertexId>]) -> Self {
        let n = adjacency.len();
        assert!(n <= VertexId::MAX as usize, "too many vertices for u32 ids");

        let mut offsets = Vec::with_capacity(n + 1);
        offsets.push(0);
        let mut total_edges = 0usize;
        for nbrs in adjacency {
            total_edges += nbrs.len();
            offsets.push(total_edges);
        }

        let mut columns = Vec::with_capacity(total_edges);
        for (u, nbrs) in adjacency.iter().enumerate() {
            for &v in nbrs {
                assert!((v as usize) < n, "edge {u}->{v} is out of bounds for n={n}");
                columns.push(v);
            }
        }

        Self { offsets, columns }
    }

    /// Builds a CSR graph directly from CSR parts.
    ///
    /// # Panics
    /// - if `offsets.len() < 2`
    /// - if offsets do not start at zero or are not monotone
    /// - if `offsets.last() != columns.len()`
    /// - if a column index is out of bounds
    pub fn from_csr_parts(offsets: Vec<usize>, columns: Vec<VertexId>) -> Self {
        assert!(offsets.len() >= 2, "offsets must have length n+1");
        assert!(offsets[0] == 0, "offsets must start at zero");
        let n = offsets.len() - 1;
        for w in offsets.windows(2) {
            assert!(w[0] <= w[1], "offsets must be monotone");
        }
        assert!(
            offsets[n] == columns.len(),
            "offsets last must equal edges length"
        );
        for &v in &columns {
            assert!((v as usize) < n, "edge to {v} out of bounds for n={n}");
        }
        Self { offsets, columns }
    }

    /// Builds a symmetric graph with `nodes` vertices from undirected edges.
    ///
    /// Every pair `(u, v)` becomes the two arcs `u -> v` and `v -> u`;
    /// self-loops become a single arc. Neighbor lists keep input order.
    ///
    /// # Panics
    /// Panics if an endpoint is `>= nodes`.
    pub fn from_undirected_edges(nodes: usize, edges: &[(VertexId, VertexId)]) -> Self {
        let mut adjacency = vec![Vec::new(); nodes];
        for &(u, v) in edges {
            assert!((u as usize) < nodes && (v as usize) < nodes, "edge {u}-{v} out of bounds");
            adjacency[u as usize].push(v);
            if u != v {
                adjacency[v as usize].push(u);
            }
        }
        Self::from_adjacency(&adjacency)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.columns.len()
    }

    /// Row offsets (`node_count() + 1` entries).
    pub fn row_offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Column indices (`edge_count()` entries).
    pub fn column_indices(&self) -> &[VertexId] {
        &self.columns
    }

    /// Out-neighbors of `node`.
    pub fn neighbors(&self, node: VertexId) -> &[VertexId] {
        let u = node as usize;
        &self.columns[self.offsets[u]..self.offsets[u + 1]]
    }

    /// Out-degree of `node`.
    pub fn degree(&self, node: VertexId) -> usize {
        let u = node as usize;
        self.offsets[u + 1] - self.offsets[u]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undirected_edges_are_symmetric() {
        let g = CsrGraph::from_undirected_edges(5, &[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4)]);
        assert_eq!(g.node_count(), 5);
        assert_eq!(g.edge_count(), 10);
        assert_eq!(g.neighbors(0), &[1, 2]);
        assert_eq!(g.neighbors(3), &[1, 2, 4]);
        assert_eq!(g.degree(4), 1);
        assert_eq!(g.row_offsets(), &[0, 2, 4, 6, 9, 10]);
    }

    #[test]
    fn self_loop_is_a_single_arc() {
        let g = CsrGraph::from_undirected_edges(2, &[(1, 1)]);
        assert_eq!(g.neighbors(1), &[1]);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn csr_parts_round_trip_adjacency() {
        let g = CsrGraph::from_adjacency(&[vec![1, 2], vec![3], vec![3], vec![]]);
        let h = CsrGraph::from_csr_parts(g.row_offsets().to_vec(), g.column_indices().to_vec());
        assert_eq!(g, h);
    }

    #[test]
    #[should_panic(expected = "offsets must be monotone")]
    fn csr_parts_reject_decreasing_offsets() {
        let _ = CsrGraph::from_csr_parts(vec![0, 2, 1, 2], vec![0, 1]);
    }
}
