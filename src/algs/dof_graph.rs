//! DOF connectivity graphs.
//!
//! Two DOFs are coupled when some element references both. A [`CrsGraph`]
//! stores, for each row of an [`IndexMap`], the sorted global column ids it
//! couples to, always including the diagonal. The overlap graph uses only
//! element cliques seen on this partition; the owned graph additionally
//! merges rows that other partitions contributed for DOFs owned here.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::algs::communicator::{Communicator, DofCommTags};
use crate::algs::csr_graph::CsrGraph;
use crate::algs::exchange::{all_peers, exchange_variable};
use crate::algs::numbering::DofNumbering;
use crate::algs::wire::WireEdge;
use crate::data::index_map::IndexMap;
use crate::dof_error::DofError;

/// Row gid → coupled column gids (diagonal included).
pub type Couplings = BTreeMap<u64, BTreeSet<u64>>;

/// Collect the element cliques of `element_gids`.
pub fn element_couplings<'a>(element_gids: impl IntoIterator<Item = &'a [u64]>) -> Couplings {
    let mut couplings = Couplings::new();
    for gids in element_gids {
        for &row in gids {
            couplings.entry(row).or_default().extend(gids.iter().copied());
        }
    }
    couplings
}

/// Send rows of ghost DOFs to their owners; returns rows received for
/// owned DOFs as `(row, col)` pairs.
///
/// Collective: every partition must call this once per build.
pub fn ship_ghost_rows<C: Communicator>(
    couplings: &Couplings,
    numbering: &DofNumbering,
    comm: &C,
    tags: &DofCommTags,
) -> Result<Vec<(u64, u64)>, DofError> {
    let mut outgoing: BTreeMap<usize, Vec<WireEdge>> = BTreeMap::new();
    for (gid, owner) in numbering.ghost_gids() {
        if let Some(cols) = couplings.get(&gid) {
            outgoing
                .entry(owner)
                .or_default()
                .extend(cols.iter().map(|&c| WireEdge::new(gid, c)));
        }
    }
    let peers = all_peers(comm);
    let incoming = exchange_variable(&outgoing, comm, tags.graph_sizes, tags.graph_rows, &peers)?;
    Ok(incoming
        .into_values()
        .flatten()
        .map(|e| (e.row(), e.col()))
        .collect())
}

/// Sparse row graph over global DOF ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrsGraph {
    rows: Arc<IndexMap>,
    xadj: Vec<usize>,
    cols: Vec<u64>,
}

impl CrsGraph {
    /// Rows of `rows` in local order; columns from `pairs` whose row is
    /// present, plus the diagonal.
    pub fn from_pairs(rows: Arc<IndexMap>, pairs: impl IntoIterator<Item = (u64, u64)>) -> Self {
        let mut per_row: Vec<BTreeSet<u64>> = rows.gids().iter().map(|&g| BTreeSet::from([g])).collect();
        for (r, c) in pairs {
            if let Some(lid) = rows.lid(r) {
                per_row[lid].insert(c);
            }
        }
        let mut xadj = Vec::with_capacity(per_row.len() + 1);
        let mut cols = Vec::new();
        xadj.push(0);
        for row in per_row {
            cols.extend(row);
            xadj.push(cols.len());
        }
        Self { rows, xadj, cols }
    }

    /// Build from a coupling table.
    pub fn from_couplings(rows: Arc<IndexMap>, couplings: &Couplings) -> Self {
        Self::from_pairs(
            rows,
            couplings
                .iter()
                .flat_map(|(&r, cs)| cs.iter().map(move |&c| (r, c))),
        )
    }

    pub fn row_map(&self) -> &Arc<IndexMap> {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.xadj.len() - 1
    }

    /// Stored entries, diagonal included.
    pub fn num_entries(&self) -> usize {
        self.cols.len()
    }

    /// Global column ids of local row `lid`, ascending.
    pub fn row(&self, lid: usize) -> &[u64] {
        &self.cols[self.xadj[lid]..self.xadj[lid + 1]]
    }

    /// Global column ids of the row for global id `gid`.
    pub fn row_by_gid(&self, gid: u64) -> Option<&[u64]> {
        self.rows.lid(gid).map(|lid| self.row(lid))
    }

    /// Local graph over the row map's indices, suitable for reordering.
    ///
    /// Columns not present in the row map and the diagonal are dropped; the
    /// result is symmetrised.
    pub fn local_graph(&self) -> Result<CsrGraph, DofError> {
        let mut edges = Vec::with_capacity(self.cols.len());
        for lid in 0..self.num_rows() {
            for &c in self.row(lid) {
                if let Some(j) = self.rows.lid(c) {
                    if j != lid {
                        edges.push((lid, j));
                    }
                }
            }
        }
        CsrGraph::from_edges(self.num_rows(), &edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_cliques_include_diagonal() {
        let elems: Vec<Vec<u64>> = vec![vec![0, 1], vec![1, 2]];
        let couplings = element_couplings(elems.iter().map(|v| v.as_slice()));
        let rows = Arc::new(IndexMap::try_new(vec![0, 1, 2], 3).unwrap());
        let g = CrsGraph::from_couplings(rows, &couplings);
        assert_eq!(g.row(0), &[0, 1]);
        assert_eq!(g.row(1), &[0, 1, 2]);
        assert_eq!(g.row_by_gid(2), Some(&[1u64, 2][..]));
        assert_eq!(g.num_entries(), 7);
    }

    #[test]
    fn local_graph_drops_diagonal_and_foreign_columns() {
        let rows = Arc::new(IndexMap::try_new(vec![4, 5], 10).unwrap());
        let g = CrsGraph::from_pairs(rows, [(4, 5), (5, 4), (5, 9)]);
        assert_eq!(g.row(1), &[4, 5, 9]);
        let local = g.local_graph().unwrap();
        assert_eq!(local.neighbors(0), &[1]);
        assert_eq!(local.neighbors(1), &[0]);
    }
}
