//! Local sparse graphs in CSR form and node permutations.
//!
//! Determinism:
//! - neighbour lists are always sorted and deduplicated;
//! - self-loops are dropped on construction.

use crate::debug_invariants::DebugInvariants;
use crate::dof_error::DofError;

/// Undirected graph over nodes `0..n` in CSR form.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct CsrGraph {
    /// CSR offsets into `adjncy` for each node; `xadj.len() == n + 1`.
    pub xadj: Vec<usize>,
    /// Concatenated neighbour lists.
    pub adjncy: Vec<usize>,
}

/// Check raw CSR arrays: offsets, node range, and symmetry.
///
/// Self-loops and duplicate entries are tolerated here; [`CsrGraph::new`]
/// removes them.
pub fn validate_csr(xadj: &[usize], adjncy: &[usize]) -> Result<(), DofError> {
    let Some(&last) = xadj.last() else {
        return Err(DofError::GraphMalformed("offset array is empty".into()));
    };
    if xadj[0] != 0 {
        return Err(DofError::GraphMalformed(format!(
            "offsets must start at 0, got {}",
            xadj[0]
        )));
    }
    if last != adjncy.len() {
        return Err(DofError::GraphMalformed(format!(
            "last offset {last} != adjacency length {}",
            adjncy.len()
        )));
    }
    if let Some(i) = xadj.windows(2).position(|w| w[0] > w[1]) {
        return Err(DofError::GraphMalformed(format!(
            "offsets decrease at node {i}"
        )));
    }
    let n = xadj.len() - 1;
    for i in 0..n {
        for &j in &adjncy[xadj[i]..xadj[i + 1]] {
            if j >= n {
                return Err(DofError::NodeOutOfRange { from: i, node: j, n });
            }
        }
    }
    // Sorted copies make the reverse-edge lookup a binary search.
    let sorted: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            let mut row = adjncy[xadj[i]..xadj[i + 1]].to_vec();
            row.sort_unstable();
            row
        })
        .collect();
    for (i, row) in sorted.iter().enumerate() {
        for &j in row {
            if j != i && sorted[j].binary_search(&i).is_err() {
                return Err(DofError::AsymmetricGraph { from: i, to: j });
            }
        }
    }
    Ok(())
}

impl CsrGraph {
    /// Validate and normalise raw CSR arrays.
    pub fn new(xadj: Vec<usize>, adjncy: Vec<usize>) -> Result<Self, DofError> {
        validate_csr(&xadj, &adjncy)?;
        let n = xadj.len() - 1;
        let mut out_x = Vec::with_capacity(n + 1);
        let mut out_a = Vec::with_capacity(adjncy.len());
        out_x.push(0);
        for i in 0..n {
            let mut row: Vec<usize> = adjncy[xadj[i]..xadj[i + 1]]
                .iter()
                .copied()
                .filter(|&j| j != i)
                .collect();
            row.sort_unstable();
            row.dedup();
            out_a.extend(row);
            out_x.push(out_a.len());
        }
        Ok(Self {
            xadj: out_x,
            adjncy: out_a,
        })
    }

    /// Symmetric graph from an undirected edge list.
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> Result<Self, DofError> {
        let mut rows = vec![Vec::new(); n];
        for &(a, b) in edges {
            if a >= n {
                return Err(DofError::NodeOutOfRange { from: b, node: a, n });
            }
            if b >= n {
                return Err(DofError::NodeOutOfRange { from: a, node: b, n });
            }
            if a != b {
                rows[a].push(b);
                rows[b].push(a);
            }
        }
        Ok(Self::from_rows(rows))
    }

    /// Build from per-node neighbour lists already known to be symmetric.
    pub(crate) fn from_rows(rows: Vec<Vec<usize>>) -> Self {
        let mut xadj = Vec::with_capacity(rows.len() + 1);
        let mut adjncy = Vec::new();
        xadj.push(0);
        for (i, mut row) in rows.into_iter().enumerate() {
            row.retain(|&j| j != i);
            row.sort_unstable();
            row.dedup();
            adjncy.extend(row);
            xadj.push(adjncy.len());
        }
        Self { xadj, adjncy }
    }

    /// Graph with `n` nodes and no edges.
    pub fn empty(n: usize) -> Self {
        Self {
            xadj: vec![0; n + 1],
            adjncy: Vec::new(),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.xadj.len().saturating_sub(1)
    }

    /// Number of undirected edges.
    pub fn num_edges(&self) -> usize {
        self.adjncy.len() / 2
    }

    /// Return the neighbor index slice for node `i`.
    #[inline]
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.adjncy[self.xadj[i]..self.xadj[i + 1]]
    }

    #[inline]
    pub fn degree(&self, i: usize) -> usize {
        self.xadj[i + 1] - self.xadj[i]
    }

    /// Relabel nodes: old node `i` becomes `perm.new_index(i)`.
    pub fn permute(&self, perm: &Permutation) -> Result<Self, DofError> {
        let n = self.num_nodes();
        if perm.len() != n {
            return Err(DofError::InvalidPermutation(format!(
                "permutation of length {} applied to graph with {n} nodes",
                perm.len()
            )));
        }
        let mut xadj = Vec::with_capacity(n + 1);
        let mut adjncy = Vec::with_capacity(self.adjncy.len());
        xadj.push(0);
        for new in 0..n {
            let old = perm.new_to_old[new];
            let start = adjncy.len();
            adjncy.extend(self.neighbors(old).iter().map(|&j| perm.old_to_new[j]));
            adjncy[start..].sort_unstable();
            xadj.push(adjncy.len());
        }
        Ok(Self { xadj, adjncy })
    }
}

impl DebugInvariants for CsrGraph {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "CsrGraph");
    }

    fn validate_invariants(&self) -> Result<(), DofError> {
        validate_csr(&self.xadj, &self.adjncy)?;
        for i in 0..self.num_nodes() {
            let row = self.neighbors(i);
            if row.windows(2).any(|w| w[0] >= w[1]) || row.contains(&i) {
                return Err(DofError::GraphMalformed(format!(
                    "row {i} is not sorted, unique, and loop-free"
                )));
            }
        }
        Ok(())
    }
}

/// Bijection between old and new node labels.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Permutation {
    old_to_new: Vec<usize>,
    new_to_old: Vec<usize>,
}

impl Permutation {
    pub fn identity(n: usize) -> Self {
        Self {
            old_to_new: (0..n).collect(),
            new_to_old: (0..n).collect(),
        }
    }

    /// Build from an ordering: `order[k]` is the old node placed at new index `k`.
    pub fn from_new_to_old(order: Vec<usize>) -> Result<Self, DofError> {
        let n = order.len();
        let mut old_to_new = vec![usize::MAX; n];
        for (new, &old) in order.iter().enumerate() {
            if old >= n {
                return Err(DofError::InvalidPermutation(format!(
                    "entry {old} out of range for length {n}"
                )));
            }
            if old_to_new[old] != usize::MAX {
                return Err(DofError::InvalidPermutation(format!(
                    "node {old} appears twice"
                )));
            }
            old_to_new[old] = new;
        }
        Ok(Self {
            old_to_new,
            new_to_old: order,
        })
    }

    /// Build from old → new labels.
    pub fn from_old_to_new(labels: Vec<usize>) -> Result<Self, DofError> {
        Ok(Self::from_new_to_old(labels)?.inverse())
    }

    pub fn len(&self) -> usize {
        self.old_to_new.len()
    }

    pub fn is_empty(&self) -> bool {
        self.old_to_new.is_empty()
    }

    #[inline]
    pub fn new_index(&self, old: usize) -> usize {
        self.old_to_new[old]
    }

    #[inline]
    pub fn old_index(&self, new: usize) -> usize {
        self.new_to_old[new]
    }

    pub fn old_to_new(&self) -> &[usize] {
        &self.old_to_new
    }

    /// Elimination order: old node ids in new-index order.
    pub fn new_to_old(&self) -> &[usize] {
        &self.new_to_old
    }

    pub fn inverse(&self) -> Self {
        Self {
            old_to_new: self.new_to_old.clone(),
            new_to_old: self.old_to_new.clone(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.old_to_new.iter().enumerate().all(|(i, &j)| i == j)
    }
}

impl DebugInvariants for Permutation {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Permutation");
    }

    fn validate_invariants(&self) -> Result<(), DofError> {
        if self.old_to_new.len() != self.new_to_old.len() {
            return Err(DofError::InvalidPermutation("direction lengths differ".into()));
        }
        for (old, &new) in self.old_to_new.iter().enumerate() {
            if self.new_to_old.get(new) != Some(&old) {
                return Err(DofError::InvalidPermutation(format!(
                    "old {old} -> new {new} is not inverted"
                )));
            }
        }
        Ok(())
    }
}
