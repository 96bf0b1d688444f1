//! Approximate minimum degree (AMD) fill-reducing ordering.
//!
//! The elimination runs on a quotient graph: every eliminated pivot turns
//! into an *element* whose variable list `Le` stands for the clique its
//! elimination would create, so fill is never stored explicitly. Variables
//! keep two pruned adjacency lists (variables and elements). Storage is an
//! arena indexed by node id; an element reuses the id of its pivot, and
//! merged or absorbed nodes keep a back-reference to the node that took
//! them over.
//!
//! Degrees are the AMD upper bound
//! `min(n - w_i, d_i + |Lp \ i|, |A_i \ i| + |Lp \ i| + Σ_e |Le \ Lp|)`
//! rather than exact external degrees. Variables with identical pruned
//! adjacency are merged into supervariables and eliminated together (mass
//! elimination).
//!
//! Pivots are picked in passes: every variable whose degree equals the
//! current minimum is eliminated in ascending index order, skipping those
//! whose degree changed earlier in the same pass. On a path `0-1-2-3` this
//! eliminates both endpoints before either interior node.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

use crate::algs::csr_graph::{CsrGraph, Permutation};
use crate::debug_invariants::DebugInvariants;
use crate::dof_error::DofError;

/// Options for [`AmdReorderer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AmdOptions {
    /// Log elimination statistics at `info` level.
    pub verbose: bool,
    /// Absorb elements whose variables all lie in the current pivot's element.
    pub aggressive_absorption: bool,
}

impl Default for AmdOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            aggressive_absorption: true,
        }
    }
}

/// Counters gathered during one ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AmdStats {
    /// Minimum-degree passes.
    pub passes: usize,
    /// Supervariables eliminated as pivots.
    pub pivots: usize,
    /// Variables merged into another supervariable.
    pub supervariables_merged: usize,
    /// Elements absorbed into a newer element.
    pub elements_absorbed: usize,
    /// Estimated nonzeros in the strictly lower factor.
    pub nnz_l: u64,
}

/// Result of [`AmdReorderer::reorder`].
#[derive(Clone, Debug)]
pub struct AmdResult {
    /// Old → new labels; `new_to_old()` is the elimination order.
    pub permutation: Permutation,
    /// Input graph relabelled by `permutation`.
    pub graph: CsrGraph,
    pub stats: AmdStats,
}

/// Stateless AMD driver; all working storage lives in one call.
#[derive(Clone, Copy, Debug, Default)]
pub struct AmdReorderer {
    pub options: AmdOptions,
}

impl AmdReorderer {
    pub fn new(options: AmdOptions) -> Self {
        Self { options }
    }

    /// Order `graph` and return the permutation plus the permuted graph.
    ///
    /// The graph is validated first; self-loops and duplicate entries are
    /// ignored.
    pub fn reorder(&self, graph: &CsrGraph) -> Result<AmdResult, DofError> {
        let graph = CsrGraph::new(graph.xadj.clone(), graph.adjncy.clone())?;
        let mut qg = QuotientGraph::new(&graph, self.options.aggressive_absorption);
        let order = qg.eliminate_all();
        let permutation = Permutation::from_new_to_old(order)?;
        crate::debug_invariants!(permutation.validate_invariants(), "AmdReorderer::reorder");
        let permuted = graph.permute(&permutation)?;
        if self.options.verbose {
            let s = &qg.stats;
            log::info!(
                "[amd] n={} edges={} passes={} pivots={} merged={} absorbed={} nnz(L)~{}",
                graph.num_nodes(),
                graph.num_edges(),
                s.passes,
                s.pivots,
                s.supervariables_merged,
                s.elements_absorbed,
                s.nnz_l
            );
        }
        Ok(AmdResult {
            permutation,
            graph: permuted,
            stats: qg.stats,
        })
    }

    /// Order raw CSR arrays.
    pub fn reorder_csr(&self, xadj: Vec<usize>, adjncy: Vec<usize>) -> Result<AmdResult, DofError> {
        self.reorder(&CsrGraph::new(xadj, adjncy)?)
    }
}

/// Order `graph` with default options.
pub fn amd_order(graph: &CsrGraph) -> Result<AmdResult, DofError> {
    AmdReorderer::default().reorder(graph)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Kind {
    Variable,
    Element,
    /// Element absorbed into the given newer element.
    Absorbed(usize),
    /// Variable merged into the given principal supervariable.
    Merged(usize),
}

struct QuotientGraph {
    kind: Vec<Kind>,
    adj_vars: Vec<Vec<usize>>,
    adj_elems: Vec<Vec<usize>>,
    elem_vars: Vec<Vec<usize>>,
    weight: Vec<usize>,
    members: Vec<Vec<usize>>,
    degree: Vec<usize>,
    queue: BTreeSet<(usize, usize)>,
    live_weight: usize,
    aggressive: bool,
    // Scratch stamps: `lp_mark[v] == stamp` iff v is in the current Lp.
    lp_mark: Vec<usize>,
    stale: Vec<usize>,
    stamp: usize,
    pass: usize,
    stats: AmdStats,
}

impl QuotientGraph {
    fn new(graph: &CsrGraph, aggressive: bool) -> Self {
        let n = graph.num_nodes();
        let adj_vars: Vec<Vec<usize>> = (0..n).map(|i| graph.neighbors(i).to_vec()).collect();
        let degree: Vec<usize> = adj_vars.iter().map(|a| a.len()).collect();
        let queue = degree.iter().enumerate().map(|(i, &d)| (d, i)).collect();
        Self {
            kind: vec![Kind::Variable; n],
            adj_vars,
            adj_elems: vec![Vec::new(); n],
            elem_vars: vec![Vec::new(); n],
            weight: vec![1; n],
            members: vec![Vec::new(); n],
            degree,
            queue,
            live_weight: n,
            aggressive,
            lp_mark: vec![0; n],
            stale: vec![0; n],
            stamp: 0,
            pass: 0,
            stats: AmdStats::default(),
        }
    }

    fn eliminate_all(&mut self) -> Vec<usize> {
        let n = self.kind.len();
        let mut order = Vec::with_capacity(n);
        while let Some(&(mindeg, _)) = self.queue.first() {
            self.pass += 1;
            self.stats.passes += 1;
            let candidates: Vec<usize> = self
                .queue
                .iter()
                .take_while(|&&(d, _)| d == mindeg)
                .map(|&(_, i)| i)
                .collect();
            for p in candidates {
                if self.stale[p] == self.pass || self.kind[p] != Kind::Variable {
                    continue;
                }
                self.eliminate(p, &mut order);
            }
        }
        debug_assert!(self.back_references_resolve());
        order
    }

    /// Every merged variable leads to an element, every absorbed element to
    /// a newer element.
    fn back_references_resolve(&self) -> bool {
        self.kind.iter().enumerate().all(|(v, k)| match *k {
            Kind::Variable => false,
            Kind::Element => true,
            Kind::Merged(i) => i != v && self.kind[i] != Kind::Variable,
            Kind::Absorbed(e) => e != v && matches!(self.kind[e], Kind::Element | Kind::Absorbed(_)),
        })
    }

    fn eliminate(&mut self, p: usize, order: &mut Vec<usize>) {
        self.queue.remove(&(self.degree[p], p));
        self.stamp += 1;
        let stamp = self.stamp;

        // Lp = (A_p ∪ ⋃ Le) \ {p}, live principal variables only.
        let mut lp: Vec<usize> = std::mem::take(&mut self.adj_vars[p]);
        let absorbed = std::mem::take(&mut self.adj_elems[p]);
        for &e in &absorbed {
            lp.extend(self.elem_vars[e].drain(..));
            self.kind[e] = Kind::Absorbed(p);
        }
        self.stats.elements_absorbed += absorbed.len();
        lp.retain(|&v| v != p && self.kind[v] == Kind::Variable);
        lp.sort_unstable();
        lp.dedup();
        for &v in &lp {
            self.lp_mark[v] = stamp;
        }

        let wp = self.weight[p];
        let w_lp: usize = lp.iter().map(|&v| self.weight[v]).sum();
        self.stats.pivots += 1;
        self.stats.nnz_l += (wp * (wp - 1) / 2 + wp * w_lp) as u64;
        self.live_weight -= wp;
        order.push(p);
        let mut merged = std::mem::take(&mut self.members[p]);
        merged.sort_unstable();
        order.extend(merged);
        self.kind[p] = Kind::Element;

        // Prune every variable of the new element.
        for &i in &lp {
            self.queue.remove(&(self.degree[i], i));
            self.stale[i] = self.pass;
            let (lp_mark, kind) = (&self.lp_mark, &self.kind);
            self.adj_vars[i].retain(|&v| v != p && lp_mark[v] != stamp && kind[v] == Kind::Variable);
            self.adj_elems[i].retain(|&e| kind[e] == Kind::Element);
            self.adj_elems[i].push(p);
            self.adj_elems[i].sort_unstable();
        }

        // |Le \ Lp| for every element touching Lp; absorb empty ones.
        let mut outside: HashMap<usize, usize> = HashMap::new();
        for &i in &lp {
            for &e in &self.adj_elems[i] {
                if e == p || outside.contains_key(&e) {
                    continue;
                }
                let w: usize = self.elem_vars[e]
                    .iter()
                    .filter(|&&v| self.lp_mark[v] != stamp)
                    .map(|&v| self.weight[v])
                    .sum();
                outside.insert(e, w);
            }
        }
        if self.aggressive {
            let mut dead: Vec<usize> = outside
                .iter()
                .filter(|&(_, &w)| w == 0)
                .map(|(&e, _)| e)
                .collect();
            dead.sort_unstable();
            for e in dead {
                self.kind[e] = Kind::Absorbed(p);
                self.elem_vars[e].clear();
                self.stats.elements_absorbed += 1;
                outside.remove(&e);
            }
            for &i in &lp {
                let kind = &self.kind;
                self.adj_elems[i].retain(|&e| kind[e] == Kind::Element);
            }
        }

        self.detect_supervariables(&lp);

        let live: Vec<usize> = lp
            .iter()
            .copied()
            .filter(|&v| self.kind[v] == Kind::Variable)
            .collect();
        let w_lp: usize = live.iter().map(|&v| self.weight[v]).sum();
        for &i in &live {
            let wi = self.weight[i];
            let vars_w: usize = self.adj_vars[i].iter().map(|&v| self.weight[v]).sum();
            let ext: usize = self.adj_elems[i]
                .iter()
                .filter(|&&e| e != p)
                .map(|e| outside.get(e).copied().unwrap_or(0))
                .sum();
            let approx = vars_w + (w_lp - wi) + ext;
            let bound_old = self.degree[i] + (w_lp - wi);
            let d = approx
                .min(bound_old)
                .min(self.live_weight.saturating_sub(wi));
            self.degree[i] = d;
            self.queue.insert((d, i));
        }
        self.elem_vars[p] = live;
    }

    /// Merge variables of `lp` whose pruned adjacency lists coincide.
    fn detect_supervariables(&mut self, lp: &[usize]) {
        let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();
        for &i in lp {
            if self.kind[i] != Kind::Variable {
                continue;
            }
            let mut h = DefaultHasher::new();
            self.adj_vars[i].hash(&mut h);
            self.adj_elems[i].hash(&mut h);
            buckets.entry(h.finish()).or_default().push(i);
        }
        let mut groups: Vec<Vec<usize>> = buckets.into_values().filter(|b| b.len() > 1).collect();
        groups.sort_unstable();
        for group in groups {
            let mut principals: Vec<usize> = Vec::new();
            for j in group {
                let twin = principals.iter().copied().find(|&i| {
                    self.adj_vars[i] == self.adj_vars[j] && self.adj_elems[i] == self.adj_elems[j]
                });
                match twin {
                    Some(i) => self.merge(i, j),
                    None => principals.push(j),
                }
            }
        }
    }

    fn merge(&mut self, i: usize, j: usize) {
        self.weight[i] += self.weight[j];
        self.weight[j] = 0;
        self.members[i].push(j);
        let inherited = std::mem::take(&mut self.members[j]);
        self.members[i].extend(inherited);
        self.kind[j] = Kind::Merged(i);
        for e in std::mem::take(&mut self.adj_elems[j]) {
            self.elem_vars[e].retain(|&v| v != j);
        }
        for v in std::mem::take(&mut self.adj_vars[j]) {
            self.adj_vars[v].retain(|&u| u != j);
        }
        self.stats.supervariables_merged += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(g: &CsrGraph) -> Vec<usize> {
        amd_order(g).unwrap().permutation.new_to_old().to_vec()
    }

    #[test]
    fn path_eliminates_endpoints_first() {
        let g = CsrGraph::from_edges(4, &[(0, 1), (1, 2), (2, 3)]).unwrap();
        assert_eq!(order(&g), vec![0, 3, 1, 2]);
    }

    #[test]
    fn edgeless_graph_keeps_identity() {
        let res = amd_order(&CsrGraph::empty(5)).unwrap();
        assert!(res.permutation.is_identity());
        assert_eq!(res.graph, CsrGraph::empty(5));
        assert_eq!(res.stats.nnz_l, 0);
    }

    #[test]
    fn star_center_goes_last() {
        let g = CsrGraph::from_edges(5, &[(0, 1), (0, 2), (0, 3), (0, 4)]).unwrap();
        assert_eq!(order(&g), vec![1, 2, 3, 4, 0]);
    }

    #[test]
    fn clique_is_mass_eliminated() {
        let edges: Vec<(usize, usize)> = (0..4)
            .flat_map(|a| (a + 1..4).map(move |b| (a, b)))
            .collect();
        let g = CsrGraph::from_edges(4, &edges).unwrap();
        let res = amd_order(&g).unwrap();
        assert_eq!(res.permutation.new_to_old(), &[0, 1, 2, 3]);
        assert_eq!(res.stats.supervariables_merged, 2);
        assert_eq!(res.stats.nnz_l, 6);
    }

    #[test]
    fn permuted_graph_matches_relabelled_edges() {
        let g = CsrGraph::from_edges(6, &[(0, 3), (3, 5), (5, 1), (1, 4), (4, 2), (2, 0), (0, 5)])
            .unwrap();
        let res = amd_order(&g).unwrap();
        let p = &res.permutation;
        for i in 0..6 {
            let mut mapped: Vec<usize> = g.neighbors(i).iter().map(|&j| p.new_index(j)).collect();
            mapped.sort_unstable();
            assert_eq!(res.graph.neighbors(p.new_index(i)), mapped.as_slice());
        }
    }

    #[test]
    fn self_loops_and_duplicates_are_ignored() {
        let res = AmdReorderer::default()
            .reorder_csr(vec![0, 3, 5], vec![0, 1, 1, 1, 0])
            .unwrap();
        assert_eq!(res.graph.neighbors(0), &[1]);
        assert_eq!(res.permutation.len(), 2);
    }

    #[test]
    fn malformed_input_is_rejected_before_elimination() {
        let amd = AmdReorderer::new(AmdOptions {
            verbose: true,
            aggressive_absorption: false,
        });
        assert!(matches!(
            amd.reorder_csr(vec![0, 1, 1], vec![1]),
            Err(DofError::AsymmetricGraph { .. })
        ));
        assert!(matches!(
            amd.reorder_csr(vec![0, 1], vec![3]),
            Err(DofError::NodeOutOfRange { .. })
        ));
    }

    #[test]
    fn grid_ordering_is_a_bijection_without_aggressive_absorption() {
        let side = 5;
        let mut edges = Vec::new();
        for r in 0..side {
            for c in 0..side {
                let v = r * side + c;
                if c + 1 < side {
                    edges.push((v, v + 1));
                }
                if r + 1 < side {
                    edges.push((v, v + side));
                }
            }
        }
        let g = CsrGraph::from_edges(side * side, &edges).unwrap();
        for aggressive in [false, true] {
            let res = AmdReorderer::new(AmdOptions {
                verbose: false,
                aggressive_absorption: aggressive,
            })
            .reorder(&g)
            .unwrap();
            assert!(res.permutation.validate_invariants().is_ok());
            assert_eq!(res.graph.num_edges(), g.num_edges());
            // corners have degree 2 and go first
            assert_eq!(res.permutation.new_to_old()[0], 0);
        }
    }
}
