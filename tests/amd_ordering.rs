mod util;
use util::*;

use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use dof_sieve::prelude::*;

fn random_graph(n: usize, density: f64, seed: u64) -> CsrGraph {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut edges = Vec::new();
    for u in 0..n {
        for v in u + 1..n {
            if rng.gen_bool(density) {
                edges.push((u, v));
            }
        }
    }
    CsrGraph::from_edges(n, &edges).unwrap()
}

fn grid(nx: usize, ny: usize) -> CsrGraph {
    let id = |i: usize, j: usize| i + j * nx;
    let mut edges = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            if i + 1 < nx {
                edges.push((id(i, j), id(i + 1, j)));
            }
            if j + 1 < ny {
                edges.push((id(i, j), id(i, j + 1)));
            }
        }
    }
    CsrGraph::from_edges(nx * ny, &edges).unwrap()
}

#[test]
fn path_eliminates_endpoints_first() {
    let g = CsrGraph::from_edges(4, &[(0, 1), (1, 2), (2, 3)]).unwrap();
    let res = amd_order(&g).unwrap();
    assert_eq!(res.permutation.new_to_old(), &[0, 3, 1, 2]);
    assert_eq!(res.graph.num_edges(), 3);
}

#[test]
fn edgeless_graph_keeps_identity() {
    let res = amd_order(&CsrGraph::empty(6)).unwrap();
    assert!(res.permutation.is_identity());
    assert_eq!(res.stats.nnz_l, 0);
}

#[test]
fn empty_graph_orders_to_nothing() {
    let res = amd_order(&CsrGraph::empty(0)).unwrap();
    assert!(res.permutation.is_empty());
}

#[test]
fn asymmetric_input_is_rejected() {
    let err = AmdReorderer::default()
        .reorder_csr(vec![0, 1, 1], vec![1])
        .unwrap_err();
    assert!(matches!(err, DofError::AsymmetricGraph { from: 0, to: 1 }));
}

#[test]
fn grid_ordering_is_a_valid_relabelling() {
    let g = grid(8, 8);
    for aggressive in [false, true] {
        let amd = AmdReorderer::new(AmdOptions {
            aggressive_absorption: aggressive,
            ..AmdOptions::default()
        });
        let res = amd.reorder(&g).unwrap();
        let want: Vec<usize> = (0..64).collect();
        assert_permutation(res.permutation.new_to_old(), &want);
        assert_eq!(res.graph.num_edges(), g.num_edges());
        assert!(res.stats.pivots > 0);
    }
}

#[test]
fn stats_serialize_as_json() {
    let res = amd_order(&grid(4, 3)).unwrap();
    let json = serde_json::to_string(&res.stats).unwrap();
    let back: AmdStats = serde_json::from_str(&json).unwrap();
    assert_eq!(back, res.stats);
}

proptest! {
    #[test]
    fn ordering_is_bijection_preserving_adjacency(
        n in 1usize..40,
        density in 0.0f64..0.5,
        seed in any::<u64>(),
    ) {
        let g = random_graph(n, density, seed);
        let res = amd_order(&g).unwrap();
        let perm = &res.permutation;

        let want: Vec<usize> = (0..n).collect();
        assert_permutation(perm.new_to_old(), &want);
        for old in 0..n {
            prop_assert_eq!(perm.old_index(perm.new_index(old)), old);
        }

        // Every edge of the input appears, relabelled, in the output.
        prop_assert_eq!(res.graph.num_edges(), g.num_edges());
        for (u, v) in edge_set(&g) {
            let (a, b) = (perm.new_index(u), perm.new_index(v));
            prop_assert!(res.graph.neighbors(a).contains(&b));
        }

        // Relabelling back recovers the input.
        let back = res.graph.permute(&perm.inverse()).unwrap();
        prop_assert_eq!(back, g);
    }

    #[test]
    fn ordering_is_deterministic(n in 2usize..30, seed in any::<u64>()) {
        let g = random_graph(n, 0.2, seed);
        let a = amd_order(&g).unwrap();
        let b = amd_order(&g).unwrap();
        prop_assert_eq!(a.permutation, b.permutation);
        prop_assert_eq!(a.stats, b.stats);
    }
}
