#![allow(dead_code)]
use std::sync::Arc;

use dof_sieve::{
    algs::communicator::RayonComm,
    algs::csr_graph::CsrGraph,
    data::dof_manager::{DofManager, DofManagerConfig},
    topology::cell_type::CellType,
    topology::conn_manager::{ConnManager, InMemoryConnManager},
};

/// Two-rank Rayon comms (ranks 0 and 1) on the process-wide mailbox.
pub fn rayons() -> (RayonComm, RayonComm) {
    (RayonComm::new(0, 2), RayonComm::new(1, 2))
}

/// Run `f` once per rank, each on its own thread with a private mailbox.
pub fn run_ranks<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(RayonComm) -> T + Sync,
{
    let world = RayonComm::world(size);
    std::thread::scope(|s| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank panicked"))
            .collect()
    })
}

/// Segment mesh in block 0 from `(node_a, node_b, cell_gid)` triples.
pub fn segments(elems: &[(u64, u64, u64)]) -> Arc<dyn ConnManager> {
    let mut conn = InMemoryConnManager::new();
    conn.add_block(0, CellType::Segment).unwrap();
    for &(a, b, c) in elems {
        conn.add_element_from_nodes(0, &[a, b], c).unwrap();
    }
    Arc::new(conn)
}

/// Structured triangle mesh of an `nx` x `ny` node grid, keeping cells
/// whose index satisfies `keep`. Node ids are `1 + i + j * nx`.
pub fn tri_grid(nx: u64, ny: u64, keep: impl Fn(u64) -> bool) -> Arc<dyn ConnManager> {
    let mut conn = InMemoryConnManager::new();
    conn.add_block(1, CellType::Triangle).unwrap();
    let mut cell = 0u64;
    for j in 0..ny - 1 {
        for i in 0..nx - 1 {
            let n = |a: u64, b: u64| 1 + a + b * nx;
            let quads = [
                [n(i, j), n(i + 1, j), n(i + 1, j + 1)],
                [n(i, j), n(i + 1, j + 1), n(i, j + 1)],
            ];
            for tri in quads {
                if keep(cell) {
                    conn.add_element_from_nodes(1, &tri, 1000 + cell).unwrap();
                }
                cell += 1;
            }
        }
    }
    Arc::new(conn)
}

pub fn manager_on(conn: Arc<dyn ConnManager>, comm: RayonComm) -> DofManager<RayonComm> {
    DofManager::with_conn_manager(DofManagerConfig::default(), conn, comm)
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}

/// Bandwidth of an ordering π over an undirected simple graph E (u,v).
pub fn bandwidth(order: &[usize], edges: &[(usize, usize)]) -> usize {
    let mut pos = vec![0usize; order.len()];
    for (i, &v) in order.iter().enumerate() {
        pos[v] = i;
    }
    edges
        .iter()
        .map(|&(u, v)| pos[u].abs_diff(pos[v]))
        .max()
        .unwrap_or(0)
}

/// Undirected edge list of a graph, each edge once with `u < v`.
pub fn edge_set(g: &CsrGraph) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for u in 0..g.num_nodes() {
        for &v in g.neighbors(u) {
            if u < v {
                out.push((u, v));
            }
        }
    }
    out
}
