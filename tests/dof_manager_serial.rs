mod util;
use util::*;

use std::sync::Arc;

use dof_sieve::prelude::*;

/// Block 0: one segment 3-5. Block 1: one triangle 1-2-3.
fn mixed_blocks() -> Arc<dyn ConnManager> {
    let mut conn = InMemoryConnManager::new();
    conn.add_block(0, CellType::Segment).unwrap();
    conn.add_block(1, CellType::Triangle).unwrap();
    conn.add_element_from_nodes(0, &[3, 5], 100).unwrap();
    conn.add_element_from_nodes(1, &[1, 2, 3], 200).unwrap();
    Arc::new(conn)
}

fn serial(conn: Arc<dyn ConnManager>) -> DofManager {
    DofManager::with_conn_manager(DofManagerConfig::default(), conn, NoComm)
}

#[test]
fn same_field_on_two_blocks_shares_interface_node() {
    let mut mgr = serial(mixed_blocks());
    let u = mgr
        .add_field_to_block(0, "u", UniformPattern::nodal(CellType::Segment, 1).shared())
        .unwrap();
    assert_eq!(
        mgr.add_field_to_block(1, "u", UniformPattern::nodal(CellType::Triangle, 1).shared())
            .unwrap(),
        u
    );
    mgr.build_global_unknowns().unwrap();
    assert_eq!(mgr.element_gids(0).unwrap(), &[2, 3]);
    assert_eq!(mgr.element_gids(1).unwrap(), &[0, 1, 2]);
    assert_eq!(mgr.map().unwrap().num_global(), 4);
    assert_eq!(mgr.block_element_ids(1).unwrap(), &[1]);
}

#[test]
fn global_field_must_fit_every_block() {
    let mut mgr = serial(mixed_blocks());
    mgr.add_field("u", UniformPattern::nodal(CellType::Triangle, 1).shared())
        .unwrap();
    assert!(matches!(
        mgr.build_global_unknowns(),
        Err(DofError::PatternMismatch { block: 0, .. })
    ));
}

#[test]
fn block_without_fields_contributes_nothing() {
    let mut mgr = serial(mixed_blocks());
    mgr.add_field_to_block(1, "T", UniformPattern::nodal(CellType::Triangle, 1).shared())
        .unwrap();
    mgr.build_global_unknowns().unwrap();
    assert!(mgr.element_gids(0).unwrap().is_empty());
    assert_eq!(mgr.element_gids(1).unwrap(), &[0, 1, 2]);
    assert_eq!(mgr.aggregate_pattern(0).unwrap_err(), DofError::UnknownBlock(0));
}

#[test]
fn graph_of_triangle_strip_reorders() {
    let mut mgr = serial(tri_grid(4, 2, |_| true));
    mgr.add_field("u", UniformPattern::nodal(CellType::Triangle, 1).shared())
        .unwrap();
    mgr.build_global_unknowns().unwrap();
    let graph = mgr.graph().unwrap();
    assert_eq!(graph.num_rows(), 8);
    let local = graph.local_graph().unwrap();
    let res = amd_order(&local).unwrap();
    let want: Vec<usize> = (0..8).collect();
    assert_permutation(res.permutation.new_to_old(), &want);
    assert_eq!(res.graph.num_edges(), local.num_edges());
}

#[test]
fn index_maps_serialize() {
    let mut mgr = serial(segments(&[(1, 2, 10), (2, 3, 11)]));
    mgr.add_field("u", UniformPattern::nodal(CellType::Segment, 1).shared())
        .unwrap();
    mgr.build_global_unknowns().unwrap();
    let map = mgr.map().unwrap();
    let bytes = bincode::serialize(&*map).unwrap();
    let back: IndexMap = bincode::deserialize(&bytes).unwrap();
    assert_eq!(back, *map);
    assert_eq!(back.lid(2), Some(2));

    let json = serde_json::to_string(&mgr.overlap_import().unwrap()).unwrap();
    let import: OverlapImport = serde_json::from_str(&json).unwrap();
    assert!(import.is_empty());
    assert!(mgr.overlap_export().unwrap().is_empty());
}

#[test]
fn debug_output_reports_state() {
    let mut mgr = serial(segments(&[(1, 2, 10)]));
    mgr.add_field("u", UniformPattern::nodal(CellType::Segment, 1).shared())
        .unwrap();
    assert!(format!("{mgr:?}").contains("built: false"));
    mgr.build_global_unknowns().unwrap();
    assert!(format!("{mgr:?}").contains("built: true"));
}
