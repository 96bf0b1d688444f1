use std::sync::Arc;

use dof_sieve::data::agg_pattern::{AggregatePattern, LocalDof};
use dof_sieve::prelude::*;

fn taylor_hood_like() -> Vec<(usize, Arc<dyn FieldPattern>)> {
    vec![
        (0, UniformPattern::nodal(CellType::Triangle, 2).shared()),
        (1, UniformPattern::nodal(CellType::Triangle, 1).shared()),
        (2, UniformPattern::new(CellType::Triangle, &[0, 1]).unwrap().shared()),
    ]
}

#[test]
fn fields_interleave_per_sub_cell() {
    let agg = AggregatePattern::new(taylor_hood_like()).unwrap();
    assert_eq!(agg.num_dofs(), 12);
    assert_eq!(agg.local_offsets(0).unwrap(), &[0, 1, 3, 4, 6, 7]);
    assert_eq!(agg.local_offsets(1).unwrap(), &[2, 5, 8]);
    assert_eq!(agg.local_offsets(2).unwrap(), &[9, 10, 11]);
    assert_eq!(
        agg.layout()[4],
        LocalDof {
            dim: 0,
            sub_cell: 1,
            field: 0,
            component: 1
        }
    );
}

#[test]
fn sub_cell_offsets_cover_each_field() {
    let agg = AggregatePattern::new(taylor_hood_like()).unwrap();
    assert_eq!(agg.sub_cell_offsets(0, 0, 1).unwrap(), &[3, 4]);
    assert_eq!(agg.sub_cell_offsets(2, 1, 2).unwrap(), &[11]);
    assert!(agg.sub_cell_offsets(1, 1, 0).unwrap().is_empty());
    assert_eq!(
        agg.sub_cell_offsets(0, 0, 3),
        Err(DofError::SubCellOutOfRange { dim: 0, index: 3 })
    );
    assert_eq!(agg.sub_cell_offsets(9, 0, 0), Err(DofError::UnknownField(9)));
}

#[test]
fn input_order_does_not_change_layout() {
    let mut fields = taylor_hood_like();
    fields.reverse();
    let a = AggregatePattern::new(fields).unwrap();
    let b = AggregatePattern::new(taylor_hood_like()).unwrap();
    assert_eq!(a.layout(), b.layout());
}

#[test]
fn shared_edge_dof_gets_one_gid() {
    let mut conn = InMemoryConnManager::new();
    conn.add_block(1, CellType::Triangle).unwrap();
    conn.add_element_from_nodes(1, &[1, 2, 3], 10).unwrap();
    conn.add_element_from_nodes(1, &[3, 2, 4], 11).unwrap();
    let mut mgr: DofManager = DofManager::with_conn_manager(
        DofManagerConfig::default(),
        Arc::new(conn),
        NoComm,
    );
    for (name, (_, pattern)) in ["u", "p", "flux"].into_iter().zip(taylor_hood_like()) {
        mgr.add_field(name, pattern).unwrap();
    }
    mgr.build_global_unknowns().unwrap();

    let flux = mgr.field_num("flux").unwrap();
    // Edge (2,3) is edge 1 of the first triangle and edge 0 of the second.
    let first = mgr.sub_cell_offsets(1, flux, 1, 1).unwrap()[0];
    let second = mgr.sub_cell_offsets(1, flux, 1, 0).unwrap()[0];
    assert_eq!(
        mgr.element_gids(0).unwrap()[first],
        mgr.element_gids(1).unwrap()[second]
    );

    // 4 nodes x 3 nodal unknowns + 5 edges.
    assert_eq!(mgr.map().unwrap().num_global(), 17);
    let offsets = mgr.gid_field_offsets(1, mgr.field_num("p").unwrap()).unwrap();
    assert_eq!(offsets, &[2, 5, 8]);
}

#[test]
fn pattern_json_roundtrip() {
    let p = UniformPattern::new(CellType::Quadrilateral, &[1, 1, 1]).unwrap();
    let json = serde_json::to_string(&p).unwrap();
    let back: UniformPattern = serde_json::from_str(&json).unwrap();
    assert_eq!(back, p);
    assert_eq!(back.num_dofs(), 9);
}
