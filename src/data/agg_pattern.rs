//! Aggregate patterns: the merged per-element DOF layout of one element block.
//!
//! An [`AggregatePattern`] interleaves every field registered on a block into
//! one local DOF list. The layout is sub-cell-major: for each dimension in
//! ascending order, for each sub-cell of that dimension, every field (in field
//! number order) contributes its unknowns on that sub-cell. Offsets are fixed
//! once the pattern is built, so the position of any field's unknown inside an
//! element's GID list is known without looking at the element.
//!
//! # Invariants
//! - every registered field's local DOFs `0..num_dofs()` map to exactly one
//!   aggregate offset;
//! - offsets are dense: `0..num_dofs()` of the aggregate;
//! - all merged patterns share one reference cell.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::data::field_pattern::FieldPattern;
use crate::debug_invariants::DebugInvariants;
use crate::dof_error::DofError;
use crate::topology::cell_type::CellType;
use crate::topology::entity::SubEntity;
use crate::topology::ownership::DofKey;

/// Position of one aggregate DOF on the reference cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LocalDof {
    pub dim: usize,
    pub sub_cell: usize,
    pub field: usize,
    /// Index of this unknown among the field's unknowns on the sub-cell.
    pub component: usize,
}

/// Merged layout of all fields on one element block.
#[derive(Clone)]
pub struct AggregatePattern {
    cell_type: CellType,
    fields: Vec<(usize, Arc<dyn FieldPattern>)>,
    layout: Vec<LocalDof>,
    field_offsets: BTreeMap<usize, Vec<usize>>,
    sub_cell_offsets: BTreeMap<(usize, usize, usize), Vec<usize>>,
    entity_base: Vec<usize>,
}

impl AggregatePattern {
    /// Merge `fields` (field number, pattern). Field order in the layout is
    /// ascending field number regardless of input order.
    pub fn new(
        mut fields: Vec<(usize, Arc<dyn FieldPattern>)>,
    ) -> Result<Self, DofError> {
        fields.sort_by_key(|(num, _)| *num);
        fields.dedup_by_key(|(num, _)| *num);
        let cell_type = match fields.first() {
            Some((_, p)) => p.cell_type(),
            None => CellType::default(),
        };
        for (num, p) in &fields {
            if p.cell_type() != cell_type {
                return Err(DofError::PatternMismatch {
                    block: 0,
                    field: num.to_string(),
                    reason: format!(
                        "pattern cell type {:?} differs from {:?}",
                        p.cell_type(),
                        cell_type
                    ),
                });
            }
        }

        let counts = cell_type.sub_entity_counts();
        let mut entity_base = Vec::with_capacity(counts.len());
        let mut acc = 0usize;
        for &c in &counts {
            entity_base.push(acc);
            acc += c;
        }

        let mut layout = Vec::new();
        let mut field_offsets: BTreeMap<usize, Vec<Option<usize>>> = fields
            .iter()
            .map(|(num, p)| (*num, vec![None; p.num_dofs()]))
            .collect();
        let mut sub_cell_offsets = BTreeMap::new();
        for (dim, &count) in counts.iter().enumerate() {
            for sub_cell in 0..count {
                for (num, pattern) in &fields {
                    let ids = pattern.sub_cell_indices(dim, sub_cell);
                    if ids.is_empty() {
                        continue;
                    }
                    let slots = field_offsets.entry(*num).or_default();
                    let mut here = Vec::with_capacity(ids.len());
                    for (component, &local) in ids.iter().enumerate() {
                        let offset = layout.len();
                        match slots.get_mut(local) {
                            Some(slot) if slot.is_none() => *slot = Some(offset),
                            _ => {
                                return Err(DofError::PatternMismatch {
                                    block: 0,
                                    field: num.to_string(),
                                    reason: format!(
                                        "local dof {local} repeated or out of range"
                                    ),
                                });
                            }
                        }
                        layout.push(LocalDof {
                            dim,
                            sub_cell,
                            field: *num,
                            component,
                        });
                        here.push(offset);
                    }
                    sub_cell_offsets.insert((*num, dim, sub_cell), here);
                }
            }
        }

        let mut dense = BTreeMap::new();
        for (num, slots) in field_offsets {
            let offsets: Option<Vec<usize>> = slots.into_iter().collect();
            let offsets = offsets.ok_or_else(|| DofError::PatternMismatch {
                block: 0,
                field: num.to_string(),
                reason: "pattern leaves local dofs unattached to any sub-cell".into(),
            })?;
            dense.insert(num, offsets);
        }

        let agg = Self {
            cell_type,
            fields,
            layout,
            field_offsets: dense,
            sub_cell_offsets,
            entity_base,
        };
        crate::debug_invariants!(agg.validate_invariants(), "AggregatePattern::new");
        Ok(agg)
    }

    /// Reference cell shared by all merged fields.
    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Total DOFs per element.
    pub fn num_dofs(&self) -> usize {
        self.layout.len()
    }

    /// Field numbers merged into this pattern, ascending.
    pub fn field_nums(&self) -> impl Iterator<Item = usize> + '_ {
        self.fields.iter().map(|(n, _)| *n)
    }

    /// The pattern registered for `field`, if merged here.
    pub fn field_pattern(&self, field: usize) -> Option<&Arc<dyn FieldPattern>> {
        self.fields
            .iter()
            .find(|(n, _)| *n == field)
            .map(|(_, p)| p)
    }

    /// Aggregate layout, one entry per local DOF.
    pub fn layout(&self) -> &[LocalDof] {
        &self.layout
    }

    /// Aggregate offsets of `field`'s unknowns, ordered like the field
    /// pattern's local DOF numbering.
    pub fn local_offsets(&self, field: usize) -> Option<&[usize]> {
        self.field_offsets.get(&field).map(|v| v.as_slice())
    }

    /// Aggregate offsets of `field`'s unknowns on one sub-cell.
    ///
    /// A field with no unknowns on a valid sub-cell yields an empty slice.
    pub fn sub_cell_offsets(
        &self,
        field: usize,
        dim: usize,
        sub_cell: usize,
    ) -> Result<&[usize], DofError> {
        if !self.field_offsets.contains_key(&field) {
            return Err(DofError::UnknownField(field));
        }
        if sub_cell >= self.cell_type.sub_entity_count(dim) {
            return Err(DofError::SubCellOutOfRange {
                dim,
                index: sub_cell,
            });
        }
        Ok(self
            .sub_cell_offsets
            .get(&(field, dim, sub_cell))
            .map(|v| v.as_slice())
            .unwrap_or(&[]))
    }

    /// Number of sub-entities an element connectivity list must carry.
    pub fn connectivity_len(&self) -> usize {
        self.cell_type.total_sub_entities()
    }

    /// DOF key for every aggregate slot of one element.
    pub fn element_keys(&self, element: usize, conn: &[SubEntity]) -> Result<Vec<DofKey>, DofError> {
        if conn.len() != self.connectivity_len() {
            return Err(DofError::ConnectivityMismatch {
                element,
                expected: self.connectivity_len(),
                got: conn.len(),
            });
        }
        Ok(self
            .layout
            .iter()
            .map(|d| DofKey::new(conn[self.entity_base[d.dim] + d.sub_cell], d.field, d.component))
            .collect())
    }
}

impl DebugInvariants for AggregatePattern {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "AggregatePattern");
    }

    fn validate_invariants(&self) -> Result<(), DofError> {
        let mut seen = vec![false; self.layout.len()];
        for (field, offsets) in &self.field_offsets {
            for &o in offsets {
                match seen.get_mut(o) {
                    Some(s) if !*s => *s = true,
                    _ => {
                        return Err(DofError::PatternMismatch {
                            block: 0,
                            field: field.to_string(),
                            reason: format!("offset {o} duplicated or out of range"),
                        });
                    }
                }
            }
        }
        if seen.iter().any(|s| !s) {
            return Err(DofError::PatternMismatch {
                block: 0,
                field: String::new(),
                reason: "aggregate offsets are not dense".into(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for AggregatePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatePattern")
            .field("cell_type", &self.cell_type)
            .field("fields", &self.field_nums().collect::<Vec<_>>())
            .field("num_dofs", &self.num_dofs())
            .finish()
    }
}

impl fmt::Display for AggregatePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:?}: {} dofs per element",
            self.cell_type,
            self.num_dofs()
        )?;
        for (field, offsets) in &self.field_offsets {
            writeln!(f, "  field {field}: offsets {offsets:?}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::field_pattern::UniformPattern;

    fn tri(per_dim: &[usize]) -> Arc<dyn FieldPattern> {
        UniformPattern::new(CellType::Triangle, per_dim)
            .unwrap()
            .shared()
    }

    #[test]
    fn two_nodal_fields_interleave_per_node() {
        let agg = AggregatePattern::new(vec![(1, tri(&[1])), (0, tri(&[2]))]).unwrap();
        assert_eq!(agg.num_dofs(), 9);
        // node 0: field0 c0, field0 c1, field1; node 1: ...
        assert_eq!(agg.local_offsets(0).unwrap(), &[0, 1, 3, 4, 6, 7]);
        assert_eq!(agg.local_offsets(1).unwrap(), &[2, 5, 8]);
        assert_eq!(agg.field_nums().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn edge_dofs_follow_node_dofs() {
        let agg = AggregatePattern::new(vec![(0, tri(&[1, 1]))]).unwrap();
        assert_eq!(agg.sub_cell_offsets(0, 1, 2).unwrap(), &[5]);
        assert!(agg.sub_cell_offsets(0, 2, 0).unwrap().is_empty());
        assert!(agg.sub_cell_offsets(0, 1, 3).is_err());
        assert!(agg.sub_cell_offsets(4, 0, 0).is_err());
    }

    #[test]
    fn mixed_geometry_is_rejected() {
        let seg = UniformPattern::nodal(CellType::Segment, 1).shared();
        let err = AggregatePattern::new(vec![(0, tri(&[1])), (1, seg)]).unwrap_err();
        assert!(matches!(err, DofError::PatternMismatch { .. }));
    }

    #[test]
    fn element_keys_follow_layout() {
        let agg = AggregatePattern::new(vec![(0, tri(&[1, 1]))]).unwrap();
        let conn: Vec<SubEntity> = [1, 2, 3]
            .iter()
            .map(|&g| SubEntity::node(g))
            .chain([7, 8, 9].iter().map(|&g| SubEntity::edge(g)))
            .chain(std::iter::once(SubEntity::new(2, 50)))
            .collect();
        let keys = agg.element_keys(0, &conn).unwrap();
        assert_eq!(keys.len(), 6);
        assert_eq!(keys[4].entity, SubEntity::edge(8));
        assert!(agg.element_keys(0, &conn[..3]).is_err());
    }
}
