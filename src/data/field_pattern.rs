//! Field patterns: how one field's scalar unknowns attach to a reference cell.
//!
//! A [`FieldPattern`] numbers a field's local basis functions `0..num_dofs()`
//! and says which of them live on each sub-cell `(dim, index)` of the
//! reference cell. Patterns are immutable once built and shared behind
//! `Arc<dyn FieldPattern>` between the DOF manager and its aggregate
//! patterns.

use std::fmt;
use std::sync::Arc;

use crate::dof_error::DofError;
use crate::topology::cell_type::CellType;

/// Layout of one field's unknowns on a reference cell.
pub trait FieldPattern: Send + Sync + fmt::Debug {
    /// Reference cell this pattern is defined on.
    fn cell_type(&self) -> CellType;

    /// Local DOF indices (into `0..num_dofs()`) attached to one sub-cell.
    ///
    /// Returns an empty slice for sub-cells that carry no unknowns or lie
    /// outside the reference cell.
    fn sub_cell_indices(&self, dim: usize, sub_cell: usize) -> &[usize];

    /// Total number of local DOFs.
    fn num_dofs(&self) -> usize;

    /// Topological dimension of the reference cell.
    fn dimension(&self) -> usize {
        self.cell_type().dimension() as usize
    }

    /// Number of sub-cells of dimension `dim`.
    fn sub_cell_count(&self, dim: usize) -> usize {
        self.cell_type().sub_entity_count(dim)
    }

    /// Sub-cell counts for every dimension `0..=dimension()`.
    fn num_entities_per_dim(&self) -> Vec<usize> {
        self.cell_type().sub_entity_counts()
    }

    /// DOFs on sub-cell 0 of dimension `dim`; uniform patterns use the same
    /// count on every sub-cell of a dimension.
    fn num_dofs_per_entity(&self, dim: usize) -> usize {
        if self.sub_cell_count(dim) == 0 {
            0
        } else {
            self.sub_cell_indices(dim, 0).len()
        }
    }

    /// Whether two patterns are defined on the same reference geometry.
    fn same_geometry(&self, other: &dyn FieldPattern) -> bool {
        self.cell_type() == other.cell_type()
    }
}

/// Pattern with the same number of DOFs on every sub-cell of a dimension.
///
/// Local DOFs are numbered dimension-major: every node's DOFs first (node 0
/// components, node 1 components, ...), then edges, faces, and the cell.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UniformPattern {
    cell_type: CellType,
    dofs_per_dim: Vec<usize>,
    indices: Vec<Vec<Vec<usize>>>,
    num_dofs: usize,
}

impl UniformPattern {
    /// Build a pattern with `dofs_per_dim[d]` unknowns on each dimension-`d`
    /// sub-cell. Missing trailing dimensions carry no unknowns.
    pub fn new(cell_type: CellType, dofs_per_dim: &[usize]) -> Result<Self, DofError> {
        let top = cell_type.dimension() as usize;
        if dofs_per_dim.len() > top + 1 {
            return Err(DofError::SubCellOutOfRange {
                dim: dofs_per_dim.len() - 1,
                index: 0,
            });
        }
        let mut per_dim = dofs_per_dim.to_vec();
        per_dim.resize(top + 1, 0);
        Ok(Self::build(cell_type, per_dim))
    }

    /// `components` unknowns on every node (e.g. linear Lagrange).
    pub fn nodal(cell_type: CellType, components: usize) -> Self {
        let mut per_dim = vec![0; cell_type.dimension() as usize + 1];
        per_dim[0] = components;
        Self::build(cell_type, per_dim)
    }

    fn build(cell_type: CellType, per_dim: Vec<usize>) -> Self {
        let top = cell_type.dimension() as usize;
        let mut next = 0usize;
        let mut indices = Vec::with_capacity(top + 1);
        for (dim, &k) in per_dim.iter().enumerate() {
            let subs = (0..cell_type.sub_entity_count(dim))
                .map(|_| {
                    let ids: Vec<usize> = (next..next + k).collect();
                    next += k;
                    ids
                })
                .collect();
            indices.push(subs);
        }
        Self {
            cell_type,
            dofs_per_dim: per_dim,
            indices,
            num_dofs: next,
        }
    }

    /// Convenience: shared pattern handle.
    pub fn shared(self) -> Arc<dyn FieldPattern> {
        Arc::new(self)
    }

    /// Unknowns per sub-cell for each dimension.
    pub fn dofs_per_dim(&self) -> &[usize] {
        &self.dofs_per_dim
    }
}

impl fmt::Debug for UniformPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformPattern")
            .field("cell_type", &self.cell_type)
            .field("dofs_per_dim", &self.dofs_per_dim)
            .finish()
    }
}

impl FieldPattern for UniformPattern {
    fn cell_type(&self) -> CellType {
        self.cell_type
    }

    fn sub_cell_indices(&self, dim: usize, sub_cell: usize) -> &[usize] {
        self.indices
            .get(dim)
            .and_then(|subs| subs.get(sub_cell))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    fn num_dofs_per_entity(&self, dim: usize) -> usize {
        self.dofs_per_dim.get(dim).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodal_triangle() {
        let p = UniformPattern::nodal(CellType::Triangle, 2);
        assert_eq!(p.num_dofs(), 6);
        assert_eq!(p.sub_cell_indices(0, 1), &[2, 3]);
        assert!(p.sub_cell_indices(1, 0).is_empty());
        assert_eq!(p.num_entities_per_dim(), vec![3, 3, 1]);
    }

    #[test]
    fn quadratic_like_layout_numbers_edges_after_nodes() {
        let p = UniformPattern::new(CellType::Triangle, &[1, 1]).unwrap();
        assert_eq!(p.num_dofs(), 6);
        assert_eq!(p.sub_cell_indices(1, 0), &[3]);
        assert_eq!(p.num_dofs_per_entity(2), 0);
    }

    #[test]
    fn too_many_dimensions_is_an_error() {
        assert!(UniformPattern::new(CellType::Segment, &[1, 0, 1]).is_err());
    }

    #[test]
    fn out_of_range_sub_cell_is_empty() {
        let p = UniformPattern::nodal(CellType::Segment, 1);
        assert!(p.sub_cell_indices(0, 5).is_empty());
        assert!(p.sub_cell_indices(4, 0).is_empty());
    }
}
