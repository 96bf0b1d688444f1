//! Cell type metadata and reference-cell sub-entity counts.

/// Common cell types for mesh elements.
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, Default, serde::Serialize, serde::Deserialize,
)]
pub enum CellType {
    /// 0D vertex.
    #[default]
    Vertex,
    /// 1D segment/edge.
    Segment,
    /// 2D simplex (triangle).
    Triangle,
    /// 2D tensor-product cell (quad).
    Quadrilateral,
    /// 3D simplex (tet).
    Tetrahedron,
    /// 3D tensor-product cell (hex).
    Hexahedron,
    /// 3D wedge/prism.
    Prism,
    /// 3D pyramid.
    Pyramid,
    /// 2D polygon with `n` vertices.
    Polygon(u8),
    /// Generic simplex with dimension `d`.
    Simplex(u8),
}

impl CellType {
    /// Returns the topological dimension of the cell.
    pub fn dimension(self) -> u8 {
        match self {
            CellType::Vertex => 0,
            CellType::Segment => 1,
            CellType::Triangle | CellType::Quadrilateral | CellType::Polygon(_) => 2,
            CellType::Tetrahedron | CellType::Hexahedron | CellType::Prism | CellType::Pyramid => {
                3
            }
            CellType::Simplex(d) => d,
        }
    }

    /// Number of sub-entities of dimension `dim` in the reference cell.
    ///
    /// Dimension `self.dimension()` always has exactly one entity (the cell
    /// itself); dimensions above it have none.
    pub fn sub_entity_count(self, dim: usize) -> usize {
        let top = self.dimension() as usize;
        if dim > top {
            return 0;
        }
        if dim == top {
            return 1;
        }
        match (self, dim) {
            (CellType::Segment, 0) => 2,
            (CellType::Triangle, _) => 3,
            (CellType::Quadrilateral, _) => 4,
            (CellType::Polygon(n), _) => n as usize,
            (CellType::Tetrahedron, 0) => 4,
            (CellType::Tetrahedron, 1) => 6,
            (CellType::Tetrahedron, _) => 4,
            (CellType::Hexahedron, 0) => 8,
            (CellType::Hexahedron, 1) => 12,
            (CellType::Hexahedron, _) => 6,
            (CellType::Prism, 0) => 6,
            (CellType::Prism, 1) => 9,
            (CellType::Prism, _) => 5,
            (CellType::Pyramid, 0) => 5,
            (CellType::Pyramid, 1) => 8,
            (CellType::Pyramid, _) => 5,
            (CellType::Simplex(d), k) => binomial(d as usize + 1, k + 1),
            _ => 0,
        }
    }

    /// Sub-entity counts for every dimension `0..=dimension()`.
    pub fn sub_entity_counts(self) -> Vec<usize> {
        (0..=self.dimension() as usize)
            .map(|d| self.sub_entity_count(d))
            .collect()
    }

    /// Total number of sub-entities over all dimensions (cell included).
    pub fn total_sub_entities(self) -> usize {
        self.sub_entity_counts().iter().sum()
    }
}

fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1usize, |acc, i| acc * (n - i) / (i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_counts() {
        assert_eq!(CellType::Segment.sub_entity_counts(), vec![2, 1]);
        assert_eq!(CellType::Triangle.sub_entity_counts(), vec![3, 3, 1]);
        assert_eq!(CellType::Quadrilateral.sub_entity_counts(), vec![4, 4, 1]);
        assert_eq!(CellType::Tetrahedron.sub_entity_counts(), vec![4, 6, 4, 1]);
        assert_eq!(CellType::Hexahedron.sub_entity_counts(), vec![8, 12, 6, 1]);
        assert_eq!(CellType::Prism.total_sub_entities(), 21);
    }

    #[test]
    fn generic_simplex_matches_named_simplices() {
        assert_eq!(
            CellType::Simplex(2).sub_entity_counts(),
            CellType::Triangle.sub_entity_counts()
        );
        assert_eq!(
            CellType::Simplex(3).sub_entity_counts(),
            CellType::Tetrahedron.sub_entity_counts()
        );
    }

    #[test]
    fn out_of_range_dimension_is_empty() {
        assert_eq!(CellType::Segment.sub_entity_count(2), 0);
        assert_eq!(CellType::Vertex.sub_entity_counts(), vec![1]);
    }
}
