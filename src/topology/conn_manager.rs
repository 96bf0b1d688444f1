//! Connection manager: local elements → global sub-entity ids.
//!
//! The DOF manager never owns the mesh; it consumes connectivity through the
//! [`ConnManager`] trait. Connectivity for one element is a flat list of
//! [`SubEntity`] values laid out dimension-major: all nodes of the reference
//! cell in reference order, then all edges, then faces, then the cell itself.
//! [`InMemoryConnManager`] is a concrete implementation suitable for tests
//! and for meshes already held in memory.

use std::collections::{BTreeMap, HashMap};

use crate::dof_error::DofError;
use crate::topology::cell_type::CellType;
use crate::topology::entity::SubEntity;

/// Element block identifier.
pub type BlockId = i32;

/// Read-only view of distributed mesh connectivity.
pub trait ConnManager: Send + Sync + std::fmt::Debug {
    /// All element block ids known on this partition, ascending.
    fn element_block_ids(&self) -> Vec<BlockId>;

    /// Reference cell type shared by every element in `block`.
    fn block_cell_type(&self, block: BlockId) -> Option<CellType>;

    /// Local element ids belonging to `block`.
    fn block_elements(&self, block: BlockId) -> Option<&[usize]>;

    /// Number of local elements (over all blocks).
    fn num_elements(&self) -> usize;

    /// Block of a local element.
    fn element_block(&self, element: usize) -> Option<BlockId>;

    /// Ordered sub-entity ids of a local element (dimension-major).
    fn connectivity(&self, element: usize) -> Option<&[SubEntity]>;

    /// Rank that the mesh database designates as owner of `entity`, if any.
    ///
    /// When this returns `Some(rank)` and `rank` references the entity, that
    /// rank owns every DOF on it; otherwise the lowest referencing rank wins.
    fn entity_owner(&self, _entity: SubEntity) -> Option<usize> {
        None
    }
}

#[derive(Clone, Debug)]
struct BlockInfo {
    cell_type: CellType,
    elements: Vec<usize>,
}

/// Vec-backed connection manager.
#[derive(Clone, Debug, Default)]
pub struct InMemoryConnManager {
    blocks: BTreeMap<BlockId, BlockInfo>,
    element_block: Vec<BlockId>,
    connectivity: Vec<Vec<SubEntity>>,
    owners: HashMap<SubEntity, usize>,
}

impl InMemoryConnManager {
    /// Create an empty connection manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an element block with its reference cell type.
    ///
    /// Declaring an existing block again with the same cell type is a no-op.
    pub fn add_block(&mut self, block: BlockId, cell_type: CellType) -> Result<(), DofError> {
        match self.blocks.get(&block) {
            Some(info) if info.cell_type != cell_type => Err(DofError::PatternMismatch {
                block,
                field: String::new(),
                reason: format!(
                    "block already declared as {:?}, not {:?}",
                    info.cell_type, cell_type
                ),
            }),
            Some(_) => Ok(()),
            None => {
                self.blocks.insert(
                    block,
                    BlockInfo {
                        cell_type,
                        elements: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Append an element given its sub-entity global ids per dimension.
    ///
    /// `entities[d]` lists the dimension-`d` sub-entities in reference order
    /// and must have exactly `cell_type.sub_entity_count(d)` entries.
    /// Returns the new local element id.
    pub fn add_element(
        &mut self,
        block: BlockId,
        entities: &[&[u64]],
    ) -> Result<usize, DofError> {
        let cell_type = self
            .blocks
            .get(&block)
            .map(|b| b.cell_type)
            .ok_or(DofError::UnknownBlock(block))?;
        let element = self.connectivity.len();
        let counts = cell_type.sub_entity_counts();
        let expected: usize = counts.iter().sum();
        let got: usize = entities.iter().map(|e| e.len()).sum();
        if entities.len() != counts.len()
            || entities.iter().zip(&counts).any(|(e, &c)| e.len() != c)
        {
            return Err(DofError::ConnectivityMismatch {
                element,
                expected,
                got,
            });
        }
        let conn = entities
            .iter()
            .enumerate()
            .flat_map(|(dim, ids)| ids.iter().map(move |&g| SubEntity::new(dim as u8, g)))
            .collect();
        self.push_element(block, conn);
        Ok(element)
    }

    /// Append a 1D or 2D element from its node ids and cell id.
    ///
    /// Edge ids of 2D cells are derived from their sorted end-node ids with a
    /// pairing function, so partitions sharing an edge derive the same id.
    pub fn add_element_from_nodes(
        &mut self,
        block: BlockId,
        nodes: &[u64],
        cell_gid: u64,
    ) -> Result<usize, DofError> {
        let cell_type = self
            .blocks
            .get(&block)
            .map(|b| b.cell_type)
            .ok_or(DofError::UnknownBlock(block))?;
        let element = self.connectivity.len();
        let expected = cell_type.sub_entity_count(0);
        if nodes.len() != expected {
            return Err(DofError::ConnectivityMismatch {
                element,
                expected,
                got: nodes.len(),
            });
        }
        let cell = [cell_gid];
        match cell_type.dimension() {
            0 => self.add_element(block, &[&cell]),
            1 => self.add_element(block, &[nodes, &cell]),
            2 => {
                let n = nodes.len();
                let edges = (0..n)
                    .map(|i| {
                        let (a, b) = (nodes[i], nodes[(i + 1) % n]);
                        edge_gid(a, b).ok_or(DofError::EdgeIdOverflow { a, b })
                    })
                    .collect::<Result<Vec<u64>, _>>()?;
                self.add_element(block, &[nodes, &edges, &cell])
            }
            _ => Err(DofError::ConnectivityMismatch {
                element,
                expected: cell_type.total_sub_entities(),
                got: nodes.len() + 1,
            }),
        }
    }

    /// Record the mesh database's owner for `entity`.
    pub fn set_entity_owner(&mut self, entity: SubEntity, rank: usize) {
        self.owners.insert(entity, rank);
    }

    fn push_element(&mut self, block: BlockId, conn: Vec<SubEntity>) {
        let element = self.connectivity.len();
        self.connectivity.push(conn);
        self.element_block.push(block);
        if let Some(info) = self.blocks.get_mut(&block) {
            info.elements.push(element);
        }
    }
}

/// Pairing of two node ids into an order-independent edge id.
///
/// Injective while both ids are below 2^32; `None` once the larger id
/// reaches 2^32 and the pairing no longer fits in a `u64`.
pub fn edge_gid(a: u64, b: u64) -> Option<u64> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    // Szudzik pairing with hi >= lo.
    hi.checked_mul(hi)?.checked_add(lo)
}

impl ConnManager for InMemoryConnManager {
    fn element_block_ids(&self) -> Vec<BlockId> {
        self.blocks.keys().copied().collect()
    }

    fn block_cell_type(&self, block: BlockId) -> Option<CellType> {
        self.blocks.get(&block).map(|b| b.cell_type)
    }

    fn block_elements(&self, block: BlockId) -> Option<&[usize]> {
        self.blocks.get(&block).map(|b| b.elements.as_slice())
    }

    fn num_elements(&self) -> usize {
        self.connectivity.len()
    }

    fn element_block(&self, element: usize) -> Option<BlockId> {
        self.element_block.get(element).copied()
    }

    fn connectivity(&self, element: usize) -> Option<&[SubEntity]> {
        self.connectivity.get(element).map(|c| c.as_slice())
    }

    fn entity_owner(&self, entity: SubEntity) -> Option<usize> {
        self.owners.get(&entity).copied()
    }
}
