//! Degree-of-freedom manager.
//!
//! [`DofManager`] turns per-element, per-field connectivity into a global
//! numbering that every partition agrees on. It owns the field registry and
//! every pattern, map, and graph it produces; the connection manager is
//! borrowed through an `Arc` and never mutated.
//!
//! `build_global_unknowns` runs three phases in order:
//! 1. *pattern*: merge the fields of each element block into an
//!    [`AggregatePattern`];
//! 2. *connectivity*: expand each local element into its [`DofKey`]s;
//! 3. *completion*: negotiate owners and global ids with the other
//!    partitions (collective).
//!
//! Maps and graphs are built on first request by the configured
//! [`LinearAlgebraBuilder`] and cached until the next reset.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::algs::communicator::{Communicator, DofCommTags, NoComm};
use crate::algs::dof_graph::{Couplings, CrsGraph, element_couplings, ship_ghost_rows};
use crate::algs::numbering::{DofNumbering, agree_ready};
use crate::data::agg_pattern::AggregatePattern;
use crate::data::field_pattern::FieldPattern;
use crate::data::field_registry::FieldRegistry;
use crate::data::index_map::{IndexMap, OverlapExport, OverlapImport};
use crate::data::la_builder::{BuildContext, DefaultBuilder, LinearAlgebraBuilder};
use crate::dof_error::DofError;
use crate::topology::conn_manager::{BlockId, ConnManager};
use crate::topology::ownership::DofKey;

/// Configuration for [`DofManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DofManagerConfig {
    /// Message tags for the ownership negotiation.
    pub tags: DofCommTags,
    /// Compare field registrations across partitions before negotiating.
    pub check_registrations: bool,
}

impl Default for DofManagerConfig {
    fn default() -> Self {
        Self {
            tags: DofCommTags::default(),
            check_registrations: true,
        }
    }
}

struct Binding<C> {
    conn: Arc<dyn ConnManager>,
    comm: C,
}

struct Built {
    patterns: BTreeMap<BlockId, Arc<AggregatePattern>>,
    element_gids: Vec<Vec<u64>>,
    numbering: DofNumbering,
    couplings: Couplings,
    remote_rows: Vec<(u64, u64)>,
    held_by: BTreeMap<usize, Vec<u64>>,
}

impl Built {
    fn context(&self) -> BuildContext<'_> {
        BuildContext {
            numbering: &self.numbering,
            couplings: &self.couplings,
            remote_rows: &self.remote_rows,
        }
    }
}

#[derive(Default)]
struct Cache {
    map: OnceCell<Arc<IndexMap>>,
    overlap_map: OnceCell<Arc<IndexMap>>,
    graph: OnceCell<Arc<CrsGraph>>,
    overlap_graph: OnceCell<Arc<CrsGraph>>,
}

/// Field registration, global numbering, and per-element GID lookup.
pub struct DofManager<C: Communicator = NoComm> {
    config: DofManagerConfig,
    binding: Option<Binding<C>>,
    registry: FieldRegistry,
    global_patterns: BTreeMap<usize, Arc<dyn FieldPattern>>,
    block_patterns: BTreeMap<BlockId, BTreeMap<usize, Arc<dyn FieldPattern>>>,
    builder: Arc<dyn LinearAlgebraBuilder>,
    built: Option<Built>,
    cache: Cache,
}

impl<C: Communicator> fmt::Debug for DofManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DofManager")
            .field("config", &self.config)
            .field("fields", &self.registry)
            .field("bound", &self.binding.is_some())
            .field("built", &self.built.is_some())
            .finish()
    }
}

impl<C: Communicator> Default for DofManager<C> {
    fn default() -> Self {
        Self::new(DofManagerConfig::default())
    }
}

impl<C: Communicator> DofManager<C> {
    /// An unbound manager with no fields.
    pub fn new(config: DofManagerConfig) -> Self {
        Self {
            config,
            binding: None,
            registry: FieldRegistry::new(),
            global_patterns: BTreeMap::new(),
            block_patterns: BTreeMap::new(),
            builder: Arc::new(DefaultBuilder),
            built: None,
            cache: Cache::default(),
        }
    }

    /// A manager already bound to `conn` and `comm`.
    pub fn with_conn_manager(
        config: DofManagerConfig,
        conn: Arc<dyn ConnManager>,
        comm: C,
    ) -> Self {
        let mut mgr = Self::new(config);
        mgr.set_conn_manager(conn, comm);
        mgr
    }

    pub fn config(&self) -> &DofManagerConfig {
        &self.config
    }

    /// Bind mesh connectivity and the communicator.
    ///
    /// Discards any computed numbering; field registrations are kept.
    pub fn set_conn_manager(&mut self, conn: Arc<dyn ConnManager>, comm: C) {
        self.reset_indices();
        self.binding = Some(Binding { conn, comm });
    }

    /// Replace the map/graph builder. Cached maps and graphs are dropped.
    pub fn set_builder(&mut self, builder: Arc<dyn LinearAlgebraBuilder>) {
        self.builder = builder;
        self.cache = Cache::default();
    }

    /// Register `name` on every element block.
    ///
    /// Returns the field number (stable across repeated registrations).
    pub fn add_field(
        &mut self,
        name: &str,
        pattern: Arc<dyn FieldPattern>,
    ) -> Result<usize, DofError> {
        self.ensure_not_built(name)?;
        let num = self.registry.register(name)?;
        self.global_patterns.insert(num, pattern);
        Ok(num)
    }

    /// Register `name` on one element block only.
    ///
    /// A block-scoped pattern takes precedence over a global one for the
    /// same field.
    pub fn add_field_to_block(
        &mut self,
        block: BlockId,
        name: &str,
        pattern: Arc<dyn FieldPattern>,
    ) -> Result<usize, DofError> {
        self.ensure_not_built(name)?;
        let num = self.registry.register(name)?;
        self.block_patterns
            .entry(block)
            .or_default()
            .insert(num, pattern);
        Ok(num)
    }

    fn ensure_not_built(&self, name: &str) -> Result<(), DofError> {
        if self.built.is_some() {
            return Err(DofError::AlreadyBuilt(name.to_string()));
        }
        Ok(())
    }

    /// Number every registered field's DOFs across all partitions.
    ///
    /// Collective: every partition must call this the same number of times
    /// with the same field registrations. If any partition fails before the
    /// negotiation, every partition returns an error.
    pub fn build_global_unknowns(&mut self) -> Result<(), DofError> {
        self.built = None;
        self.cache = Cache::default();
        let Some(binding) = self.binding.as_ref() else {
            return Err(DofError::MissingConnManager);
        };
        let conn = &*binding.conn;
        let comm = &binding.comm;
        let tags = self.config.tags;
        let rank = comm.rank();

        log::debug!("[dof_manager] rank {rank}: pattern phase");
        let local = self.pattern_phase(conn).and_then(|patterns| {
            log::debug!("[dof_manager] rank {rank}: connectivity phase");
            let keys = self.connectivity_phase(conn, &patterns)?;
            Ok((patterns, keys))
        });
        let status = local.as_ref().map(|_| ()).map_err(Clone::clone);
        agree_ready(
            comm,
            status,
            self.registry.fingerprint(),
            self.config.check_registrations,
        )?;
        let (patterns, element_keys) = local?;

        log::debug!("[dof_manager] rank {rank}: completion phase");
        let keys: BTreeSet<DofKey> = element_keys.iter().flatten().copied().collect();
        let numbering = DofNumbering::negotiate(&keys, |e| conn.entity_owner(e), comm, &tags)?;
        let element_gids = element_keys
            .iter()
            .map(|ks| ks.iter().map(|k| numbering.gid_or_err(k)).collect())
            .collect::<Result<Vec<Vec<u64>>, DofError>>()?;
        let couplings = element_couplings(element_gids.iter().map(|v| v.as_slice()));
        let remote_rows = ship_ghost_rows(&couplings, &numbering, comm, &tags)?;
        let held_by = numbering.ghost_holders(comm, &tags)?;

        log::info!(
            "[dof_manager] rank {rank}: {} owned, {} ghost, {} global dofs over {} elements",
            numbering.num_owned(),
            numbering.ghost_gids().len(),
            numbering.num_global(),
            element_gids.len()
        );
        self.built = Some(Built {
            patterns,
            element_gids,
            numbering,
            couplings,
            remote_rows,
            held_by,
        });
        Ok(())
    }

    fn block_fields(&self, block: BlockId) -> BTreeMap<usize, Arc<dyn FieldPattern>> {
        let mut fields = self.global_patterns.clone();
        if let Some(scoped) = self.block_patterns.get(&block) {
            fields.extend(scoped.iter().map(|(&n, p)| (n, Arc::clone(p))));
        }
        fields
    }

    fn pattern_phase(
        &self,
        conn: &dyn ConnManager,
    ) -> Result<BTreeMap<BlockId, Arc<AggregatePattern>>, DofError> {
        let known: BTreeSet<BlockId> = conn.element_block_ids().into_iter().collect();
        if let Some(&block) = self.block_patterns.keys().find(|b| !known.contains(b)) {
            return Err(DofError::UnknownBlock(block));
        }
        let mut patterns = BTreeMap::new();
        for &block in &known {
            let fields = self.block_fields(block);
            if fields.is_empty() {
                continue;
            }
            let cell_type = conn
                .block_cell_type(block)
                .ok_or(DofError::UnknownBlock(block))?;
            for (&num, pattern) in &fields {
                if pattern.cell_type() != cell_type {
                    return Err(DofError::PatternMismatch {
                        block,
                        field: self.field_label(num),
                        reason: format!(
                            "pattern is defined on {:?}, block elements are {:?}",
                            pattern.cell_type(),
                            cell_type
                        ),
                    });
                }
            }
            let agg = AggregatePattern::new(fields.into_iter().collect())
                .map_err(|e| self.in_block(e, block))?;
            patterns.insert(block, Arc::new(agg));
        }
        Ok(patterns)
    }

    fn connectivity_phase(
        &self,
        conn: &dyn ConnManager,
        patterns: &BTreeMap<BlockId, Arc<AggregatePattern>>,
    ) -> Result<Vec<Vec<DofKey>>, DofError> {
        let len = conn.num_elements();
        let expand = |element: usize| -> Result<Vec<DofKey>, DofError> {
            let block = conn
                .element_block(element)
                .ok_or(DofError::ElementOutOfRange { element, len })?;
            let Some(agg) = patterns.get(&block) else {
                return Ok(Vec::new());
            };
            let sub_entities = conn
                .connectivity(element)
                .ok_or(DofError::ElementOutOfRange { element, len })?;
            agg.element_keys(element, sub_entities)
        };
        #[cfg(feature = "rayon")]
        let keys: Result<Vec<Vec<DofKey>>, DofError> = {
            use rayon::prelude::*;
            (0..len).into_par_iter().map(expand).collect()
        };
        #[cfg(not(feature = "rayon"))]
        let keys: Result<Vec<Vec<DofKey>>, DofError> = (0..len).map(expand).collect();
        keys
    }

    fn field_label(&self, num: usize) -> String {
        self.registry
            .name(num)
            .map_or_else(|| num.to_string(), str::to_string)
    }

    fn in_block(&self, err: DofError, block: BlockId) -> DofError {
        match err {
            DofError::PatternMismatch { field, reason, .. } => DofError::PatternMismatch {
                block,
                field: field
                    .parse::<usize>()
                    .map_or(field, |n| self.field_label(n)),
                reason,
            },
            other => other,
        }
    }

    /// Drop every computed map, graph, and GID list; unbind and return the
    /// connection manager. Field registrations are kept.
    pub fn reset_indices(&mut self) -> Option<Arc<dyn ConnManager>> {
        self.built = None;
        self.cache = Cache::default();
        self.binding.take().map(|b| b.conn)
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    fn built(&self) -> Result<&Built, DofError> {
        self.built.as_ref().ok_or(DofError::NotBuilt)
    }

    /// Global DOF ids of one local element, in aggregate-pattern order.
    pub fn element_gids(&self, element: usize) -> Result<&[u64], DofError> {
        let built = self.built()?;
        built
            .element_gids
            .get(element)
            .map(|v| v.as_slice())
            .ok_or(DofError::ElementOutOfRange {
                element,
                len: built.element_gids.len(),
            })
    }

    /// Field number for `name`; `None` for names never registered.
    pub fn field_num(&self, name: &str) -> Option<usize> {
        self.registry.num(name)
    }

    pub fn field_string(&self, num: usize) -> Result<&str, DofError> {
        self.registry.name(num).ok_or(DofError::UnknownField(num))
    }

    pub fn num_fields(&self) -> usize {
        self.registry.len()
    }

    /// `(number, name)` pairs in number order.
    pub fn fields(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.registry.iter()
    }

    /// Pattern in effect for `field` on `block`, if any.
    pub fn field_pattern(&self, block: BlockId, field: usize) -> Option<Arc<dyn FieldPattern>> {
        self.block_patterns
            .get(&block)
            .and_then(|m| m.get(&field))
            .or_else(|| self.global_patterns.get(&field))
            .cloned()
    }

    pub fn field_pattern_by_name(&self, block: BlockId, name: &str) -> Option<Arc<dyn FieldPattern>> {
        self.field_num(name)
            .and_then(|num| self.field_pattern(block, num))
    }

    /// Aggregate pattern built for `block`.
    pub fn aggregate_pattern(&self, block: BlockId) -> Result<&Arc<AggregatePattern>, DofError> {
        self.built()?
            .patterns
            .get(&block)
            .ok_or(DofError::UnknownBlock(block))
    }

    /// Offsets of `field`'s DOFs within an element GID list of `block`.
    pub fn gid_field_offsets(&self, block: BlockId, field: usize) -> Result<&[usize], DofError> {
        self.aggregate_pattern(block)?
            .local_offsets(field)
            .ok_or(DofError::FieldNotInBlock { block, field })
    }

    /// Offsets of `field`'s DOFs on sub-cell `(dim, sub_cell)` of `block`'s
    /// reference cell.
    pub fn sub_cell_offsets(
        &self,
        block: BlockId,
        field: usize,
        dim: usize,
        sub_cell: usize,
    ) -> Result<&[usize], DofError> {
        self.aggregate_pattern(block)?
            .sub_cell_offsets(field, dim, sub_cell)
            .map_err(|e| match e {
                DofError::UnknownField(field) => DofError::FieldNotInBlock { block, field },
                other => other,
            })
    }

    /// Owned index space.
    pub fn map(&self) -> Result<Arc<IndexMap>, DofError> {
        let built = self.built()?;
        self.cache
            .map
            .get_or_try_init(|| self.builder.build_map(&built.context()).map(Arc::new))
            .cloned()
    }

    /// Owned indices followed by ghosts.
    pub fn overlap_map(&self) -> Result<Arc<IndexMap>, DofError> {
        let built = self.built()?;
        self.cache
            .overlap_map
            .get_or_try_init(|| {
                self.builder
                    .build_overlap_map(&built.context())
                    .map(Arc::new)
            })
            .cloned()
    }

    /// Connectivity over owned rows.
    pub fn graph(&self) -> Result<Arc<CrsGraph>, DofError> {
        let built = self.built()?;
        let rows = self.map()?;
        self.cache
            .graph
            .get_or_try_init(|| {
                self.builder
                    .build_graph(&built.context(), rows)
                    .map(Arc::new)
            })
            .cloned()
    }

    /// Connectivity over overlap rows.
    pub fn overlap_graph(&self) -> Result<Arc<CrsGraph>, DofError> {
        let built = self.built()?;
        let rows = self.overlap_map()?;
        self.cache
            .overlap_graph
            .get_or_try_init(|| {
                self.builder
                    .build_overlap_graph(&built.context(), rows)
                    .map(Arc::new)
            })
            .cloned()
    }

    /// Ghost ids grouped by owning partition.
    pub fn overlap_import(&self) -> Result<OverlapImport, DofError> {
        Ok(OverlapImport::from_ghosts(
            self.built()?.numbering.ghost_gids(),
        ))
    }

    /// Ghost ids grouped by owner together with the owned ids each peer
    /// holds as ghosts.
    pub fn overlap_export(&self) -> Result<OverlapExport, DofError> {
        let built = self.built()?;
        Ok(OverlapExport::new(
            built.numbering.ghost_gids(),
            built.held_by.iter().map(|(&r, g)| (r, g.clone())),
        ))
    }

    pub fn numbering(&self) -> Result<&DofNumbering, DofError> {
        Ok(&self.built()?.numbering)
    }

    pub fn conn_manager(&self) -> Option<&Arc<dyn ConnManager>> {
        self.binding.as_ref().map(|b| &b.conn)
    }

    pub fn comm(&self) -> Option<&C> {
        self.binding.as_ref().map(|b| &b.comm)
    }

    /// Local element ids of `block`.
    pub fn block_element_ids(&self, block: BlockId) -> Result<&[usize], DofError> {
        let binding = self.binding.as_ref().ok_or(DofError::MissingConnManager)?;
        binding
            .conn
            .block_elements(block)
            .ok_or(DofError::UnknownBlock(block))
    }

    /// Human-readable summary of fields and block layouts.
    pub fn field_information(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} field(s):", self.registry.len());
        for (num, name) in self.registry.iter() {
            let _ = writeln!(out, "  {num}: {name}");
        }
        match &self.built {
            Some(built) => {
                for (block, agg) in &built.patterns {
                    let _ = write!(out, "block {block}: {agg}");
                }
            }
            None => {
                let _ = writeln!(out, "global unknowns not built");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::field_pattern::UniformPattern;
    use crate::topology::cell_type::CellType;
    use crate::topology::conn_manager::InMemoryConnManager;

    fn two_segments() -> Arc<dyn ConnManager> {
        let mut conn = InMemoryConnManager::new();
        conn.add_block(0, CellType::Segment).unwrap();
        conn.add_element_from_nodes(0, &[1, 2], 100).unwrap();
        conn.add_element_from_nodes(0, &[2, 3], 101).unwrap();
        Arc::new(conn)
    }

    fn nodal(components: usize) -> Arc<dyn FieldPattern> {
        UniformPattern::nodal(CellType::Segment, components).shared()
    }

    fn manager() -> DofManager {
        DofManager::with_conn_manager(DofManagerConfig::default(), two_segments(), NoComm)
    }

    #[test]
    fn field_names_roundtrip() {
        let mut mgr: DofManager = DofManager::default();
        let u = mgr.add_field("u", nodal(1)).unwrap();
        let p = mgr.add_field_to_block(0, "p", nodal(1)).unwrap();
        assert_eq!(mgr.add_field("u", nodal(1)).unwrap(), u);
        for n in [u, p] {
            assert_eq!(mgr.field_num(mgr.field_string(n).unwrap()), Some(n));
        }
        assert_eq!(mgr.field_num("T"), None);
        assert!(matches!(mgr.field_string(7), Err(DofError::UnknownField(7))));
        assert_eq!(mgr.num_fields(), 2);
    }

    #[test]
    fn build_requires_conn_manager() {
        let mut mgr: DofManager = DofManager::default();
        mgr.add_field("u", nodal(1)).unwrap();
        assert_eq!(mgr.build_global_unknowns(), Err(DofError::MissingConnManager));
        assert_eq!(mgr.element_gids(0), Err(DofError::NotBuilt));
        assert!(matches!(mgr.map(), Err(DofError::NotBuilt)));
    }

    #[test]
    fn serial_segments_share_middle_node() {
        let mut mgr = manager();
        mgr.add_field("u", nodal(1)).unwrap();
        mgr.build_global_unknowns().unwrap();
        assert_eq!(mgr.element_gids(0).unwrap(), &[0, 1]);
        assert_eq!(mgr.element_gids(1).unwrap(), &[1, 2]);
        assert!(matches!(
            mgr.element_gids(2),
            Err(DofError::ElementOutOfRange { element: 2, len: 2 })
        ));
        let map = mgr.map().unwrap();
        assert_eq!(map.gids(), &[0, 1, 2]);
        assert_eq!(mgr.overlap_map().unwrap().gids(), map.gids());
        assert!(mgr.overlap_import().unwrap().is_empty());
        assert!(Arc::ptr_eq(&map, &mgr.map().unwrap()));
    }

    #[test]
    fn element_gid_length_matches_aggregate() {
        let mut mgr = manager();
        mgr.add_field("u", nodal(2)).unwrap();
        mgr.add_field(
            "q",
            UniformPattern::new(CellType::Segment, &[0, 1]).unwrap().shared(),
        )
        .unwrap();
        mgr.build_global_unknowns().unwrap();
        let agg = mgr.aggregate_pattern(0).unwrap();
        assert_eq!(agg.num_dofs(), 5);
        for e in 0..2 {
            assert_eq!(mgr.element_gids(e).unwrap().len(), 5);
        }
        assert_eq!(mgr.gid_field_offsets(0, 0).unwrap(), &[0, 1, 2, 3]);
        assert_eq!(mgr.gid_field_offsets(0, 1).unwrap(), &[4]);
        assert_eq!(mgr.sub_cell_offsets(0, 0, 0, 1).unwrap(), &[2, 3]);
        assert!(mgr.sub_cell_offsets(0, 1, 0, 0).unwrap().is_empty());
        assert_eq!(mgr.map().unwrap().num_global(), 8);
    }

    #[test]
    fn registration_after_build_needs_reset() {
        let mut mgr = manager();
        mgr.add_field("u", nodal(1)).unwrap();
        mgr.build_global_unknowns().unwrap();
        assert_eq!(
            mgr.add_field("v", nodal(1)),
            Err(DofError::AlreadyBuilt("v".into()))
        );
        let conn = mgr.reset_indices().unwrap();
        assert!(mgr.conn_manager().is_none());
        mgr.add_field("v", nodal(1)).unwrap();
        mgr.set_conn_manager(conn, NoComm);
        mgr.build_global_unknowns().unwrap();
        assert_eq!(mgr.element_gids(0).unwrap().len(), 4);
        assert_eq!(mgr.map().unwrap().len(), 6);
    }

    #[test]
    fn reset_and_rebuild_is_deterministic() {
        let mut mgr = manager();
        mgr.add_field("u", nodal(1)).unwrap();
        mgr.add_field("p", nodal(1)).unwrap();
        mgr.build_global_unknowns().unwrap();
        let first: Vec<Vec<u64>> = (0..2).map(|e| mgr.element_gids(e).unwrap().to_vec()).collect();
        let conn = mgr.reset_indices().unwrap();
        assert_eq!(mgr.element_gids(0), Err(DofError::NotBuilt));
        mgr.set_conn_manager(conn, NoComm);
        mgr.build_global_unknowns().unwrap();
        let second: Vec<Vec<u64>> = (0..2).map(|e| mgr.element_gids(e).unwrap().to_vec()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_block_fails_build() {
        let mut mgr = manager();
        mgr.add_field_to_block(9, "u", nodal(1)).unwrap();
        assert_eq!(mgr.build_global_unknowns(), Err(DofError::UnknownBlock(9)));
        assert!(!mgr.is_built());
    }

    #[test]
    fn pattern_geometry_must_match_block() {
        let mut mgr = manager();
        mgr.add_field("u", UniformPattern::nodal(CellType::Triangle, 1).shared())
            .unwrap();
        match mgr.build_global_unknowns() {
            Err(DofError::PatternMismatch { block, field, .. }) => {
                assert_eq!(block, 0);
                assert_eq!(field, "u");
            }
            other => panic!("expected pattern mismatch, got {other:?}"),
        }
    }

    #[test]
    fn offsets_for_unregistered_field_fail() {
        let mut mgr = manager();
        mgr.add_field("u", nodal(1)).unwrap();
        mgr.build_global_unknowns().unwrap();
        assert_eq!(
            mgr.gid_field_offsets(0, 3),
            Err(DofError::FieldNotInBlock { block: 0, field: 3 })
        );
        assert_eq!(mgr.gid_field_offsets(5, 0), Err(DofError::UnknownBlock(5)));
    }

    #[test]
    fn graphs_couple_element_neighbours() {
        let mut mgr = manager();
        mgr.add_field("u", nodal(1)).unwrap();
        mgr.build_global_unknowns().unwrap();
        let g = mgr.graph().unwrap();
        assert_eq!(g.row(0), &[0, 1]);
        assert_eq!(g.row(1), &[0, 1, 2]);
        assert_eq!(mgr.overlap_graph().unwrap().num_entries(), g.num_entries());
        let local = g.local_graph().unwrap();
        let res = crate::algs::amd::amd_order(&local).unwrap();
        assert_eq!(res.permutation.new_to_old(), &[0, 2, 1]);
    }

    #[test]
    fn field_information_lists_layouts() {
        let mut mgr = manager();
        mgr.add_field("u", nodal(1)).unwrap();
        assert!(mgr.field_information().contains("not built"));
        mgr.build_global_unknowns().unwrap();
        let info = mgr.field_information();
        assert!(info.contains("0: u"));
        assert!(info.contains("block 0"));
    }

    #[derive(Debug)]
    struct ReversedMap;

    impl LinearAlgebraBuilder for ReversedMap {
        fn build_map(&self, ctx: &BuildContext<'_>) -> Result<IndexMap, DofError> {
            let mut gids = ctx.numbering.owned_gids();
            gids.reverse();
            IndexMap::try_new(gids, ctx.numbering.num_global())
        }
    }

    #[test]
    fn custom_builder_overrides_one_piece() {
        let mut mgr = manager();
        mgr.add_field("u", nodal(1)).unwrap();
        mgr.set_builder(Arc::new(ReversedMap));
        mgr.build_global_unknowns().unwrap();
        assert_eq!(mgr.map().unwrap().gids(), &[2, 1, 0]);
        assert_eq!(mgr.overlap_map().unwrap().gids(), &[0, 1, 2]);
        assert_eq!(mgr.graph().unwrap().row(0), &[1, 2]);
    }

    #[test]
    fn block_scoped_pattern_overrides_global() {
        let mut mgr = manager();
        mgr.add_field("u", nodal(1)).unwrap();
        mgr.add_field_to_block(0, "u", nodal(2)).unwrap();
        assert_eq!(mgr.field_pattern(0, 0).unwrap().num_dofs(), 4);
        assert_eq!(mgr.field_pattern(3, 0).unwrap().num_dofs(), 2);
        assert!(mgr.field_pattern_by_name(0, "nope").is_none());
        assert_eq!(mgr.block_element_ids(0).unwrap(), &[0, 1]);
    }
}
