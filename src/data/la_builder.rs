//! Overridable construction of index maps and DOF graphs.
//!
//! [`DofManager`](crate::data::dof_manager::DofManager) asks its
//! [`LinearAlgebraBuilder`] for every map and graph it hands out. The
//! default methods produce the standard owned/overlap layouts; a specialised
//! numbering strategy overrides only the pieces it changes.

use std::fmt;
use std::sync::Arc;

use crate::algs::dof_graph::{Couplings, CrsGraph};
use crate::algs::numbering::DofNumbering;
use crate::data::index_map::IndexMap;
use crate::dof_error::DofError;

/// Everything a builder may read after the completion phase.
#[derive(Clone, Copy, Debug)]
pub struct BuildContext<'a> {
    pub numbering: &'a DofNumbering,
    /// Element cliques seen on this partition.
    pub couplings: &'a Couplings,
    /// Rows for owned DOFs contributed by other partitions.
    pub remote_rows: &'a [(u64, u64)],
}

pub trait LinearAlgebraBuilder: Send + Sync + fmt::Debug {
    /// Owned global ids, ascending.
    fn build_map(&self, ctx: &BuildContext<'_>) -> Result<IndexMap, DofError> {
        IndexMap::try_new(ctx.numbering.owned_gids(), ctx.numbering.num_global())
    }

    /// Owned ids followed by ghost ids, each ascending.
    fn build_overlap_map(&self, ctx: &BuildContext<'_>) -> Result<IndexMap, DofError> {
        let mut gids = ctx.numbering.owned_gids();
        gids.extend(ctx.numbering.ghost_gids().into_iter().map(|(g, _)| g));
        IndexMap::try_new(gids, ctx.numbering.num_global())
    }

    /// Complete rows for owned DOFs.
    fn build_graph(
        &self,
        ctx: &BuildContext<'_>,
        rows: Arc<IndexMap>,
    ) -> Result<CrsGraph, DofError> {
        let local = ctx
            .couplings
            .iter()
            .flat_map(|(&r, cs)| cs.iter().map(move |&c| (r, c)));
        Ok(CrsGraph::from_pairs(
            rows,
            local.chain(ctx.remote_rows.iter().copied()),
        ))
    }

    /// Rows for every overlap DOF, from local elements only.
    fn build_overlap_graph(
        &self,
        ctx: &BuildContext<'_>,
        rows: Arc<IndexMap>,
    ) -> Result<CrsGraph, DofError> {
        Ok(CrsGraph::from_couplings(rows, ctx.couplings))
    }
}

/// Builder with the standard layouts.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultBuilder;

impl LinearAlgebraBuilder for DefaultBuilder {}
