#![cfg_attr(docsrs, feature(doc_cfg))]
//! # dof-sieve
//!
//! dof-sieve assigns partition-consistent global indices to the degrees of
//! freedom of finite-element fields on a distributed mesh, and computes
//! fill-reducing orderings of sparse graphs with the approximate minimum
//! degree heuristic.
//!
//! ## Features
//! - Field registration per element block with aggregate per-element layouts
//! - Ownership negotiation across partitions (owned and overlap index spaces)
//! - Owned/overlap DOF connectivity graphs
//! - Approximate minimum degree reordering with supervariables and element
//!   absorption
//! - Pluggable communication backends (serial, threads, MPI)
//!
//! ## Determinism
//!
//! Numbering depends only on the referenced DOFs, the mesh owner hints, and
//! the number of partitions; repeated builds reproduce the same indices.
//! AMD breaks degree ties by lowest node index.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! dof-sieve = "0.1"
//! # Optional features:
//! # features = ["mpi-support","rayon"]
//! ```

pub mod algs;
pub mod data;
pub mod debug_invariants;
pub mod dof_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;
pub use dof_error::DofError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::amd::{AmdOptions, AmdReorderer, AmdResult, AmdStats, amd_order};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{CommTag, Communicator, DofCommTags, NoComm, RayonComm};
    pub use crate::algs::csr_graph::{CsrGraph, Permutation};
    pub use crate::algs::dof_graph::CrsGraph;
    pub use crate::data::dof_manager::{DofManager, DofManagerConfig};
    pub use crate::data::field_pattern::{FieldPattern, UniformPattern};
    pub use crate::data::index_map::{IndexMap, OverlapExport, OverlapImport};
    pub use crate::data::la_builder::{DefaultBuilder, LinearAlgebraBuilder};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::dof_error::DofError;
    pub use crate::topology::cell_type::CellType;
    pub use crate::topology::conn_manager::{BlockId, ConnManager, InMemoryConnManager};
    pub use crate::topology::entity::SubEntity;
    pub use crate::topology::ownership::DofKey;
}
