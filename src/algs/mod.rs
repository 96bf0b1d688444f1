//! Re-export public algorithms.

pub mod amd;
pub mod communicator;
pub mod csr_graph;
pub mod dof_graph;
pub mod exchange;
pub mod numbering;
pub mod wire;

pub use amd::{AmdOptions, AmdReorderer, AmdResult, AmdStats, amd_order};
pub use csr_graph::{CsrGraph, Permutation};
pub use dof_graph::CrsGraph;
pub use numbering::DofNumbering;
