//! Data module: field patterns, index spaces, and the DOF manager.

pub mod agg_pattern;
pub mod dof_manager;
pub mod field_pattern;
pub mod field_registry;
pub mod index_map;
pub mod la_builder;

pub use agg_pattern::{AggregatePattern, LocalDof};
pub use dof_manager::{DofManager, DofManagerConfig};
pub use field_pattern::{FieldPattern, UniformPattern};
pub use field_registry::FieldRegistry;
pub use index_map::{IndexMap, OverlapExport, OverlapImport};
pub use la_builder::{BuildContext, DefaultBuilder, LinearAlgebraBuilder};
