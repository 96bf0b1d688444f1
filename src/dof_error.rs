//! DofError: Unified error type for dof-sieve public APIs
//!
//! Every fallible operation in the crate (field registration, global
//! numbering, graph validation, AMD reordering, communication) reports
//! through this enum instead of panicking.

use crate::topology::conn_manager::BlockId;
use crate::topology::entity::SubEntity;
use thiserror::Error;

/// Unified error type for dof-sieve operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DofError {
    /// An operation needed a bound connection manager and none was set.
    #[error("no connection manager has been set")]
    MissingConnManager,
    /// Global unknowns have not been built yet.
    #[error("global unknowns have not been built (call build_global_unknowns first)")]
    NotBuilt,
    /// Field registration attempted after the numbering was built.
    #[error("global unknowns already built; reset indices before registering field `{0}`")]
    AlreadyBuilt(String),
    /// Field names must be non-empty.
    #[error("field name must be non-empty")]
    EmptyFieldName,
    /// A field registration referenced a block the connection manager does not know.
    #[error("element block {0} is not known to the connection manager")]
    UnknownBlock(BlockId),
    /// A field number was not registered.
    #[error("field number {0} is not registered")]
    UnknownField(usize),
    /// The field is registered, but not on this block.
    #[error("field {field} is not registered on element block {block}")]
    FieldNotInBlock { block: BlockId, field: usize },
    /// Local element id is outside the connection manager's element range.
    #[error("local element {element} out of range (num elements = {len})")]
    ElementOutOfRange { element: usize, len: usize },
    /// Field pattern geometry disagrees with the block's cell type.
    #[error("pattern for field `{field}` does not match block {block}: {reason}")]
    PatternMismatch {
        block: BlockId,
        field: String,
        reason: String,
    },
    /// Element connectivity does not match the block's reference topology.
    #[error("element {element}: expected {expected} sub-entities, got {got}")]
    ConnectivityMismatch {
        element: usize,
        expected: usize,
        got: usize,
    },
    /// Sub-cell dimension or index outside the reference topology.
    #[error("sub-cell ({dim}, {index}) is outside the reference cell")]
    SubCellOutOfRange { dim: usize, index: usize },
    /// Sparse-graph offsets are malformed (length or monotonicity).
    #[error("malformed graph: {0}")]
    GraphMalformed(String),
    /// A graph edge references a node outside `0..n`.
    #[error("node {node} referenced by node {from} is out of range (n = {n})")]
    NodeOutOfRange { from: usize, node: usize, n: usize },
    /// Adjacency is not symmetric.
    #[error("graph is not symmetric: edge {from} -> {to} has no reverse")]
    AsymmetricGraph { from: usize, to: usize },
    /// Permutation is not a bijection on `0..n`.
    #[error("invalid permutation: {0}")]
    InvalidPermutation(String),
    /// Index map lists a global id twice or one outside the global range.
    #[error("invalid index map: {0}")]
    InvalidIndexMap(String),
    /// Two node ids too large to pair into a distinct edge id.
    #[error("edge between nodes {a} and {b} has no representable id")]
    EdgeIdOverflow { a: u64, b: u64 },
    /// A global index was requested for a DOF with no assignment.
    #[error("no global index assigned for {entity:?} (field {field}, component {component})")]
    MissingGlobalIndex {
        entity: SubEntity,
        field: usize,
        component: usize,
    },
    /// Field registrations differ between partitions.
    #[error("field registrations on rank {rank} differ from rank 0")]
    RegistrationMismatch { rank: usize },
    /// Another partition failed before the ownership collective.
    #[error("peer partition(s) {ranks:?} failed before ownership negotiation")]
    PeerFailure { ranks: Vec<usize> },
    /// Generic communication error.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        source: CommFailure,
    },
    /// Received buffer length mismatch.
    #[error("buffer size mismatch with rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
}

/// Boxed-free description of a communication failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CommFailure(pub String);

impl From<String> for CommFailure {
    fn from(s: String) -> Self {
        CommFailure(s)
    }
}

impl From<&str> for CommFailure {
    fn from(s: &str) -> Self {
        CommFailure(s.to_string())
    }
}
