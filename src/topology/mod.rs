//! Mesh-side collaborators: reference cells, sub-entity ids, connectivity, ownership.

pub mod cell_type;
pub mod conn_manager;
pub mod entity;
pub mod ownership;

pub use cell_type::CellType;
pub use conn_manager::{BlockId, ConnManager, InMemoryConnManager};
pub use entity::SubEntity;
pub use ownership::{DofKey, DofOwnership};
