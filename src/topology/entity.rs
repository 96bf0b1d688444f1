//! `SubEntity`: a globally-identified geometric sub-entity of an element.
//!
//! Nodes, edges, faces and cells carry independent global numberings in most
//! mesh databases, so a global id alone is ambiguous. `SubEntity` pairs the
//! id with its topological dimension; ordering is by dimension first, which
//! keeps vertex DOFs ahead of edge DOFs in every sorted container.

use std::fmt;

/// A sub-entity of dimension `dim` with mesh-global id `gid`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct SubEntity {
    dim: u8,
    gid: u64,
}

impl SubEntity {
    /// Construct a sub-entity of dimension `dim` (0 = node … 3 = cell).
    #[inline]
    pub const fn new(dim: u8, gid: u64) -> Self {
        Self { dim, gid }
    }

    /// Shorthand for a node (dimension 0).
    #[inline]
    pub const fn node(gid: u64) -> Self {
        Self::new(0, gid)
    }

    /// Shorthand for an edge (dimension 1).
    #[inline]
    pub const fn edge(gid: u64) -> Self {
        Self::new(1, gid)
    }

    /// Topological dimension.
    #[inline]
    pub const fn dim(self) -> u8 {
        self.dim
    }

    /// Mesh-global id within its dimension.
    #[inline]
    pub const fn gid(self) -> u64 {
        self.gid
    }

    /// Rendezvous rank for ownership negotiation among `size` partitions.
    ///
    /// Must be identical on every process, so this never uses a randomly
    /// seeded hasher.
    pub fn home_rank(self, size: usize) -> usize {
        if size <= 1 {
            return 0;
        }
        let mixed = splitmix64(self.gid ^ ((self.dim as u64) << 61));
        (mixed % size as u64) as usize
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl fmt::Debug for SubEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubEntity")
            .field(&self.dim)
            .field(&self.gid)
            .finish()
    }
}

impl fmt::Display for SubEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dim, self.gid)
    }
}
