//! Owned and overlapped global index spaces.
//!
//! An [`IndexMap`] lists the global DOF indices present on this partition in
//! local order, together with the global problem size. The owned map holds
//! exactly the indices this partition is authoritative for; the overlap map
//! holds the owned indices first, followed by ghost copies of indices owned
//! elsewhere.

use std::collections::{BTreeMap, HashMap};

use crate::debug_invariants::DebugInvariants;
use crate::dof_error::DofError;

#[derive(serde::Serialize, serde::Deserialize)]
struct IndexMapRepr {
    gids: Vec<u64>,
    num_global: u64,
}

/// Local ↔ global index map for one partition.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "IndexMapRepr", into = "IndexMapRepr")]
pub struct IndexMap {
    gids: Vec<u64>,
    num_global: u64,
    lookup: HashMap<u64, usize>,
}

impl TryFrom<IndexMapRepr> for IndexMap {
    type Error = DofError;

    fn try_from(r: IndexMapRepr) -> Result<Self, DofError> {
        IndexMap::try_new(r.gids, r.num_global)
    }
}

impl From<IndexMap> for IndexMapRepr {
    fn from(m: IndexMap) -> Self {
        IndexMapRepr {
            gids: m.gids,
            num_global: m.num_global,
        }
    }
}

impl IndexMap {
    /// Build a map from local-ordered global ids.
    ///
    /// Fails with [`DofError::InvalidIndexMap`] if an id repeats or is not
    /// below `num_global`.
    pub fn try_new(gids: Vec<u64>, num_global: u64) -> Result<Self, DofError> {
        let lookup = gids.iter().enumerate().map(|(l, &g)| (g, l)).collect();
        let map = Self {
            gids,
            num_global,
            lookup,
        };
        map.validate_invariants()?;
        Ok(map)
    }

    /// Number of local entries.
    pub fn len(&self) -> usize {
        self.gids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gids.is_empty()
    }

    /// Global problem size (owned DOFs summed over all partitions).
    pub fn num_global(&self) -> u64 {
        self.num_global
    }

    /// Global ids in local order.
    pub fn gids(&self) -> &[u64] {
        &self.gids
    }

    /// Global id of local entry `lid`.
    pub fn gid(&self, lid: usize) -> Option<u64> {
        self.gids.get(lid).copied()
    }

    /// Local index of global id `gid`.
    pub fn lid(&self, gid: u64) -> Option<usize> {
        self.lookup.get(&gid).copied()
    }

    pub fn contains(&self, gid: u64) -> bool {
        self.lookup.contains_key(&gid)
    }
}

impl DebugInvariants for IndexMap {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "IndexMap");
    }

    fn validate_invariants(&self) -> Result<(), DofError> {
        if self.lookup.len() != self.gids.len() {
            return Err(DofError::InvalidIndexMap(format!(
                "index map has duplicate global ids ({} entries, {} distinct)",
                self.gids.len(),
                self.lookup.len()
            )));
        }
        if let Some(&g) = self.gids.iter().find(|&&g| g >= self.num_global) {
            return Err(DofError::InvalidIndexMap(format!(
                "global id {g} exceeds global size {}",
                self.num_global
            )));
        }
        Ok(())
    }
}

/// Ghost global ids grouped by the partition that owns them.
///
/// Downstream linear-algebra layers use this to import owned values into
/// the overlap space.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OverlapImport {
    by_owner: BTreeMap<usize, Vec<u64>>,
}

impl OverlapImport {
    pub fn from_ghosts(ghosts: impl IntoIterator<Item = (u64, usize)>) -> Self {
        let mut by_owner: BTreeMap<usize, Vec<u64>> = BTreeMap::new();
        for (gid, owner) in ghosts {
            by_owner.entry(owner).or_default().push(gid);
        }
        for list in by_owner.values_mut() {
            list.sort_unstable();
            list.dedup();
        }
        Self { by_owner }
    }

    /// Ranks this partition imports from.
    pub fn source_ranks(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_owner.keys().copied()
    }

    /// Ghost ids owned by `rank`, ascending.
    pub fn from_rank(&self, rank: usize) -> &[u64] {
        self.by_owner.get(&rank).map_or(&[][..], |v| &v[..])
    }

    /// Total number of imported ids.
    pub fn len(&self) -> usize {
        self.by_owner.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_owner.is_empty()
    }
}

/// Both directions of the ghost overlap on one partition.
///
/// `to_owner` lists the ghosts this partition holds, grouped by the owner
/// they are sent back to; `held_by` lists the owned ids each peer holds as
/// ghosts, grouped by that peer. Lists are ascending; empty groups are
/// absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OverlapExport {
    to_owner: BTreeMap<usize, Vec<u64>>,
    held_by: BTreeMap<usize, Vec<u64>>,
}

impl OverlapExport {
    pub fn new(
        ghosts: impl IntoIterator<Item = (u64, usize)>,
        held_by: impl IntoIterator<Item = (usize, Vec<u64>)>,
    ) -> Self {
        let to_owner = OverlapImport::from_ghosts(ghosts).by_owner;
        let mut held: BTreeMap<usize, Vec<u64>> = BTreeMap::new();
        for (peer, gids) in held_by {
            held.entry(peer).or_default().extend(gids);
        }
        held.retain(|_, v| {
            v.sort_unstable();
            v.dedup();
            !v.is_empty()
        });
        Self {
            to_owner,
            held_by: held,
        }
    }

    /// Owners this partition sends ghost contributions to.
    pub fn destination_ranks(&self) -> impl Iterator<Item = usize> + '_ {
        self.to_owner.keys().copied()
    }

    /// Ghost ids sent to `rank`.
    pub fn to_rank(&self, rank: usize) -> &[u64] {
        self.to_owner.get(&rank).map_or(&[][..], |v| &v[..])
    }

    /// Peers holding at least one id owned here.
    pub fn peer_ranks(&self) -> impl Iterator<Item = usize> + '_ {
        self.held_by.keys().copied()
    }

    /// Owned ids that `rank` holds as ghosts.
    pub fn held_by(&self, rank: usize) -> &[u64] {
        self.held_by.get(&rank).map_or(&[][..], |v| &v[..])
    }

    /// Ghost ids sent plus owned ids shared, counted per peer.
    pub fn len(&self) -> usize {
        self.to_owner
            .values()
            .chain(self.held_by.values())
            .map(|v| v.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.to_owner.is_empty() && self.held_by.is_empty()
    }
}
