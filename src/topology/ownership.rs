//! Ownership metadata for scalar DOFs.
//!
//! A [`DofKey`] names one scalar unknown independently of any partition: the
//! sub-entity it lives on, the field, and the component index within that
//! field on that sub-entity. [`DofOwnership`] records, for every key
//! referenced on the current rank, which rank owns it and whether it is a
//! ghost here. Keys iterate in sorted order so owned numbering is
//! deterministic.

use crate::dof_error::DofError;
use crate::topology::entity::SubEntity;
use std::collections::BTreeMap;

/// Partition-independent identity of one scalar DOF.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct DofKey {
    pub entity: SubEntity,
    pub field: usize,
    pub component: usize,
}

impl DofKey {
    pub fn new(entity: SubEntity, field: usize, component: usize) -> Self {
        Self {
            entity,
            field,
            component,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OwnershipEntry {
    pub owner: usize,
    pub is_ghost: bool,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct DofOwnership {
    entries: BTreeMap<DofKey, OwnershipEntry>,
}

impl DofOwnership {
    /// Number of tracked DOFs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries exist in the map.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or update an ownership entry using `my_rank` to determine ghostness.
    pub fn set_from_owner(&mut self, key: DofKey, owner: usize, my_rank: usize) {
        self.entries.insert(
            key,
            OwnershipEntry {
                owner,
                is_ghost: owner != my_rank,
            },
        );
    }

    /// Insert or update an ownership entry, keeping the smallest owner when repeated.
    pub fn set_owner_min(&mut self, key: DofKey, owner: usize, my_rank: usize) {
        let owner = match self.entries.get(&key) {
            Some(existing) => existing.owner.min(owner),
            None => owner,
        };
        self.set_from_owner(key, owner, my_rank);
    }

    /// Retrieve the ownership entry for a key.
    pub fn entry(&self, key: &DofKey) -> Option<OwnershipEntry> {
        self.entries.get(key).copied()
    }

    /// Retrieve the owning rank for a key.
    pub fn owner(&self, key: &DofKey) -> Option<usize> {
        self.entry(key).map(|entry| entry.owner)
    }

    /// Retrieve the owning rank or return an error if missing.
    pub fn owner_or_err(&self, key: &DofKey) -> Result<usize, DofError> {
        self.owner(key).ok_or(DofError::MissingGlobalIndex {
            entity: key.entity,
            field: key.field,
            component: key.component,
        })
    }

    /// Returns true if the key is owned by `rank`.
    pub fn is_owned_by(&self, key: &DofKey, rank: usize) -> bool {
        self.owner(key).is_some_and(|owner| owner == rank)
    }

    /// Iterate over all keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &DofKey> + '_ {
        self.entries.keys()
    }

    /// Iterate over owned keys (non-ghosts) in sorted order.
    pub fn owned_keys(&self) -> impl Iterator<Item = &DofKey> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| !e.is_ghost)
            .map(|(k, _)| k)
    }

    /// Iterate over ghost keys with their owners, in sorted key order.
    pub fn ghost_keys(&self) -> impl Iterator<Item = (&DofKey, usize)> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| e.is_ghost)
            .map(|(k, e)| (k, e.owner))
    }

    /// Number of owned keys.
    pub fn num_owned(&self) -> usize {
        self.owned_keys().count()
    }
}
