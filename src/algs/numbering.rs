//! Partition-consistent ownership and global numbering of DOF keys.
//!
//! Each partition lists the [`DofKey`]s its elements reference. Keys are
//! negotiated through a *home* rank chosen by hashing the key's sub-entity,
//! so no partition needs to know who its neighbours are in advance:
//!
//! 1. every partition sends its claims to the home ranks (size + records);
//! 2. the home picks an owner per key (the mesh-designated owner when that
//!    rank claims the key, otherwise the lowest claiming rank) and replies;
//! 3. owners number their owned keys in sorted key order, offset by the
//!    prefix sum of owned counts over lower ranks;
//! 4. owners report their global ids to the home, which relays them to
//!    every claimant.
//!
//! The result depends only on the key sets, the owner hints, and the rank
//! count, so repeated builds reproduce identical numberings.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::algs::communicator::{Communicator, DofCommTags};
use crate::algs::exchange::{all_peers, exchange_records, exchange_sizes, exchange_variable};
use crate::algs::wire::{WireDofClaim, WireGid, WireOwner, WireStatus, decode_records};
use crate::dof_error::DofError;
use crate::topology::entity::SubEntity;
use crate::topology::ownership::{DofKey, DofOwnership};

/// Outcome of the ownership negotiation on one partition.
#[derive(Clone, Debug, Default)]
pub struct DofNumbering {
    rank: usize,
    ownership: DofOwnership,
    gids: HashMap<DofKey, u64>,
    num_owned: usize,
    owned_base: u64,
    num_global: u64,
}

impl DofNumbering {
    /// Run the collective negotiation for `keys`.
    ///
    /// `hint` returns the mesh-designated owner of a sub-entity, if any.
    pub fn negotiate<C, H>(
        keys: &BTreeSet<DofKey>,
        hint: H,
        comm: &C,
        tags: &DofCommTags,
    ) -> Result<Self, DofError>
    where
        C: Communicator,
        H: Fn(SubEntity) -> Option<usize>,
    {
        let me = comm.rank();
        let size = comm.size().max(1);
        let peers = all_peers(comm);

        // Round A: claims to home ranks.
        let mut claims: BTreeMap<usize, Vec<DofKey>> = BTreeMap::new();
        for key in keys {
            claims.entry(key.entity.home_rank(size)).or_default().push(*key);
        }
        let wire_claims: BTreeMap<usize, Vec<WireDofClaim>> = claims
            .iter()
            .map(|(&home, ks)| {
                let recs = ks.iter().map(|k| WireDofClaim::new(k, hint(k.entity))).collect();
                (home, recs)
            })
            .collect();
        let send_counts: BTreeMap<usize, usize> =
            claims.iter().map(|(&r, v)| (r, v.len())).collect();
        let recv_counts = exchange_sizes(&send_counts, comm, tags.sizes, &peers)?;
        let mut incoming = exchange_records(&wire_claims, &recv_counts, comm, tags.claims, &peers)?;
        if let Some(own) = wire_claims.get(&me) {
            incoming.insert(me, own.clone());
        }

        // Home side: decide owners.
        let mut claimants: BTreeMap<DofKey, (Vec<usize>, Option<usize>)> = BTreeMap::new();
        for (&src, recs) in &incoming {
            for rec in recs {
                let entry = claimants.entry(rec.key()).or_default();
                entry.0.push(src);
                if entry.1.is_none() {
                    entry.1 = rec.hint();
                }
            }
        }
        let decided: BTreeMap<DofKey, usize> = claimants
            .iter()
            .map(|(key, (ranks, hint))| {
                let owner = match hint {
                    Some(h) if ranks.contains(h) => *h,
                    _ => ranks.iter().copied().min().unwrap_or(me),
                };
                (*key, owner)
            })
            .collect();

        // Round B: owners back to claimants, aligned with their claims.
        let owner_replies: BTreeMap<usize, Vec<WireOwner>> = incoming
            .iter()
            .map(|(&src, recs)| {
                let reply = recs
                    .iter()
                    .map(|rec| WireOwner::of(decided.get(&rec.key()).copied().unwrap_or(src)))
                    .collect();
                (src, reply)
            })
            .collect();
        let mut owners_in = exchange_records(&owner_replies, &send_counts, comm, tags.owners, &peers)?;
        if let Some(own) = owner_replies.get(&me) {
            owners_in.insert(me, own.clone());
        }

        let mut ownership = DofOwnership::default();
        for (home, ks) in &claims {
            let replies = owners_in.get(home).map_or(&[][..], |v| &v[..]);
            if replies.len() != ks.len() {
                return Err(DofError::BufferSizeMismatch {
                    neighbor: *home,
                    expected: ks.len(),
                    got: replies.len(),
                });
            }
            for (k, o) in ks.iter().zip(replies) {
                ownership.set_from_owner(*k, o.get(), me);
            }
        }

        // Owned numbering: sorted keys, offset by lower ranks' counts.
        let owned: Vec<DofKey> = ownership.owned_keys().copied().collect();
        let num_owned = owned.len();
        let mut recvbuf = vec![0u8; size * 8];
        comm.allgather(&(num_owned as u64).to_le_bytes(), &mut recvbuf);
        let totals: Vec<u64> = recvbuf
            .chunks_exact(8)
            .map(|chunk| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                u64::from_le_bytes(raw)
            })
            .collect();
        let owned_base: u64 = totals.iter().take(me).sum();
        let num_global: u64 = totals.iter().sum();

        let mut gids: HashMap<DofKey, u64> = owned
            .iter()
            .enumerate()
            .map(|(i, k)| (*k, owned_base + i as u64))
            .collect();

        // Round C: owners report gids to the home rank.
        let up: BTreeMap<usize, Vec<WireGid>> = claims
            .iter()
            .map(|(&home, ks)| {
                let recs = ks
                    .iter()
                    .map(|k| WireGid::of(gids.get(k).copied()))
                    .collect();
                (home, recs)
            })
            .collect();
        let mut up_in = exchange_records(&up, &recv_counts, comm, tags.gids_up, &peers)?;
        if let Some(own) = up.get(&me) {
            up_in.insert(me, own.clone());
        }
        let mut resolved: BTreeMap<DofKey, u64> = BTreeMap::new();
        for (src, recs) in &incoming {
            let vals = up_in.get(src).map_or(&[][..], |v| &v[..]);
            for (rec, g) in recs.iter().zip(vals) {
                if let Some(g) = g.get() {
                    resolved.insert(rec.key(), g);
                }
            }
        }

        // Round D: home relays gids to every claimant.
        let down: BTreeMap<usize, Vec<WireGid>> = incoming
            .iter()
            .map(|(&src, recs)| {
                let reply = recs
                    .iter()
                    .map(|rec| WireGid::of(resolved.get(&rec.key()).copied()))
                    .collect();
                (src, reply)
            })
            .collect();
        let mut down_in = exchange_records(&down, &send_counts, comm, tags.gids_down, &peers)?;
        if let Some(own) = down.get(&me) {
            down_in.insert(me, own.clone());
        }
        for (home, ks) in &claims {
            let replies = down_in.get(home).map_or(&[][..], |v| &v[..]);
            for (k, g) in ks.iter().zip(replies) {
                if let Some(g) = g.get() {
                    gids.entry(*k).or_insert(g);
                }
            }
        }

        let numbering = Self {
            rank: me,
            ownership,
            gids,
            num_owned,
            owned_base,
            num_global,
        };
        numbering.ensure_complete(keys)?;
        log::debug!(
            "[numbering] rank {me}: {} owned of {} referenced dofs, global size {}",
            num_owned,
            keys.len(),
            num_global
        );
        Ok(numbering)
    }

    fn ensure_complete(&self, keys: &BTreeSet<DofKey>) -> Result<(), DofError> {
        for key in keys {
            if !self.gids.contains_key(key) {
                return Err(DofError::MissingGlobalIndex {
                    entity: key.entity,
                    field: key.field,
                    component: key.component,
                });
            }
        }
        Ok(())
    }

    pub fn ownership(&self) -> &DofOwnership {
        &self.ownership
    }

    pub fn gid(&self, key: &DofKey) -> Option<u64> {
        self.gids.get(key).copied()
    }

    pub fn gid_or_err(&self, key: &DofKey) -> Result<u64, DofError> {
        self.gid(key).ok_or(DofError::MissingGlobalIndex {
            entity: key.entity,
            field: key.field,
            component: key.component,
        })
    }

    /// Owned global ids, ascending (a contiguous range).
    pub fn owned_gids(&self) -> Vec<u64> {
        (self.owned_base..self.owned_base + self.num_owned as u64).collect()
    }

    /// Ghost global ids with their owners, ascending by id.
    pub fn ghost_gids(&self) -> Vec<(u64, usize)> {
        let mut ghosts: Vec<(u64, usize)> = self
            .ownership
            .ghost_keys()
            .filter_map(|(k, owner)| self.gid(k).map(|g| (g, owner)))
            .collect();
        ghosts.sort_unstable();
        ghosts.dedup();
        ghosts
    }

    pub fn num_owned(&self) -> usize {
        self.num_owned
    }

    pub fn owned_base(&self) -> u64 {
        self.owned_base
    }

    pub fn num_global(&self) -> u64 {
        self.num_global
    }

    /// Tell each owner which of its ids this partition holds as ghosts;
    /// returns, per peer, the owned ids that peer holds, ascending.
    ///
    /// Collective: every partition must call this once per build.
    pub fn ghost_holders<C: Communicator>(
        &self,
        comm: &C,
        tags: &DofCommTags,
    ) -> Result<BTreeMap<usize, Vec<u64>>, DofError> {
        let mut outgoing: BTreeMap<usize, Vec<WireGid>> = BTreeMap::new();
        for (gid, owner) in self.ghost_gids() {
            outgoing.entry(owner).or_default().push(WireGid::of(Some(gid)));
        }
        let peers = all_peers(comm);
        let incoming = exchange_variable(&outgoing, comm, tags.ghost_sizes, tags.ghost_gids, &peers)?;
        let mut held = BTreeMap::new();
        for (peer, recs) in incoming {
            let mut gids: Vec<u64> = recs.iter().filter_map(WireGid::get).collect();
            if let Some(&g) = gids.iter().find(|&&g| self.owner_of_gid(g) != Some(self.rank)) {
                return Err(DofError::CommError {
                    neighbor: peer,
                    source: format!("peer holds ghost {g} not owned by rank {}", self.rank).into(),
                });
            }
            gids.sort_unstable();
            gids.dedup();
            if !gids.is_empty() {
                held.insert(peer, gids);
            }
        }
        Ok(held)
    }

    /// Owner rank of a global id referenced on this partition.
    pub fn owner_of_gid(&self, gid: u64) -> Option<usize> {
        if (self.owned_base..self.owned_base + self.num_owned as u64).contains(&gid) {
            return Some(self.rank);
        }
        let ghosts = self.ghost_gids();
        ghosts
            .binary_search_by_key(&gid, |&(g, _)| g)
            .ok()
            .map(|i| ghosts[i].1)
    }
}

/// Agree across partitions that every local phase succeeded.
///
/// Every partition must call this exactly once before the negotiation. A
/// partition whose `local` result is an error returns that error; the others
/// return [`DofError::PeerFailure`]. When `check_registrations` is set and
/// field registrations differ, every partition returns
/// [`DofError::RegistrationMismatch`] naming the first differing rank.
pub fn agree_ready<C: Communicator>(
    comm: &C,
    local: Result<(), DofError>,
    fingerprint: u64,
    check_registrations: bool,
) -> Result<(), DofError> {
    let size = comm.size().max(1);
    let status = WireStatus::new(local.is_ok(), fingerprint);
    let mut recvbuf = vec![0u8; size * std::mem::size_of::<WireStatus>()];
    comm.allgather(
        crate::algs::wire::cast_slice(std::slice::from_ref(&status)),
        &mut recvbuf,
    );
    local?;
    let all: Vec<WireStatus> = decode_records(&recvbuf).map_err(|msg| DofError::CommError {
        neighbor: comm.rank(),
        source: msg.into(),
    })?;
    let failed: Vec<usize> = all
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.ok())
        .map(|(r, _)| r)
        .collect();
    if !failed.is_empty() {
        return Err(DofError::PeerFailure { ranks: failed });
    }
    if check_registrations {
        let reference = all[0].fingerprint();
        if let Some(rank) = all.iter().position(|s| s.fingerprint() != reference) {
            return Err(DofError::RegistrationMismatch { rank });
        }
    }
    Ok(())
}
