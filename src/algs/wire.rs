//! Fixed, versioned, little-endian wire types for the ownership negotiation.
//!
//! All multi-byte integers in these structs are **little-endian** on the wire.
//! We store them pre-LE with `.to_le()` and decode with `.from_le()`.

use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

use crate::topology::entity::SubEntity;
use crate::topology::ownership::DofKey;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Copy a received byte buffer into freshly allocated records.
///
/// The receive buffer carries no alignment guarantee, so records are copied
/// rather than reinterpreted in place.
pub fn decode_records<T: Pod>(raw: &[u8]) -> Result<Vec<T>, String> {
    let sz = size_of::<T>();
    if sz == 0 || raw.len() % sz != 0 {
        return Err(format!(
            "payload of {} bytes is not a whole number of {sz}-byte records",
            raw.len()
        ));
    }
    let mut out = vec![T::zeroed(); raw.len() / sz];
    cast_slice_mut(&mut out).copy_from_slice(raw);
    Ok(out)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// `hint_le` value meaning "no designated owner".
pub const NO_HINT: u32 = u32::MAX;

/// Global id placeholder for claims the sender does not own.
pub const NO_GID: u64 = u64::MAX;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32, // count of following records
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// One DOF a partition references, sent to the key's home rank.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireDofClaim {
    pub entity_le: u64,
    pub dim_le: u32,
    pub field_le: u32,
    pub comp_le: u32,
    pub hint_le: u32, // mesh-designated owner or NO_HINT
}

impl WireDofClaim {
    pub fn new(key: &DofKey, hint: Option<usize>) -> Self {
        Self {
            entity_le: key.entity.gid().to_le(),
            dim_le: (key.entity.dim() as u32).to_le(),
            field_le: (key.field as u32).to_le(),
            comp_le: (key.component as u32).to_le(),
            hint_le: hint.map_or(NO_HINT, |r| r as u32).to_le(),
        }
    }

    pub fn key(&self) -> DofKey {
        DofKey::new(
            SubEntity::new(u32::from_le(self.dim_le) as u8, u64::from_le(self.entity_le)),
            u32::from_le(self.field_le) as usize,
            u32::from_le(self.comp_le) as usize,
        )
    }

    pub fn hint(&self) -> Option<usize> {
        match u32::from_le(self.hint_le) {
            NO_HINT => None,
            r => Some(r as usize),
        }
    }
}

/// Owner rank reply, aligned with the claims it answers.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireOwner(pub u32);

impl WireOwner {
    pub fn of(rank: usize) -> Self {
        Self((rank as u32).to_le())
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.0) as usize
    }
}

/// Global id, or [`NO_GID`].
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireGid(pub u64);

impl WireGid {
    pub fn of(gid: Option<u64>) -> Self {
        Self(gid.unwrap_or(NO_GID).to_le())
    }
    pub fn get(&self) -> Option<u64> {
        match u64::from_le(self.0) {
            NO_GID => None,
            g => Some(g),
        }
    }
}

/// One coupling `(row, col)` in global ids.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireEdge {
    pub row_le: u64,
    pub col_le: u64,
}

impl WireEdge {
    pub fn new(row: u64, col: u64) -> Self {
        Self {
            row_le: row.to_le(),
            col_le: col.to_le(),
        }
    }
    pub fn row(&self) -> u64 {
        u64::from_le(self.row_le)
    }
    pub fn col(&self) -> u64 {
        u64::from_le(self.col_le)
    }
}

/// Per-partition readiness word gathered before the collective phase.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireStatus {
    pub version_le: u16,
    pub ok_le: u16, // 1 = local phases succeeded
    pub reserved_le: u32,
    pub fingerprint_le: u64,
}

impl WireStatus {
    pub fn new(ok: bool, fingerprint: u64) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            ok_le: (ok as u16).to_le(),
            reserved_le: 0,
            fingerprint_le: fingerprint.to_le(),
        }
    }
    pub fn ok(&self) -> bool {
        u16::from_le(self.ok_le) == 1
    }
    pub fn fingerprint(&self) -> u64 {
        u64::from_le(self.fingerprint_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
}

// Compile-time layout checks (no padding, fixed sizes).
static_assertions::const_assert_eq!(size_of::<WireCount>(), 4);
static_assertions::const_assert_eq!(size_of::<WireDofClaim>(), 24);
static_assertions::const_assert_eq!(size_of::<WireOwner>(), 4);
static_assertions::const_assert_eq!(size_of::<WireGid>(), 8);
static_assertions::const_assert_eq!(size_of::<WireEdge>(), 16);
static_assertions::const_assert_eq!(size_of::<WireStatus>(), 16);
