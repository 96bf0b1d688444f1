//! Two-phase neighbour exchange: sizes first, then fixed-width records.
//!
//! Every exchange posts all receives before any send and waits on every
//! handle even after an error, so no message is left in flight for the next
//! round. Empty payloads are never sent; the receiver learns from the size
//! phase (or from an aligned earlier round) that nothing is coming.

use std::collections::{BTreeMap, BTreeSet};
use std::mem::size_of;

use bytemuck::Pod;

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireCount, cast_slice, decode_records};
use crate::dof_error::DofError;

/// Every rank except `comm.rank()`.
pub fn all_peers<C: Communicator>(comm: &C) -> BTreeSet<usize> {
    let me = comm.rank();
    (0..comm.size().max(1)).filter(|&r| r != me).collect()
}

/// Tell each peer how many records to expect; learn the same from them.
///
/// A count is sent to every peer, including zero counts.
pub fn exchange_sizes<C: Communicator>(
    send_counts: &BTreeMap<usize, usize>,
    comm: &C,
    tag: CommTag,
    peers: &BTreeSet<usize>,
) -> Result<BTreeMap<usize, usize>, DofError> {
    let mut recv_size = Vec::with_capacity(peers.len());
    for &nbr in peers {
        let mut hint = [0u8; size_of::<WireCount>()];
        recv_size.push((nbr, comm.irecv(nbr, tag.as_u16(), &mut hint)));
    }

    let mut pending_sends = Vec::with_capacity(peers.len());
    for &nbr in peers {
        let wire = WireCount::new(send_counts.get(&nbr).copied().unwrap_or(0));
        pending_sends.push(comm.isend(nbr, tag.as_u16(), cast_slice(std::slice::from_ref(&wire))));
    }

    let mut sizes_in = BTreeMap::new();
    let mut maybe_err = None;
    for (nbr, h) in recv_size {
        match h.wait() {
            Some(data) if data.len() == size_of::<WireCount>() => {
                if let Ok(cnt) = decode_records::<WireCount>(&data) {
                    sizes_in.insert(nbr, cnt[0].get());
                }
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(DofError::CommError {
                    neighbor: nbr,
                    source: format!(
                        "expected {} bytes for size header, got {}",
                        size_of::<WireCount>(),
                        data.len()
                    )
                    .into(),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(DofError::CommError {
                    neighbor: nbr,
                    source: format!("failed to receive size from rank {nbr}").into(),
                });
            }
            _ => {}
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(sizes_in),
    }
}

/// Ship `outgoing[peer]` to each peer and receive `expected[peer]` records
/// back from it.
pub fn exchange_records<C: Communicator, T: Pod>(
    outgoing: &BTreeMap<usize, Vec<T>>,
    expected: &BTreeMap<usize, usize>,
    comm: &C,
    tag: CommTag,
    peers: &BTreeSet<usize>,
) -> Result<BTreeMap<usize, Vec<T>>, DofError> {
    let mut recv_data = Vec::new();
    for &nbr in peers {
        let n_items = expected.get(&nbr).copied().unwrap_or(0);
        if n_items == 0 {
            continue;
        }
        let mut hint = vec![0u8; n_items * size_of::<T>()];
        recv_data.push((nbr, n_items, comm.irecv(nbr, tag.as_u16(), &mut hint)));
    }

    let mut pending_sends = Vec::new();
    for &nbr in peers {
        match outgoing.get(&nbr) {
            Some(records) if !records.is_empty() => {
                pending_sends.push(comm.isend(nbr, tag.as_u16(), cast_slice(records)));
            }
            _ => {}
        }
    }

    let mut incoming = BTreeMap::new();
    let mut maybe_err = None;
    for (nbr, n_items, h) in recv_data {
        let Some(raw) = h.wait() else {
            maybe_err.get_or_insert(DofError::CommError {
                neighbor: nbr,
                source: "no data received (wait returned None)".into(),
            });
            continue;
        };
        let want = n_items * size_of::<T>();
        if raw.len() != want {
            maybe_err.get_or_insert(DofError::BufferSizeMismatch {
                neighbor: nbr,
                expected: want,
                got: raw.len(),
            });
            continue;
        }
        match decode_records::<T>(&raw) {
            Ok(records) => {
                incoming.insert(nbr, records);
            }
            Err(msg) => {
                maybe_err.get_or_insert(DofError::CommError {
                    neighbor: nbr,
                    source: msg.into(),
                });
            }
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(incoming),
    }
}

/// Size exchange followed by record exchange on two tags.
pub fn exchange_variable<C: Communicator, T: Pod>(
    outgoing: &BTreeMap<usize, Vec<T>>,
    comm: &C,
    size_tag: CommTag,
    data_tag: CommTag,
    peers: &BTreeSet<usize>,
) -> Result<BTreeMap<usize, Vec<T>>, DofError> {
    let send_counts = outgoing.iter().map(|(&r, v)| (r, v.len())).collect();
    let recv_counts = exchange_sizes(&send_counts, comm, size_tag, peers)?;
    exchange_records(outgoing, &recv_counts, comm, data_tag, peers)
}
