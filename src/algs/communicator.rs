//! Thin façade over intra-process (thread) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking; the numbering protocol
//! calls `.wait()` before it trusts that the buffer is ready. Messages between
//! one `(src, dst, tag)` triple are delivered in send order.

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Arc;

/// Non-blocking communication interface.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive; `buf` is a size hint, the payload comes back from `wait`.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Rank of this process in the communicator.
    fn rank(&self) -> usize;
    /// Number of ranks.
    fn size(&self) -> usize;

    /// True for the serial no-op backend.
    fn is_no_comm(&self) -> bool {
        false
    }

    /// Gather `send` from every rank into `recv` (rank-major, equal sizes).
    fn allgather(&self, send: &[u8], recv: &mut [u8]) {
        let me = self.rank();
        let n = self.size().max(1);
        let chunk = send.len();
        debug_assert_eq!(recv.len(), chunk * n);
        recv[me * chunk..(me + 1) * chunk].copy_from_slice(send);
        if n == 1 || self.is_no_comm() {
            return;
        }
        let mut sends = Vec::with_capacity(n - 1);
        for peer in (0..n).filter(|&p| p != me) {
            sends.push(self.isend(peer, ALLGATHER_TAG, send));
        }
        for peer in (0..n).filter(|&p| p != me) {
            let mut hint = vec![0u8; chunk];
            let data = self.irecv(peer, ALLGATHER_TAG, &mut hint).wait();
            if let Some(data) = data {
                let len = data.len().min(chunk);
                recv[peer * chunk..peer * chunk + len].copy_from_slice(&data[..len]);
            }
        }
        for s in sends {
            let _ = s.wait();
        }
    }
}

/// Reserved tag for [`Communicator::allgather`].
pub const ALLGATHER_TAG: u16 = 0xFFF0;

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Message tag newtype.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Tag `offset` steps above this one.
    pub const fn offset(self, offset: u16) -> Self {
        Self(self.0.wrapping_add(offset))
    }
}

/// Tags for each round of the DOF ownership negotiation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DofCommTags {
    pub sizes: CommTag,
    pub claims: CommTag,
    pub owners: CommTag,
    pub gids_up: CommTag,
    pub gids_down: CommTag,
    pub graph_sizes: CommTag,
    pub graph_rows: CommTag,
    pub ghost_sizes: CommTag,
    pub ghost_gids: CommTag,
}

impl DofCommTags {
    /// Derive consecutive tags from `base`.
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            sizes: base,
            claims: base.offset(1),
            owners: base.offset(2),
            gids_up: base.offset(3),
            gids_down: base.offset(4),
            graph_sizes: base.offset(5),
            graph_rows: base.offset(6),
            ghost_sizes: base.offset(7),
            ghost_gids: base.offset(8),
        }
    }
}

impl Default for DofCommTags {
    fn default() -> Self {
        Self::from_base(CommTag::new(0xD0F0))
    }
}

/// Compile-time no-op comm for pure serial unit tests.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- RayonComm: intra-process / multi-thread ---
type Key = (usize, usize, u16); // (src, dst, tag)
type Mailbox = DashMap<Key, VecDeque<Bytes>>;

static MAILBOX: Lazy<Arc<Mailbox>> = Lazy::new(|| Arc::new(DashMap::new()));

pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(mut queue) = self.mailbox.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    return Some(bytes.to_vec());
                }
            }
            std::thread::yield_now();
        }
    }
}

/// In-process communicator: each rank runs on its own thread.
///
/// Ranks created with [`RayonComm::new`] share one process-global mailbox;
/// tests that use it concurrently must not reuse tags (or run `#[serial]`).
/// [`RayonComm::world`] returns ranks with a private mailbox.
#[derive(Clone)]
pub struct RayonComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for RayonComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RayonComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl RayonComm {
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            mailbox: Arc::clone(&MAILBOX),
        }
    }

    /// `size` ranks sharing a mailbox that no other communicator sees.
    pub fn world(size: usize) -> Vec<Self> {
        let mailbox: Arc<Mailbox> = Arc::new(DashMap::new());
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag);
        self.mailbox
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::environment::Universe;
    use mpi::request::StaticScope;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    pub struct MpiComm {
        world: Arc<SimpleCommunicator>,
        rank: usize,
        size: usize,
        _universe: Arc<Universe>,
    }

    // The communicator is only driven from the thread that initialised MPI.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        /// Initialise MPI and wrap `MPI_COMM_WORLD`.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                world: Arc::new(world),
                rank,
                size,
                _universe: Arc::new(universe),
            })
        }
    }

    pub struct MpiHandle(Option<Box<dyn FnOnce() -> Option<Vec<u8>>>>);

    impl Wait for MpiHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            self.0.take().and_then(|f| f())
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let data: &'static [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let raw = data as *const [u8] as *mut [u8];
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, data, tag as i32);
            MpiHandle(Some(Box::new(move || {
                req.wait();
                // SAFETY: `raw` came from `Box::leak` above and the request
                // that borrowed it has completed.
                unsafe { drop(Box::from_raw(raw)) };
                None
            })))
        }

        fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> MpiHandle {
            let world = Arc::clone(&self.world);
            MpiHandle(Some(Box::new(move || {
                let (data, _status) = world
                    .process_at_rank(peer as i32)
                    .receive_vec_with_tag::<u8>(tag as i32);
                Some(data)
            })))
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
