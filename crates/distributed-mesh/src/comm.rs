//! Message-passing communicators.
//!
//! Ranks exchange tagged byte payloads point to point. Messages between a
//! pair of ranks are delivered in order, and a receive names the tag it
//! expects so that ranks calling collectives in a different order fail
//! instead of mixing up data.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Barrier};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::{MeshError, MeshResult};

/// Identifies the collective a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Broadcast,
    Scatter,
    Gather,
    Halo,
}

impl Tag {
    /// Wire value of the tag for transports with integer tags.
    pub fn code(self) -> i32 {
        match self {
            Tag::Broadcast => 1,
            Tag::Scatter => 2,
            Tag::Gather => 3,
            Tag::Halo => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Tag::Broadcast),
            2 => Some(Tag::Scatter),
            3 => Some(Tag::Gather),
            4 => Some(Tag::Halo),
            _ => None,
        }
    }
}

/// A fixed group of cooperating ranks.
pub trait Communicator {
    /// This process' rank, in `0..size()`.
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Block until every rank has reached the barrier.
    fn barrier(&self) -> MeshResult<()>;

    fn send(&self, dest: usize, tag: Tag, payload: Bytes) -> MeshResult<()>;

    fn recv(&self, source: usize, tag: Tag) -> MeshResult<Bytes>;

    /// Distribute `payload` from `root` to every rank. The payload passed by
    /// non-root ranks is ignored.
    fn broadcast(&self, root: usize, payload: Bytes) -> MeshResult<Bytes> {
        check_rank(root, self.size())?;
        if self.rank() == root {
            for dest in (0..self.size()).filter(|r| *r != root) {
                self.send(dest, Tag::Broadcast, payload.clone())?;
            }
            Ok(payload)
        } else {
            self.recv(root, Tag::Broadcast)
        }
    }

    /// Broadcast a single flag from `root`.
    fn broadcast_flag(&self, root: usize, flag: bool) -> MeshResult<bool> {
        let payload = self.broadcast(root, Bytes::copy_from_slice(&[flag as u8]))?;
        Ok(payload.first().copied().unwrap_or(0) != 0)
    }
}

pub(crate) fn check_rank(rank: usize, size: usize) -> MeshResult<()> {
    if rank >= size {
        return Err(MeshError::InvalidRank { rank, size });
    }
    Ok(())
}

/// Little-endian encoding of a slice of doubles.
pub fn encode_f64s(values: &[f64]) -> Bytes {
    let mut buf = BytesMut::with_capacity(values.len() * 8);
    for v in values {
        buf.put_f64_le(*v);
    }
    buf.freeze()
}

/// Decode little-endian doubles into `out`, which must match the payload length.
pub fn decode_f64s_into(mut payload: Bytes, out: &mut [f64], what: &str) -> MeshResult<()> {
    if payload.len() != out.len() * 8 {
        return Err(MeshError::SizeMismatch {
            what: what.to_string(),
            expected: out.len(),
            found: payload.len() / 8,
        });
    }
    for slot in out.iter_mut() {
        *slot = payload.get_f64_le();
    }
    Ok(())
}

/// The single-rank communicator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> MeshResult<()> {
        Ok(())
    }

    fn send(&self, dest: usize, _tag: Tag, _payload: Bytes) -> MeshResult<()> {
        check_rank(dest, 1)?;
        Err(MeshError::Comm("serial communicator cannot send to itself".to_string()))
    }

    fn recv(&self, source: usize, _tag: Tag) -> MeshResult<Bytes> {
        check_rank(source, 1)?;
        Err(MeshError::Comm("serial communicator cannot receive from itself".to_string()))
    }
}

/// In-process communicator: one thread per rank, one channel per ordered
/// pair of ranks. Used to run multi-rank collectives in tests; separate
/// processes use `MpiComm`.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    senders: Vec<Sender<(Tag, Bytes)>>,
    receivers: Vec<Receiver<(Tag, Bytes)>>,
    barrier: Arc<Barrier>,
}

impl ThreadComm {
    /// Create the communicators of a group of `size` ranks, indexed by rank.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let barrier = Arc::new(Barrier::new(size));

        // senders[src][dst] pairs with receivers[dst][src]
        let mut senders: Vec<Vec<Sender<(Tag, Bytes)>>> = (0..size).map(|_| Vec::new()).collect();
        let mut receivers: Vec<Vec<Receiver<(Tag, Bytes)>>> =
            (0..size).map(|_| Vec::new()).collect();
        for src in 0..size {
            for dst in 0..size {
                let (tx, rx) = channel();
                senders[src].push(tx);
                // Filled in src order, so receivers[dst][src] lines up
                receivers[dst].push(rx);
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| ThreadComm {
                rank,
                size,
                senders,
                receivers,
                barrier: Arc::clone(&barrier),
            })
            .collect()
    }

    /// Run `f` on `size` ranks, each on its own scoped thread, and return the
    /// per-rank results in rank order.
    pub fn run<T, F>(size: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(ThreadComm) -> T + Sync,
    {
        let comms = Self::group(size);
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| scope.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> MeshResult<()> {
        self.barrier.wait();
        Ok(())
    }

    fn send(&self, dest: usize, tag: Tag, payload: Bytes) -> MeshResult<()> {
        check_rank(dest, self.size)?;
        trace!(rank = self.rank, dest, ?tag, bytes = payload.len(), "send");
        self.senders[dest]
            .send((tag, payload))
            .map_err(|_| MeshError::Disconnected { peer: dest })
    }

    fn recv(&self, source: usize, tag: Tag) -> MeshResult<Bytes> {
        check_rank(source, self.size)?;
        let (found, payload) = self.receivers[source]
            .recv()
            .map_err(|_| MeshError::Disconnected { peer: source })?;
        if found != tag {
            return Err(MeshError::TagMismatch {
                peer: source,
                expected: tag,
                found,
            });
        }
        trace!(rank = self.rank, source, ?tag, bytes = payload.len(), "recv");
        Ok(payload)
    }
}
