//! DMA descriptor ring.
//!
//! Fixed-capacity circular queue of transfer descriptors. Producers submit at
//! `head`, the completion path retires descriptors in FIFO order from `tail`.
//! All state sits behind one lock so submit and complete may run on
//! different threads.

use crate::common::SimError;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Ring operation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("descriptor ring overrun")]
    Overrun,
    #[error("descriptor ring empty")]
    Empty,
}

impl From<RingError> for SimError {
    fn from(err: RingError) -> Self {
        match err {
            RingError::Overrun => SimError::ResourceExhausted(err.to_string()),
            RingError::Empty => SimError::InvalidParameter(err.to_string()),
        }
    }
}

/// One slot of the ring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Descriptor {
    pub buffer_addr: u64,
    pub length: u32,
    pub flags: u32,
    /// Nanoseconds since the ring was created, stamped on submit.
    pub submitted_ns: u64,
    pub status: u32,
}

/// A retired descriptor together with its queueing latency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Completion {
    /// Slot the descriptor occupied.
    pub index: usize,
    pub buffer_addr: u64,
    pub length: u32,
    pub flags: u32,
    pub status: u32,
    pub latency_ns: u64,
}

/// Monotonic ring counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RingStats {
    pub submissions: u64,
    pub completions: u64,
    pub overruns: u64,
}

struct RingState {
    descriptors: Box<[Descriptor]>,
    head: usize,
    tail: usize,
    count: usize,
    stats: RingStats,
}

/// Circular descriptor queue for one transfer direction.
pub struct RingBuffer {
    name: &'static str,
    epoch: Instant,
    state: Mutex<RingState>,
}

impl RingBuffer {
    /// Creates a ring of `capacity` zeroed descriptors.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            epoch: Instant::now(),
            state: Mutex::new(RingState {
                descriptors: vec![Descriptor::default(); capacity].into_boxed_slice(),
                head: 0,
                tail: 0,
                count: 0,
                stats: RingStats::default(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn now_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Queues a descriptor at `head` and returns its slot index.
    ///
    /// # Errors
    ///
    /// [`RingError::Overrun`] when the ring is full. The overrun counter is
    /// bumped and head / tail stay where they are.
    pub fn submit(&self, buffer_addr: u64, length: u32, flags: u32) -> Result<usize, RingError> {
        let now = self.now_ns();
        let mut s = self.state.lock();
        let capacity = s.descriptors.len();
        if s.count >= capacity {
            s.stats.overruns += 1;
            warn!(ring = self.name, capacity, "descriptor ring overrun");
            return Err(RingError::Overrun);
        }

        let head = s.head;
        s.descriptors[head] = Descriptor {
            buffer_addr,
            length,
            flags,
            submitted_ns: now,
            status: 0,
        };
        s.head = (head + 1) % capacity;
        s.count += 1;
        s.stats.submissions += 1;
        debug!(
            ring = self.name,
            index = head,
            addr = format_args!("{buffer_addr:#x}"),
            length,
            "descriptor submitted"
        );
        Ok(head)
    }

    /// Retires the descriptor at `tail`, storing `status` in it.
    ///
    /// # Errors
    ///
    /// [`RingError::Empty`] when nothing is queued.
    pub fn complete(&self, status: u32) -> Result<Completion, RingError> {
        let now = self.now_ns();
        let mut s = self.state.lock();
        if s.count == 0 {
            return Err(RingError::Empty);
        }

        let capacity = s.descriptors.len();
        let tail = s.tail;
        let desc = &mut s.descriptors[tail];
        desc.status = status;
        let completion = Completion {
            index: tail,
            buffer_addr: desc.buffer_addr,
            length: desc.length,
            flags: desc.flags,
            status,
            latency_ns: now.saturating_sub(desc.submitted_ns),
        };
        s.tail = (tail + 1) % capacity;
        s.count -= 1;
        s.stats.completions += 1;
        debug!(
            ring = self.name,
            index = tail,
            status,
            latency_ns = completion.latency_ns,
            "descriptor completed"
        );
        Ok(completion)
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().descriptors.len()
    }

    /// Descriptors currently queued.
    pub fn len(&self) -> usize {
        self.state.lock().count
    }

    /// Free slots.
    pub fn space(&self) -> usize {
        let s = self.state.lock();
        s.descriptors.len() - s.count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.space() == 0
    }

    pub fn head(&self) -> usize {
        self.state.lock().head
    }

    pub fn tail(&self) -> usize {
        self.state.lock().tail
    }

    pub fn stats(&self) -> RingStats {
        self.state.lock().stats
    }

    /// Copy of the descriptor in slot `index`, if it exists.
    pub fn descriptor(&self, index: usize) -> Option<Descriptor> {
        self.state.lock().descriptors.get(index).copied()
    }
}
