//! Bounded hand-off queue between the hardware callback and the transport
//! pull context.
//!
//! The producer side runs on the audio subsystem's own thread and must
//! return promptly, so a full queue is resolved immediately by policy
//! rather than by waiting. Only the consumer side may block, and only up to
//! its caller's timeout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// What to do with an incoming block when the queue is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Discard the incoming block, keep what is queued
    DropNewest,
    /// Discard the single oldest block to make room; keeps consumer-side
    /// latency bounded to the freshest audio at the cost of a skip
    #[default]
    EvictOldest,
}

/// Fixed-capacity FIFO of captured audio blocks
pub struct BlockQueue {
    tx: Sender<Bytes>,
    rx: Receiver<Bytes>,
    capacity: usize,
    policy: OverflowPolicy,
    dropped: AtomicU64,
    evicted: AtomicU64,
}

impl BlockQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            capacity,
            policy,
            dropped: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Enqueue one block. Never blocks; a full queue is resolved by the
    /// configured policy.
    pub fn push(&self, block: Bytes) {
        match self.policy {
            OverflowPolicy::DropNewest => {
                if self.tx.try_send(block).is_err() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            OverflowPolicy::EvictOldest => {
                if self.tx.is_full() && self.rx.try_recv().is_ok() {
                    self.evicted.fetch_add(1, Ordering::Relaxed);
                }
                if self.tx.try_send(block).is_err() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Dequeue one block, waiting up to `timeout` for one to arrive
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Bytes> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_pop(&self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Blocks discarded on arrival (both policies count here when the
    /// eviction itself lost a race and the queue stayed full)
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Oldest blocks removed to admit newer ones
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}
