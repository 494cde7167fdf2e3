//! Descriptor ring tests.

use pcie_sim::soc::ring::{RingBuffer, RingError};
use std::thread;

/// A new ring is empty with all slots free.
#[test]
fn test_ring_new_is_empty() {
    let ring = RingBuffer::new("tx", 8);
    assert_eq!(ring.capacity(), 8);
    assert_eq!(ring.len(), 0);
    assert_eq!(ring.space(), 8);
    assert!(ring.is_empty());
    assert!(!ring.is_full());
    assert_eq!(ring.head(), 0);
    assert_eq!(ring.tail(), 0);
    assert_eq!(ring.descriptor(0).map(|d| d.length), Some(0));
}

/// Completing on an empty ring reports Empty.
#[test]
fn test_ring_complete_empty() {
    let ring = RingBuffer::new("rx", 4);
    assert_eq!(ring.complete(0), Err(RingError::Empty));
    assert_eq!(ring.stats().completions, 0);
}

/// Descriptors complete in submission order.
#[test]
fn test_ring_fifo_order() {
    let ring = RingBuffer::new("tx", 16);
    for i in 0..10u32 {
        ring.submit(0x1000 * u64::from(i), 64 + i, i).unwrap();
    }
    for i in 0..10u32 {
        let c = ring.complete(0).unwrap();
        assert_eq!(c.length, 64 + i);
        assert_eq!(c.flags, i);
        assert_eq!(c.buffer_addr, 0x1000 * u64::from(i));
    }
    assert!(ring.is_empty());
}

/// Submitting to a full ring fails and leaves head and tail untouched.
#[test]
fn test_ring_overrun() {
    let ring = RingBuffer::new("tx", 4);
    for _ in 0..4 {
        ring.submit(0, 128, 0).unwrap();
    }
    assert!(ring.is_full());
    let head = ring.head();
    let tail = ring.tail();

    assert_eq!(ring.submit(0, 128, 0), Err(RingError::Overrun));
    assert_eq!(ring.submit(0, 128, 0), Err(RingError::Overrun));

    let stats = ring.stats();
    assert_eq!(stats.overruns, 2);
    assert_eq!(stats.submissions, 4);
    assert_eq!(ring.head(), head);
    assert_eq!(ring.tail(), tail);
    assert_eq!(ring.len(), 4);
}

/// Head and tail wrap modulo capacity.
#[test]
fn test_ring_wraparound() {
    let ring = RingBuffer::new("tx", 3);
    for round in 0..5u32 {
        ring.submit(0, 100 + round, 0).unwrap();
        ring.submit(0, 200 + round, 0).unwrap();
        assert_eq!(ring.complete(0).unwrap().length, 100 + round);
        assert_eq!(ring.complete(0).unwrap().length, 200 + round);
    }
    assert_eq!(ring.head(), 10 % 3);
    assert_eq!(ring.tail(), 10 % 3);
    assert_eq!(ring.stats().submissions, 10);
    assert_eq!(ring.stats().completions, 10);
}

/// Submit reports the slot it filled, wrapping at capacity.
#[test]
fn test_ring_submit_returns_slot() {
    let ring = RingBuffer::new("tx", 2);
    assert_eq!(ring.submit(0x10, 64, 0), Ok(0));
    assert_eq!(ring.submit(0x20, 64, 0), Ok(1));
    let first = ring.complete(0).unwrap();
    assert_eq!(first.index, 0);
    assert_eq!(ring.submit(0x30, 64, 0), Ok(0));
    assert_eq!(ring.complete(0).unwrap().index, 1);
    assert_eq!(ring.complete(0).unwrap().buffer_addr, 0x30);
}

/// Completion stores the status in the retired slot.
#[test]
fn test_ring_complete_stores_status() {
    let ring = RingBuffer::new("rx", 2);
    ring.submit(0xdead_0000, 512, 0x6).unwrap();
    let c = ring.complete(0x5).unwrap();
    assert_eq!(c.index, 0);
    assert_eq!(c.status, 0x5);
    assert_eq!(ring.descriptor(0).map(|d| d.status), Some(0x5));
}

/// Count always equals submissions minus completions.
#[test]
fn test_ring_count_invariant() {
    let ring = RingBuffer::new("tx", 8);
    let ops = [true, true, true, false, true, false, false, true, true, true, true, true, true, true];
    for submit in ops {
        if submit {
            let _ = ring.submit(0, 1, 0);
        } else {
            let _ = ring.complete(0);
        }
        let s = ring.stats();
        assert_eq!(ring.len() as u64, s.submissions - s.completions);
        assert!(ring.len() <= ring.capacity());
    }
}

/// Concurrent producer and consumer keep the ring consistent.
#[test]
fn test_ring_concurrent_submit_complete() {
    let ring = RingBuffer::new("tx", 32);
    let total = 2_000u32;

    thread::scope(|s| {
        s.spawn(|| {
            let mut sent = 0;
            while sent < total {
                if ring.submit(u64::from(sent), sent, 0).is_ok() {
                    sent += 1;
                }
            }
        });
        s.spawn(|| {
            let mut expected = 0;
            while expected < total {
                if let Ok(c) = ring.complete(0) {
                    assert_eq!(c.length, expected);
                    expected += 1;
                }
            }
        });
    });

    let stats = ring.stats();
    assert_eq!(stats.submissions, u64::from(total));
    assert_eq!(stats.completions, u64::from(total));
    assert!(ring.is_empty());
}
